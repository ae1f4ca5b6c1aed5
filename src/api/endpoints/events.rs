//! Server-sent events: pushes the refreshed order view whenever a care plan
//! reaches a terminal status.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::api::types::ApiContext;
use crate::db::repository;

/// `GET /api/events` — SSE stream of order updates.
///
/// Opens with a `connected` event, then emits an `order-update` event with
/// the full order view each time the worker finishes a care plan.
pub async fn stream(
    State(ctx): State<ApiContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let client_id = Uuid::new_v4();
    tracing::debug!(
        %client_id,
        subscribers = ctx.events.subscriber_count(),
        "SSE client connected"
    );
    let rx = ctx.events.subscribe();

    let connected = stream::once(async { Ok(Event::default().event("connected").data("{}")) });

    let updates = stream::unfold((rx, ctx), move |(mut rx, ctx)| async move {
        loop {
            match rx.recv().await {
                Ok(update) => match order_event(&ctx, update.order_id) {
                    Some(event) => return Some((Ok(event), (rx, ctx))),
                    // Order vanished between publish and resolve, skip
                    None => continue,
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%client_id, skipped, "SSE client lagged behind order updates");
                    continue;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!(%client_id, "SSE client stream closed");
                    return None;
                }
            }
        }
    });

    Sse::new(connected.chain(updates)).keep_alive(KeepAlive::default())
}

fn order_event(ctx: &ApiContext, order_id: i64) -> Option<Event> {
    let conn = ctx.lock_db().ok()?;
    let view = match repository::fetch_order_view(&conn, order_id) {
        Ok(view) => view?,
        Err(e) => {
            tracing::error!(order_id, error = %e, "Failed to resolve order for SSE");
            return None;
        }
    };

    match Event::default().event("order-update").json_data(&view) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(order_id, error = %e, "Failed to serialize order update");
            None
        }
    }
}
