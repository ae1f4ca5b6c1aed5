//! Route table for the order intake service.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the service router.
///
/// Returns a `Router` with the order endpoints under `/api/` plus the
/// unversioned `/health` probe. CORS is permissive: the service fronts a
/// local clinic UI, not the open internet.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/api/orders",
            get(endpoints::orders::list).post(endpoints::orders::create),
        )
        .route("/api/orders/search", get(endpoints::orders::search))
        .route(
            "/api/orders/:id",
            get(endpoints::orders::detail).delete(endpoints::orders::remove),
        )
        .route("/api/events", get(endpoints::events::stream))
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
