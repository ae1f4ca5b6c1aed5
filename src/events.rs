//! Order-update fan-out: the worker publishes after a care plan reaches a
//! terminal status, and every connected SSE client receives the update.
//!
//! In-process broadcast channel; subscribers that lag past the buffer miss
//! intermediate updates, which is acceptable — each event carries the order
//! id and the client re-reads current state.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// One order changed; subscribers should re-read its view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrderUpdate {
    pub order_id: i64,
}

/// Cloneable handle to the order-update broadcast channel.
#[derive(Debug, Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderUpdate>,
}

impl OrderEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an update. Returns the number of subscribers reached; zero
    /// subscribers is not an error.
    pub fn publish(&self, order_id: i64) -> usize {
        match self.tx.send(OrderUpdate { order_id }) {
            Ok(receivers) => {
                tracing::debug!(order_id, receivers, "Published order update");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderUpdate> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_updates() {
        let events = OrderEvents::new();
        let mut rx = events.subscribe();

        assert_eq!(events.publish(42), 1);
        let update = rx.recv().await.unwrap();
        assert_eq!(update.order_id, 42);
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let events = OrderEvents::new();
        assert_eq!(events.publish(1), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_update() {
        let events = OrderEvents::new();
        let mut a = events.subscribe();
        let mut b = events.subscribe();

        assert_eq!(events.publish(7), 2);
        assert_eq!(a.recv().await.unwrap().order_id, 7);
        assert_eq!(b.recv().await.unwrap().order_id, 7);
    }
}
