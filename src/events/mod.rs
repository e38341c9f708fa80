use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order_item::FulfillmentStatus;

/// Handle for publishing domain events onto the in-process bus.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the bus is gone.
    /// Event delivery is best-effort; it never fails the request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, ?event, "Failed to publish event");
        }
    }
}

/// Domain events published after a state change commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Cart events
    CartItemAdded { user_id: Uuid, product_id: Uuid },
    CartItemRemoved { user_id: Uuid, product_id: Uuid },
    WishlistItemAdded { user_id: Uuid, product_id: Uuid },
    WishlistItemRemoved { user_id: Uuid, product_id: Uuid },

    // Order lifecycle events
    OrderPlaced(Uuid),
    OrderPaid(Uuid),
    OrderCancelled(Uuid),
    OrderReturned(Uuid),
    FulfillmentUpdated {
        order_item_id: Uuid,
        status: FulfillmentStatus,
    },

    // Review events
    ReviewCreated(Uuid),
    ReviewUpdated(Uuid),
    ReviewDeleted(Uuid),
}

/// Drains the event channel and logs what happened. Downstream consumers
/// (webhooks, analytics) would hang off this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced(order_id) => {
                info!(order_id = %order_id, "Order placed");
            }
            Event::OrderPaid(order_id) => {
                info!(order_id = %order_id, "Order payment captured");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "Order cancelled");
            }
            Event::OrderReturned(order_id) => {
                info!(order_id = %order_id, "Order returned");
            }
            Event::FulfillmentUpdated {
                order_item_id,
                status,
            } => {
                info!(order_item_id = %order_item_id, status = %status, "Fulfillment updated");
            }
            other => {
                info!(event = ?other, "Event received");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender.send(Event::OrderPlaced(Uuid::new_v4())).await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::OrderPlaced(_))));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out.
        sender.send_or_log(Event::OrderPaid(Uuid::new_v4())).await;
    }
}
