use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

// Define the events emitted by the checkout flow. Consumers react after the
// fact; no state transition ever depends on an event being delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    /// A provider-side order was opened for an internal order
    GatewayOrderCreated {
        order_id: Uuid,
        gateway_order_id: String,
    },
    OrderPaid {
        order_id: Uuid,
        gateway_payment_id: String,
    },
    /// Cash-on-delivery order accepted without gateway involvement
    OrderConfirmed(Uuid),
    OrderPaymentFailed {
        order_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Function to process incoming events. Today this is a logging consumer; a
// commission payout or notification worker would hook in here.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderCreated(order_id) => {
                info!("Order created: {}", order_id);
            }
            Event::GatewayOrderCreated {
                order_id,
                gateway_order_id,
            } => {
                info!(
                    "Gateway order {} opened for order {}",
                    gateway_order_id, order_id
                );
            }
            Event::OrderPaid {
                order_id,
                gateway_payment_id,
            } => {
                info!(
                    "Order {} paid with payment {}",
                    order_id, gateway_payment_id
                );
            }
            Event::OrderConfirmed(order_id) => {
                info!("Order confirmed for offline settlement: {}", order_id);
            }
            Event::OrderPaymentFailed { order_id, reason } => {
                warn!("Payment failed for order {}: {}", order_id, reason);
            }
        }
    }

    warn!("Event processing loop has ended");
}
