use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

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

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Event delivery is best-effort; checkout operations never fail because
    /// of a full or closed event channel.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

// The events emitted by the checkout flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Session lifecycle
    CheckoutStarted {
        buyer_id: Uuid,
    },
    SessionCleared {
        buyer_id: Uuid,
    },

    // Address step
    AddressCreated {
        buyer_id: Uuid,
        address_id: Uuid,
    },
    AddressSelected {
        buyer_id: Uuid,
        address_id: Uuid,
        shipping_method_id: String,
    },

    // Payment step
    PaymentMethodRegistered {
        buyer_id: Uuid,
        payment_method_id: String,
    },
    PaymentMethodSelected {
        buyer_id: Uuid,
        payment_method_id: String,
    },
    PaymentMethodDeleted {
        buyer_id: Uuid,
        payment_method_id: String,
    },

    // Confirmation step
    OrderPlaced {
        buyer_id: Uuid,
        order_id: Uuid,
    },
    CheckoutDeclined {
        buyer_id: Uuid,
        reason: String,
    },
}

/// Consumes events from the channel and processes them.
///
/// Order placement is the only event with a side effect worth surfacing at
/// info level; the rest are logged for audit trails and debugging.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced { buyer_id, order_id } => {
                info!(%buyer_id, %order_id, "order placed");
            }
            Event::CheckoutDeclined { buyer_id, reason } => {
                warn!(%buyer_id, %reason, "checkout declined");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}
