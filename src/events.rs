use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
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
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderConfirmed(Uuid),

    // Checkout events
    CheckoutCompleted {
        order_id: Uuid,
        customer_id: Uuid,
    },
    CheckoutFailed {
        customer_id: Uuid,
        reason: String,
    },

    // Payment events
    PaymentCaptured {
        order_id: Uuid,
        transaction_id: String,
        amount: Decimal,
    },
    PaymentFailed(Uuid),

    // Enrollment events
    EnrollmentCreated {
        student_id: Uuid,
        course_id: Uuid,
    },

    // Coupon events
    CouponCreated(String),
    CouponDeactivated(String),
    CouponRedeemed {
        code: String,
        order_id: Uuid,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        metadata: serde_json::Value,
    },
}

/// Consumes events off the channel until every sender is dropped.
///
/// Handlers here are intentionally side-effect light: downstream consumers
/// (notifications, analytics) subscribe by extending the match arms.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(%order_id, "order created");
            }
            Event::OrderConfirmed(order_id) => {
                info!(%order_id, "order confirmed");
            }
            Event::CheckoutCompleted {
                order_id,
                customer_id,
            } => {
                info!(%order_id, %customer_id, "checkout completed");
            }
            Event::CheckoutFailed {
                customer_id,
                reason,
            } => {
                info!(%customer_id, reason = %reason, "checkout failed");
            }
            Event::PaymentCaptured {
                order_id,
                transaction_id,
                amount,
            } => {
                info!(%order_id, %transaction_id, %amount, "payment captured");
            }
            Event::PaymentFailed(order_id) => {
                info!(%order_id, "payment failed");
            }
            Event::EnrollmentCreated {
                student_id,
                course_id,
            } => {
                info!(%student_id, %course_id, "enrollment created");
            }
            Event::CouponCreated(code) => {
                info!(code = %code, "coupon created");
            }
            Event::CouponDeactivated(code) => {
                info!(code = %code, "coupon deactivated");
            }
            Event::CouponRedeemed { code, order_id } => {
                info!(code = %code, %order_id, "coupon redeemed");
            }
            Event::Generic { message, .. } => {
                info!(message = %message, "event received");
            }
        }
    }

    error!("Event processing loop terminated: channel closed");
}
