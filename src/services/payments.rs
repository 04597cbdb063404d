use crate::{entities::payment, errors::ServiceError};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment methods accepted at checkout
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Captured,
    Declined,
}

/// Successful charge outcome returned by a processor
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub status: PaymentStatus,
}

/// Narrow seam to the payment gateway.
///
/// Implementations are injected into the checkout service; a charge error
/// aborts the surrounding transaction, so processors must not leave partial
/// state behind on failure.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn charge(
        &self,
        order_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError>;
}

/// Stand-in for the live gateway integration.
///
/// Approves every charge with a synthetic transaction id. The real gateway
/// protocol lives behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPaymentProcessor;

#[async_trait]
impl PaymentProcessor for SimulatedPaymentProcessor {
    async fn charge(
        &self,
        order_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError> {
        info!(%order_id, %amount, %method, "processing payment");

        Ok(PaymentReceipt {
            transaction_id: format!("sim_{}", Uuid::new_v4().simple()),
            status: PaymentStatus::Captured,
        })
    }
}

/// Deterministic processor for test-mode checkouts and integration tests.
#[derive(Debug, Clone)]
pub struct MockPaymentProcessor {
    behavior: MockBehavior,
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Approve,
    Decline(String),
}

impl MockPaymentProcessor {
    /// Approves every charge.
    pub fn approving() -> Self {
        Self {
            behavior: MockBehavior::Approve,
        }
    }

    /// Declines every charge with the given reason.
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Decline(reason.into()),
        }
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    async fn charge(
        &self,
        order_id: Uuid,
        amount: Decimal,
        method: PaymentMethod,
    ) -> Result<PaymentReceipt, ServiceError> {
        info!(%order_id, %amount, %method, "processing mock payment");

        match &self.behavior {
            MockBehavior::Approve => Ok(PaymentReceipt {
                transaction_id: format!("mock_{}", Uuid::new_v4().simple()),
                status: PaymentStatus::Captured,
            }),
            MockBehavior::Decline(reason) => Err(ServiceError::PaymentFailed(reason.clone())),
        }
    }
}

/// Persists the payment record for an order inside the caller's transaction.
pub async fn record_payment<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    amount: Decimal,
    currency: &str,
    method: PaymentMethod,
    receipt: &PaymentReceipt,
) -> Result<payment::Model, ServiceError> {
    let model = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        amount: Set(amount),
        currency: Set(currency.to_string()),
        method: Set(method.to_string()),
        status: Set(receipt.status.to_string()),
        transaction_id: Set(Some(receipt.transaction_id.clone())),
        created_at: Set(Utc::now()),
    };

    Ok(model.insert(conn).await?)
}
