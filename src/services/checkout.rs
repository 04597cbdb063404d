use crate::{
    db::DatabaseAccess,
    entities::{coupon, enrollment, order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        coupons::CouponService,
        enrollments::{EnrollmentOp, EnrollmentService},
        payments::{self, PaymentMethod, PaymentProcessor, PaymentReceipt},
        pricing,
    },
};
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Client-supplied totals may drift from server math by at most one cent.
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

const STATUS_PENDING: &str = "pending";
const STATUS_CONFIRMED: &str = "confirmed";
const PAYMENT_STATUS_PAID: &str = "paid";

/// Billing address captured with the order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub country_code: String,
    pub postal_code: String,
}

/// One cart line. Exactly one of `course_id` / `product_id` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub course_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    pub student_id: Uuid,
    #[validate(length(min = 1, message = "Cart must contain at least one item"))]
    pub cart_items: Vec<CartItem>,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    /// Route this checkout through the mock payment processor
    #[serde(default)]
    pub use_test_mode: bool,
}

/// Receipt returned once the checkout transaction has committed
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub payment_status: String,
    pub enrollment_ids: Vec<Uuid>,
    pub discount: Decimal,
    pub final_total: Decimal,
}

/// Orchestrates a checkout: validates the cart and coupon, prices the
/// order, then performs every write — order, payment record, enrollments,
/// coupon redemption — inside one all-or-nothing transaction.
#[derive(Clone)]
pub struct CheckoutService {
    db: DatabaseAccess,
    event_sender: Arc<EventSender>,
    coupons: Arc<CouponService>,
    enrollments: Arc<EnrollmentService>,
    payment: Arc<dyn PaymentProcessor>,
    test_payment: Arc<dyn PaymentProcessor>,
    currency: String,
    payment_test_mode: bool,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseAccess,
        event_sender: Arc<EventSender>,
        coupons: Arc<CouponService>,
        enrollments: Arc<EnrollmentService>,
        payment: Arc<dyn PaymentProcessor>,
        test_payment: Arc<dyn PaymentProcessor>,
        currency: String,
        payment_test_mode: bool,
    ) -> Self {
        Self {
            db,
            event_sender,
            coupons,
            enrollments,
            payment,
            test_payment,
            currency,
            payment_test_mode,
        }
    }

    /// Converts a cart into an order, a payment, enrollments, and a coupon
    /// redemption, atomically.
    ///
    /// Validation failures (bad cart, bad totals, invalid coupon) return
    /// before anything is written. Once the transaction opens, any failure —
    /// declined payment, duplicate enrollment, exhausted coupon quota —
    /// rolls back every write and propagates the original error kind.
    #[instrument(skip(self, request), fields(student_id = %request.student_id, item_count = request.cart_items.len()))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        validate_items(&request.cart_items)?;

        if request.subtotal < Decimal::ZERO || request.total < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Totals must not be negative".to_string(),
            ));
        }

        // Never trust client math: the cart lines are the source of truth.
        let computed_subtotal = compute_subtotal(&request.cart_items);
        ensure_within_tolerance(request.subtotal, computed_subtotal, "subtotal")?;

        let applied_coupon = match &request.coupon_code {
            Some(code) => Some(self.coupons.validate(code, computed_subtotal).await?),
            None => None,
        };

        let pricing = pricing::compute_discount(applied_coupon.as_ref(), computed_subtotal);
        ensure_within_tolerance(request.total, pricing.total, "total")?;

        let order_id = Uuid::new_v4();
        let order_number = format!("ORD-{}", &order_id.simple().to_string()[..8].to_uppercase());

        let enrollment_ops: Vec<EnrollmentOp> = request
            .cart_items
            .iter()
            .filter_map(|item| item.course_id)
            .map(|course_id| {
                self.enrollments
                    .enrollment_op(request.student_id, course_id, Some(order_id))
            })
            .collect();

        let processor = if request.use_test_mode || self.payment_test_mode {
            self.test_payment.clone()
        } else {
            self.payment.clone()
        };

        let billing_address = request
            .billing_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ServiceError::InvalidInput(format!("Invalid billing address: {}", e)))?;

        let txn_result = self
            .run_checkout_transaction(CheckoutWrites {
                order_id,
                order_number,
                student_id: request.student_id,
                payment_method: request.payment_method,
                items: request.cart_items.clone(),
                billing_address,
                coupon: applied_coupon,
                subtotal: computed_subtotal,
                discount: pricing.discount,
                final_total: pricing.total,
                enrollment_ops,
                processor,
            })
            .await;

        match txn_result {
            Ok((order_row, receipt, enrollments)) => {
                counter!("learnstack_checkout.completed", 1);
                self.emit_success_events(&order_row, &receipt, &enrollments)
                    .await;

                info!(
                    order_id = %order_row.id,
                    total = %order_row.total_amount,
                    "Checkout completed"
                );

                Ok(CheckoutReceipt {
                    order_id: order_row.id,
                    order_number: order_row.order_number,
                    payment_status: order_row.payment_status,
                    enrollment_ids: enrollments.into_iter().map(|e| e.id).collect(),
                    discount: order_row.discount,
                    final_total: order_row.total_amount,
                })
            }
            Err(err) => {
                counter!("learnstack_checkout.failed", 1, "kind" => err.kind());
                if let Err(e) = self
                    .event_sender
                    .send(Event::CheckoutFailed {
                        customer_id: request.student_id,
                        reason: err.kind().to_string(),
                    })
                    .await
                {
                    warn!(error = %e, "Failed to send checkout failed event");
                }
                Err(err)
            }
        }
    }

    /// Performs the write phase. Everything here shares one transaction
    /// handle: the order row and its item snapshot, the gateway charge, the
    /// enrollment batch, the coupon quota increment, and the payment record.
    async fn run_checkout_transaction(
        &self,
        writes: CheckoutWrites,
    ) -> Result<(order::Model, PaymentReceipt, Vec<enrollment::Model>), ServiceError> {
        let currency = self.currency.clone();

        self.db
            .transaction::<_, (order::Model, PaymentReceipt, Vec<enrollment::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let now = Utc::now();
                        let order_row = order::ActiveModel {
                            id: Set(writes.order_id),
                            order_number: Set(writes.order_number.clone()),
                            customer_id: Set(writes.student_id),
                            status: Set(STATUS_PENDING.to_string()),
                            order_date: Set(now),
                            subtotal: Set(writes.subtotal),
                            discount: Set(writes.discount),
                            total_amount: Set(writes.final_total),
                            currency: Set(currency.clone()),
                            payment_status: Set(STATUS_PENDING.to_string()),
                            payment_method: Set(Some(writes.payment_method.to_string())),
                            coupon_code: Set(writes.coupon.as_ref().map(|c| c.code.clone())),
                            billing_address: Set(writes.billing_address.clone()),
                            created_at: Set(now),
                            updated_at: Set(Some(now)),
                            version: Set(1),
                        }
                        .insert(txn)
                        .await?;

                        for item in &writes.items {
                            order_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                order_id: Set(writes.order_id),
                                course_id: Set(item.course_id),
                                product_id: Set(item.product_id),
                                quantity: Set(item.quantity),
                                unit_price: Set(item.price),
                                total_price: Set(item.price * Decimal::from(item.quantity)),
                                created_at: Set(now),
                            }
                            .insert(txn)
                            .await?;
                        }

                        // Charge before enrolling: a declined payment must
                        // leave nothing behind.
                        let receipt = writes
                            .processor
                            .charge(writes.order_id, writes.final_total, writes.payment_method)
                            .await?;

                        let enrollments =
                            EnrollmentService::run_batch(txn, writes.enrollment_ops).await?;

                        // The authoritative quota check: increments only while
                        // headroom remains, aborting the whole checkout otherwise.
                        if let Some(c) = &writes.coupon {
                            CouponService::redeem(txn, c.id, &c.code).await?;
                        }

                        payments::record_payment(
                            txn,
                            writes.order_id,
                            writes.final_total,
                            &currency,
                            writes.payment_method,
                            &receipt,
                        )
                        .await?;

                        let mut confirm: order::ActiveModel = order_row.into();
                        confirm.status = Set(STATUS_CONFIRMED.to_string());
                        confirm.payment_status = Set(PAYMENT_STATUS_PAID.to_string());
                        confirm.updated_at = Set(Some(Utc::now()));
                        confirm.version = Set(2);
                        let order_row = confirm.update(txn).await?;

                        Ok((order_row, receipt, enrollments))
                    })
                },
            )
            .await
    }

    async fn emit_success_events(
        &self,
        order_row: &order::Model,
        receipt: &PaymentReceipt,
        enrollments: &[enrollment::Model],
    ) {
        let events = std::iter::empty()
            .chain([
                Event::OrderCreated(order_row.id),
                Event::PaymentCaptured {
                    order_id: order_row.id,
                    transaction_id: receipt.transaction_id.clone(),
                    amount: order_row.total_amount,
                },
            ])
            .chain(enrollments.iter().map(|e| Event::EnrollmentCreated {
                student_id: e.student_id,
                course_id: e.course_id,
            }))
            .chain(order_row.coupon_code.iter().map(|code| Event::CouponRedeemed {
                code: code.clone(),
                order_id: order_row.id,
            }))
            .chain([Event::CheckoutCompleted {
                order_id: order_row.id,
                customer_id: order_row.customer_id,
            }]);

        for event in events {
            if let Err(e) = self.event_sender.send(event).await {
                warn!(error = %e, order_id = %order_row.id, "Failed to send checkout event");
            }
        }
    }
}

/// Everything the transactional phase needs, captured by value so the
/// closure owns its inputs.
struct CheckoutWrites {
    order_id: Uuid,
    order_number: String,
    student_id: Uuid,
    payment_method: PaymentMethod,
    items: Vec<CartItem>,
    billing_address: Option<String>,
    coupon: Option<coupon::Model>,
    subtotal: Decimal,
    discount: Decimal,
    final_total: Decimal,
    enrollment_ops: Vec<EnrollmentOp>,
    processor: Arc<dyn PaymentProcessor>,
}

fn compute_subtotal(items: &[CartItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

fn ensure_within_tolerance(
    client: Decimal,
    computed: Decimal,
    field: &str,
) -> Result<(), ServiceError> {
    if (client - computed).abs() > AMOUNT_TOLERANCE {
        return Err(ServiceError::AmountMismatch(format!(
            "client {} {} differs from server-computed {}",
            field, client, computed
        )));
    }
    Ok(())
}

fn validate_items(items: &[CartItem]) -> Result<(), ServiceError> {
    for (index, item) in items.iter().enumerate() {
        match (item.course_id, item.product_id) {
            (Some(_), Some(_)) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Cart item {} references both a course and a product",
                    index
                )))
            }
            (None, None) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Cart item {} references neither a course nor a product",
                    index
                )))
            }
            _ => {}
        }

        if item.quantity < 1 {
            return Err(ServiceError::InvalidInput(format!(
                "Cart item {} quantity must be at least 1",
                index
            )));
        }
        if item.price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "Cart item {} price must not be negative",
                index
            )));
        }
    }
    Ok(())
}
