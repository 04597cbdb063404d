pub mod checkout;
pub mod common;
pub mod coupons;
pub mod enrollments;
pub mod orders;

use crate::config::AppConfig;
use crate::db::{DatabaseAccess, DbPool};
use crate::events::EventSender;
use crate::services::{
    checkout::CheckoutService,
    coupons::CouponService,
    enrollments::EnrollmentService,
    orders::OrderService,
    payments::{MockPaymentProcessor, PaymentProcessor, SimulatedPaymentProcessor},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub coupons: Arc<CouponService>,
    pub enrollments: Arc<EnrollmentService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    /// Build the default AppServices container with the standard payment
    /// processor pair: the simulated gateway plus the approving mock used
    /// for test-mode checkouts.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self::with_payment_processors(
            db_pool,
            event_sender,
            config,
            Arc::new(SimulatedPaymentProcessor),
            Arc::new(MockPaymentProcessor::approving()),
        )
    }

    /// Build AppServices with explicit payment processors. Tests use this to
    /// inject declining processors.
    pub fn with_payment_processors(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
        payment: Arc<dyn PaymentProcessor>,
        test_payment: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let db_access = DatabaseAccess::new(db_pool.clone());

        let coupons = Arc::new(CouponService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let enrollments = Arc::new(EnrollmentService::new(
            db_access.clone(),
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(OrderService::new(db_pool));
        let checkout = Arc::new(CheckoutService::new(
            db_access,
            event_sender,
            coupons.clone(),
            enrollments.clone(),
            payment,
            test_payment,
            config.default_currency.clone(),
            config.payment_test_mode,
        ));

        Self {
            coupons,
            enrollments,
            orders,
            checkout,
        }
    }
}
