// Each integration test binary compiles this module independently and
// uses a different subset of the helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use learnstack_api::{
    config::AppConfig,
    db,
    entities::{coupon, course},
    events::{self, EventSender},
    handlers::AppServices,
    services::payments::{MockPaymentProcessor, PaymentProcessor, SimulatedPaymentProcessor},
    AppState,
};

/// Helper harness for spinning up an application state backed by a
/// file-based SQLite database in a temporary directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state and the
    /// default payment processors.
    pub async fn new() -> Self {
        Self::with_payment_processors(
            Arc::new(SimulatedPaymentProcessor),
            Arc::new(MockPaymentProcessor::approving()),
        )
        .await
    }

    /// Construct a test application with explicit payment processors, for
    /// exercising declined-payment paths.
    pub async fn with_payment_processors(
        payment: Arc<dyn PaymentProcessor>,
        test_payment: Arc<dyn PaymentProcessor>,
    ) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("learnstack_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 5;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::with_payment_processors(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            &cfg,
            payment,
            test_payment,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .merge(learnstack_api::health_routes())
            .nest("/api/v1", learnstack_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Insert a published course priced in USD.
    pub async fn seed_course(&self, title: &str, price: Decimal) -> course::Model {
        let now = Utc::now();
        course::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            description: Set(Some(format!("Test course: {}", title))),
            price: Set(price),
            currency: Set("USD".to_string()),
            is_published: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed course for tests")
    }

    /// Insert a coupon directly, bypassing the admin endpoint.
    pub async fn seed_coupon(&self, seed: CouponSeed) -> coupon::Model {
        let now = Utc::now();
        coupon::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(seed.code),
            coupon_type: Set(seed.coupon_type),
            value: Set(seed.value),
            is_active: Set(seed.is_active),
            expires_at: Set(seed.expires_at),
            max_uses: Set(seed.max_uses),
            used_count: Set(seed.used_count),
            min_purchase_amount: Set(seed.min_purchase_amount),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed coupon for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Coupon fixture with sensible defaults: an active, unlimited 10%-off
/// code with no expiry and no minimum purchase.
pub struct CouponSeed {
    pub code: String,
    pub coupon_type: coupon::CouponType,
    pub value: Decimal,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: i32,
    pub used_count: i32,
    pub min_purchase_amount: Decimal,
}

impl Default for CouponSeed {
    fn default() -> Self {
        Self {
            code: "TESTCODE".to_string(),
            coupon_type: coupon::CouponType::Percentage,
            value: Decimal::from(10),
            is_active: true,
            expires_at: None,
            max_uses: 0,
            used_count: 0,
            min_purchase_amount: Decimal::ZERO,
        }
    }
}
