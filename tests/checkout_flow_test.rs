//! Integration tests for the checkout flow.
//!
//! Covers the full happy path (order + payment + enrollments + coupon),
//! every pre-transaction rejection, and the atomicity guarantees: any
//! failure after the transaction opens leaves no order, no enrollment, and
//! an unchanged coupon usage count.

mod common;

use axum::{body, http::Method, response::Response};
use common::{CouponSeed, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use learnstack_api::entities::{coupon::CouponType, enrollment, order, payment};
use learnstack_api::services::payments::MockPaymentProcessor;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn dec_of(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected decimal-ish value, got {:?}", other),
    }
}

async fn order_count(app: &TestApp) -> u64 {
    order::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count orders")
}

async fn enrollment_count(app: &TestApp) -> u64 {
    enrollment::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count enrollments")
}

async fn payment_count(app: &TestApp) -> u64 {
    payment::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count payments")
}

fn course_line(course_id: Uuid, price: &str, quantity: i32) -> Value {
    json!({
        "course_id": course_id,
        "quantity": quantity,
        "price": price,
    })
}

// ==================== Happy path ====================

#[tokio::test]
async fn checkout_creates_order_payment_and_enrollments() {
    let app = TestApp::new().await;
    let student_id = Uuid::new_v4();
    let rust_course = app.seed_course("Rust Fundamentals", dec!(120)).await;
    let sql_course = app.seed_course("Practical SQL", dec!(80)).await;

    let payload = json!({
        "student_id": student_id,
        "cart_items": [
            course_line(rust_course.id, "120", 1),
            course_line(sql_course.id, "80", 1),
        ],
        "subtotal": "200",
        "total": "200",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 201);

    let receipt = response_json(response).await;
    assert_eq!(receipt["payment_status"], "paid");
    assert_eq!(dec_of(&receipt["discount"]), Decimal::ZERO);
    assert_eq!(dec_of(&receipt["final_total"]), dec!(200));
    assert_eq!(receipt["enrollment_ids"].as_array().unwrap().len(), 2);

    let order_id = receipt["order_id"].as_str().unwrap();

    // The stored order reflects the committed state machine: confirmed + paid.
    let order_response = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    assert_eq!(order_response.status(), 200);
    let order_body = response_json(order_response).await;
    assert_eq!(order_body["status"], "confirmed");
    assert_eq!(order_body["payment_status"], "paid");
    assert_eq!(order_body["items"].as_array().unwrap().len(), 2);
    assert_eq!(dec_of(&order_body["total_amount"]), dec!(200));

    // Both enrollments are queryable for the student.
    let enrollments_response = app
        .request(
            Method::GET,
            &format!("/api/v1/enrollments?student_id={}", student_id),
            None,
        )
        .await;
    assert_eq!(enrollments_response.status(), 200);
    let enrollments = response_json(enrollments_response).await;
    assert_eq!(enrollments.as_array().unwrap().len(), 2);

    assert_eq!(payment_count(&app).await, 1);
}

#[tokio::test]
async fn checkout_applies_percentage_coupon() {
    let app = TestApp::new().await;
    let student_id = Uuid::new_v4();
    let course = app.seed_course("Distributed Systems", dec!(200)).await;
    app.seed_coupon(CouponSeed {
        code: "QUARTER".to_string(),
        coupon_type: CouponType::Percentage,
        value: dec!(25),
        ..Default::default()
    })
    .await;

    let payload = json!({
        "student_id": student_id,
        "cart_items": [course_line(course.id, "200", 1)],
        "subtotal": "200",
        "total": "150",
        "payment_method": "paypal",
        "coupon_code": "QUARTER",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 201);

    let receipt = response_json(response).await;
    assert_eq!(dec_of(&receipt["discount"]), dec!(50));
    assert_eq!(dec_of(&receipt["final_total"]), dec!(150));

    // Exactly one usage consumed.
    let coupon_response = app
        .request(Method::GET, "/api/v1/coupons/QUARTER", None)
        .await;
    let coupon_body = response_json(coupon_response).await;
    assert_eq!(coupon_body["used_count"], 1);
}

#[tokio::test]
async fn checkout_clips_fixed_coupon_to_subtotal() {
    let app = TestApp::new().await;
    let course = app.seed_course("Intro Course", dec!(200)).await;
    app.seed_coupon(CouponSeed {
        code: "BIGFIXED".to_string(),
        coupon_type: CouponType::Fixed,
        value: dec!(300),
        ..Default::default()
    })
    .await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(course.id, "200", 1)],
        "subtotal": "200",
        "total": "0",
        "payment_method": "stripe",
        "coupon_code": "BIGFIXED",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 201);

    let receipt = response_json(response).await;
    assert_eq!(dec_of(&receipt["discount"]), dec!(200));
    assert_eq!(dec_of(&receipt["final_total"]), Decimal::ZERO);
}

#[tokio::test]
async fn product_lines_create_no_enrollments() {
    let app = TestApp::new().await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [{
            "product_id": Uuid::new_v4(),
            "quantity": 2,
            "price": "15",
        }],
        "subtotal": "30",
        "total": "30",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 201);

    let receipt = response_json(response).await;
    assert!(receipt["enrollment_ids"].as_array().unwrap().is_empty());
    assert_eq!(enrollment_count(&app).await, 0);
    assert_eq!(order_count(&app).await, 1);
}

// ==================== Pre-transaction rejections ====================

#[tokio::test]
async fn tampered_subtotal_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let course = app.seed_course("Cheap Course", dec!(100)).await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(course.id, "100", 1)],
        "subtotal": "10",
        "total": "10",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 400);

    let body = response_json(response).await;
    assert_eq!(body["kind"], "amount_mismatch");
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(enrollment_count(&app).await, 0);
}

#[tokio::test]
async fn tampered_total_is_rejected_after_discount_math() {
    let app = TestApp::new().await;
    let course = app.seed_course("Course", dec!(200)).await;
    app.seed_coupon(CouponSeed {
        code: "TEN".to_string(),
        coupon_type: CouponType::Percentage,
        value: dec!(10),
        ..Default::default()
    })
    .await;

    // Client claims a bigger discount than the coupon grants.
    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(course.id, "200", 1)],
        "subtotal": "200",
        "total": "100",
        "payment_method": "stripe",
        "coupon_code": "TEN",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "amount_mismatch");
    assert_eq!(order_count(&app).await, 0);

    // Validation never consumes quota.
    let coupon_body =
        response_json(app.request(Method::GET, "/api/v1/coupons/TEN", None).await).await;
    assert_eq!(coupon_body["used_count"], 0);
}

#[tokio::test]
async fn coupon_rejections_short_circuit_checkout() {
    let app = TestApp::new().await;
    let course = app.seed_course("Course", dec!(100)).await;

    app.seed_coupon(CouponSeed {
        code: "EXPIRED".to_string(),
        expires_at: Some(chrono::Utc::now() - chrono::Duration::days(1)),
        ..Default::default()
    })
    .await;
    app.seed_coupon(CouponSeed {
        code: "PAUSED".to_string(),
        is_active: false,
        ..Default::default()
    })
    .await;
    app.seed_coupon(CouponSeed {
        code: "BIGSPEND".to_string(),
        min_purchase_amount: dec!(500),
        ..Default::default()
    })
    .await;
    app.seed_coupon(CouponSeed {
        code: "USEDUP".to_string(),
        max_uses: 2,
        used_count: 2,
        ..Default::default()
    })
    .await;

    let cases = [
        ("GHOST", 404, "coupon_not_found"),
        ("EXPIRED", 422, "coupon_expired"),
        ("PAUSED", 422, "coupon_inactive"),
        ("BIGSPEND", 422, "coupon_below_minimum"),
        ("USEDUP", 409, "coupon_exhausted"),
    ];

    for (code, expected_status, expected_kind) in cases {
        let payload = json!({
            "student_id": Uuid::new_v4(),
            "cart_items": [course_line(course.id, "100", 1)],
            "subtotal": "100",
            "total": "100",
            "payment_method": "stripe",
            "coupon_code": code,
        });

        let response = app
            .request(Method::POST, "/api/v1/checkout", Some(payload))
            .await;
        assert_eq!(response.status(), expected_status, "coupon {}", code);
        let body = response_json(response).await;
        assert_eq!(body["kind"], expected_kind, "coupon {}", code);
    }

    assert_eq!(order_count(&app).await, 0);
    assert_eq!(enrollment_count(&app).await, 0);
}

#[tokio::test]
async fn expired_coupon_wins_over_quota_and_minimum() {
    let app = TestApp::new().await;
    let course = app.seed_course("Course", dec!(100)).await;

    // Expired AND exhausted AND below minimum: expiry is reported because
    // it is checked before the later rules.
    app.seed_coupon(CouponSeed {
        code: "OLDCODE".to_string(),
        expires_at: Some(chrono::Utc::now() - chrono::Duration::hours(1)),
        max_uses: 1,
        used_count: 1,
        min_purchase_amount: dec!(1000),
        ..Default::default()
    })
    .await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(course.id, "100", 1)],
        "subtotal": "100",
        "total": "100",
        "payment_method": "stripe",
        "coupon_code": "OLDCODE",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 422);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "coupon_expired");
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [],
        "subtotal": "0",
        "total": "0",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn cart_line_must_pick_course_or_product() {
    let app = TestApp::new().await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [{
            "quantity": 1,
            "price": "10",
        }],
        "subtotal": "10",
        "total": "10",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "invalid_input");
}

// ==================== Atomicity on in-transaction failures ====================

#[tokio::test]
async fn declined_payment_leaves_no_trace() {
    let app = TestApp::with_payment_processors(
        Arc::new(MockPaymentProcessor::declining("card declined")),
        Arc::new(MockPaymentProcessor::declining("card declined")),
    )
    .await;

    let course = app.seed_course("Course", dec!(100)).await;
    app.seed_coupon(CouponSeed {
        code: "TEN".to_string(),
        max_uses: 5,
        ..Default::default()
    })
    .await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(course.id, "100", 1)],
        "subtotal": "100",
        "total": "90",
        "payment_method": "stripe",
        "coupon_code": "TEN",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 402);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "payment_failed");
    assert_eq!(body["message"], "Payment failed: card declined");

    // Nothing from the aborted transaction is visible.
    assert_eq!(order_count(&app).await, 0);
    assert_eq!(enrollment_count(&app).await, 0);
    assert_eq!(payment_count(&app).await, 0);
    let coupon_body =
        response_json(app.request(Method::GET, "/api/v1/coupons/TEN", None).await).await;
    assert_eq!(coupon_body["used_count"], 0);
}

#[tokio::test]
async fn duplicate_enrollment_aborts_whole_checkout() {
    let app = TestApp::new().await;
    let student_id = Uuid::new_v4();
    let owned_course = app.seed_course("Already Owned", dec!(50)).await;
    let new_course = app.seed_course("Brand New", dec!(70)).await;
    app.seed_coupon(CouponSeed {
        code: "TEN".to_string(),
        max_uses: 5,
        ..Default::default()
    })
    .await;

    // First purchase enrolls the student.
    let first = json!({
        "student_id": student_id,
        "cart_items": [course_line(owned_course.id, "50", 1)],
        "subtotal": "50",
        "total": "50",
        "payment_method": "stripe",
    });
    let response = app.request(Method::POST, "/api/v1/checkout", Some(first)).await;
    assert_eq!(response.status(), 201);
    assert_eq!(order_count(&app).await, 1);
    assert_eq!(enrollment_count(&app).await, 1);

    // Second purchase includes the already-owned course: the whole cart
    // fails, including the brand-new course and the coupon.
    let second = json!({
        "student_id": student_id,
        "cart_items": [
            course_line(new_course.id, "70", 1),
            course_line(owned_course.id, "50", 1),
        ],
        "subtotal": "120",
        "total": "108",
        "payment_method": "stripe",
        "coupon_code": "TEN",
    });
    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(second))
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "duplicate_enrollment");

    assert_eq!(order_count(&app).await, 1, "second order must not persist");
    assert_eq!(
        enrollment_count(&app).await,
        1,
        "the brand-new course enrollment must roll back with the batch"
    );
    let coupon_body =
        response_json(app.request(Method::GET, "/api/v1/coupons/TEN", None).await).await;
    assert_eq!(coupon_body["used_count"], 0);
}

#[tokio::test]
async fn repeated_course_lines_in_one_cart_abort() {
    let app = TestApp::new().await;
    let course = app.seed_course("Course", dec!(40)).await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [
            course_line(course.id, "40", 1),
            course_line(course.id, "40", 1),
        ],
        "subtotal": "80",
        "total": "80",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "duplicate_enrollment");

    assert_eq!(order_count(&app).await, 0);
    assert_eq!(enrollment_count(&app).await, 0);
}

#[tokio::test]
async fn unknown_course_aborts_checkout() {
    let app = TestApp::new().await;

    let payload = json!({
        "student_id": Uuid::new_v4(),
        "cart_items": [course_line(Uuid::new_v4(), "40", 1)],
        "subtotal": "40",
        "total": "40",
        "payment_method": "stripe",
    });

    let response = app
        .request(Method::POST, "/api/v1/checkout", Some(payload))
        .await;
    assert_eq!(response.status(), 404);
    let body = response_json(response).await;
    assert_eq!(body["kind"], "not_found");
    assert_eq!(order_count(&app).await, 0);
}

// ==================== Health ====================

#[tokio::test]
async fn health_endpoints_answer() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["status"], "up");

    let response = app.request(Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), 200);
}
