use crate::handlers::common::{created_response, map_service_error};
use crate::{
    errors::{ApiError, ErrorResponse},
    services::checkout::{CheckoutReceipt, CheckoutRequest},
    AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};

/// Creates the router for checkout endpoints
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Convert a cart into an order, payment, and course enrollments.
///
/// All writes are atomic: a declined payment, a duplicate enrollment, or an
/// exhausted coupon leaves nothing behind.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    tag = "checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Checkout committed", body = CheckoutReceipt),
        (status = 400, description = "Invalid cart or totals mismatch", body = ErrorResponse),
        (status = 402, description = "Payment declined", body = ErrorResponse),
        (status = 404, description = "Coupon not found", body = ErrorResponse),
        (status = 409, description = "Coupon exhausted or duplicate enrollment", body = ErrorResponse),
        (status = 422, description = "Coupon not applicable", body = ErrorResponse),
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .services
        .checkout
        .checkout(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(receipt))
}
