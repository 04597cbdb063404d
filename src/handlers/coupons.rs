use crate::handlers::common::{created_response, map_service_error, success_response, PaginationParams};
use crate::{
    entities::coupon,
    errors::{ApiError, ErrorResponse},
    services::coupons::{CouponListResponse, CreateCouponInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};

/// Creates the router for coupon administration endpoints
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_coupon).get(list_coupons))
        .route("/:code", get(get_coupon))
        .route("/:code/deactivate", post(deactivate_coupon))
}

/// Create a coupon
#[utoipa::path(
    post,
    path = "/api/v1/coupons",
    tag = "coupons",
    request_body = CreateCouponInput,
    responses(
        (status = 201, description = "Coupon created", body = coupon::Model),
        (status = 400, description = "Invalid coupon definition", body = ErrorResponse),
        (status = 409, description = "Coupon code already exists", body = ErrorResponse),
    )
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state
        .services
        .coupons
        .create_coupon(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(created))
}

/// List coupons
#[utoipa::path(
    get,
    path = "/api/v1/coupons",
    tag = "coupons",
    params(PaginationParams),
    responses(
        (status = 200, description = "Coupon page", body = CouponListResponse),
    )
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .coupons
        .list_coupons(pagination.page, pagination.per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(page))
}

/// Fetch a coupon by code
#[utoipa::path(
    get,
    path = "/api/v1/coupons/{code}",
    tag = "coupons",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Coupon", body = coupon::Model),
        (status = 404, description = "Unknown coupon code", body = ErrorResponse),
    )
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .services
        .coupons
        .get_coupon(&code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(found))
}

/// Deactivate a coupon so it no longer validates
#[utoipa::path(
    post,
    path = "/api/v1/coupons/{code}/deactivate",
    tag = "coupons",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Coupon deactivated", body = coupon::Model),
        (status = 404, description = "Unknown coupon code", body = ErrorResponse),
    )
)]
pub async fn deactivate_coupon(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .services
        .coupons
        .deactivate_coupon(&code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(updated))
}
