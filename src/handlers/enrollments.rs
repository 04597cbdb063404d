use crate::handlers::common::{map_service_error, success_response};
use crate::{
    entities::enrollment,
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for enrollment endpoints
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_enrollments))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EnrollmentQuery {
    pub student_id: Uuid,
}

/// List a student's enrollments, newest first
#[utoipa::path(
    get,
    path = "/api/v1/enrollments",
    tag = "enrollments",
    params(EnrollmentQuery),
    responses(
        (status = 200, description = "Enrollments", body = [enrollment::Model]),
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    Query(query): Query<EnrollmentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let enrollments = state
        .services
        .enrollments
        .list_for_student(query.student_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(enrollments))
}
