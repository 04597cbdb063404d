//! Health check endpoints: basic up/down status plus a readiness probe
//! that verifies database connectivity.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::{db, AppState};

/// Simple liveness probe; answers as long as the process is serving.
pub async fn simple_health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "up",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Readiness probe: the service only accepts traffic once the database
/// answers a ping.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_connection(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "up",
                "database": "up",
            })),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "down",
                "database": "down",
            })),
        ),
    }
}
