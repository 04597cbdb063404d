use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "kind": "coupon_expired",
    "message": "Coupon expired: SUMMER25",
    "details": null,
    "timestamp": "2025-11-02T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Machine-readable error kind (stable taxonomy)
    #[schema(example = "coupon_expired")]
    pub kind: String,
    /// Human-readable error description
    #[schema(example = "Coupon expired: SUMMER25")]
    pub message: String,
    /// Additional error details (validation errors in dev mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2025-11-02T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Coupon is not active: {0}")]
    CouponInactive(String),

    #[error("Coupon expired: {0}")]
    CouponExpired(String),

    #[error("Coupon {code} requires a minimum purchase of {minimum}")]
    CouponBelowMinimum { code: String, minimum: String },

    #[error("Coupon usage limit reached: {0}")]
    CouponExhausted(String),

    #[error("Submitted totals do not match the cart contents: {0}")]
    AmountMismatch(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Student is already enrolled in course {0}")]
    DuplicateEnrollment(String),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Internal server error")]
    InternalServerError,

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Stable machine-readable kind for this error.
    /// Clients branch on this field, so values never change once shipped.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::InvalidOperation(_) => "invalid_operation",
            Self::InvalidInput(_) => "invalid_input",
            Self::CouponNotFound(_) => "coupon_not_found",
            Self::CouponInactive(_) => "coupon_inactive",
            Self::CouponExpired(_) => "coupon_expired",
            Self::CouponBelowMinimum { .. } => "coupon_below_minimum",
            Self::CouponExhausted(_) => "coupon_exhausted",
            Self::AmountMismatch(_) => "amount_mismatch",
            Self::PaymentFailed(_) => "payment_failed",
            Self::DuplicateEnrollment(_) => "duplicate_enrollment",
            Self::TransactionAborted(_) => "transaction_aborted",
            Self::Conflict(_) => "conflict",
            Self::EventError(_) => "event_error",
            Self::InternalError(_) | Self::InternalServerError | Self::Other(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) | Self::CouponNotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::InvalidInput(_)
            | Self::AmountMismatch(_) => StatusCode::BAD_REQUEST,
            Self::CouponInactive(_)
            | Self::CouponExpired(_)
            | Self::CouponBelowMinimum { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::CouponExhausted(_) | Self::DuplicateEnrollment(_) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
            Self::TransactionAborted(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::InternalServerError
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::InternalServerError => "Internal server error".to_string(),
            Self::TransactionAborted(_) => "Transaction aborted".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            kind: self.kind().to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        error_code: Option<String>,
    },

    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Delegate to ServiceError's unified status/kind/message methods when applicable
        let (status, kind, message) = match &self {
            ApiError::ServiceError(service_error) => (
                service_error.status_code(),
                service_error.kind().to_string(),
                service_error.response_message(),
            ),
            ApiError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error".to_string(),
                msg.clone(),
            ),
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found".to_string(), msg.clone())
            }
            ApiError::BadRequest {
                message,
                error_code,
            } => (
                StatusCode::BAD_REQUEST,
                error_code
                    .clone()
                    .unwrap_or_else(|| "bad_request".to_string()),
                message.clone(),
            ),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                "Internal server error".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            kind,
            message,
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(error_response)).into_response()
    }
}

// Result extensions for easier error handling
pub trait ResultExt<T> {
    fn map_err_to_service(self) -> Result<T, ServiceError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn map_err_to_service(self) -> Result<T, ServiceError> {
        self.map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::CouponNotFound("X1".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::AmountMismatch("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::CouponExpired("X1".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::CouponExhausted("X1".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::DuplicateEnrollment("rust-101".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentFailed("declined".into()).status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::TransactionAborted("commit".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::InternalServerError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(ServiceError::CouponNotFound("X".into()).kind(), "coupon_not_found");
        assert_eq!(ServiceError::CouponInactive("X".into()).kind(), "coupon_inactive");
        assert_eq!(ServiceError::CouponExpired("X".into()).kind(), "coupon_expired");
        assert_eq!(
            ServiceError::CouponBelowMinimum {
                code: "X".into(),
                minimum: "50".into()
            }
            .kind(),
            "coupon_below_minimum"
        );
        assert_eq!(ServiceError::CouponExhausted("X".into()).kind(), "coupon_exhausted");
        assert_eq!(ServiceError::AmountMismatch("x".into()).kind(), "amount_mismatch");
        assert_eq!(ServiceError::PaymentFailed("x".into()).kind(), "payment_failed");
        assert_eq!(
            ServiceError::DuplicateEnrollment("x".into()).kind(),
            "duplicate_enrollment"
        );
        assert_eq!(
            ServiceError::TransactionAborted("x".into()).kind(),
            "transaction_aborted"
        );
    }

    #[test]
    fn service_error_response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("sensitive".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::db_error("connection refused").response_message(),
            "Database error"
        );

        // User-facing errors keep the actual message
        assert_eq!(
            ServiceError::CouponExpired("SUMMER25".into()).response_message(),
            "Coupon expired: SUMMER25"
        );
        assert_eq!(
            ServiceError::NotFound("Order not found".into()).response_message(),
            "Not found: Order not found"
        );
    }

    #[tokio::test]
    async fn error_response_body_carries_kind() {
        let response = ServiceError::CouponExhausted("LAUNCH10".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.kind, "coupon_exhausted");
        assert_eq!(payload.message, "Coupon usage limit reached: LAUNCH10");
    }

    #[test]
    fn api_error_delegates_to_service_error_status() {
        let service_err = ServiceError::CouponNotFound("GONE".into());
        let status = service_err.status_code();
        let api_err = ApiError::ServiceError(service_err);

        let api_status = match &api_err {
            ApiError::ServiceError(se) => se.status_code(),
            _ => panic!("Expected ServiceError variant"),
        };
        assert_eq!(status, api_status);
        assert_eq!(api_status, StatusCode::NOT_FOUND);
    }
}
