use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payout error: {0}")]
    Payout(#[from] PayoutError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Payout lifecycle errors
#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("Staff member {0} has no usable transfer destination")]
    NotOnboarded(Uuid),

    #[error("Payout not found: {0}")]
    NotFound(Uuid),

    #[error("Payout {payout_id} in invalid state: {current}, expected: {expected}")]
    InvalidState {
        payout_id: Uuid,
        current: String,
        expected: String,
    },

    #[error("Transfer for payout {payout_id} failed: {reason}")]
    TransferFailed { payout_id: Uuid, reason: String },
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Payout(PayoutError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "PAYOUT_NOT_FOUND",
                format!("Payout not found: {}", id),
                None,
            ),
            AppError::Payout(PayoutError::NotOnboarded(id)) => (
                StatusCode::CONFLICT,
                "STAFF_NOT_ONBOARDED",
                format!("Staff member {} has not completed payout onboarding", id),
                Some(serde_json::json!({ "staff_member_id": id })),
            ),
            AppError::Payout(PayoutError::InvalidState {
                payout_id,
                current,
                expected,
            }) => (
                StatusCode::CONFLICT,
                "PAYOUT_INVALID_STATE",
                format!(
                    "Payout {} is {}, expected {}",
                    payout_id, current, expected
                ),
                Some(serde_json::json!({ "payout_id": payout_id, "current": current })),
            ),
            AppError::Payout(PayoutError::TransferFailed { payout_id, reason }) => (
                StatusCode::BAD_GATEWAY,
                "TRANSFER_FAILED",
                format!("Transfer for payout {} failed: {}", payout_id, reason),
                Some(serde_json::json!({ "payout_id": payout_id })),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::ExternalService(_) => (
                StatusCode::BAD_GATEWAY,
                "EXTERNAL_SERVICE_ERROR",
                "An upstream service error occurred".to_string(),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalService(format!("HTTP request error: {:?}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
