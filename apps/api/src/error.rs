//! API error types with HTTP response mapping.
//!
//! Every error leaving a handler is rendered as a JSON body of the form
//! `{"code": "...", "message": "..."}`. The `code` is a stable machine
//! token; the `message` is the human-readable error text.
//!
//! ## Status Mapping
//! ```text
//! 400  invalid_input        malformed line items, validation failures
//! 400  price_mismatch       declared total off by more than the tolerance
//! 404  not_found            missing product / variant / service / order
//! 409  insufficient_stock   requested quantity exceeds on-hand stock
//! 409  overpayment_rejected payment would exceed the order total
//! 503  transaction_failed   write conflict or pool exhaustion, retryable
//! 500  internal_error       everything else
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tally_core::CoreError;
use tally_db::DbError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Storage or domain error surfaced from the database layer.
    Db(DbError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::Db(err) => db_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, code, error = %message, "request failed");
        }

        let body = serde_json::json!({ "code": code, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn db_error_to_response(err: DbError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        DbError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", message),
        DbError::Domain(core) => core_error_to_response(core, message),
        DbError::TransactionFailed(_) | DbError::PoolExhausted => {
            (StatusCode::SERVICE_UNAVAILABLE, "transaction_failed", message)
        }
        DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", message)
        }
        DbError::ConnectionFailed(_)
        | DbError::MigrationFailed(_)
        | DbError::QueryFailed(_)
        | DbError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message),
    }
}

fn core_error_to_response(err: CoreError, message: String) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::ProductNotFound(_)
        | CoreError::VariantNotFound(_)
        | CoreError::ServiceNotFound(_)
        | CoreError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "not_found", message),
        CoreError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, "insufficient_stock", message)
        }
        CoreError::OverpaymentRejected { .. } => {
            (StatusCode::CONFLICT, "overpayment_rejected", message)
        }
        CoreError::PriceMismatch { .. } => (StatusCode::BAD_REQUEST, "price_mismatch", message),
        CoreError::InvalidLineItem { .. }
        | CoreError::InvalidPaymentAmount { .. }
        | CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_input", message),
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Db(err)
    }
}
