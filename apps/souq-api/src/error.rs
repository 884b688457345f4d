//! # API Error
//!
//! Every failure leaves the API as `{"code": "...", "message": "..."}` with
//! the status the engine assigned to it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use souq_engine::FulfillmentError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "Request failed");
        }
        let message = match &err {
            // storage details stay in the log
            FulfillmentError::Database(_) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                "internal database error".to_string()
            }
            _ => err.to_string(),
        };
        ApiError::new(status, err.code(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                code: self.code,
                message: self.message,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use souq_core::{CoreError, Money};
    use souq_db::DbError;

    #[test]
    fn test_engine_errors_keep_their_status() {
        let err: ApiError = FulfillmentError::from(CoreError::InsufficientBalance {
            available: Money::from_minor(1_000),
            required: Money::from_minor(17_250),
        })
        .into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "INSUFFICIENT_BALANCE");

        let err: ApiError = FulfillmentError::from(CoreError::ExternalGateway("timeout".into())).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "EXTERNAL_GATEWAY_ERROR");
    }

    #[test]
    fn test_database_details_are_hidden() {
        let err: ApiError = FulfillmentError::from(DbError::Internal("disk I/O error at page 7".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "DATABASE_ERROR");
        assert!(!err.message.contains("page 7"));

        let missing: ApiError = FulfillmentError::from(DbError::not_found("Order", 4)).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }
}
