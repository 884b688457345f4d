//! # Engine Error Type
//!
//! A fulfillment operation fails either on a business rule (`CoreError`) or
//! on storage (`DbError`). Both abort the enclosing transaction: the
//! `sqlx::Transaction` is dropped on the `?` and SQLite rolls back.

use thiserror::Error;

use souq_core::{CoreError, ValidationError};
use souq_db::DbError;

#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl FulfillmentError {
    /// HTTP-style status code for the error.
    pub fn http_status(&self) -> u16 {
        match self {
            FulfillmentError::Domain(e) => e.http_status(),
            FulfillmentError::Database(DbError::NotFound { .. }) => 404,
            FulfillmentError::Database(DbError::UniqueViolation { .. }) => 409,
            FulfillmentError::Database(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::Domain(e) => e.code(),
            FulfillmentError::Database(DbError::NotFound { .. }) => "NOT_FOUND",
            FulfillmentError::Database(DbError::UniqueViolation { .. }) => "CONFLICT",
            FulfillmentError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Domain(CoreError::NotFound { .. })
                | FulfillmentError::Database(DbError::NotFound { .. })
        )
    }
}

impl From<ValidationError> for FulfillmentError {
    fn from(error: ValidationError) -> Self {
        FulfillmentError::Domain(CoreError::Validation(error))
    }
}

impl From<sqlx::Error> for FulfillmentError {
    fn from(error: sqlx::Error) -> Self {
        FulfillmentError::Database(DbError::from(error))
    }
}

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use souq_core::Money;

    #[test]
    fn test_status_mapping() {
        let stock: FulfillmentError = CoreError::InsufficientBalance {
            available: Money::from_minor(10_000),
            required: Money::from_minor(12_000),
        }
        .into();
        assert_eq!(stock.http_status(), 409);
        assert_eq!(stock.code(), "INSUFFICIENT_BALANCE");

        let missing: FulfillmentError = DbError::not_found("Order", 7).into();
        assert!(missing.is_not_found());
        assert_eq!(missing.http_status(), 404);

        let invalid: FulfillmentError = ValidationError::Required { field: "items".into() }.into();
        assert_eq!(invalid.http_status(), 400);
    }
}
