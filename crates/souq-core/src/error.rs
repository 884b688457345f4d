//! # Error Types
//!
//! Domain-specific error types for souq-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  souq-core errors (this file)                                           │
//! │  ├── CoreError        - Business rule violations                        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  souq-db errors (separate crate)                                        │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  souq-engine errors                                                     │
//! │  └── FulfillmentError - Domain | Database, rolls the transaction back   │
//! │                                                                         │
//! │  HTTP errors (souq-api)                                                 │
//! │  └── ApiError         - { code, message } + status                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → FulfillmentError → ApiError        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Any of these raised inside an order, payment or cancellation transaction
/// aborts the whole unit of work.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Variant availability below the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Order line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Dates 1kg", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole order rolled back, nothing reserved
    /// ```
    #[error("Insufficient stock for {product} (variant {variant_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        variant_id: i64,
        available: i64,
        requested: i64,
    },

    /// Wallet balance below the amount to charge.
    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// Customer tried to redeem more points than they hold.
    #[error("Insufficient points: available {available}, requested {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    /// Offer cannot be used on this order.
    ///
    /// ## When This Occurs
    /// - Offer is inactive or outside its start/end window
    /// - Charity offer on an order that has a customer
    #[error("Offer {offer_id} is not applicable: {reason}")]
    OfferNotApplicable { offer_id: i64, reason: String },

    /// Entity missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Operation already performed (cancel on cancelled order, decision on
    /// a decided refund request).
    #[error("{entity} {id} is already {status}")]
    AlreadyProcessed {
        entity: String,
        id: String,
        status: String,
    },

    /// State machine does not allow the requested move.
    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// Payment-link creation failed or returned no usable link.
    #[error("Payment gateway error: {0}")]
    ExternalGateway(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn already_processed(entity: &str, id: impl ToString, status: impl ToString) -> Self {
        CoreError::AlreadyProcessed {
            entity: entity.to_string(),
            id: id.to_string(),
            status: status.to_string(),
        }
    }

    pub fn invalid_transition(entity: &str, from: impl ToString, to: impl ToString) -> Self {
        CoreError::InvalidTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn offer_not_applicable(offer_id: i64, reason: impl Into<String>) -> Self {
        CoreError::OfferNotApplicable {
            offer_id,
            reason: reason.into(),
        }
    }

    /// HTTP-style status code surfaced to callers.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::InsufficientStock { .. }
            | CoreError::InsufficientBalance { .. }
            | CoreError::InsufficientPoints { .. }
            | CoreError::AlreadyProcessed { .. }
            | CoreError::InvalidTransition { .. } => 409,
            CoreError::OfferNotApplicable { .. } => 422,
            CoreError::NotFound { .. } => 404,
            CoreError::ExternalGateway(_) => 502,
            CoreError::Validation(_) => 400,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            CoreError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            CoreError::OfferNotApplicable { .. } => "OFFER_NOT_APPLICABLE",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::ExternalGateway(_) => "EXTERNAL_GATEWAY_ERROR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised by the command validators before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., unparsable amount or date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Combination of fields that cannot be used together.
    #[error("{0}")]
    Conflict(String),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product: "Dates 1kg".into(),
            variant_id: 7,
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Dates 1kg (variant 7): available 3, requested 5"
        );
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn test_balance_message_uses_three_decimals() {
        let err = CoreError::InsufficientBalance {
            available: Money::from_minor(10_000),
            required: Money::from_minor(12_000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient wallet balance: available 10.000, required 12.000"
        );
        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CoreError::not_found("Order", 4).http_status(), 404);
        assert_eq!(CoreError::offer_not_applicable(1, "inactive").http_status(), 422);
        assert_eq!(CoreError::ExternalGateway("timeout".into()).http_status(), 502);
        let validation: CoreError = ValidationError::Required { field: "items".into() }.into();
        assert_eq!(validation.http_status(), 400);
        assert_eq!(
            CoreError::already_processed("Order", 1, "cancelled").http_status(),
            409
        );
    }
}
