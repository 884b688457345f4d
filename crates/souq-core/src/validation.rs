//! # Validation Module
//!
//! Input validation for order, payment and wallet commands.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP (souq-api)                                               │
//! │  └── Type validation (JSON deserialization into commands)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  └── Quantities, amounts, rates, free-text lengths                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (quantity >= 0), CHECK (balance >= 0)                        │
//! │  ├── UNIQUE constraints                                                 │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_ITEM_QUANTITY, MAX_OFFER_QUANTITY, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of free-text notes and reasons.
pub const MAX_NOTE_LENGTH: usize = 1000;

/// Validates a line quantity.
///
/// ## Rules
/// - Must be at least 1
/// - Must be at most [`MAX_ITEM_QUANTITY`]
///
/// ## Example
/// ```rust
/// use souq_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates how many times an offer is applied to one order.
pub fn validate_offer_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 || qty > MAX_OFFER_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "offer_quantity".to_string(),
            min: 1,
            max: MAX_OFFER_QUANTITY,
        });
    }
    Ok(())
}

/// Validates the number of distinct lines requested.
///
/// An order must carry at least one line unless an offer supplies them.
pub fn validate_line_count(lines: usize, has_offers: bool) -> ValidationResult<()> {
    if lines == 0 && !has_offers {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 0,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

/// Validates redeemed points (zero means "no redemption").
pub fn validate_points(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::MustBePositive {
            field: "points".to_string(),
        });
    }
    Ok(())
}

/// Validates an amount that must be strictly positive (top-ups, refunds).
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a rate in basis points (0% - 100%).
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

/// Validates an optional free-text field and returns it trimmed, or `None`
/// when blank.
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if note.chars().count() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(Some(note.to_string()))
}

/// Validates a required free-text field (e.g. a cancellation reason).
pub fn validate_required_text(field: &str, text: &str) -> ValidationResult<String> {
    validate_note(field, Some(text))?.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}
