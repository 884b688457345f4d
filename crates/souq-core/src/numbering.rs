//! # Identifiers
//!
//! Human-readable numbers for orders, payments and wallet top-ups.
//!
//! | Kind          | Format                  | Example              |
//! |---------------|-------------------------|----------------------|
//! | Order         | `{PREFIX}-{YEAR}-{SEQ}` | `APPS-2026-000042`   |
//! | Payment       | `PAY-{YEAR}-{SEQ}`      | `PAY-2026-000007`    |
//! | Wallet charge | `WCH-{YEAR}-{SEQ}`      | `WCH-2026-000003`    |
//! | Invoice       | `INV-{order_number}`    | `INV-APPS-2026-000042` |
//!
//! Sequences restart every year per prefix. The next value comes from
//! parsing the highest existing number, not from a sequence table.

use crate::types::OrderSource;

/// Prefix of payment numbers.
pub const PAYMENT_PREFIX: &str = "PAY";

/// Prefix of wallet top-up references.
pub const WALLET_CHARGE_PREFIX: &str = "WCH";

/// Largest numeric id accepted as an order-reference fallback.
pub const MAX_NUMERIC_ORDER_ID: i64 = 999_999_999;

/// Formats `{prefix}-{year}-{seq:06}`.
pub fn format_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:06}")
}

/// `{prefix}-{year}-` used to find the highest existing number.
pub fn sequence_prefix(prefix: &str, year: i32) -> String {
    format!("{prefix}-{year}-")
}

pub fn order_number(source: OrderSource, year: i32, sequence: i64) -> String {
    format_number(source.prefix(), year, sequence)
}

pub fn payment_number(year: i32, sequence: i64) -> String {
    format_number(PAYMENT_PREFIX, year, sequence)
}

pub fn wallet_charge_reference(year: i32, sequence: i64) -> String {
    format_number(WALLET_CHARGE_PREFIX, year, sequence)
}

/// Sequence after `last`, the highest number issued so far for the prefix
/// and year. Starts at 1; unparsable input also restarts at 1.
///
/// ## Example
/// ```rust
/// use souq_core::numbering::next_sequence;
///
/// assert_eq!(next_sequence(None), 1);
/// assert_eq!(next_sequence(Some("APPS-2026-000041")), 42);
/// ```
pub fn next_sequence(last: Option<&str>) -> i64 {
    last.and_then(|n| n.rsplit('-').next())
        .and_then(|seq| seq.parse::<i64>().ok())
        .map(|seq| seq + 1)
        .unwrap_or(1)
}

/// True for `WCH-…` references.
pub fn is_wallet_charge(reference: &str) -> bool {
    reference.starts_with(&format!("{WALLET_CHARGE_PREFIX}-"))
}

/// How a callback identifies its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderReference {
    /// An order number such as `APPS-2026-000042`.
    Number(String),
    /// A small numeric id, looked up only if no order has that number.
    NumericId(i64),
}

impl OrderReference {
    /// Parses a raw reference.
    ///
    /// Returns `None` for blank input. All-digit input of at most nine
    /// digits that is greater than zero yields both interpretations via
    /// [`OrderReference::candidates`].
    pub fn parse(raw: &str) -> Option<OrderReference> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(OrderReference::Number(trimmed.to_string()))
    }

    /// Lookups to try, in order: by number first, then the bounded numeric id.
    pub fn candidates(raw: &str) -> Vec<OrderReference> {
        let Some(primary) = OrderReference::parse(raw) else {
            return Vec::new();
        };
        let mut candidates = vec![primary];
        if let Some(id) = numeric_id(raw.trim()) {
            candidates.push(OrderReference::NumericId(id));
        }
        candidates
    }
}

fn numeric_id(raw: &str) -> Option<i64> {
    if raw.is_empty() || raw.len() > 9 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0 && *id <= MAX_NUMERIC_ORDER_ID)
}
