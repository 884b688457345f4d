//! # Wallet Rules
//!
//! Balance checks and top-up arithmetic. Balances are never negative.

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};

/// Fails with `InsufficientBalance` when `balance < required`.
pub fn ensure_sufficient(balance: Money, required: Money) -> CoreResult<()> {
    if balance < required {
        return Err(CoreError::InsufficientBalance {
            available: balance,
            required,
        });
    }
    Ok(())
}

/// Balance after a debit, clamped at zero.
#[inline]
pub fn debit_clamped(balance: Money, amount: Money) -> Money {
    balance.saturating_sub_to_zero(amount)
}

/// Wallet credit for a settled top-up: `amount + amount × bonus_rate`.
///
/// ## Example
/// ```rust
/// use souq_core::money::{Money, Rate};
/// use souq_core::wallet::top_up_credit;
///
/// // 10.000 top-up with a 5% bonus
/// let credit = top_up_credit(Money::from_minor(10_000), Rate::from_bps(500));
/// assert_eq!(credit, Money::from_minor(10_500));
/// ```
pub fn top_up_credit(amount: Money, bonus_rate: Rate) -> Money {
    amount + amount.percentage(bonus_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_sufficient() {
        assert!(ensure_sufficient(Money::from_minor(12_000), Money::from_minor(12_000)).is_ok());

        let err = ensure_sufficient(Money::from_minor(10_000), Money::from_minor(12_000)).unwrap_err();
        match err {
            CoreError::InsufficientBalance { available, required } => {
                assert_eq!(available, Money::from_minor(10_000));
                assert_eq!(required, Money::from_minor(12_000));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debit_clamped() {
        assert_eq!(debit_clamped(Money::from_minor(5_000), Money::from_minor(2_000)), Money::from_minor(3_000));
        assert_eq!(debit_clamped(Money::from_minor(5_000), Money::from_minor(9_000)), Money::zero());
    }

    #[test]
    fn test_top_up_without_bonus() {
        assert_eq!(top_up_credit(Money::from_minor(7_000), Rate::zero()), Money::from_minor(7_000));
    }
}
