//! # Loyalty Points Arithmetic
//!
//! Converts redeemed points to a currency discount and computes points
//! earned by completed orders. Balance mutation lives in souq-engine.

use crate::money::Money;

/// Points actually consumed and the discount they buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointsDiscount {
    pub used_points: i64,
    pub discount: Money,
}

/// Converts `requested` points into a discount.
///
/// The discount is capped at `subtotal - offer_discount` (never below zero).
/// The consumed point count is then recomputed from the capped discount,
/// rounding down, and the discount re-derived from that count so the
/// customer never receives more than their points are worth.
///
/// ## Example
/// ```rust
/// use souq_core::money::Money;
/// use souq_core::points::calculate_discount;
///
/// // 100 points at 0.100 each against 5.000 left after offers
/// let result = calculate_discount(
///     100,
///     Money::from_minor(100),
///     Money::from_minor(20_000),
///     Money::from_minor(15_000),
/// );
/// assert_eq!(result.discount, Money::from_minor(5_000));
/// assert_eq!(result.used_points, 50);
/// ```
pub fn calculate_discount(
    requested: i64,
    point_value: Money,
    subtotal: Money,
    offer_discount: Money,
) -> PointsDiscount {
    if requested <= 0 || !point_value.is_positive() {
        return PointsDiscount::default();
    }

    let cap = subtotal.saturating_sub_to_zero(offer_discount);
    let raw = point_value.multiply_quantity(requested);
    let capped = raw.min(cap);

    let used_points = capped.minor() / point_value.minor();
    PointsDiscount {
        used_points,
        discount: point_value.multiply_quantity(used_points),
    }
}

/// Points earned on completion: `Σ offer.points × offer quantity`.
pub fn earned_points<I>(offers: I) -> i64
where
    I: IntoIterator<Item = (i64, i64)>,
{
    offers
        .into_iter()
        .map(|(points, quantity)| points.max(0) * quantity.max(0))
        .sum()
}

/// Wallet credit for converting `points`.
#[inline]
pub fn conversion_amount(points: i64, point_value: Money) -> Money {
    point_value.multiply_quantity(points)
}

/// Point balance after a deduction, clamped at zero.
#[inline]
pub fn deduct_clamped(balance: i64, points: i64) -> i64 {
    (balance - points).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncapped_redemption() {
        let result = calculate_discount(
            30,
            Money::from_minor(100),
            Money::from_minor(20_000),
            Money::zero(),
        );
        assert_eq!(result.used_points, 30);
        assert_eq!(result.discount, Money::from_minor(3_000));
    }

    #[test]
    fn test_cap_recomputes_points() {
        let result = calculate_discount(
            100,
            Money::from_minor(100),
            Money::from_minor(20_000),
            Money::from_minor(15_000),
        );
        assert_eq!(result.used_points, 50);
        assert_eq!(result.discount, Money::from_minor(5_000));
    }

    #[test]
    fn test_fractional_cap_rounds_points_down() {
        // cap 0.250 at 0.100 per point -> 2 points, 0.200
        let result = calculate_discount(
            10,
            Money::from_minor(100),
            Money::from_minor(250),
            Money::zero(),
        );
        assert_eq!(result.used_points, 2);
        assert_eq!(result.discount, Money::from_minor(200));
    }

    #[test]
    fn test_offer_discount_exceeding_subtotal() {
        let result = calculate_discount(
            10,
            Money::from_minor(100),
            Money::from_minor(1_000),
            Money::from_minor(2_000),
        );
        assert_eq!(result, PointsDiscount::default());
    }

    #[test]
    fn test_zero_point_value() {
        let result = calculate_discount(10, Money::zero(), Money::from_minor(1_000), Money::zero());
        assert_eq!(result, PointsDiscount::default());
    }

    #[test]
    fn test_earned_points() {
        assert_eq!(earned_points([(10, 2), (5, 1)]), 25);
        assert_eq!(earned_points(Vec::<(i64, i64)>::new()), 0);
    }

    #[test]
    fn test_deduct_clamped() {
        assert_eq!(deduct_clamped(30, 10), 20);
        assert_eq!(deduct_clamped(5, 10), 0);
    }
}
