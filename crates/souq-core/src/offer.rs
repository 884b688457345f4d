//! # Offer Evaluation Engine
//!
//! Resolves an offer's conditions and rewards against the cart.
//!
//! ## One Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_offer(definition, variants, lines, subtotal)                     │
//! │                                                                         │
//! │  1. Conditions   merge into the paid line for the variant, or append    │
//! │                  a new paid line (is_offer = false)                     │
//! │                                                                         │
//! │  2a. Products    append a NEW reward line (is_offer = true) at the      │
//! │                  normal price; its total goes into the discount         │
//! │                                                                         │
//! │  2b. Discount    fixed value, or bps × condition subtotal of THIS       │
//! │                  application; the sum is capped at that subtotal        │
//! │                                                                         │
//! │  Output: new subtotal + discount for this application                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An order that takes an offer `n` times calls [`apply_offer`] `n` times;
//! each call caps only its own discount.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Rate};
use crate::types::{
    DiscountType, LineItem, Offer, OfferDefinition, OfferType, ProductVariant, RewardType,
};

/// Result of applying one offer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferApplication {
    /// Running subtotal after condition and reward lines were added.
    pub subtotal: Money,
    /// Discount granted by this instance.
    pub discount: Money,
    /// Value of the condition lines this instance contributed.
    pub condition_subtotal: Money,
}

/// Totals after every selected offer has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OffersOutcome {
    pub subtotal: Money,
    pub discount: Money,
}

/// Checks that an offer may be used on an order.
///
/// ## Rules
/// - Offer must be active
/// - `now` must fall inside the optional start/end window
/// - Charity offers are only valid on orders without a customer
pub fn validate_offer(offer: &Offer, has_customer: bool, now: DateTime<Utc>) -> CoreResult<()> {
    if !offer.is_active {
        return Err(CoreError::offer_not_applicable(offer.id, "offer is inactive"));
    }

    if let Some(start) = offer.start_date {
        if now < start {
            return Err(CoreError::offer_not_applicable(offer.id, "offer has not started"));
        }
    }

    if let Some(end) = offer.end_date {
        if now > end {
            return Err(CoreError::offer_not_applicable(offer.id, "offer has expired"));
        }
    }

    if offer.offer_type == OfferType::Charity && has_customer {
        return Err(CoreError::offer_not_applicable(
            offer.id,
            "charity offers cannot be used on customer orders",
        ));
    }

    Ok(())
}

/// Applies one instance of `definition` to `lines`.
///
/// `variants` must hold every variant the offer references, with `quantity`
/// set to what this order may take (on update that includes the units the
/// order already holds).
pub fn apply_offer(
    definition: &OfferDefinition,
    variants: &HashMap<i64, ProductVariant>,
    lines: &mut Vec<LineItem>,
    subtotal: Money,
) -> CoreResult<OfferApplication> {
    let offer = &definition.offer;
    let mut subtotal = subtotal;
    let mut condition_subtotal = Money::zero();

    for condition in definition.conditions.iter().filter(|c| c.is_active) {
        let variant = lookup(variants, offer.id, condition.variant_id)?;
        let added = variant.price.multiply_quantity(condition.quantity);

        match lines
            .iter_mut()
            .find(|l| l.variant_id == condition.variant_id && !l.is_offer)
        {
            Some(line) => line.add_quantity(condition.quantity),
            None => lines.push(LineItem::paid(variant, condition.quantity)),
        }

        ensure_stock(variant, lines)?;
        subtotal += added;
        condition_subtotal += added;
    }

    let discount = match offer.reward_type {
        RewardType::Products => {
            let mut discount = Money::zero();
            for reward in definition.rewards.iter().filter(|r| r.is_active) {
                let Some(variant_id) = reward.variant_id else {
                    continue;
                };
                let variant = lookup(variants, offer.id, variant_id)?;
                let line = LineItem::reward(variant, reward.quantity);
                subtotal += line.total_price;
                discount += line.total_price;
                lines.push(line);
                ensure_stock(variant, lines)?;
            }
            discount
        }
        RewardType::Discount => {
            let raw: Money = definition
                .rewards
                .iter()
                .filter(|r| r.is_active)
                .map(|r| match (r.discount_type, r.discount_value) {
                    (Some(DiscountType::Fixed), Some(value)) => Money::from_minor(value.max(0)),
                    (Some(DiscountType::Percentage), Some(bps)) => {
                        condition_subtotal.percentage(Rate::from_bps(bps.clamp(0, 10000) as u32))
                    }
                    _ => Money::zero(),
                })
                .sum();
            raw.min(condition_subtotal)
        }
    };

    Ok(OfferApplication {
        subtotal,
        discount,
        condition_subtotal,
    })
}

/// Applies every selected offer `quantity` times, in order.
pub fn apply_offers(
    selections: &[(&OfferDefinition, i64)],
    variants: &HashMap<i64, ProductVariant>,
    lines: &mut Vec<LineItem>,
    subtotal: Money,
) -> CoreResult<OffersOutcome> {
    let mut outcome = OffersOutcome {
        subtotal,
        discount: Money::zero(),
    };

    for (definition, quantity) in selections {
        for _ in 0..*quantity {
            let applied = apply_offer(definition, variants, lines, outcome.subtotal)?;
            outcome.subtotal = applied.subtotal;
            outcome.discount += applied.discount;
        }
    }

    Ok(outcome)
}

/// Variant ids an offer needs loaded before it can be applied.
pub fn referenced_variants(definition: &OfferDefinition) -> Vec<i64> {
    let mut ids: Vec<i64> = definition
        .conditions
        .iter()
        .filter(|c| c.is_active)
        .map(|c| c.variant_id)
        .chain(
            definition
                .rewards
                .iter()
                .filter(|r| r.is_active)
                .filter_map(|r| r.variant_id),
        )
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn lookup<'a>(
    variants: &'a HashMap<i64, ProductVariant>,
    offer_id: i64,
    variant_id: i64,
) -> CoreResult<&'a ProductVariant> {
    let variant = variants
        .get(&variant_id)
        .ok_or_else(|| CoreError::not_found("ProductVariant", variant_id))?;
    if !variant.is_active {
        return Err(CoreError::offer_not_applicable(
            offer_id,
            format!("variant {} is not available", variant.sku),
        ));
    }
    Ok(variant)
}

/// Total demand for the variant across all lines must fit its stock.
fn ensure_stock(variant: &ProductVariant, lines: &[LineItem]) -> CoreResult<()> {
    let requested: i64 = lines
        .iter()
        .filter(|l| l.variant_id == variant.id)
        .map(|l| l.quantity)
        .sum();

    if !variant.has_stock(requested) {
        return Err(CoreError::InsufficientStock {
            product: variant.product_name.clone(),
            variant_id: variant.id,
            available: variant.quantity,
            requested,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{lines_total, OfferCondition, OfferReward};
    use chrono::Duration;

    fn variant(id: i64, price: i64, quantity: i64) -> ProductVariant {
        ProductVariant {
            id,
            product_id: id * 10,
            product_name: format!("Product {id}"),
            sku: format!("SKU-{id}"),
            price: Money::from_minor(price),
            quantity,
            is_active: true,
        }
    }

    fn catalog(variants: &[ProductVariant]) -> HashMap<i64, ProductVariant> {
        variants.iter().map(|v| (v.id, v.clone())).collect()
    }

    fn offer(id: i64, reward_type: RewardType) -> Offer {
        Offer {
            id,
            name: format!("Offer {id}"),
            offer_type: OfferType::Standard,
            reward_type,
            points: 10,
            is_active: true,
            start_date: None,
            end_date: None,
        }
    }

    fn condition(offer_id: i64, variant_id: i64, quantity: i64) -> OfferCondition {
        OfferCondition {
            id: variant_id,
            offer_id,
            variant_id,
            quantity,
            is_active: true,
        }
    }

    fn product_reward(offer_id: i64, variant_id: i64, quantity: i64) -> OfferReward {
        OfferReward {
            id: variant_id,
            offer_id,
            variant_id: Some(variant_id),
            quantity,
            discount_value: None,
            discount_type: None,
            is_active: true,
        }
    }

    fn discount_reward(offer_id: i64, kind: DiscountType, value: i64) -> OfferReward {
        OfferReward {
            id: value,
            offer_id,
            variant_id: None,
            quantity: 0,
            discount_value: Some(value),
            discount_type: Some(kind),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount_scenario() {
        // Cart already holds 10.000 of unrelated goods; the offer's condition
        // adds 2 × 5.000 and grants 50% of that.
        let variants = catalog(&[variant(1, 10_000, 10), variant(2, 5_000, 10)]);
        let mut lines = vec![LineItem::paid(&variants[&1], 1)];
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Discount),
            conditions: vec![condition(1, 2, 2)],
            rewards: vec![discount_reward(1, DiscountType::Percentage, 5000)],
        };

        let subtotal = lines_total(&lines);
        let applied = apply_offer(&definition, &variants, &mut lines, subtotal).unwrap();

        assert_eq!(applied.subtotal, Money::from_minor(20_000));
        assert_eq!(applied.condition_subtotal, Money::from_minor(10_000));
        assert_eq!(applied.discount, Money::from_minor(5_000));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_discount_is_capped_at_condition_subtotal() {
        let variants = catalog(&[variant(1, 50_000, 10), variant(2, 3_000, 10)]);
        let mut lines = vec![LineItem::paid(&variants[&1], 1)];
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Discount),
            conditions: vec![condition(1, 2, 1)],
            rewards: vec![
                discount_reward(1, DiscountType::Fixed, 2_000),
                discount_reward(1, DiscountType::Fixed, 2_000),
            ],
        };

        let subtotal = lines_total(&lines);
        let applied = apply_offer(&definition, &variants, &mut lines, subtotal).unwrap();
        assert_eq!(applied.discount, Money::from_minor(3_000));
    }

    #[test]
    fn test_condition_merges_into_existing_paid_line() {
        let variants = catalog(&[variant(2, 5_000, 10)]);
        let mut lines = vec![LineItem::paid(&variants[&2], 1)];
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Discount),
            conditions: vec![condition(1, 2, 2)],
            rewards: vec![],
        };

        let subtotal = lines_total(&lines);
        apply_offer(&definition, &variants, &mut lines, subtotal).unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(lines[0].total_price, Money::from_minor(15_000));
    }

    #[test]
    fn test_reward_products_are_separate_offer_lines() {
        let variants = catalog(&[variant(2, 5_000, 10), variant(3, 1_500, 10)]);
        let mut lines = vec![LineItem::paid(&variants[&3], 1)];
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Products),
            conditions: vec![condition(1, 2, 1)],
            rewards: vec![product_reward(1, 3, 2)],
        };

        let subtotal = lines_total(&lines);
        let applied = apply_offer(&definition, &variants, &mut lines, subtotal).unwrap();

        let rewards: Vec<_> = lines.iter().filter(|l| l.is_offer).collect();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].variant_id, 3);
        assert_eq!(rewards[0].quantity, 2);
        // the paid line for the same variant is untouched
        assert_eq!(lines.iter().filter(|l| l.variant_id == 3 && !l.is_offer).count(), 1);
        assert_eq!(applied.discount, Money::from_minor(3_000));
        assert_eq!(applied.subtotal, Money::from_minor(1_500 + 5_000 + 3_000));
    }

    #[test]
    fn test_repeated_application_appends_independent_rewards() {
        let variants = catalog(&[variant(2, 5_000, 10), variant(3, 1_500, 10)]);
        let mut lines = Vec::new();
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Products),
            conditions: vec![condition(1, 2, 1)],
            rewards: vec![product_reward(1, 3, 1)],
        };

        let outcome = apply_offers(&[(&definition, 2)], &variants, &mut lines, Money::zero()).unwrap();

        assert_eq!(lines.iter().filter(|l| l.is_offer).count(), 2);
        assert_eq!(lines.iter().find(|l| !l.is_offer).unwrap().quantity, 2);
        assert_eq!(outcome.discount, Money::from_minor(3_000));
        assert_eq!(outcome.subtotal, Money::from_minor(13_000));
    }

    #[test]
    fn test_insufficient_stock_for_condition() {
        let variants = catalog(&[variant(2, 5_000, 1)]);
        let mut lines = Vec::new();
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Discount),
            conditions: vec![condition(1, 2, 2)],
            rewards: vec![],
        };

        let err = apply_offer(&definition, &variants, &mut lines, Money::zero()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 1, requested: 2, .. }
        ));
    }

    #[test]
    fn test_missing_variant_is_not_found() {
        let variants = catalog(&[]);
        let mut lines = Vec::new();
        let definition = OfferDefinition {
            offer: offer(1, RewardType::Products),
            conditions: vec![],
            rewards: vec![product_reward(1, 99, 1)],
        };

        let err = apply_offer(&definition, &variants, &mut lines, Money::zero()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn test_validate_offer_rules() {
        let now = Utc::now();
        let mut o = offer(1, RewardType::Discount);
        assert!(validate_offer(&o, true, now).is_ok());

        o.end_date = Some(now - Duration::days(1));
        assert!(validate_offer(&o, true, now).is_err());

        o.end_date = None;
        o.start_date = Some(now + Duration::days(1));
        assert!(validate_offer(&o, true, now).is_err());

        o.start_date = None;
        o.offer_type = OfferType::Charity;
        assert!(matches!(
            validate_offer(&o, true, now),
            Err(CoreError::OfferNotApplicable { offer_id: 1, .. })
        ));
        assert!(validate_offer(&o, false, now).is_ok());

        o.is_active = false;
        assert!(validate_offer(&o, false, now).is_err());
    }
}
