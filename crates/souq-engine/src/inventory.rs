//! # Inventory Ledger
//!
//! Stock checks and conditional decrements on the caller's transaction.
//!
//! ## Update Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  held      = quantities of the order's current lines                    │
//! │  effective = variant.quantity + held      (units the order may take)    │
//! │  validate new lines against `effective`                                 │
//! │  apply stock_movements(old, new): releases first, then reserves         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use souq_core::inventory::{quantities_by_variant, StockMovement};
use souq_core::{CoreError, CoreResult, LineItem, OrderItem, ProductVariant, ValidationError};
use souq_db::{CatalogRepository, Conn};

use crate::error::FulfillmentResult;

#[derive(Debug, Clone, Copy)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Loads variants by id. A missing id is `NotFound`.
    pub async fn load(conn: &mut Conn, ids: &[i64]) -> FulfillmentResult<HashMap<i64, ProductVariant>> {
        let variants = CatalogRepository::find_variants(conn, ids).await?;
        if let Some(missing) = ids.iter().find(|id| !variants.contains_key(id)) {
            return Err(CoreError::not_found("ProductVariant", missing).into());
        }
        Ok(variants)
    }

    /// Takes `quantity` units, failing with `InsufficientStock` instead of
    /// going negative.
    pub async fn reserve(conn: &mut Conn, variant_id: i64, quantity: i64) -> FulfillmentResult<()> {
        if quantity <= 0 {
            return Ok(());
        }
        if CatalogRepository::reserve(conn, variant_id, quantity).await? {
            return Ok(());
        }

        let variant = CatalogRepository::find_variant(conn, variant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("ProductVariant", variant_id))?;
        Err(CoreError::InsufficientStock {
            product: variant.product_name,
            variant_id,
            available: variant.quantity,
            requested: quantity,
        }
        .into())
    }

    pub async fn release(conn: &mut Conn, variant_id: i64, quantity: i64) -> FulfillmentResult<()> {
        if quantity > 0 {
            CatalogRepository::release(conn, variant_id, quantity).await?;
        }
        Ok(())
    }

    /// Reserves the summed quantity of every variant in `lines`.
    pub async fn reserve_lines(conn: &mut Conn, lines: &[LineItem]) -> FulfillmentResult<()> {
        let totals = quantities_by_variant(lines.iter().map(|l| (l.variant_id, l.quantity)));
        for (variant_id, quantity) in totals {
            Self::reserve(conn, variant_id, quantity).await?;
        }
        Ok(())
    }

    /// Puts back every unit held by `items`.
    pub async fn release_items(conn: &mut Conn, items: &[OrderItem]) -> FulfillmentResult<()> {
        let totals = quantities_by_variant(items.iter().map(|i| (i.variant_id, i.quantity)));
        for (variant_id, quantity) in totals {
            Self::release(conn, variant_id, quantity).await?;
        }
        Ok(())
    }

    /// Applies net movements in order.
    pub async fn apply(conn: &mut Conn, movements: &[StockMovement]) -> FulfillmentResult<()> {
        for movement in movements {
            debug!(variant_id = movement.variant_id, delta = movement.delta, "Applying stock movement");
            if movement.is_release() {
                Self::release(conn, movement.variant_id, movement.delta).await?;
            } else {
                Self::reserve(conn, movement.variant_id, -movement.delta).await?;
            }
        }
        Ok(())
    }
}

/// Adds units already held by the order to each variant's availability.
pub fn with_held(
    mut variants: HashMap<i64, ProductVariant>,
    held: &BTreeMap<i64, i64>,
) -> HashMap<i64, ProductVariant> {
    for (variant_id, quantity) in held {
        if let Some(variant) = variants.get_mut(variant_id) {
            variant.quantity += quantity;
        }
    }
    variants
}

/// Builds paid lines from requests, merging repeated variants.
///
/// Fails on inactive variants and on demand above availability.
pub fn build_lines<I>(requests: I, variants: &HashMap<i64, ProductVariant>) -> CoreResult<Vec<LineItem>>
where
    I: IntoIterator<Item = (i64, i64)>,
{
    let mut lines: Vec<LineItem> = Vec::new();
    for (variant_id, quantity) in requests {
        let variant = variants
            .get(&variant_id)
            .ok_or_else(|| CoreError::not_found("ProductVariant", variant_id))?;
        if !variant.is_active {
            return Err(ValidationError::Conflict(format!(
                "{} ({}) is not available for sale",
                variant.product_name, variant.sku
            ))
            .into());
        }
        match lines.iter_mut().find(|l| l.variant_id == variant_id) {
            Some(line) => line.add_quantity(quantity),
            None => lines.push(LineItem::paid(variant, quantity)),
        }
    }
    ensure_available(&lines, variants)?;
    Ok(lines)
}

/// Checks the summed demand per variant against availability.
pub fn ensure_available(lines: &[LineItem], variants: &HashMap<i64, ProductVariant>) -> CoreResult<()> {
    let demand = quantities_by_variant(lines.iter().map(|l| (l.variant_id, l.quantity)));
    for (variant_id, requested) in demand {
        let variant = variants
            .get(&variant_id)
            .ok_or_else(|| CoreError::not_found("ProductVariant", variant_id))?;
        if !variant.has_stock(requested) {
            return Err(CoreError::InsufficientStock {
                product: variant.product_name.clone(),
                variant_id,
                available: variant.quantity,
                requested,
            });
        }
    }
    Ok(())
}
