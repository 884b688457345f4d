//! # Stock Movements
//!
//! Net per-variant stock change between an order's old and new lines.
//!
//! ```text
//! old lines:  A×3  B×1
//! new lines:  A×1  C×2
//! movements:  A +2 (release)   B +1 (release)   C -2 (reserve)
//! ```
//!
//! Releases are listed first so re-validation sees the freed units.

use std::collections::BTreeMap;

/// Net change for one variant. Positive releases stock, negative reserves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockMovement {
    pub variant_id: i64,
    pub delta: i64,
}

impl StockMovement {
    #[inline]
    pub fn is_release(&self) -> bool {
        self.delta > 0
    }
}

/// Sums quantities per variant, reward lines included.
pub fn quantities_by_variant<I>(lines: I) -> BTreeMap<i64, i64>
where
    I: IntoIterator<Item = (i64, i64)>,
{
    let mut totals = BTreeMap::new();
    for (variant_id, quantity) in lines {
        *totals.entry(variant_id).or_insert(0) += quantity;
    }
    totals
}

/// Computes net movements from `old` to `new` (both `(variant_id, quantity)`).
///
/// Unchanged variants produce no movement.
pub fn stock_movements<O, N>(old: O, new: N) -> Vec<StockMovement>
where
    O: IntoIterator<Item = (i64, i64)>,
    N: IntoIterator<Item = (i64, i64)>,
{
    let mut net = quantities_by_variant(old);
    for (variant_id, quantity) in quantities_by_variant(new) {
        *net.entry(variant_id).or_insert(0) -= quantity;
    }

    let mut movements: Vec<StockMovement> = net
        .into_iter()
        .filter(|(_, delta)| *delta != 0)
        .map(|(variant_id, delta)| StockMovement { variant_id, delta })
        .collect();

    movements.sort_by_key(|m| (!m.is_release(), m.variant_id));
    movements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movements() {
        let movements = stock_movements([(1, 3), (2, 1)], [(1, 1), (3, 2)]);
        assert_eq!(
            movements,
            vec![
                StockMovement { variant_id: 1, delta: 2 },
                StockMovement { variant_id: 2, delta: 1 },
                StockMovement { variant_id: 3, delta: -2 },
            ]
        );
    }

    #[test]
    fn test_unchanged_lines_produce_nothing() {
        assert!(stock_movements([(1, 2), (1, 1)], [(1, 3)]).is_empty());
    }

    #[test]
    fn test_reward_and_paid_lines_net_together() {
        // paid A×2 + reward A×1 -> paid A×1 + reward A×1
        let movements = stock_movements([(1, 2), (1, 1)], [(1, 1), (1, 1)]);
        assert_eq!(movements, vec![StockMovement { variant_id: 1, delta: 1 }]);
    }
}
