//! # Settings Provider
//!
//! Tax rate, point value and wallet top-up bonus, injected into every
//! service instead of being looked up from a global.
//!
//! ## Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. StaticSettings::default()         15% tax, 0.100/point, no bonus    │
//! │  2. [settings] section of souq.toml   applied by the API                │
//! │  3. settings table                    tax_rate / point_value /          │
//! │                                       wallet_bonus_rate (highest)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, warn};

use souq_core::{Money, Rate};
use souq_db::{Conn, DbResult, SettingsRepository};

pub const TAX_RATE_KEY: &str = "tax_rate";
pub const POINT_VALUE_KEY: &str = "point_value";
pub const WALLET_BONUS_RATE_KEY: &str = "wallet_bonus_rate";

/// Read-only business settings.
pub trait SettingsProvider: Send + Sync {
    fn tax_rate(&self) -> Rate;

    /// Currency value of one loyalty point.
    fn point_value(&self) -> Money;

    fn wallet_bonus_rate(&self) -> Rate;
}

/// Settings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSettings {
    pub tax_rate: Rate,
    pub point_value: Money,
    pub wallet_bonus_rate: Rate,
}

impl Default for StaticSettings {
    fn default() -> Self {
        StaticSettings {
            tax_rate: Rate::from_bps(1500),
            point_value: Money::from_minor(100),
            wallet_bonus_rate: Rate::zero(),
        }
    }
}

impl StaticSettings {
    /// Overrides values from the `settings` table. Rates are stored as
    /// fractions (`"0.15"`), the point value as an amount (`"0.100"`).
    /// Unparsable rows are logged and skipped.
    pub async fn with_stored_overrides(mut self, conn: &mut Conn) -> DbResult<Self> {
        let stored = SettingsRepository::all(conn).await?;

        if let Some(raw) = stored.get(TAX_RATE_KEY) {
            match parse_rate(raw) {
                Some(rate) => self.tax_rate = rate,
                None => warn!(key = TAX_RATE_KEY, value = %raw, "Ignoring invalid setting"),
            }
        }
        if let Some(raw) = stored.get(POINT_VALUE_KEY) {
            match raw.trim().parse::<Money>() {
                Ok(value) if !value.is_negative() => self.point_value = value,
                _ => warn!(key = POINT_VALUE_KEY, value = %raw, "Ignoring invalid setting"),
            }
        }
        if let Some(raw) = stored.get(WALLET_BONUS_RATE_KEY) {
            match parse_rate(raw) {
                Some(rate) => self.wallet_bonus_rate = rate,
                None => warn!(key = WALLET_BONUS_RATE_KEY, value = %raw, "Ignoring invalid setting"),
            }
        }

        debug!(
            tax_bps = self.tax_rate.bps(),
            point_value = %self.point_value,
            bonus_bps = self.wallet_bonus_rate.bps(),
            "Settings resolved"
        );
        Ok(self)
    }
}

impl SettingsProvider for StaticSettings {
    fn tax_rate(&self) -> Rate {
        self.tax_rate
    }

    fn point_value(&self) -> Money {
        self.point_value
    }

    fn wallet_bonus_rate(&self) -> Rate {
        self.wallet_bonus_rate
    }
}

/// Parses a fraction between 0 and 1 (`"0.15"` → 1500 bps).
fn parse_rate(raw: &str) -> Option<Rate> {
    let fraction: f64 = raw.trim().parse().ok()?;
    (0.0..=1.0)
        .contains(&fraction)
        .then(|| Rate::from_fraction(fraction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_db::{Database, DbConfig};

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0.15"), Some(Rate::from_bps(1500)));
        assert_eq!(parse_rate(" 0 "), Some(Rate::zero()));
        assert_eq!(parse_rate("1.5"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[tokio::test]
    async fn test_stored_overrides() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        SettingsRepository::set(&mut conn, TAX_RATE_KEY, "0.05").await.unwrap();
        SettingsRepository::set(&mut conn, POINT_VALUE_KEY, "0.250").await.unwrap();
        SettingsRepository::set(&mut conn, WALLET_BONUS_RATE_KEY, "nonsense").await.unwrap();

        let settings = StaticSettings::default()
            .with_stored_overrides(&mut conn)
            .await
            .unwrap();
        assert_eq!(settings.tax_rate, Rate::from_bps(500));
        assert_eq!(settings.point_value, Money::from_minor(250));
        assert!(settings.wallet_bonus_rate.is_zero());
    }
}
