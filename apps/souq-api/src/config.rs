//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     SOUQ_PORT=8080  SOUQ_DATABASE_PATH=/var/lib/souq/souq.db            │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     --config <path>, SOUQ_CONFIG, or                                    │
//! │     ~/.config/souq/souq.toml (Linux)                                    │
//! │     ~/Library/Application Support/com.souq.souq/souq.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "souq.db"
//! max_connections = 5
//!
//! [settings]
//! tax_rate_bps = 1500      # 15%
//! point_value = "0.100"    # currency per loyalty point
//! wallet_bonus_bps = 0
//!
//! [gateway]
//! base_url = "https://pay.example.com/api/v1"
//! api_key = "…"
//! success_url = "https://shop.example.com/payments/success"
//! error_url = "https://shop.example.com/payments/cancel"
//! currency = "KWD"
//! timeout_secs = 15
//!
//! [logging]
//! filter = "info,souq=debug,sqlx=warn"
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use souq_core::{Money, Rate};
use souq_engine::StaticSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: PathBuf::from("souq.db"),
            max_connections: 5,
        }
    }
}

/// Business settings. The `settings` table overrides these at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub tax_rate_bps: u32,
    /// Decimal amount, e.g. `"0.100"`.
    pub point_value: String,
    pub wallet_bonus_bps: u32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        SettingsConfig {
            tax_rate_bps: 1500,
            point_value: "0.100".to_string(),
            wallet_bonus_bps: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub success_url: String,
    pub error_url: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            base_url: "http://localhost:9090".to_string(),
            api_key: String::new(),
            success_url: "http://localhost:8080/payments/success".to_string(),
            error_url: "http://localhost:8080/payments/cancel".to_string(),
            currency: "KWD".to_string(),
            timeout_secs: 15,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info,souq=debug,sqlx=warn".to_string(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub settings: SettingsConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (souq.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let explicit = config_path.or_else(|| std::env::var_os("SOUQ_CONFIG").map(PathBuf::from));
        if let Some(path) = explicit.clone().or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else if explicit.is_some() {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "souq", "souq").map(|dirs| dirs.config_dir().join("souq.toml"))
    }

    /// Applies `SOUQ_*` overrides. `lookup` is `std::env::var` outside tests.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SOUQ_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SOUQ_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(value = %port, "Ignoring invalid SOUQ_PORT"),
            }
        }
        if let Some(path) = lookup("SOUQ_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("SOUQ_DATABASE_MAX_CONNECTIONS") {
            match max.parse() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid SOUQ_DATABASE_MAX_CONNECTIONS"),
            }
        }
        if let Some(bps) = lookup("SOUQ_TAX_RATE_BPS") {
            match bps.parse() {
                Ok(b) => self.settings.tax_rate_bps = b,
                Err(_) => warn!(value = %bps, "Ignoring invalid SOUQ_TAX_RATE_BPS"),
            }
        }
        if let Some(value) = lookup("SOUQ_POINT_VALUE") {
            self.settings.point_value = value;
        }
        if let Some(bps) = lookup("SOUQ_WALLET_BONUS_BPS") {
            match bps.parse() {
                Ok(b) => self.settings.wallet_bonus_bps = b,
                Err(_) => warn!(value = %bps, "Ignoring invalid SOUQ_WALLET_BONUS_BPS"),
            }
        }
        if let Some(url) = lookup("SOUQ_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Some(key) = lookup("SOUQ_GATEWAY_API_KEY") {
            self.gateway.api_key = key;
        }
        if let Some(url) = lookup("SOUQ_GATEWAY_SUCCESS_URL") {
            self.gateway.success_url = url;
        }
        if let Some(url) = lookup("SOUQ_GATEWAY_ERROR_URL") {
            self.gateway.error_url = url;
        }
        if let Some(filter) = lookup("SOUQ_LOG") {
            self.logging.filter = filter;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be greater than 0"));
        }
        if self.settings.tax_rate_bps > 10_000 {
            return Err(invalid("settings.tax_rate_bps", "must be at most 10000"));
        }
        if self.settings.wallet_bonus_bps > 10_000 {
            return Err(invalid("settings.wallet_bonus_bps", "must be at most 10000"));
        }
        self.point_value()?;

        for (field, value) in [
            ("gateway.base_url", &self.gateway.base_url),
            ("gateway.success_url", &self.gateway.success_url),
            ("gateway.error_url", &self.gateway.error_url),
        ] {
            match url::Url::parse(value) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => return Err(invalid(field, format!("must be an http(s) URL, got {value:?}"))),
            }
        }
        if self.gateway.timeout_secs == 0 {
            return Err(invalid("gateway.timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| invalid("server.host", format!("{}:{} is not a socket address", self.server.host, self.server.port)))
    }

    pub fn point_value(&self) -> Result<Money, ConfigError> {
        match self.settings.point_value.parse::<Money>() {
            Ok(value) if !value.is_negative() => Ok(value),
            _ => Err(invalid(
                "settings.point_value",
                format!("expected a non-negative amount, got {:?}", self.settings.point_value),
            )),
        }
    }

    /// Settings before the `settings` table is consulted.
    pub fn static_settings(&self) -> Result<StaticSettings, ConfigError> {
        Ok(StaticSettings {
            tax_rate: Rate::from_bps(self.settings.tax_rate_bps),
            point_value: self.point_value()?,
            wallet_bonus_rate: Rate::from_bps(self.settings.wallet_bonus_bps),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        let settings = config.static_settings().unwrap();
        assert_eq!(settings.tax_rate, Rate::from_bps(1500));
        assert_eq!(settings.point_value, Money::from_minor(100));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [settings]
            wallet_bonus_bps = 500
            point_value = "0.250"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.settings.tax_rate_bps, 1500);
        assert_eq!(config.point_value().unwrap(), Money::from_minor(250));
        assert_eq!(config.gateway.currency, "KWD");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SOUQ_PORT", "7000"),
            ("SOUQ_DATABASE_PATH", "/tmp/souq-test.db"),
            ("SOUQ_TAX_RATE_BPS", "not-a-number"),
            ("SOUQ_GATEWAY_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.path, PathBuf::from("/tmp/souq-test.db"));
        assert_eq!(config.settings.tax_rate_bps, 1500);
        assert_eq!(config.gateway.api_key, "secret");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.settings.point_value = "abc".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "settings.point_value", .. })
        ));

        let mut config = AppConfig::default();
        config.gateway.success_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.settings.tax_rate_bps = 20_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.host = "not a host".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = AppConfig::load(Some(PathBuf::from("/nonexistent/souq.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
