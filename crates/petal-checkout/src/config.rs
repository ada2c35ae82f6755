//! # Storefront Configuration
//!
//! Settings for the checkout services and the database adapter.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PETAL_DB_PATH=/var/lib/petal/petal.db                              │
//! │     PETAL_MAX_ITEM_QUANTITY=50                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/storefront/storefront.toml (Linux)                       │
//! │     ~/Library/Application Support/com.petal.storefront/... (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "petal.db"
//! max_connections = 5
//!
//! [cart]
//! max_item_quantity = 999
//! max_lines = 100
//! abandon_after_hours = 72
//!
//! [stock]
//! low_stock_threshold = 5
//!
//! [money]
//! currency_symbol = "$"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use petal_core::stock::DEFAULT_LOW_STOCK_THRESHOLD;
use petal_core::{MoneyFormat, MAX_CART_LINES, MAX_ITEM_QUANTITY};

// =============================================================================
// Config Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "petal.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSettings {
    /// Upper bound for a single line.
    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,

    /// Distinct lines per cart.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Inactivity after which `abandon_stale` sweeps an active cart.
    #[serde(default = "default_abandon_after_hours")]
    pub abandon_after_hours: i64,
}

fn default_max_item_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}

fn default_max_lines() -> usize {
    MAX_CART_LINES
}

fn default_abandon_after_hours() -> i64 {
    72
}

impl Default for CartSettings {
    fn default() -> Self {
        CartSettings {
            max_item_quantity: default_max_item_quantity(),
            max_lines: default_max_lines(),
            abandon_after_hours: default_abandon_after_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSettings {
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,
}

fn default_low_stock_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

impl Default for StockSettings {
    fn default() -> Self {
        StockSettings {
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneySettings {
    /// Only used to render amounts inside messages.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_currency_symbol() -> String {
    "$".to_string()
}

impl Default for MoneySettings {
    fn default() -> Self {
        MoneySettings {
            currency_symbol: default_currency_symbol(),
        }
    }
}

// =============================================================================
// Storefront Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cart: CartSettings,

    #[serde(default)]
    pub stock: StockSettings,

    #[serde(default)]
    pub money: MoneySettings,
}

impl StorefrontConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`storefront.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storefront config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storefront config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.cart.max_item_quantity < 1 {
            return Err(ConfigError::Invalid(
                "cart.max_item_quantity must be at least 1".into(),
            ));
        }
        if self.cart.max_lines == 0 {
            return Err(ConfigError::Invalid("cart.max_lines must be greater than 0".into()));
        }
        if self.cart.abandon_after_hours < 1 {
            return Err(ConfigError::Invalid(
                "cart.abandon_after_hours must be at least 1".into(),
            ));
        }
        if self.stock.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "stock.low_stock_threshold cannot be negative".into(),
            ));
        }
        Ok(())
    }

    /// Formatter for amounts rendered in messages.
    pub fn money_format(&self) -> MoneyFormat {
        MoneyFormat::new(self.money.currency_symbol.clone())
    }

    /// Applies `PETAL_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("PETAL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = path;
        }
        if let Some(raw) = lookup("PETAL_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("PETAL_DB_MAX_CONNECTIONS", raw)?;
        }
        if let Some(raw) = lookup("PETAL_MAX_ITEM_QUANTITY") {
            self.cart.max_item_quantity = parse_env("PETAL_MAX_ITEM_QUANTITY", raw)?;
        }
        if let Some(raw) = lookup("PETAL_LOW_STOCK_THRESHOLD") {
            self.stock.low_stock_threshold = parse_env("PETAL_LOW_STOCK_THRESHOLD", raw)?;
        }
        if let Some(raw) = lookup("PETAL_ABANDON_AFTER_HOURS") {
            self.cart.abandon_after_hours = parse_env("PETAL_ABANDON_AFTER_HOURS", raw)?;
        }
        if let Some(symbol) = lookup("PETAL_CURRENCY_SYMBOL") {
            self.money.currency_symbol = symbol;
        }
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "petal", "storefront")
            .map(|dirs| dirs.config_dir().join("storefront.toml"))
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, raw: String) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value: raw })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::default();
        assert_eq!(config.cart.max_item_quantity, 999);
        assert_eq!(config.cart.max_lines, 100);
        assert_eq!(config.cart.abandon_after_hours, 72);
        assert_eq!(config.stock.low_stock_threshold, 5);
        assert_eq!(config.money.currency_symbol, "$");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: StorefrontConfig = toml::from_str(
            r#"
            [cart]
            max_item_quantity = 20

            [money]
            currency_symbol = "£"
            "#,
        )
        .unwrap();
        assert_eq!(config.cart.max_item_quantity, 20);
        assert_eq!(config.cart.max_lines, 100);
        assert_eq!(config.database.path, "petal.db");
        assert_eq!(config.money_format().format(petal_core::Money::from_cents(250)), "£2.50");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PETAL_DB_PATH", "/tmp/shop.db"),
            ("PETAL_MAX_ITEM_QUANTITY", "12"),
            ("PETAL_LOW_STOCK_THRESHOLD", " 3 "),
        ]);
        let mut config = StorefrontConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, "/tmp/shop.db");
        assert_eq!(config.cart.max_item_quantity, 12);
        assert_eq!(config.stock.low_stock_threshold, 3);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = StorefrontConfig::default();
        let err = config
            .apply_overrides(|key| (key == "PETAL_ABANDON_AFTER_HOURS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                key: "PETAL_ABANDON_AFTER_HOURS",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = StorefrontConfig::default();
        config.cart.max_lines = 0;
        assert!(config.validate().is_err());

        let mut config = StorefrontConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
