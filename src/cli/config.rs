//! Simulation configuration.
//!
//! Configuration for the `reserve-sim` tool: deployment parameters plus the
//! market scenario the simulation drives. Loaded from JSON, overridable from
//! the environment.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::config::ProtocolParams;
use crate::protocol::engine::DEFAULT_NAMESPACE;
use crate::utils::math::Decimal;

// ═══════════════════════════════════════════════════════════════════════════════
// SIMULATION CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Namespace for derived addresses
    pub namespace: String,
    /// Ledger time at deployment
    pub start_time: u64,
    /// Number of simulated days
    pub days: u32,
    /// Deployment parameters
    pub params: ProtocolParams,
    /// Stable-side pair liquidity in whole tokens
    pub pair_liquidity: u64,
    /// Pool price of the stable asset on day zero
    pub initial_price: Decimal,
    /// Daily move of the pool price back toward par, in basis points
    pub price_recovery_bps: u64,
    /// Daily yield accrued by the yield pool, in basis points of its cash
    pub daily_yield_bps: u64,
    /// Stable asset a saver deposits into the flywheel, in whole tokens
    pub saver_deposit: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            start_time: 1_700_000_000,
            days: 30,
            params: ProtocolParams::default().with_redemption_tax(Decimal::from_bps(500)),
            pair_liquidity: 1_000_000,
            initial_price: Decimal::from_bps(9_700),
            price_recovery_bps: 20,
            daily_yield_bps: 1,
            saver_deposit: 100_000,
        }
    }
}

impl SimConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Apply `RESERVE_*` environment overrides
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(namespace) = std::env::var("RESERVE_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(days) = env_parse("RESERVE_DAYS")? {
            self.days = days;
        }
        if let Some(tax) = env_parse("RESERVE_REDEMPTION_TAX")? {
            self.params.redemption_tax = tax;
        }
        if let Some(rate) = env_parse("RESERVE_REWARD_RATE")? {
            self.params.reward_rate = rate;
        }
        if let Some(price) = env_parse("RESERVE_INITIAL_PRICE")? {
            self.initial_price = price;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::Validation("namespace cannot be empty".into()));
        }
        if self.days == 0 {
            return Err(ConfigError::Validation("days must be greater than 0".into()));
        }
        if self.pair_liquidity == 0 {
            return Err(ConfigError::Validation("pair liquidity must be greater than 0".into()));
        }
        if self.initial_price.is_zero() || self.initial_price > Decimal::ONE {
            return Err(ConfigError::Validation(format!(
                "initial price {} must be in (0, 1]",
                self.initial_price
            )));
        }
        self.params
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("{}: cannot parse {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    Io(String),
    /// Parse error
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.params.redemption_tax, "0.05".parse().unwrap());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim").join("config.json");

        let config = SimConfig {
            days: 7,
            ..SimConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(SimConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "days": 3, "initial_price": "0.99" }"#).unwrap();

        let config = SimConfig::load(&path).unwrap();
        assert_eq!(config.days, 3);
        assert_eq!(config.initial_price, "0.99".parse().unwrap());
        assert_eq!(config.pair_liquidity, SimConfig::default().pair_liquidity);
    }

    #[test]
    fn test_validation() {
        let config = SimConfig {
            days: 0,
            ..SimConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let config = SimConfig {
            initial_price: "1.5".parse().unwrap(),
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SimConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
