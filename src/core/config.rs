//! Protocol configuration and parameters.
//!
//! Parameters are divided into:
//! - Deployment: fixed when the world is built (reference-liquidity floor)
//! - Governable: adjustable by the authority through the governance setters

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::Decimal;

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Protocol parameters applied at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Protocol version
    pub version: String,

    /// Fraction subtracted from the redemption price
    pub redemption_tax: Decimal,

    /// Fraction of stable supply the stabilizer may borrow per day
    pub daily_borrow_limit: Decimal,

    /// Daily reward rate paid to stabilizer shareholders at full deviation
    pub reward_rate: Decimal,

    /// EMA decay per day of elapsed time
    pub decay_rate: Decimal,

    /// Cap on a single EMA step
    pub max_alpha: Decimal,

    /// Reference-asset reserve a pool needs for a healthy price snapshot
    pub min_reference_liquidity: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            redemption_tax: Decimal::from_bps(DEFAULT_REDEMPTION_TAX_BPS),
            daily_borrow_limit: Decimal::from_bps(DAILY_BORROW_LIMIT_BPS),
            reward_rate: Decimal::from_bps(DEFAULT_REWARD_RATE_BPS),
            decay_rate: Decimal::from_bps(DEFAULT_DECAY_RATE_BPS),
            max_alpha: Decimal::from_bps(DEFAULT_MAX_ALPHA_BPS),
            min_reference_liquidity: MIN_REFERENCE_LIQUIDITY,
        }
    }
}

impl ProtocolParams {
    /// Create with a custom redemption tax
    pub fn with_redemption_tax(mut self, tax: Decimal) -> Self {
        self.redemption_tax = tax;
        self
    }

    /// Create with custom flywheel rates
    pub fn with_flywheel(mut self, reward_rate: Decimal, decay_rate: Decimal, max_alpha: Decimal) -> Self {
        self.reward_rate = reward_rate;
        self.decay_rate = decay_rate;
        self.max_alpha = max_alpha;
        self
    }

    /// Create with a custom reference-liquidity floor
    pub fn with_min_reference_liquidity(mut self, floor: u64) -> Self {
        self.min_reference_liquidity = floor;
        self
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        let at_most_one = |name: &'static str, value: Decimal| {
            if value > Decimal::ONE {
                return Err(Error::InvalidParameter {
                    name,
                    reason: format!("{value} exceeds 1.0"),
                });
            }
            Ok(())
        };

        at_most_one("redemption_tax", self.redemption_tax)?;
        at_most_one("daily_borrow_limit", self.daily_borrow_limit)?;
        at_most_one("reward_rate", self.reward_rate)?;
        at_most_one("max_alpha", self.max_alpha)?;

        if self.daily_borrow_limit.is_zero() {
            return Err(Error::InvalidParameter {
                name: "daily_borrow_limit",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_params_default() {
        let params = ProtocolParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.daily_borrow_limit, "0.002".parse().unwrap());
        assert_eq!(params.reward_rate, "0.001".parse().unwrap());
        assert_eq!(params.decay_rate, "0.1".parse().unwrap());
        assert_eq!(params.max_alpha, "0.1".parse().unwrap());
        assert_eq!(params.redemption_tax, Decimal::ZERO);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let params = ProtocolParams::default().with_redemption_tax("1.5".parse().unwrap());
        let err = params.validate().unwrap_err();
        assert_eq!(err.tag(), "redemption_tax");

        let mut params = ProtocolParams::default();
        params.daily_borrow_limit = Decimal::ZERO;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_params_json() {
        let params = ProtocolParams::default().with_min_reference_liquidity(5);
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"0.002000000000000000\""));
        let parsed: ProtocolParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, params);
    }
}
