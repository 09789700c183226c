//! Protocol constants and magic numbers.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of decimal places carried by `Decimal`
pub const DECIMAL_PLACES: u32 = 18;

/// Fixed-point scale (10^18)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

/// Fractional bits of the pool's UQ112x112 cumulative price counters
pub const Q112_BITS: u32 = 112;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collateral asset decimals
pub const COLLATERAL_DECIMALS: u8 = 6;

/// Managed stable asset decimals
pub const STABLE_DECIMALS: u8 = 18;

/// Factor between one collateral unit and one stable unit (10^12)
pub const DECIMALS_FACTOR: u128 = 1_000_000_000_000;

/// One whole collateral token in base units
pub const COLLATERAL_UNIT: u128 = 1_000_000;

/// One whole stable token in base units
pub const STABLE_UNIT: u128 = WAD;

// ═══════════════════════════════════════════════════════════════════════════════
// RESERVE
// ═══════════════════════════════════════════════════════════════════════════════

/// Daily internal borrow limit - 0.2% of stable supply (20 basis points)
pub const DAILY_BORROW_LIMIT_BPS: u64 = 20;

/// Default redemption tax - none
pub const DEFAULT_REDEMPTION_TAX_BPS: u64 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// FLYWHEEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Default daily reward rate - 0.1% (10 basis points)
pub const DEFAULT_REWARD_RATE_BPS: u64 = 10;

/// Default EMA decay per day - 10%
pub const DEFAULT_DECAY_RATE_BPS: u64 = 1_000;

/// Default cap on a single EMA step - 10%
pub const DEFAULT_MAX_ALPHA_BPS: u64 = 1_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference-asset liquidity floor for a healthy snapshot - 100,000 collateral tokens
pub const MIN_REFERENCE_LIQUIDITY: u64 = 100_000 * COLLATERAL_UNIT as u64;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds per day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds per hour
pub const SECONDS_PER_HOUR: u64 = 3_600;

// ═══════════════════════════════════════════════════════════════════════════════
// ADDRESSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;
