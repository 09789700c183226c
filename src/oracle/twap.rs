//! Time-weighted average price oracle.
//!
//! Each tracked asset is bound to one liquidity pair whose other side is the
//! reference asset. A market moves through three states:
//! - Unregistered: `capture` returns the neutral snapshot and changes nothing
//! - Registered: the first `capture` records the cumulative price and time
//! - Steady: every later `capture` returns the average price since the last one
//!
//! Prices are reference-asset units per tracked-asset unit, normalized for the
//! decimal difference between the two assets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::token::RestrictionList;
use crate::error::{Error, Result};
use crate::oracle::pair::{current_cumulative_prices, LiquidityPair};
use crate::utils::address::Address;
use crate::utils::constants::{DECIMAL_PLACES, Q112_BITS};
use crate::utils::math::{narrow, u256_serde, Decimal, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// An asset and its decimal places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Asset address
    pub address: Address,
    /// Decimal places
    pub decimals: u8,
}

/// Result of a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Average price over the window
    pub price: Decimal,
    /// Window length in seconds
    pub elapsed: u32,
    /// Whether the price can be trusted
    pub healthy: bool,
}

impl Snapshot {
    /// Price 1.0 over an empty, unhealthy window
    pub const NEUTRAL: Self = Self {
        price: Decimal::ONE,
        elapsed: 0,
        healthy: false,
    };
}

/// Per-asset TWAP state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Tracked asset
    pub asset: Address,
    /// Pair the price is read from
    pub pair: Address,
    /// Side of the pair holding the tracked asset (0 or 1)
    pub side: usize,
    /// Whether the first capture has happened
    pub initialized: bool,
    /// Cumulative price at the last capture
    #[serde(with = "u256_serde")]
    pub last_cumulative: U256,
    /// Timestamp of the last capture
    pub last_timestamp: u32,
    /// Tracked decimals minus reference decimals
    pub decimals_shift: i32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// TWAP oracle over constant-product pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapOracle {
    address: Address,
    /// Only account allowed to set up markets and capture
    authority: Address,
    reference: AssetRef,
    /// Reference-asset reserve needed for a healthy snapshot
    min_reference_liquidity: u128,
    markets: HashMap<Address, Market>,
}

impl TwapOracle {
    /// Create an oracle priced in `reference`
    pub fn new(address: Address, authority: Address, reference: AssetRef, min_reference_liquidity: u128) -> Self {
        Self {
            address,
            authority,
            reference,
            min_reference_liquidity,
            markets: HashMap::new(),
        }
    }

    /// Oracle address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Reference asset
    pub fn reference(&self) -> AssetRef {
        self.reference
    }

    /// Market state for an asset
    pub fn market(&self, asset: &Address) -> Option<&Market> {
        self.markets.get(asset)
    }

    /// Whether an asset is registered
    pub fn is_registered(&self, asset: &Address) -> bool {
        self.markets.contains_key(asset)
    }

    /// Bind `asset` to `pair`
    pub fn setup<P: LiquidityPair + ?Sized>(&mut self, caller: &Address, asset: AssetRef, pair: &P) -> Result<()> {
        self.require_authority(caller, "oracle-setup")?;

        if self.markets.contains_key(&asset.address) {
            return Err(Error::InvalidState("market-exists"));
        }

        let (token0, token1) = (pair.token0(), pair.token1());
        if token0 == token1 {
            return Err(Error::InvalidState("pair-sides-identical"));
        }
        let (side, other) = if asset.address == token0 {
            (0, token1)
        } else if asset.address == token1 {
            (1, token0)
        } else {
            return Err(Error::InvalidState("asset-not-in-pair"));
        };
        if other != self.reference.address {
            return Err(Error::InvalidState("reference-not-in-pair"));
        }

        self.markets.insert(
            asset.address,
            Market {
                asset: asset.address,
                pair: pair.address(),
                side,
                initialized: false,
                last_cumulative: U256::zero(),
                last_timestamp: 0,
                decimals_shift: asset.decimals as i32 - self.reference.decimals as i32,
            },
        );

        tracing::info!(asset = %asset.address, pair = %pair.address(), side, "oracle market registered");
        Ok(())
    }

    /// Take a price snapshot of `asset` at `now`
    pub fn capture<P: LiquidityPair + ?Sized>(
        &mut self,
        caller: &Address,
        asset: &Address,
        now: u32,
        pair: &P,
        restrictions: &dyn RestrictionList,
    ) -> Result<Snapshot> {
        self.require_authority(caller, "oracle-capture")?;

        let floor = self.min_reference_liquidity;
        let market = match self.markets.get_mut(asset) {
            Some(market) => market,
            None => return Ok(Snapshot::NEUTRAL),
        };
        if market.pair != pair.address() {
            return Err(Error::InvalidState("pair-mismatch"));
        }

        let (cumulative0, cumulative1) = current_cumulative_prices(pair, now);
        let cumulative = if market.side == 0 { cumulative0 } else { cumulative1 };

        if !market.initialized {
            market.initialized = true;
            market.last_cumulative = cumulative;
            market.last_timestamp = now;
            tracing::debug!(asset = %asset, now, "oracle market initialized");
            return Ok(Snapshot::NEUTRAL);
        }

        let elapsed = now.wrapping_sub(market.last_timestamp);
        if elapsed == 0 {
            return Ok(Snapshot::NEUTRAL);
        }

        let average = cumulative.overflowing_sub(market.last_cumulative).0 / U256::from(elapsed);
        let price = scale_price(average, market.decimals_shift)?;

        market.last_cumulative = cumulative;
        market.last_timestamp = now;

        let (reserve0, reserve1, _) = pair.reserves();
        let reference_reserve = if market.side == 0 { reserve1 } else { reserve0 };
        let healthy = reference_reserve >= floor && !restrictions.is_restricted(&pair.address());

        tracing::debug!(asset = %asset, %price, elapsed, healthy, "oracle capture");
        Ok(Snapshot { price, elapsed, healthy })
    }

    fn require_authority(&self, caller: &Address, action: &'static str) -> Result<()> {
        if *caller != self.authority {
            return Err(Error::Unauthorized { action });
        }
        Ok(())
    }
}

/// UQ112x112 raw-unit price to a `Decimal`, shifted by `10^shift`
fn scale_price(average: U256, shift: i32) -> Result<Decimal> {
    let exponent = DECIMAL_PLACES as i32 + shift;
    // 10^77 no longer fits in 256 bits
    if exponent.unsigned_abs() > 76 {
        return Err(Error::arithmetic("twap-scale"));
    }
    let ten = U256::from(10u8);
    let scaled = if exponent >= 0 {
        average
            .checked_mul(ten.pow(U256::from(exponent as u32)))
            .ok_or_else(|| Error::arithmetic("twap-scale"))?
    } else {
        average / ten.pow(U256::from(exponent.unsigned_abs()))
    };
    narrow(scaled >> Q112_BITS as usize, "twap-scale").map(Decimal::from_raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::pair::ConstantProductPair;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Blocklist(HashSet<Address>);

    impl RestrictionList for Blocklist {
        fn is_restricted(&self, account: &Address) -> bool {
            self.0.contains(account)
        }
    }

    struct Fixture {
        oracle: TwapOracle,
        pair: ConstantProductPair,
        authority: Address,
        stable: AssetRef,
    }

    const FLOOR: u128 = 100_000_000_000;

    fn fixture() -> Fixture {
        let authority = Address::derive("stabilizer");
        let usdc = AssetRef { address: Address::derive("usdc"), decimals: 6 };
        let stable = AssetRef { address: Address::derive("stable"), decimals: 18 };
        let pair = ConstantProductPair::new(Address::derive("pair"), stable.address, usdc.address);
        let oracle = TwapOracle::new(Address::derive("oracle"), authority, usdc, FLOOR);
        Fixture { oracle, pair, authority, stable }
    }

    fn approx(actual: Decimal, expected: &str) {
        let expected: Decimal = expected.parse().unwrap();
        let diff = actual.raw().abs_diff(expected.raw());
        assert!(diff <= 1_000, "{actual} != {expected}");
    }

    #[test]
    fn test_setup_validation() {
        let mut f = fixture();
        let outsider = Address::derive("outsider");

        let err = f.oracle.setup(&outsider, f.stable, &f.pair).unwrap_err();
        assert_eq!(err.tag(), "oracle-setup");

        let stranger = AssetRef { address: Address::derive("other"), decimals: 18 };
        let err = f.oracle.setup(&f.authority, stranger, &f.pair).unwrap_err();
        assert_eq!(err, Error::InvalidState("asset-not-in-pair"));

        let wrong_reference =
            ConstantProductPair::new(Address::derive("pair2"), f.stable.address, Address::derive("dai"));
        let err = f.oracle.setup(&f.authority, f.stable, &wrong_reference).unwrap_err();
        assert_eq!(err, Error::InvalidState("reference-not-in-pair"));

        let same = ConstantProductPair::new(Address::derive("pair3"), f.stable.address, f.stable.address);
        let err = f.oracle.setup(&f.authority, f.stable, &same).unwrap_err();
        assert_eq!(err, Error::InvalidState("pair-sides-identical"));

        f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap();
        assert_eq!(f.oracle.market(&f.stable.address).unwrap().side, 0);
        assert_eq!(f.oracle.market(&f.stable.address).unwrap().decimals_shift, 12);

        let err = f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap_err();
        assert_eq!(err, Error::InvalidState("market-exists"));
    }

    #[test]
    fn test_capture_state_machine() {
        let mut f = fixture();
        let blocklist = Blocklist::default();
        f.pair.set_reserves(200_000 * 10u128.pow(18), 200_000 * 10u128.pow(6), 1_000).unwrap();

        // Unregistered
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 1_000, &f.pair, &blocklist).unwrap();
        assert_eq!(snap, Snapshot::NEUTRAL);

        f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap();

        // First capture initializes
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 1_000, &f.pair, &blocklist).unwrap();
        assert_eq!(snap, Snapshot::NEUTRAL);
        let market = f.oracle.market(&f.stable.address).unwrap().clone();
        assert!(market.initialized);
        assert_eq!(market.last_timestamp, 1_000);

        // Same instant: no mutation
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 1_000, &f.pair, &blocklist).unwrap();
        assert_eq!(snap, Snapshot::NEUTRAL);
        assert_eq!(f.oracle.market(&f.stable.address).unwrap(), &market);

        // Steady state
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 1_600, &f.pair, &blocklist).unwrap();
        assert_eq!(snap.elapsed, 600);
        assert!(snap.healthy);
        approx(snap.price, "1.0");
        assert_eq!(f.oracle.market(&f.stable.address).unwrap().last_timestamp, 1_600);
    }

    #[test]
    fn test_time_weighted_average() {
        let mut f = fixture();
        let blocklist = Blocklist::default();
        let e18 = 10u128.pow(18);
        let e6 = 10u128.pow(6);
        f.pair.set_reserves(200_000 * e18, 200_000 * e6, 0).unwrap();
        f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap();
        f.oracle.capture(&f.authority, &f.stable.address, 0, &f.pair, &blocklist).unwrap();

        // Price 1.0 for 100s then 0.8 for 100s
        f.pair.set_reserves(250_000 * e18, 200_000 * e6, 100).unwrap();
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 200, &f.pair, &blocklist).unwrap();
        assert_eq!(snap.elapsed, 200);
        approx(snap.price, "0.9");
    }

    #[test]
    fn test_unhealthy_snapshots() {
        let mut f = fixture();
        let mut blocklist = Blocklist::default();
        let e18 = 10u128.pow(18);
        // Reference side below the liquidity floor
        f.pair.set_reserves(1_000 * e18, 1_000 * 10u128.pow(6), 0).unwrap();
        f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap();
        f.oracle.capture(&f.authority, &f.stable.address, 0, &f.pair, &blocklist).unwrap();

        let snap = f.oracle.capture(&f.authority, &f.stable.address, 60, &f.pair, &blocklist).unwrap();
        assert!(!snap.healthy);
        assert_eq!(snap.elapsed, 60);

        // Restricted pool
        f.pair.set_reserves(200_000 * e18, 200_000 * 10u128.pow(6), 60).unwrap();
        blocklist.0.insert(f.pair.address());
        let snap = f.oracle.capture(&f.authority, &f.stable.address, 120, &f.pair, &blocklist).unwrap();
        assert!(!snap.healthy);
    }

    #[test]
    fn test_capture_rejects_other_pair_and_callers() {
        let mut f = fixture();
        let blocklist = Blocklist::default();
        f.oracle.setup(&f.authority, f.stable, &f.pair).unwrap();

        let other = ConstantProductPair::new(Address::derive("pair2"), f.stable.address, f.oracle.reference().address);
        let err = f.oracle.capture(&f.authority, &f.stable.address, 1, &other, &blocklist).unwrap_err();
        assert_eq!(err, Error::InvalidState("pair-mismatch"));

        let err = f
            .oracle
            .capture(&Address::derive("mallory"), &f.stable.address, 1, &f.pair, &blocklist)
            .unwrap_err();
        assert_eq!(err.kind(), "Unauthorized");
    }

    #[test]
    fn test_scale_price_shifts() {
        let one = U256::one() << 112;
        assert_eq!(scale_price(one, 0).unwrap(), Decimal::ONE);
        assert_eq!(scale_price(one, -18).unwrap(), Decimal::from_raw(1));
        assert_eq!(scale_price(one, -19).unwrap(), Decimal::ZERO);
    }
}
