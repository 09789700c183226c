//! Constant-product liquidity pair.
//!
//! The oracle reads prices from a two-asset pool that keeps cumulative price
//! counters. Each counter accumulates `reserve_other / reserve_self` as a
//! UQ112x112 fixed-point number, multiplied by the seconds the price held.
//! Counters and the 32-bit timestamp wrap; only differences are
//! meaningful.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::constants::Q112_BITS;
use crate::utils::math::{mul_div_floor, u256_serde, U256};

// ═══════════════════════════════════════════════════════════════════════════════
// PAIR BOUNDARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only view of a liquidity pool
pub trait LiquidityPair {
    /// Pool address
    fn address(&self) -> Address;
    /// First asset
    fn token0(&self) -> Address;
    /// Second asset
    fn token1(&self) -> Address;
    /// `(reserve0, reserve1, timestamp of the last update)`
    fn reserves(&self) -> (u128, u128, u32);
    /// Stored cumulative price of `side` (0 or 1) as of the last update
    fn price_cumulative_last(&self, side: usize) -> U256;
}

/// Ledger time truncated to the pool's 32-bit clock
pub fn block_timestamp(now: u64) -> u32 {
    (now % (1u64 << 32)) as u32
}

/// `numerator / denominator` as UQ112x112
pub fn encode_fraction(numerator: u128, denominator: u128) -> U256 {
    (U256::from(numerator) << Q112_BITS as usize) / U256::from(denominator)
}

/// Cumulative prices as of `now`, extrapolated from current reserves when the
/// pool has not been updated at `now`
pub fn current_cumulative_prices<P: LiquidityPair + ?Sized>(pair: &P, now: u32) -> (U256, U256) {
    let (reserve0, reserve1, last) = pair.reserves();
    let mut price0 = pair.price_cumulative_last(0);
    let mut price1 = pair.price_cumulative_last(1);

    if last != now && reserve0 > 0 && reserve1 > 0 {
        let elapsed = U256::from(now.wrapping_sub(last));
        price0 = price0.overflowing_add(encode_fraction(reserve1, reserve0).overflowing_mul(elapsed).0).0;
        price1 = price1.overflowing_add(encode_fraction(reserve0, reserve1).overflowing_mul(elapsed).0).0;
    }
    (price0, price1)
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY PAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// Constant-product pool with cumulative price counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPair {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: u128,
    reserve1: u128,
    timestamp_last: u32,
    #[serde(with = "u256_serde")]
    price0_cumulative: U256,
    #[serde(with = "u256_serde")]
    price1_cumulative: U256,
}

impl ConstantProductPair {
    /// Create an empty pool
    pub fn new(address: Address, token0: Address, token1: Address) -> Self {
        Self {
            address,
            token0,
            token1,
            reserve0: 0,
            reserve1: 0,
            timestamp_last: 0,
            price0_cumulative: U256::zero(),
            price1_cumulative: U256::zero(),
        }
    }

    /// Replace the reserves at `now`, first accruing the old price into the counters
    pub fn set_reserves(&mut self, reserve0: u128, reserve1: u128, now: u32) -> Result<()> {
        if reserve0 >> 112 != 0 || reserve1 >> 112 != 0 {
            return Err(Error::arithmetic("pair-reserve-overflow"));
        }
        let (price0, price1) = current_cumulative_prices(self, now);
        self.price0_cumulative = price0;
        self.price1_cumulative = price1;
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
        self.timestamp_last = now;
        Ok(())
    }

    /// Constant-product swap of `amount_in` of `token_in`; returns the amount out
    pub fn swap(&mut self, token_in: &Address, amount_in: u128, now: u32) -> Result<u128> {
        let (reserve_in, reserve_out) = if *token_in == self.token0 {
            (self.reserve0, self.reserve1)
        } else if *token_in == self.token1 {
            (self.reserve1, self.reserve0)
        } else {
            return Err(Error::InvalidState("asset-not-in-pair"));
        };
        if reserve_in == 0 || reserve_out == 0 {
            return Err(Error::InvalidState("pair-empty"));
        }

        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or_else(|| Error::arithmetic("pair-swap"))?;
        let amount_out = mul_div_floor(reserve_out, amount_in, new_in)?;
        let new_out = reserve_out - amount_out;

        if *token_in == self.token0 {
            self.set_reserves(new_in, new_out, now)?;
        } else {
            self.set_reserves(new_out, new_in, now)?;
        }
        Ok(amount_out)
    }
}

impl LiquidityPair for ConstantProductPair {
    fn address(&self) -> Address {
        self.address
    }

    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn reserves(&self) -> (u128, u128, u32) {
        (self.reserve0, self.reserve1, self.timestamp_last)
    }

    fn price_cumulative_last(&self, side: usize) -> U256 {
        if side == 0 {
            self.price0_cumulative
        } else {
            self.price1_cumulative
        }
    }
}
