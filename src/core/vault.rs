//! Yield vault adapter.
//!
//! Idle collateral held by the reserve is supplied to a share-based yield
//! pool. This module provides:
//! - The `YieldPool` boundary with explicit status codes
//! - `SharePool`, the in-memory pool used by the engine and tests
//! - `VaultAdapter`, which turns pool statuses into protocol errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::token::TokenLedger;
use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{mul_div_ceil, mul_div_floor, safe_add, Decimal};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL BOUNDARY
// ═══════════════════════════════════════════════════════════════════════════════

/// Status reported by a yield pool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    /// Call succeeded
    Success,
    /// Pool is paused
    Paused,
    /// Account holds too few shares
    InsufficientShares,
    /// Pool holds too little underlying
    InsufficientCash,
    /// Moving the underlying asset failed
    TransferFailed,
    /// Share arithmetic failed
    MathError,
}

impl PoolStatus {
    /// Numeric status code (0 = success)
    pub fn code(&self) -> u32 {
        match self {
            PoolStatus::Success => 0,
            PoolStatus::Paused => 1,
            PoolStatus::InsufficientShares => 2,
            PoolStatus::InsufficientCash => 3,
            PoolStatus::TransferFailed => 4,
            PoolStatus::MathError => 5,
        }
    }

    /// Convert a non-success status into `ExternalCallFailed`
    pub fn check(self, call: &'static str) -> Result<()> {
        match self {
            PoolStatus::Success => Ok(()),
            other => Err(Error::ExternalCallFailed {
                call,
                status: other.code(),
            }),
        }
    }
}

/// Share-based yield pool interface
pub trait YieldPool {
    /// Pool address (holds the underlying cash)
    fn address(&self) -> Address;

    /// Pull `amount` underlying from `from` (allowance-based) and credit shares
    fn supply(&mut self, underlying: &mut TokenLedger, from: &Address, amount: u128) -> PoolStatus;

    /// Burn shares worth `amount` underlying from `account` and pay it out
    fn redeem_underlying(
        &mut self,
        underlying: &mut TokenLedger,
        account: &Address,
        amount: u128,
    ) -> PoolStatus;

    /// Shares held by an account
    fn share_balance(&self, account: &Address) -> u128;

    /// Underlying per share
    fn exchange_rate(&self, underlying: &TokenLedger) -> Result<Decimal>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARE POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory share pool whose exchange rate is cash / total shares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePool {
    address: Address,
    shares: HashMap<Address, u128>,
    total_shares: u128,
    /// Rejects supply and redeem while set
    pub paused: bool,
}

impl SharePool {
    /// Create an empty pool
    pub fn new(address: Address) -> Self {
        Self {
            address,
            shares: HashMap::new(),
            total_shares: 0,
            paused: false,
        }
    }

    /// Total shares outstanding
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Underlying held by the pool
    pub fn cash(&self, underlying: &TokenLedger) -> u128 {
        underlying.balance_of(&self.address)
    }

    fn shares_for_supply(&self, amount: u128, cash: u128) -> Result<u128> {
        if self.total_shares == 0 || cash == 0 {
            return Ok(amount);
        }
        mul_div_floor(amount, self.total_shares, cash)
    }
}

impl YieldPool for SharePool {
    fn address(&self) -> Address {
        self.address
    }

    fn supply(&mut self, underlying: &mut TokenLedger, from: &Address, amount: u128) -> PoolStatus {
        if self.paused {
            return PoolStatus::Paused;
        }

        let cash = self.cash(underlying);
        let minted = match self.shares_for_supply(amount, cash) {
            Ok(minted) => minted,
            Err(_) => return PoolStatus::MathError,
        };
        let (balance, total) = match (
            safe_add(self.share_balance(from), minted),
            safe_add(self.total_shares, minted),
        ) {
            (Ok(balance), Ok(total)) => (balance, total),
            _ => return PoolStatus::MathError,
        };

        if underlying.transfer_from(&self.address, from, &self.address, amount).is_err() {
            return PoolStatus::TransferFailed;
        }

        self.shares.insert(*from, balance);
        self.total_shares = total;
        PoolStatus::Success
    }

    fn redeem_underlying(
        &mut self,
        underlying: &mut TokenLedger,
        account: &Address,
        amount: u128,
    ) -> PoolStatus {
        if self.paused {
            return PoolStatus::Paused;
        }

        let cash = self.cash(underlying);
        if cash < amount {
            return PoolStatus::InsufficientCash;
        }
        if amount == 0 {
            return PoolStatus::Success;
        }

        // Shares burned round up so redeeming never dilutes other holders
        let burned = match mul_div_ceil(amount, self.total_shares, cash) {
            Ok(burned) => burned,
            Err(_) => return PoolStatus::MathError,
        };
        let held = self.share_balance(account);
        if held < burned {
            return PoolStatus::InsufficientShares;
        }

        if underlying.transfer(&self.address, account, amount).is_err() {
            return PoolStatus::TransferFailed;
        }

        self.shares.insert(*account, held - burned);
        self.total_shares -= burned;
        PoolStatus::Success
    }

    fn share_balance(&self, account: &Address) -> u128 {
        self.shares.get(account).copied().unwrap_or(0)
    }

    fn exchange_rate(&self, underlying: &TokenLedger) -> Result<Decimal> {
        if self.total_shares == 0 {
            return Ok(Decimal::ONE);
        }
        Decimal::ratio(self.cash(underlying), self.total_shares)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VAULT ADAPTER
// ═══════════════════════════════════════════════════════════════════════════════

/// The reserve's position in the yield pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAdapter {
    owner: Address,
}

impl VaultAdapter {
    /// Adapter acting on behalf of `owner`
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Account holding the position
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Supply `amount` of the owner's underlying to the pool
    pub(crate) fn deposit<P: YieldPool>(
        &self,
        pool: &mut P,
        underlying: &mut TokenLedger,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        underlying.approve(&self.owner, &pool.address(), amount)?;
        pool.supply(underlying, &self.owner, amount)
            .check("yield-pool-supply")
    }

    /// Pull `amount` underlying out of the pool back to the owner
    pub(crate) fn withdraw<P: YieldPool>(
        &self,
        pool: &mut P,
        underlying: &mut TokenLedger,
        amount: u128,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        pool.redeem_underlying(underlying, &self.owner, amount)
            .check("yield-pool-redeem")
    }

    /// Underlying value of the position: shares × current exchange rate
    pub fn balance<P: YieldPool>(&self, pool: &P, underlying: &TokenLedger) -> Result<u128> {
        let shares = pool.share_balance(&self.owner);
        if shares == 0 {
            return Ok(0);
        }
        pool.exchange_rate(underlying)?.mul_amount(shares)
    }
}
