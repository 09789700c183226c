//! Stabilizer flywheel.
//!
//! Holders deposit the stable asset into the flywheel pool and receive pool
//! shares. On every tick the flywheel reads a TWAP snapshot of the stable
//! asset, and while the tracked price (smoothed by an EMA) sits below par it
//! borrows newly minted stable asset from the reserve straight into the pool.
//! The borrowed amount raises the underlying per share, paying shareholders a
//! bonus yield that grows with the depeg.
//!
//! The rate for a tick is computed from the EMA *before* that tick's snapshot
//! is folded in, and an unhealthy snapshot resets the EMA to par.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::context::LedgerContext;
use crate::core::registry::require_authority;
use crate::core::reserve::ReserveComptroller;
use crate::core::token::TokenLedger;
use crate::core::vault::YieldPool;
use crate::error::{Error, Result};
use crate::oracle::pair::{block_timestamp, LiquidityPair};
use crate::oracle::twap::{AssetRef, Snapshot, TwapOracle};
use crate::protocol::events::ProtocolEvent;
use crate::utils::address::Address;
use crate::utils::constants::SECONDS_PER_DAY;
use crate::utils::guard::ReentrancyGuard;
use crate::utils::math::{mul_div_ceil, mul_div_floor, safe_add, Decimal};

// ═══════════════════════════════════════════════════════════════════════════════
// FLYWHEEL MATH
// ═══════════════════════════════════════════════════════════════════════════════

/// Elapsed seconds as fractional days
pub fn elapsed_days(elapsed: u32) -> Result<Decimal> {
    Decimal::ratio(elapsed as u128, SECONDS_PER_DAY as u128)
}

/// `reward_rate × (1 − clamp(ema, redeem_price, 1))`
pub fn incentive_rate(reward_rate: Decimal, ema: Decimal, redeem_price: Decimal) -> Result<Decimal> {
    let deviation = Decimal::ONE.sub_or_zero(ema.clamp(redeem_price, Decimal::ONE));
    reward_rate.try_mul(deviation)
}

/// Fold a snapshot into the EMA
pub fn next_ema(ema: Decimal, snapshot: &Snapshot, decay_rate: Decimal, max_alpha: Decimal) -> Result<Decimal> {
    if !snapshot.healthy {
        return Ok(Decimal::ONE);
    }
    let alpha = decay_rate.try_mul(elapsed_days(snapshot.elapsed)?)?.min(max_alpha);
    let keep = Decimal::ONE.sub_or_zero(alpha);
    alpha.try_mul(snapshot.price)?.try_add(keep.try_mul(ema)?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward bookkeeping for one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCheckpoint {
    /// Accumulator value at the last share balance change
    pub index: Decimal,
    /// Rewards accrued up to that change
    pub settled: u128,
}

/// Flywheel parameters and reward accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerState {
    /// Smoothed stable-asset price; `None` until setup
    pub ema: Option<Decimal>,
    /// EMA decay per day
    pub decay_rate: Decimal,
    /// Cap on a single EMA step
    pub max_alpha: Decimal,
    /// Daily reward rate at full deviation
    pub reward_rate: Decimal,
    /// Borrowed stable asset per share, accumulated
    pub reward_per_share: Decimal,
    /// Per-account checkpoints
    pub checkpoints: HashMap<Address, RewardCheckpoint>,
}

/// Collaborators a flywheel tick reads and drives
pub struct Flywheel<'a, L: LiquidityPair> {
    /// Price oracle
    pub oracle: &'a mut TwapOracle,
    /// Pair the stable asset is priced on
    pub pair: &'a L,
    /// Reserve lending into the pool
    pub reserve: &'a mut ReserveComptroller,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILIZER
// ═══════════════════════════════════════════════════════════════════════════════

/// Flywheel pool paying bonus yield funded by reserve borrowing
///
/// Pool and governance calls are crate-internal; `Protocol` runs them atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stabilizer {
    address: Address,
    shares: TokenLedger,
    state: StabilizerState,
    #[serde(skip)]
    lock: ReentrancyGuard,
}

impl Stabilizer {
    /// Create a stabilizer at `address`
    pub fn new(address: Address, reward_rate: Decimal, decay_rate: Decimal, max_alpha: Decimal) -> Self {
        let state = StabilizerState {
            reward_rate,
            decay_rate,
            max_alpha,
            ..StabilizerState::default()
        };
        Self::from_parts(address, TokenLedger::new(address, "sRSV", 18, address, address), state)
    }

    /// Rebuild from stored parts
    pub fn from_parts(address: Address, shares: TokenLedger, state: StabilizerState) -> Self {
        Self {
            address,
            shares,
            state,
            lock: ReentrancyGuard::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Stabilizer address (also the pool holding the underlying)
    pub fn address(&self) -> Address {
        self.address
    }

    /// Share ledger
    pub fn shares(&self) -> &TokenLedger {
        &self.shares
    }

    /// Flywheel state
    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    /// Current EMA, if set up
    pub fn ema(&self) -> Option<Decimal> {
        self.state.ema
    }

    /// Shares held by an account
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.shares.balance_of(account)
    }

    /// Total shares outstanding
    pub fn total_shares(&self) -> u128 {
        self.shares.total_supply()
    }

    /// Stable asset held by the pool
    pub fn total_underlying(&self, stable: &TokenLedger) -> u128 {
        stable.balance_of(&self.address)
    }

    /// Underlying per share; 1.0 when no shares exist
    pub fn exchange_rate(&self, stable: &TokenLedger) -> Result<Decimal> {
        let total = self.total_shares();
        if total == 0 {
            return Ok(Decimal::ONE);
        }
        Decimal::ratio(self.total_underlying(stable), total)
    }

    /// Underlying value of an account's shares
    pub fn balance_of_underlying(&self, account: &Address, stable: &TokenLedger) -> Result<u128> {
        let total = self.total_shares();
        if total == 0 {
            return Ok(0);
        }
        mul_div_floor(self.balance_of(account), self.total_underlying(stable), total)
    }

    /// Borrowed stable asset attributed to an account's shares so far
    pub fn earned(&self, account: &Address) -> Result<u128> {
        let checkpoint = self.state.checkpoints.get(account).copied().unwrap_or_default();
        let pending = self
            .state
            .reward_per_share
            .sub_or_zero(checkpoint.index)
            .mul_amount(self.balance_of(account))?;
        safe_add(checkpoint.settled, pending)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SETUP AND TICK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register the stable asset with the oracle and start the EMA at par
    pub(crate) fn setup<P: YieldPool, L: LiquidityPair>(
        &mut self,
        caller: &Address,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<()> {
        self.guarded(|stabilizer| {
            require_authority(ctx.registry, caller, "stabilizer-setup")?;
            if stabilizer.state.ema.is_some() {
                return Err(Error::InvalidState("stabilizer-already-setup"));
            }

            let asset = AssetRef {
                address: ctx.stable.address(),
                decimals: ctx.stable.decimals,
            };
            flywheel.oracle.setup(&stabilizer.address, asset, flywheel.pair)?;
            stabilizer.state.ema = Some(Decimal::ONE);

            tracing::info!(asset = %asset.address, "stabilizer setup");
            Ok(())
        })
    }

    /// Run one flywheel tick; returns the amount borrowed into the pool
    pub(crate) fn settle<P: YieldPool, L: LiquidityPair>(
        &mut self,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<u128> {
        self.guarded(|stabilizer| stabilizer.tick(ctx, flywheel))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POOL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit `amount` stable asset; returns the shares minted
    pub(crate) fn supply<P: YieldPool, L: LiquidityPair>(
        &mut self,
        caller: &Address,
        amount: u128,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<u128> {
        self.guarded(|stabilizer| {
            stabilizer.tick(ctx, flywheel)?;

            let total = stabilizer.total_shares();
            let minted = if total == 0 {
                amount
            } else {
                mul_div_floor(amount, total, stabilizer.total_underlying(&*ctx.stable))?
            };

            stabilizer.checkpoint(caller)?;
            ctx.stable
                .transfer_from(&stabilizer.address, caller, &stabilizer.address, amount)?;
            stabilizer.shares.mint(&stabilizer.address, caller, minted)?;

            ctx.emit(ProtocolEvent::StabilizerSupply {
                account: *caller,
                amount,
                shares: minted,
            });
            tracing::info!(account = %caller, amount, shares = minted, "stabilizer supply");
            Ok(minted)
        })
    }

    /// Burn `shares`; returns the stable asset paid out
    pub(crate) fn redeem<P: YieldPool, L: LiquidityPair>(
        &mut self,
        caller: &Address,
        shares: u128,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<u128> {
        self.guarded(|stabilizer| {
            stabilizer.tick(ctx, flywheel)?;

            let held = stabilizer.balance_of(caller);
            if held < shares {
                return Err(Error::insufficient("shares", shares, held));
            }
            let amount = stabilizer.underlying_for(shares, &*ctx.stable)?;
            stabilizer.pay_out(caller, shares, amount, ctx)?;
            Ok(amount)
        })
    }

    /// Withdraw exactly `amount` stable asset; returns the shares burned
    pub(crate) fn redeem_underlying<P: YieldPool, L: LiquidityPair>(
        &mut self,
        caller: &Address,
        amount: u128,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<u128> {
        self.guarded(|stabilizer| {
            stabilizer.tick(ctx, flywheel)?;

            let total = stabilizer.total_shares();
            if total == 0 && amount > 0 {
                return Err(Error::insufficient("shares", amount, 0));
            }
            let underlying = stabilizer.total_underlying(&*ctx.stable);
            if underlying < amount {
                return Err(Error::insufficient("pool-underlying", amount, underlying));
            }
            let burned = if amount == 0 {
                0
            } else {
                mul_div_ceil(amount, total, underlying)?
            };
            let held = stabilizer.balance_of(caller);
            if held < burned {
                return Err(Error::insufficient("shares", burned, held));
            }
            stabilizer.pay_out(caller, burned, amount, ctx)?;
            Ok(burned)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SHARE TOKEN
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move shares between accounts
    pub(crate) fn transfer(&mut self, caller: &Address, to: &Address, shares: u128) -> Result<()> {
        self.guarded(|stabilizer| {
            stabilizer.checkpoint(caller)?;
            stabilizer.checkpoint(to)?;
            stabilizer.shares.transfer(caller, to, shares)
        })
    }

    /// Allow `spender` to move `caller`'s shares
    pub(crate) fn approve(&mut self, caller: &Address, spender: &Address, shares: u128) -> Result<()> {
        self.guarded(|stabilizer| stabilizer.shares.approve(caller, spender, shares))
    }

    /// Move shares on behalf of `from`
    pub(crate) fn transfer_from(&mut self, caller: &Address, from: &Address, to: &Address, shares: u128) -> Result<()> {
        self.guarded(|stabilizer| {
            stabilizer.checkpoint(from)?;
            stabilizer.checkpoint(to)?;
            stabilizer.shares.transfer_from(caller, from, to, shares)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GOVERNANCE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set the daily reward rate (authority only, at most 1.0)
    pub(crate) fn set_reward_rate<P: YieldPool>(&mut self, caller: &Address, rate: Decimal, ctx: &mut LedgerContext<'_, P>) -> Result<()> {
        self.guarded(|stabilizer| {
            let change = ParameterChange::new("set-reward-rate", "reward_rate", Some(Decimal::ONE));
            stabilizer.state.reward_rate = change.apply(ctx, caller, stabilizer.state.reward_rate, rate)?;
            Ok(())
        })
    }

    /// Set the EMA decay per day (authority only)
    pub(crate) fn set_decay_rate<P: YieldPool>(&mut self, caller: &Address, rate: Decimal, ctx: &mut LedgerContext<'_, P>) -> Result<()> {
        self.guarded(|stabilizer| {
            let change = ParameterChange::new("set-decay-rate", "decay_rate", None);
            stabilizer.state.decay_rate = change.apply(ctx, caller, stabilizer.state.decay_rate, rate)?;
            Ok(())
        })
    }

    /// Set the cap on a single EMA step (authority only, at most 1.0)
    pub(crate) fn set_max_alpha<P: YieldPool>(&mut self, caller: &Address, alpha: Decimal, ctx: &mut LedgerContext<'_, P>) -> Result<()> {
        self.guarded(|stabilizer| {
            let change = ParameterChange::new("set-max-alpha", "max_alpha", Some(Decimal::ONE));
            stabilizer.state.max_alpha = change.apply(ctx, caller, stabilizer.state.max_alpha, alpha)?;
            Ok(())
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn guarded<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.lock.enter()?;
        let result = op(self);
        self.lock.exit();
        result
    }

    fn tick<P: YieldPool, L: LiquidityPair>(
        &mut self,
        ctx: &mut LedgerContext<'_, P>,
        flywheel: &mut Flywheel<'_, L>,
    ) -> Result<u128> {
        let ema = self.state.ema.ok_or(Error::InvalidState("oracle-not-setup"))?;
        let stable_address = ctx.stable.address();

        let snapshot = flywheel.oracle.capture(
            &self.address,
            &stable_address,
            block_timestamp(ctx.now),
            flywheel.pair,
            &*ctx.collateral,
        )?;
        let days = elapsed_days(snapshot.elapsed)?;
        let redeem_price = flywheel
            .reserve
            .redeem_price(&*ctx.collateral, &*ctx.stable, &*ctx.pool)?;
        let rate = incentive_rate(self.state.reward_rate, ema, redeem_price)?;

        let borrowed = rate.try_mul(days)?.mul_amount(self.total_underlying(&*ctx.stable))?;
        if borrowed > 0 {
            flywheel.reserve.borrow(&self.address, borrowed, ctx)?;
            let total = self.total_shares();
            if total > 0 {
                let increment = Decimal::ratio(borrowed, total)?;
                self.state.reward_per_share = self.state.reward_per_share.try_add(increment)?;
            }
        }

        let ema = next_ema(ema, &snapshot, self.state.decay_rate, self.state.max_alpha)?;
        self.state.ema = Some(ema);

        ctx.emit(ProtocolEvent::StabilizerSettle {
            price: snapshot.price,
            elapsed: snapshot.elapsed,
            healthy: snapshot.healthy,
            borrowed,
            ema,
        });
        tracing::debug!(
            price = %snapshot.price,
            elapsed = snapshot.elapsed,
            healthy = snapshot.healthy,
            %rate,
            borrowed,
            %ema,
            "stabilizer tick"
        );
        Ok(borrowed)
    }

    fn underlying_for(&self, shares: u128, stable: &TokenLedger) -> Result<u128> {
        let total = self.total_shares();
        if total == 0 {
            return Ok(0);
        }
        mul_div_floor(shares, self.total_underlying(stable), total)
    }

    fn pay_out<P: YieldPool>(&mut self, caller: &Address, shares: u128, amount: u128, ctx: &mut LedgerContext<'_, P>) -> Result<()> {
        self.checkpoint(caller)?;
        self.shares.burn(&self.address, caller, shares)?;
        ctx.stable.transfer(&self.address, caller, amount)?;

        ctx.emit(ProtocolEvent::StabilizerRedeem {
            account: *caller,
            shares,
            amount,
        });
        tracing::info!(account = %caller, shares, amount, "stabilizer redeem");
        Ok(())
    }

    /// Fold pending rewards into the account's settled balance
    fn checkpoint(&mut self, account: &Address) -> Result<()> {
        let settled = self.earned(account)?;
        self.state.checkpoints.insert(
            *account,
            RewardCheckpoint {
                index: self.state.reward_per_share,
                settled,
            },
        );
        Ok(())
    }
}

/// A governed flywheel parameter
struct ParameterChange {
    action: &'static str,
    name: &'static str,
    max: Option<Decimal>,
}

impl ParameterChange {
    fn new(action: &'static str, name: &'static str, max: Option<Decimal>) -> Self {
        Self { action, name, max }
    }

    /// Authority check, range check and event; returns the value to store
    fn apply<P: YieldPool>(&self, ctx: &mut LedgerContext<'_, P>, caller: &Address, old: Decimal, new: Decimal) -> Result<Decimal> {
        require_authority(ctx.registry, caller, self.action)?;
        if let Some(max) = self.max {
            if new > max {
                return Err(Error::InvalidParameter {
                    name: self.name,
                    reason: format!("{new} exceeds {max}"),
                });
            }
        }
        ctx.emit(ProtocolEvent::ParameterChanged {
            name: self.name.to_string(),
            old,
            new,
        });
        tracing::info!(parameter = self.name, %old, %new, "flywheel parameter changed");
        Ok(new)
    }
}
