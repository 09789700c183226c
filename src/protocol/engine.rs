//! Protocol engine - core orchestration.
//!
//! The engine owns the whole ledger world: both token ledgers, the liquidity
//! pair, the yield pool, the oracle, the reserve, the stabilizer and the event
//! log. Every operation runs inside `transact`, which snapshots the world,
//! runs the operation and restores the snapshot if it fails.

use serde::{Deserialize, Serialize};

use crate::core::config::ProtocolParams;
use crate::core::context::LedgerContext;
use crate::core::registry::{Directory, Registry};
use crate::core::reserve::{BorrowController, ReserveComptroller};
use crate::core::stabilizer::{Flywheel, Stabilizer};
use crate::core::token::TokenLedger;
use crate::core::vault::SharePool;
use crate::error::{Error, Result};
use crate::oracle::pair::{block_timestamp, ConstantProductPair};
use crate::oracle::twap::{AssetRef, TwapOracle};
use crate::protocol::events::EventLog;
use crate::protocol::operations::{Operation, OperationResult};
use crate::storage::schema::{self, StateV2};
use crate::utils::address::Address;
use crate::utils::constants::{COLLATERAL_DECIMALS, STABLE_DECIMALS};
use crate::utils::math::Decimal;

/// Namespace the default deployment derives its addresses from
pub const DEFAULT_NAMESPACE: &str = "reserve-protocol";

// ═══════════════════════════════════════════════════════════════════════════════
// WORLD
// ═══════════════════════════════════════════════════════════════════════════════

/// Every piece of mutable ledger state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Collateral (reference) asset
    pub collateral: TokenLedger,
    /// Managed stable asset
    pub stable: TokenLedger,
    /// Stable/collateral liquidity pair
    pub pair: ConstantProductPair,
    /// Yield pool
    pub pool: SharePool,
    /// Price oracle
    pub oracle: TwapOracle,
    /// Reserve comptroller
    pub reserve: ReserveComptroller,
    /// Stabilizer flywheel
    pub stabilizer: Stabilizer,
    /// Emitted events
    pub events: EventLog,
}

impl World {
    /// Split into the pieces an operation needs
    fn parts<'a>(
        &'a mut self,
        registry: &'a dyn Registry,
        now: u64,
    ) -> (
        &'a mut Stabilizer,
        LedgerContext<'a, SharePool>,
        Flywheel<'a, ConstantProductPair>,
    ) {
        let World {
            collateral,
            stable,
            pair,
            pool,
            oracle,
            reserve,
            stabilizer,
            events,
        } = self;
        let ctx = LedgerContext {
            now,
            registry,
            collateral,
            stable,
            pool,
            events,
        };
        let flywheel = Flywheel {
            oracle,
            pair,
            reserve,
        };
        (stabilizer, ctx, flywheel)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════════

/// The reserve protocol and its simulated environment
#[derive(Debug, Clone)]
pub struct Protocol {
    registry: Directory,
    /// Issuer of the collateral asset (faucet, yield, restrictions)
    issuer: Address,
    params: ProtocolParams,
    world: World,
    now: u64,
}

impl Protocol {
    /// Deploy with the default namespace at time `now`
    pub fn new(params: ProtocolParams, now: u64) -> Result<Self> {
        Self::with_namespace(DEFAULT_NAMESPACE, params, now)
    }

    /// Deploy with addresses derived from `namespace`
    pub fn with_namespace(namespace: &str, params: ProtocolParams, now: u64) -> Result<Self> {
        params.validate()?;

        let registry = Directory::derive(namespace);
        let issuer = Address::derive(&format!("{namespace}/collateral-issuer"));
        let pair_address = Address::derive(&format!("{namespace}/pair"));

        let world = World {
            collateral: TokenLedger::new(registry.collateral, "USDC", COLLATERAL_DECIMALS, issuer, issuer),
            stable: TokenLedger::new(
                registry.stable,
                "RSV",
                STABLE_DECIMALS,
                registry.reserve,
                registry.authority,
            ),
            pair: ConstantProductPair::new(pair_address, registry.stable, registry.collateral),
            pool: SharePool::new(registry.yield_pool),
            oracle: TwapOracle::new(
                registry.oracle,
                registry.stabilizer,
                AssetRef {
                    address: registry.collateral,
                    decimals: COLLATERAL_DECIMALS,
                },
                u128::from(params.min_reference_liquidity),
            ),
            reserve: ReserveComptroller::new(registry.reserve, params.daily_borrow_limit, params.redemption_tax),
            stabilizer: Stabilizer::new(
                registry.stabilizer,
                params.reward_rate,
                params.decay_rate,
                params.max_alpha,
            ),
            events: EventLog::new(),
        };

        tracing::info!(namespace, reserve = %registry.reserve, now, "protocol deployed");
        Ok(Self {
            registry,
            issuer,
            params,
            world,
            now,
        })
    }

    /// Rebuild from a decoded state
    pub fn from_state(state: StateV2) -> Self {
        Self {
            registry: state.registry,
            issuer: state.issuer,
            params: state.params,
            world: state.world,
            now: state.now,
        }
    }

    /// Current state in its storable form
    pub fn to_state(&self) -> StateV2 {
        StateV2 {
            now: self.now,
            registry: self.registry.clone(),
            issuer: self.issuer,
            params: self.params.clone(),
            world: self.world.clone(),
        }
    }

    /// Encode the full state with the current schema version
    pub fn export_state(&self) -> Result<Vec<u8>> {
        schema::encode(&self.to_state())
    }

    /// Decode a state of any supported schema version
    pub fn import_state(bytes: &[u8]) -> Result<Self> {
        schema::decode(bytes).map(Self::from_state)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ATOMIC EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run `op` against the world, restoring it if `op` fails
    ///
    /// The event log is append-only, so it stays out of the snapshot and is
    /// cut back to its prior length instead.
    fn transact<T>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut World, &Directory, u64) -> Result<T>,
    ) -> Result<T> {
        let mark = self.world.events.len();
        let events = std::mem::take(&mut self.world.events);
        let snapshot = self.world.clone();
        self.world.events = events;

        match op(&mut self.world, &self.registry, self.now) {
            Ok(value) => Ok(value),
            Err(err) => {
                let mut events = std::mem::take(&mut self.world.events);
                events.truncate(mark);
                self.world = snapshot;
                self.world.events = events;
                tracing::warn!(operation, tag = err.tag(), error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    /// Execute a submitted operation
    pub fn execute(&mut self, op: Operation) -> Result<OperationResult> {
        match op {
            Operation::Mint { account, amount } => self.mint(&account, amount).map(|cost| OperationResult::Minted { cost }),
            Operation::Redeem { account, amount } => {
                self.redeem(&account, amount).map(|payout| OperationResult::Redeemed { payout })
            }
            Operation::SettleDebt { account, amount } => self
                .settle_debt(&account, amount)
                .map(|proceeds| OperationResult::DebtSettled { proceeds }),
            Operation::StabilizerSetup { caller } => self.stabilizer_setup(&caller).map(|_| OperationResult::Done),
            Operation::StabilizerSupply { account, amount } => self
                .stabilizer_supply(&account, amount)
                .map(|shares| OperationResult::Supplied { shares }),
            Operation::StabilizerRedeem { account, shares } => self
                .stabilizer_redeem(&account, shares)
                .map(|amount| OperationResult::Withdrawn { amount }),
            Operation::StabilizerRedeemUnderlying { account, amount } => self
                .stabilizer_redeem_underlying(&account, amount)
                .map(|shares| OperationResult::SharesBurned { shares }),
            Operation::StabilizerSettle => self.stabilizer_settle().map(|borrowed| OperationResult::Ticked { borrowed }),
            Operation::ShareTransfer { from, to, shares } => {
                self.share_transfer(&from, &to, shares).map(|_| OperationResult::Done)
            }
            Operation::SetRedemptionTax { caller, value } => {
                self.set_redemption_tax(&caller, value).map(|_| OperationResult::Done)
            }
            Operation::SetRewardRate { caller, value } => self.set_reward_rate(&caller, value).map(|_| OperationResult::Done),
            Operation::SetDecayRate { caller, value } => self.set_decay_rate(&caller, value).map(|_| OperationResult::Done),
            Operation::SetMaxAlpha { caller, value } => self.set_max_alpha(&caller, value).map(|_| OperationResult::Done),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESERVE OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Mint `amount` stable asset; returns the collateral cost
    pub fn mint(&mut self, account: &Address, amount: u128) -> Result<u128> {
        self.transact("mint", |world, registry, now| {
            let (_, mut ctx, mut flywheel) = world.parts(registry, now);
            flywheel.reserve.mint(account, amount, &mut ctx)
        })
    }

    /// Redeem `amount` stable asset; returns the collateral payout
    pub fn redeem(&mut self, account: &Address, amount: u128) -> Result<u128> {
        self.transact("redeem", |world, registry, now| {
            let (_, mut ctx, mut flywheel) = world.parts(registry, now);
            flywheel.reserve.redeem(account, amount, &mut ctx)
        })
    }

    /// Repay `amount` of protocol debt; returns the collateral proceeds
    pub fn settle_debt(&mut self, account: &Address, amount: u128) -> Result<u128> {
        self.transact("settle", |world, registry, now| {
            let (_, mut ctx, mut flywheel) = world.parts(registry, now);
            flywheel.reserve.settle(account, amount, &mut ctx)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STABILIZER OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register the stable asset with the oracle
    pub fn stabilizer_setup(&mut self, caller: &Address) -> Result<()> {
        self.transact("stabilizer-setup", |world, registry, now| {
            let (stabilizer, mut ctx, mut flywheel) = world.parts(registry, now);
            stabilizer.setup(caller, &mut ctx, &mut flywheel)
        })
    }

    /// Deposit stable asset into the flywheel pool; returns shares minted
    pub fn stabilizer_supply(&mut self, account: &Address, amount: u128) -> Result<u128> {
        self.transact("stabilizer-supply", |world, registry, now| {
            let (stabilizer, mut ctx, mut flywheel) = world.parts(registry, now);
            stabilizer.supply(account, amount, &mut ctx, &mut flywheel)
        })
    }

    /// Burn pool shares; returns the stable asset paid out
    pub fn stabilizer_redeem(&mut self, account: &Address, shares: u128) -> Result<u128> {
        self.transact("stabilizer-redeem", |world, registry, now| {
            let (stabilizer, mut ctx, mut flywheel) = world.parts(registry, now);
            stabilizer.redeem(account, shares, &mut ctx, &mut flywheel)
        })
    }

    /// Withdraw an exact stable amount; returns shares burned
    pub fn stabilizer_redeem_underlying(&mut self, account: &Address, amount: u128) -> Result<u128> {
        self.transact("stabilizer-redeem-underlying", |world, registry, now| {
            let (stabilizer, mut ctx, mut flywheel) = world.parts(registry, now);
            stabilizer.redeem_underlying(account, amount, &mut ctx, &mut flywheel)
        })
    }

    /// Run one flywheel tick; returns the amount borrowed
    pub fn stabilizer_settle(&mut self) -> Result<u128> {
        self.transact("stabilizer-settle", |world, registry, now| {
            let (stabilizer, mut ctx, mut flywheel) = world.parts(registry, now);
            stabilizer.settle(&mut ctx, &mut flywheel)
        })
    }

    /// Move pool shares
    pub fn share_transfer(&mut self, from: &Address, to: &Address, shares: u128) -> Result<()> {
        self.transact("share-transfer", |world, _, _| world.stabilizer.transfer(from, to, shares))
    }

    /// Allow `spender` to move `owner`'s pool shares
    pub fn share_approve(&mut self, owner: &Address, spender: &Address, shares: u128) -> Result<()> {
        self.transact("share-approve", |world, _, _| world.stabilizer.approve(owner, spender, shares))
    }

    /// Move pool shares on behalf of `from`
    pub fn share_transfer_from(&mut self, spender: &Address, from: &Address, to: &Address, shares: u128) -> Result<()> {
        self.transact("share-transfer-from", |world, _, _| {
            world.stabilizer.transfer_from(spender, from, to, shares)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GOVERNANCE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Change the redemption tax
    pub fn set_redemption_tax(&mut self, caller: &Address, value: Decimal) -> Result<()> {
        self.transact("set-redemption-tax", |world, registry, now| {
            let (_, mut ctx, mut flywheel) = world.parts(registry, now);
            flywheel.reserve.set_redemption_tax(caller, value, &mut ctx)
        })
    }

    /// Change the flywheel reward rate
    pub fn set_reward_rate(&mut self, caller: &Address, value: Decimal) -> Result<()> {
        self.transact("set-reward-rate", |world, registry, now| {
            let (stabilizer, mut ctx, _) = world.parts(registry, now);
            stabilizer.set_reward_rate(caller, value, &mut ctx)
        })
    }

    /// Change the EMA decay rate
    pub fn set_decay_rate(&mut self, caller: &Address, value: Decimal) -> Result<()> {
        self.transact("set-decay-rate", |world, registry, now| {
            let (stabilizer, mut ctx, _) = world.parts(registry, now);
            stabilizer.set_decay_rate(caller, value, &mut ctx)
        })
    }

    /// Change the EMA step cap
    pub fn set_max_alpha(&mut self, caller: &Address, value: Decimal) -> Result<()> {
        self.transact("set-max-alpha", |world, registry, now| {
            let (stabilizer, mut ctx, _) = world.parts(registry, now);
            stabilizer.set_max_alpha(caller, value, &mut ctx)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ENVIRONMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move the clock forward
    pub fn advance_time(&mut self, seconds: u64) -> Result<()> {
        self.now = self
            .now
            .checked_add(seconds)
            .ok_or_else(|| Error::arithmetic("clock-overflow"))?;
        tracing::debug!(now = self.now, "clock advanced");
        Ok(())
    }

    /// Set the pair reserves (stable side, collateral side) at the current time
    pub fn set_pair_reserves(&mut self, stable_reserve: u128, collateral_reserve: u128) -> Result<()> {
        self.transact("set-pair-reserves", |world, _, now| {
            world
                .pair
                .set_reserves(stable_reserve, collateral_reserve, block_timestamp(now))
        })
    }

    /// Issue collateral to an account
    pub fn faucet_collateral(&mut self, to: &Address, amount: u128) -> Result<()> {
        let issuer = self.issuer;
        self.transact("faucet", |world, _, _| world.collateral.mint(&issuer, to, amount))
    }

    /// Grow the yield pool's cash, raising its exchange rate
    pub fn accrue_yield(&mut self, amount: u128) -> Result<()> {
        let issuer = self.issuer;
        self.transact("accrue-yield", |world, registry, _| {
            world.collateral.mint(&issuer, &registry.yield_pool, amount)
        })
    }

    /// Put an account on the collateral issuer's restriction list
    pub fn restrict(&mut self, account: &Address) -> Result<()> {
        let issuer = self.issuer;
        self.transact("restrict", |world, _, _| world.collateral.restrict(&issuer, account))
    }

    /// Take an account off the collateral issuer's restriction list
    pub fn unrestrict(&mut self, account: &Address) -> Result<()> {
        let issuer = self.issuer;
        self.transact("unrestrict", |world, _, _| world.collateral.unrestrict(&issuer, account))
    }

    /// Pause or resume the yield pool
    pub fn set_pool_paused(&mut self, paused: bool) {
        self.world.pool.paused = paused;
    }

    /// Approve a collateral spender
    pub fn approve_collateral(&mut self, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        self.transact("approve-collateral", |world, _, _| world.collateral.approve(owner, spender, amount))
    }

    /// Approve a stable-asset spender
    pub fn approve_stable(&mut self, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        self.transact("approve-stable", |world, _, _| world.stable.approve(owner, spender, amount))
    }

    /// Transfer stable asset between accounts
    pub fn transfer_stable(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.transact("transfer-stable", |world, _, _| world.stable.transfer(from, to, amount))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current time
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Address directory
    pub fn registry(&self) -> &Directory {
        &self.registry
    }

    /// Collateral issuer
    pub fn issuer(&self) -> Address {
        self.issuer
    }

    /// Deployment parameters
    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Read-only view of the world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Emitted events
    pub fn events(&self) -> &EventLog {
        &self.world.events
    }

    /// Collateral balance of an account
    pub fn collateral_balance(&self, account: &Address) -> u128 {
        self.world.collateral.balance_of(account)
    }

    /// Stable balance of an account
    pub fn stable_balance(&self, account: &Address) -> u128 {
        self.world.stable.balance_of(account)
    }

    /// Stable supply
    pub fn stable_supply(&self) -> u128 {
        self.world.stable.total_supply()
    }

    /// Reserve balance in stable-asset units
    pub fn reserve_balance(&self) -> Result<u128> {
        self.world
            .reserve
            .reserve_balance(&self.world.collateral, &self.world.pool)
    }

    /// Reserve ratio
    pub fn reserve_ratio(&self) -> Result<Decimal> {
        self.world
            .reserve
            .reserve_ratio(&self.world.collateral, &self.world.stable, &self.world.pool)
    }

    /// Redemption price
    pub fn redeem_price(&self) -> Result<Decimal> {
        self.world
            .reserve
            .redeem_price(&self.world.collateral, &self.world.stable, &self.world.pool)
    }

    /// Outstanding protocol debt
    pub fn total_debt(&self) -> u128 {
        self.world.reserve.total_debt()
    }

    /// Outstanding debt of one borrower
    pub fn debt_of(&self, borrower: &Address) -> u128 {
        self.world.reserve.debt_of(borrower)
    }

    /// Rate limiter state
    pub fn borrow_controller(&self) -> BorrowController {
        self.world.reserve.borrow_controller()
    }

    /// Daily borrow limit in stable-asset units
    pub fn daily_borrow_limit(&self) -> Result<u128> {
        self.world.reserve.daily_limit_amount(&self.world.stable)
    }

    /// Largest borrow the rate limiter would allow now
    pub fn available_to_borrow(&self) -> Result<u128> {
        self.world.reserve.available_to_borrow(&self.world.stable, self.now)
    }

    /// Pool shares of an account
    pub fn share_balance(&self, account: &Address) -> u128 {
        self.world.stabilizer.balance_of(account)
    }

    /// Stable value of an account's pool shares
    pub fn balance_of_underlying(&self, account: &Address) -> Result<u128> {
        self.world
            .stabilizer
            .balance_of_underlying(account, &self.world.stable)
    }

    /// Stable asset held by the flywheel pool
    pub fn stabilizer_underlying(&self) -> u128 {
        self.world.stabilizer.total_underlying(&self.world.stable)
    }

    /// Flywheel pool exchange rate
    pub fn exchange_rate(&self) -> Result<Decimal> {
        self.world.stabilizer.exchange_rate(&self.world.stable)
    }

    /// Rewards attributed to an account
    pub fn earned(&self, account: &Address) -> Result<u128> {
        self.world.stabilizer.earned(account)
    }

    /// Current EMA
    pub fn ema(&self) -> Option<Decimal> {
        self.world.stabilizer.ema()
    }
}
