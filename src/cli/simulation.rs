//! Day-by-day flywheel simulation.
//!
//! Deploys a fresh protocol, seeds a liquidity pair with the stable asset
//! trading below par, and lets the price recover a little every day while
//! the flywheel ticks. Each day produces one [`DayReport`].

use serde::{Deserialize, Serialize};

use crate::cli::config::SimConfig;
use crate::error::Result;
use crate::protocol::engine::Protocol;
use crate::utils::address::Address;
use crate::utils::constants::{BPS_DIVISOR, COLLATERAL_UNIT, DECIMALS_FACTOR, SECONDS_PER_DAY, STABLE_UNIT};
use crate::utils::math::{mul_div_floor, Decimal};

/// State of the protocol at the end of one simulated day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReport {
    /// Day number, starting at 1
    pub day: u32,
    /// Pool price in force during the day
    pub pool_price: Decimal,
    /// EMA after the tick
    pub ema: Decimal,
    /// Stable asset borrowed into the flywheel by the tick
    pub borrowed: u128,
    /// Stable asset held by the flywheel pool
    pub pool_underlying: u128,
    /// Outstanding protocol debt
    pub total_debt: u128,
    /// Reserve ratio after the tick
    pub reserve_ratio: Decimal,
    /// Redemption price after the tick
    pub redeem_price: Decimal,
}

/// Participants of a simulation run
#[derive(Debug, Clone, Copy)]
pub struct Actors {
    /// Provides pair liquidity
    pub market_maker: Address,
    /// Deposits into the flywheel
    pub saver: Address,
}

impl Actors {
    /// Derive the actors from a namespace
    pub fn derive(namespace: &str) -> Self {
        Self {
            market_maker: Address::derive(&format!("{namespace}/market-maker")),
            saver: Address::derive(&format!("{namespace}/saver")),
        }
    }
}

/// Deploy and fund the protocol described by `config`
pub fn bootstrap(config: &SimConfig) -> Result<(Protocol, Actors)> {
    let mut protocol = Protocol::with_namespace(&config.namespace, config.params.clone(), config.start_time)?;
    let actors = Actors::derive(&config.namespace);
    let registry = protocol.registry().clone();

    let liquidity = config.pair_liquidity as u128;
    let deposit = config.saver_deposit as u128;

    for (account, amount) in [(actors.market_maker, liquidity), (actors.saver, deposit)] {
        protocol.faucet_collateral(&account, amount * COLLATERAL_UNIT)?;
        protocol.approve_collateral(&account, &registry.reserve, u128::MAX)?;
        protocol.mint(&account, amount * STABLE_UNIT)?;
    }

    protocol.set_pair_reserves(
        liquidity * STABLE_UNIT,
        config.initial_price.mul_amount(liquidity * COLLATERAL_UNIT)?,
    )?;

    protocol.stabilizer_setup(&registry.authority)?;
    // First tick initializes the oracle market
    protocol.stabilizer_settle()?;

    if deposit > 0 {
        protocol.approve_stable(&actors.saver, &registry.stabilizer, u128::MAX)?;
        protocol.stabilizer_supply(&actors.saver, deposit * STABLE_UNIT)?;
    }

    tracing::info!(namespace = %config.namespace, liquidity, deposit, "simulation bootstrapped");
    Ok((protocol, actors))
}

/// Run the simulation for `config.days` days
pub fn run(config: &SimConfig) -> Result<Vec<DayReport>> {
    simulate(config).map(|(_, reports)| reports)
}

/// Run the simulation, keeping the final protocol state
pub fn simulate(config: &SimConfig) -> Result<(Protocol, Vec<DayReport>)> {
    let (mut protocol, _) = bootstrap(config)?;
    let liquidity = config.pair_liquidity as u128;
    let recovery = Decimal::from_bps(config.price_recovery_bps);
    let mut price = config.initial_price;
    let mut reports = Vec::with_capacity(config.days as usize);

    for day in 1..=config.days {
        protocol.advance_time(SECONDS_PER_DAY)?;

        let cash = protocol.reserve_balance()? / DECIMALS_FACTOR;
        let accrued = mul_div_floor(cash, config.daily_yield_bps as u128, BPS_DIVISOR as u128)?;
        if accrued > 0 {
            protocol.accrue_yield(accrued)?;
        }

        let borrowed = protocol.stabilizer_settle()?;
        let report = DayReport {
            day,
            pool_price: price,
            ema: protocol.ema().unwrap_or(Decimal::ONE),
            borrowed,
            pool_underlying: protocol.stabilizer_underlying(),
            total_debt: protocol.total_debt(),
            reserve_ratio: protocol.reserve_ratio()?,
            redeem_price: protocol.redeem_price()?,
        };
        tracing::debug!(day, %price, borrowed, "simulated day");
        reports.push(report);

        price = price.try_add(recovery)?.min(Decimal::ONE);
        protocol.set_pair_reserves(
            liquidity * STABLE_UNIT,
            price.mul_amount(liquidity * COLLATERAL_UNIT)?,
        )?;
    }

    Ok((protocol, reports))
}
