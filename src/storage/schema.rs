//! Versioned snapshot encoding.
//!
//! A snapshot is the whole ledger world plus the clock, the address
//! directory and the deployment parameters. The byte layout is:
//!
//! ```text
//! magic (4) | version (u16 LE) | payload length (u64 LE) | sha256(payload) (32) | payload
//! ```
//!
//! The payload is bincode. Older versions are migrated on decode; encoding
//! always writes the current version.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::core::config::ProtocolParams;
use crate::core::registry::Directory;
use crate::core::reserve::{BorrowController, ReserveComptroller, ReserveState};
use crate::core::stabilizer::{Stabilizer, StabilizerState};
use crate::core::token::TokenLedger;
use crate::core::vault::SharePool;
use crate::error::{Error, Result};
use crate::oracle::pair::ConstantProductPair;
use crate::oracle::twap::TwapOracle;
use crate::protocol::engine::World;
use crate::protocol::events::EventLog;
use crate::utils::address::Address;
use crate::utils::constants::DEFAULT_MAX_ALPHA_BPS;
use crate::utils::math::Decimal;

/// Snapshot magic bytes
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"RSVP";

/// Current schema version
pub const SCHEMA_VERSION: u16 = 2;

const HEADER_LEN: usize = 4 + 2 + 8 + 32;

// ═══════════════════════════════════════════════════════════════════════════════
// CURRENT SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Version 2: rate-limited borrowing, capped EMA steps and reward accounting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateV2 {
    /// Ledger clock
    pub now: u64,
    /// Address directory
    pub registry: Directory,
    /// Collateral issuer
    pub issuer: Address,
    /// Deployment parameters
    pub params: ProtocolParams,
    /// Ledger world
    pub world: World,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEGACY SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Version 1 deployment parameters (no EMA step cap)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsV1 {
    /// Parameter set version
    pub version: String,
    /// Redemption tax
    pub redemption_tax: Decimal,
    /// Daily borrow limit fraction
    pub daily_borrow_limit: Decimal,
    /// Daily reward rate
    pub reward_rate: Decimal,
    /// EMA decay per day
    pub decay_rate: Decimal,
    /// Oracle liquidity floor
    pub min_reference_liquidity: u64,
}

/// Version 1 reserve (no borrow rate limiter)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveV1 {
    /// Reserve address
    pub address: Address,
    /// Daily borrow limit fraction
    pub daily_borrow_limit: Decimal,
    /// Redemption tax
    pub redemption_tax: Decimal,
    /// Outstanding debt
    pub total_debt: u128,
    /// Debt per borrower
    pub debts: HashMap<Address, u128>,
}

/// Version 1 stabilizer (no step cap, no reward accumulator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerV1 {
    /// Stabilizer address
    pub address: Address,
    /// Pool share ledger
    pub shares: TokenLedger,
    /// Smoothed price
    pub ema: Option<Decimal>,
    /// EMA decay per day
    pub decay_rate: Decimal,
    /// Daily reward rate
    pub reward_rate: Decimal,
}

/// Version 1 ledger world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldV1 {
    /// Collateral asset
    pub collateral: TokenLedger,
    /// Stable asset
    pub stable: TokenLedger,
    /// Liquidity pair
    pub pair: ConstantProductPair,
    /// Yield pool
    pub pool: SharePool,
    /// Oracle
    pub oracle: TwapOracle,
    /// Reserve
    pub reserve: ReserveV1,
    /// Stabilizer
    pub stabilizer: StabilizerV1,
    /// Events
    pub events: EventLog,
}

/// Version 1 snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateV1 {
    /// Ledger clock
    pub now: u64,
    /// Address directory
    pub registry: Directory,
    /// Collateral issuer
    pub issuer: Address,
    /// Deployment parameters
    pub params: ParamsV1,
    /// Ledger world
    pub world: WorldV1,
}

/// Lift a version 1 snapshot to the current shape
///
/// The borrow window starts empty at the snapshot time and the reward
/// accumulator starts at zero with no holder checkpoints.
pub fn migrate_v1(old: StateV1) -> StateV2 {
    let max_alpha = Decimal::from_bps(DEFAULT_MAX_ALPHA_BPS);
    let params = ProtocolParams {
        version: old.params.version,
        redemption_tax: old.params.redemption_tax,
        daily_borrow_limit: old.params.daily_borrow_limit,
        reward_rate: old.params.reward_rate,
        decay_rate: old.params.decay_rate,
        max_alpha,
        min_reference_liquidity: old.params.min_reference_liquidity,
    };

    let WorldV1 {
        collateral,
        stable,
        pair,
        pool,
        oracle,
        reserve,
        stabilizer,
        events,
    } = old.world;

    let reserve = ReserveComptroller::from_parts(
        reserve.address,
        reserve.daily_borrow_limit,
        ReserveState {
            redemption_tax: reserve.redemption_tax,
            total_debt: reserve.total_debt,
            debts: reserve.debts,
            borrow_controller: BorrowController {
                amount_borrowed: 0,
                last_update_time: old.now,
            },
        },
    );
    let stabilizer = Stabilizer::from_parts(
        stabilizer.address,
        stabilizer.shares,
        StabilizerState {
            ema: stabilizer.ema,
            decay_rate: stabilizer.decay_rate,
            max_alpha,
            reward_rate: stabilizer.reward_rate,
            reward_per_share: Decimal::ZERO,
            checkpoints: HashMap::new(),
        },
    );

    StateV2 {
        now: old.now,
        registry: old.registry,
        issuer: old.issuer,
        params,
        world: World {
            collateral,
            stable,
            pair,
            pool,
            oracle,
            reserve,
            stabilizer,
            events,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODING
// ═══════════════════════════════════════════════════════════════════════════════

fn frame(version: u16, payload: &[u8]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(HEADER_LEN + payload.len());
    buffer.extend_from_slice(SNAPSHOT_MAGIC);
    buffer.extend_from_slice(&version.to_le_bytes());
    buffer.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buffer.extend_from_slice(&Sha256::digest(payload));
    buffer.extend_from_slice(payload);
    buffer
}

/// Encode a legacy snapshot (kept for migration tests and tooling)
pub fn encode_v1(state: &StateV1) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(frame(1, &payload))
}

/// Encode a snapshot with the current schema version
pub fn encode(state: &StateV2) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(frame(SCHEMA_VERSION, &payload))
}

/// Decode a snapshot of any supported version
pub fn decode(data: &[u8]) -> Result<StateV2> {
    if data.len() < HEADER_LEN {
        return Err(Error::Deserialization("snapshot too small".into()));
    }
    if &data[0..4] != SNAPSHOT_MAGIC {
        return Err(Error::Deserialization("invalid snapshot magic".into()));
    }

    let version = u16::from_le_bytes([data[4], data[5]]);
    let mut length = [0u8; 8];
    length.copy_from_slice(&data[6..14]);
    let length = u64::from_le_bytes(length) as usize;

    let payload = &data[HEADER_LEN..];
    if payload.len() != length {
        return Err(Error::Deserialization(format!(
            "snapshot truncated: expected {} payload bytes, found {}",
            length,
            payload.len()
        )));
    }
    if Sha256::digest(payload).as_slice() != &data[14..HEADER_LEN] {
        return Err(Error::Deserialization("snapshot checksum mismatch".into()));
    }

    match version {
        1 => {
            let old: StateV1 =
                bincode::deserialize(payload).map_err(|e| Error::Deserialization(e.to_string()))?;
            tracing::info!(from = 1, to = SCHEMA_VERSION, "migrating snapshot");
            Ok(migrate_v1(old))
        }
        SCHEMA_VERSION => bincode::deserialize(payload).map_err(|e| Error::Deserialization(e.to_string())),
        other => Err(Error::Deserialization(format!("unsupported snapshot version: {}", other))),
    }
}

/// Write a snapshot to disk, creating parent directories
pub fn write_snapshot(path: &Path, state: &StateV2) -> Result<()> {
    let data = encode(state)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Serialization(format!("cannot create directory: {}", e)))?;
    }
    std::fs::write(path, &data).map_err(|e| Error::Serialization(format!("cannot write snapshot: {}", e)))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "snapshot written");
    Ok(())
}

/// Read a snapshot from disk
pub fn read_snapshot(path: &Path) -> Result<StateV2> {
    let data = std::fs::read(path).map_err(|e| Error::Deserialization(format!("cannot read snapshot: {}", e)))?;
    decode(&data)
}
