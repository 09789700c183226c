//! # Reserve Protocol
//!
//! Accounting core of a stable asset backed by a collateral reserve that is
//! parked in a yield pool.
//!
//! ## Architecture
//!
//! The protocol consists of several modules:
//!
//! - **Utils**: 18-decimal fixed point, addresses, constants
//! - **Core**: Token ledgers, the yield vault adapter, the reserve comptroller
//!   and the stabilizer flywheel
//! - **Oracle**: Constant-product pair and the TWAP oracle reading it
//! - **Protocol**: The engine that runs every operation atomically
//! - **Storage**: Versioned state snapshots
//! - **CLI**: Simulation support for the `reserve-sim` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use reserve_protocol::prelude::*;
//!
//! let mut protocol = Protocol::new(ProtocolParams::default(), 1_700_000_000)?;
//! protocol.faucet_collateral(&alice, 1_000_000)?;
//! protocol.approve_collateral(&alice, &protocol.registry().reserve, u128::MAX)?;
//! let cost = protocol.mint(&alice, 10u128.pow(18))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod oracle;
pub mod protocol;
pub mod storage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::ProtocolParams,
        registry::{Directory, Registry},
        reserve::{BorrowController, ReserveComptroller},
        stabilizer::Stabilizer,
        token::TokenLedger,
        vault::{PoolStatus, SharePool, VaultAdapter, YieldPool},
    };
    pub use crate::error::{Error, Result};
    pub use crate::oracle::{
        pair::{ConstantProductPair, LiquidityPair},
        twap::{Snapshot, TwapOracle},
    };
    pub use crate::protocol::{
        engine::Protocol,
        events::{EventLog, ProtocolEvent},
        operations::{Operation, OperationResult},
    };
    pub use crate::utils::{address::Address, math::Decimal};
}

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol name
pub const PROTOCOL_NAME: &str = "Reserve Protocol";
