//! Oracle module for pool-derived prices.
//!
//! This module provides price discovery from on-ledger liquidity:
//! - The liquidity pair boundary and an in-memory constant-product pair
//! - The time-weighted average price oracle read by the stabilizer

pub mod pair;
pub mod twap;

pub use pair::*;
pub use twap::*;
