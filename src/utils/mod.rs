//! Utility modules for the reserve protocol.
//!
//! Shared building blocks used across the protocol:
//! - Fixed-point arithmetic
//! - Account addresses
//! - Re-entrancy guard
//! - Constants

pub mod address;
pub mod constants;
pub mod guard;
pub mod math;

pub use address::*;
pub use constants::*;
pub use guard::*;
pub use math::*;
