//! Protocol module - engine, operations and events.
//!
//! This module provides the engine that runs every reserve and stabilizer
//! operation atomically against the ledger world.

pub mod engine;
pub mod events;
pub mod operations;

pub use engine::*;
pub use events::*;
pub use operations::*;
