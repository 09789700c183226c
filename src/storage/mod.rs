//! Storage module for persistent data management.
//!
//! Ledger state is persisted as a single versioned snapshot file. Decoding
//! accepts every historical schema version and migrates it forward.

pub mod schema;

pub use schema::*;
