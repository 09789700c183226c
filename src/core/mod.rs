//! Core modules for the reserve protocol.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and protocol parameters
//! - Token ledgers and the address registry
//! - The yield vault adapter
//! - The reserve comptroller
//! - The stabilizer flywheel

pub mod config;
pub mod context;
pub mod registry;
pub mod reserve;
pub mod stabilizer;
pub mod token;
pub mod vault;

pub use config::*;
pub use context::*;
pub use registry::*;
pub use reserve::*;
pub use stabilizer::*;
pub use token::*;
pub use vault::*;
