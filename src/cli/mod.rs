//! Reserve simulator command line support.
//!
//! Configuration, the day-by-day simulation driver and output formatting
//! used by the `reserve-sim` binary.

pub mod config;
pub mod output;
pub mod simulation;

pub use config::*;
pub use output::*;
pub use simulation::*;
