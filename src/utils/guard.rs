//! Busy-flag guard against nested re-entry.
//!
//! Each component that exposes mutating operations owns one guard. The flag
//! is set on entry and cleared on every exit path, success or failure.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// In-progress flag for a single component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Create an idle guard
    pub const fn new() -> Self {
        Self { entered: false }
    }

    /// Mark the component busy, rejecting a nested call
    pub fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(Error::InvalidState("reentrant-call"));
        }
        self.entered = true;
        Ok(())
    }

    /// Release the flag
    pub fn exit(&mut self) {
        self.entered = false;
    }

    /// Whether an operation is in progress
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
