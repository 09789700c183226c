//! Mutable view of the ledgers an operation touches.

use crate::core::registry::Registry;
use crate::core::token::TokenLedger;
use crate::core::vault::YieldPool;
use crate::protocol::events::{EventLog, ProtocolEvent};

/// Ledgers shared by the reserve and the stabilizer for one operation
pub struct LedgerContext<'a, P: YieldPool> {
    /// Current time (seconds)
    pub now: u64,
    /// Address directory
    pub registry: &'a dyn Registry,
    /// Collateral asset
    pub collateral: &'a mut TokenLedger,
    /// Managed stable asset
    pub stable: &'a mut TokenLedger,
    /// Yield pool holding the reserve's idle collateral
    pub pool: &'a mut P,
    /// Event sink
    pub events: &'a mut EventLog,
}

impl<'a, P: YieldPool> LedgerContext<'a, P> {
    /// Append an event stamped with the current time
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.emit(self.now, event);
    }
}
