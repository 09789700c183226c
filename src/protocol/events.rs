//! Protocol events for state change notifications.
//!
//! Events are emitted for all significant state changes in the protocol.
//! They are appended to the world's event log inside the same atomic scope
//! as the state change, so a rolled-back operation leaves no events behind.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::utils::address::Address;
use crate::utils::math::Decimal;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All protocol event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    // Reserve Events
    /// Stable asset issued against collateral
    Mint {
        /// Account that minted
        account: Address,
        /// Stable amount issued
        mint: u128,
        /// Collateral pulled from the account
        cost: u128,
    },
    /// Stable asset redeemed for collateral
    Redeem {
        /// Account that redeemed
        account: Address,
        /// Stable amount burned
        cost: u128,
        /// Collateral paid out
        redeem: u128,
    },
    /// Stabilizer borrowed newly minted stable asset
    Borrow {
        /// Stable amount borrowed
        amount: u128,
    },
    /// Protocol debt repaid
    Settle {
        /// Account that settled
        account: Address,
        /// Stable amount burned
        settle: u128,
        /// Collateral paid out
        proceeds: u128,
    },

    // Stabilizer Events
    /// Stable asset supplied to the flywheel pool
    StabilizerSupply {
        /// Supplier
        account: Address,
        /// Stable amount supplied
        amount: u128,
        /// Pool shares minted
        shares: u128,
    },
    /// Pool shares redeemed for stable asset
    StabilizerRedeem {
        /// Redeemer
        account: Address,
        /// Pool shares burned
        shares: u128,
        /// Stable amount paid out
        amount: u128,
    },
    /// Flywheel tick
    StabilizerSettle {
        /// Snapshot price
        price: Decimal,
        /// Seconds covered by the snapshot
        elapsed: u32,
        /// Whether the snapshot was healthy
        healthy: bool,
        /// Stable amount borrowed into the pool
        borrowed: u128,
        /// EMA after the tick
        ema: Decimal,
    },

    // Governance Events
    /// A governable parameter changed
    ParameterChanged {
        /// Parameter name
        name: String,
        /// Previous value
        old: Decimal,
        /// New value
        new: Decimal,
    },
}

impl ProtocolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "Mint",
            Self::Redeem { .. } => "Redeem",
            Self::Borrow { .. } => "Borrow",
            Self::Settle { .. } => "Settle",
            Self::StabilizerSupply { .. } => "StabilizerSupply",
            Self::StabilizerRedeem { .. } => "StabilizerRedeem",
            Self::StabilizerSettle { .. } => "StabilizerSettle",
            Self::ParameterChanged { .. } => "ParameterChanged",
        }
    }
}

/// An event stamped with the time it was emitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Emission time (seconds)
    pub timestamp: u64,
    /// The event
    pub event: ProtocolEvent,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only collection of emitted events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Add an event to the log
    pub fn emit(&mut self, timestamp: u64, event: ProtocolEvent) {
        self.records.push(EventRecord { timestamp, event });
    }

    /// Get all records
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Most recent event
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.records.last().map(|r| &r.event)
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&ProtocolEvent> {
        self.records
            .iter()
            .map(|r| &r.event)
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record after the first `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// SHA-256 over the encoded log, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            // Encoding plain enums and integers into a Vec cannot fail
            let bytes = bincode::serialize(record).unwrap_or_default();
            hasher.update(&bytes);
        }
        hex::encode(hasher.finalize())
    }
}
