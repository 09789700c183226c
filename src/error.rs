//! Error types for the reserve protocol.
//!
//! Every failure is fatal to the operation that raised it: the operation
//! aborts and the ledger world is rolled back to its state before the call.
//! Each variant carries a short, stable reason tag for diagnosis.

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reserve protocol
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Ledger Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Balance, allowance or debt underflow
    #[error("Insufficient {what}: required {required}, available {available}")]
    InsufficientFunds {
        /// What ran short (balance, allowance, shares, debt)
        what: &'static str,
        /// Amount the operation needed
        required: u128,
        /// Amount that was available
        available: u128,
    },

    /// Borrow window exceeds the daily cap
    #[error("Borrow rate limit exceeded: window {window} over daily limit {limit}")]
    RateLimitExceeded {
        /// Window amount after adding the request
        window: u128,
        /// Daily limit at the time of the request
        limit: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Collaborator Errors
    // ═══════════════════════════════════════════════════════════════════

    /// A collaborator returned a non-success status
    #[error("External call {call} failed with status {status}")]
    ExternalCallFailed {
        /// Call that failed
        call: &'static str,
        /// Status code reported by the collaborator
        status: u32,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Authorization / State Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller is not the registered authority for this action
    #[error("Not authorized: {action}")]
    Unauthorized {
        /// Action that was attempted
        action: &'static str,
    },

    /// Operation is not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    // ═══════════════════════════════════════════════════════════════════
    // Arithmetic Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Overflow, underflow of a checked quantity, or division by zero
    #[error("Arithmetic failure in {operation}")]
    ArithmeticFailure {
        /// Operation that failed
        operation: &'static str,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Configuration / Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid parameter value
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Shorthand for an arithmetic failure
    pub fn arithmetic(operation: &'static str) -> Self {
        Error::ArithmeticFailure { operation }
    }

    /// Shorthand for an insufficient-funds failure
    pub fn insufficient(what: &'static str, required: u128, available: u128) -> Self {
        Error::InsufficientFunds {
            what,
            required,
            available,
        }
    }

    /// Error category name
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InsufficientFunds { .. } => "InsufficientFunds",
            Error::RateLimitExceeded { .. } => "RateLimitExceeded",
            Error::ExternalCallFailed { .. } => "ExternalCallFailed",
            Error::Unauthorized { .. } => "Unauthorized",
            Error::InvalidState(_) => "InvalidState",
            Error::ArithmeticFailure { .. } => "ArithmeticFailure",
            Error::InvalidParameter { .. } => "InvalidParameter",
            Error::Serialization(_) => "Serialization",
            Error::Deserialization(_) => "Deserialization",
        }
    }

    /// Stable, machine-parseable reason tag
    pub fn tag(&self) -> &'static str {
        match self {
            Error::InsufficientFunds { what, .. } => *what,
            Error::RateLimitExceeded { .. } => "borrow-rate-limit",
            Error::ExternalCallFailed { call, .. } => *call,
            Error::Unauthorized { action } => *action,
            Error::InvalidState(reason) => *reason,
            Error::ArithmeticFailure { operation } => *operation,
            Error::InvalidParameter { name, .. } => *name,
            Error::Serialization(_) => "encode",
            Error::Deserialization(_) => "decode",
        }
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Ledger errors: 1xxx
            Error::InsufficientFunds { .. } => 1001,
            Error::RateLimitExceeded { .. } => 1002,

            // Collaborator errors: 2xxx
            Error::ExternalCallFailed { .. } => 2001,

            // Authorization / state errors: 3xxx
            Error::Unauthorized { .. } => 3001,
            Error::InvalidState(_) => 3002,

            // Arithmetic errors: 4xxx
            Error::ArithmeticFailure { .. } => 4001,

            // Configuration / serialization errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Serialization(_) => 5002,
            Error::Deserialization(_) => 5003,
        }
    }
}
