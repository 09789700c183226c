//! Protocol operations - atomic state changes.
//!
//! Operations represent discrete actions submitted to the engine. Each one
//! runs inside its own atomic scope: it commits all of its effects or none.

use serde::{Deserialize, Serialize};

use crate::utils::address::Address;
use crate::utils::math::Decimal;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// All operations accepted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    // Reserve
    /// Mint stable asset for collateral
    Mint {
        /// Minter
        account: Address,
        /// Stable amount
        amount: u128,
    },
    /// Redeem stable asset for collateral
    Redeem {
        /// Redeemer
        account: Address,
        /// Stable amount
        amount: u128,
    },
    /// Repay protocol debt for collateral
    SettleDebt {
        /// Payer
        account: Address,
        /// Stable amount
        amount: u128,
    },

    // Stabilizer
    /// Register the stable asset with the oracle
    StabilizerSetup {
        /// Must be the authority
        caller: Address,
    },
    /// Deposit stable asset into the flywheel pool
    StabilizerSupply {
        /// Supplier
        account: Address,
        /// Stable amount
        amount: u128,
    },
    /// Burn pool shares
    StabilizerRedeem {
        /// Redeemer
        account: Address,
        /// Shares
        shares: u128,
    },
    /// Withdraw an exact stable amount from the pool
    StabilizerRedeemUnderlying {
        /// Redeemer
        account: Address,
        /// Stable amount
        amount: u128,
    },
    /// Run one flywheel tick
    StabilizerSettle,
    /// Move pool shares
    ShareTransfer {
        /// Sender
        from: Address,
        /// Recipient
        to: Address,
        /// Shares
        shares: u128,
    },

    // Governance
    /// Change the redemption tax
    SetRedemptionTax {
        /// Must be the authority
        caller: Address,
        /// New value
        value: Decimal,
    },
    /// Change the flywheel reward rate
    SetRewardRate {
        /// Must be the authority
        caller: Address,
        /// New value
        value: Decimal,
    },
    /// Change the EMA decay rate
    SetDecayRate {
        /// Must be the authority
        caller: Address,
        /// New value
        value: Decimal,
    },
    /// Change the EMA step cap
    SetMaxAlpha {
        /// Must be the authority
        caller: Address,
        /// New value
        value: Decimal,
    },
}

impl Operation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "Mint",
            Self::Redeem { .. } => "Redeem",
            Self::SettleDebt { .. } => "SettleDebt",
            Self::StabilizerSetup { .. } => "StabilizerSetup",
            Self::StabilizerSupply { .. } => "StabilizerSupply",
            Self::StabilizerRedeem { .. } => "StabilizerRedeem",
            Self::StabilizerRedeemUnderlying { .. } => "StabilizerRedeemUnderlying",
            Self::StabilizerSettle => "StabilizerSettle",
            Self::ShareTransfer { .. } => "ShareTransfer",
            Self::SetRedemptionTax { .. } => "SetRedemptionTax",
            Self::SetRewardRate { .. } => "SetRewardRate",
            Self::SetDecayRate { .. } => "SetDecayRate",
            Self::SetMaxAlpha { .. } => "SetMaxAlpha",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of an executed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    /// Collateral charged for a mint
    Minted {
        /// Collateral cost
        cost: u128,
    },
    /// Collateral paid for a redemption
    Redeemed {
        /// Collateral payout
        payout: u128,
    },
    /// Collateral paid for a debt settlement
    DebtSettled {
        /// Collateral proceeds
        proceeds: u128,
    },
    /// Shares minted for a pool deposit
    Supplied {
        /// Shares minted
        shares: u128,
    },
    /// Stable asset paid for burned shares
    Withdrawn {
        /// Stable amount
        amount: u128,
    },
    /// Shares burned for an exact withdrawal
    SharesBurned {
        /// Shares burned
        shares: u128,
    },
    /// Flywheel tick
    Ticked {
        /// Stable amount borrowed into the pool
        borrowed: u128,
    },
    /// Completed with nothing to report
    Done,
}
