//! Token ledger implementation.
//!
//! This module implements the fungible-token bookkeeping shared by every
//! asset in the system:
//! - Balances and total supply
//! - Allowance-based transfers
//! - Minting and burning restricted to a single minter
//! - The issuer's restriction list

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::utils::address::Address;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// RESTRICTION LIST
// ═══════════════════════════════════════════════════════════════════════════════

/// Issuer blocklist query
pub trait RestrictionList {
    /// Whether the account is blocked by the issuer
    fn is_restricted(&self, account: &Address) -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory fungible token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Token address
    address: Address,
    /// Token symbol
    pub symbol: String,
    /// Decimal places
    pub decimals: u8,
    /// Only account allowed to mint and burn
    minter: Address,
    /// Account that maintains the restriction list
    issuer: Address,
    /// Total supply in base units
    total_supply: u128,
    /// Balances by account
    balances: HashMap<Address, u128>,
    /// Allowances by owner, then spender
    allowances: HashMap<Address, HashMap<Address, u128>>,
    /// Blocked accounts
    restricted: HashSet<Address>,
}

impl TokenLedger {
    /// Create an empty ledger
    pub fn new(address: Address, symbol: &str, decimals: u8, minter: Address, issuer: Address) -> Self {
        Self {
            address,
            symbol: symbol.to_string(),
            decimals,
            minter,
            issuer,
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            restricted: HashSet::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Token address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Account allowed to mint and burn
    pub fn minter(&self) -> Address {
        self.minter
    }

    /// Total supply
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of an account
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining allowance of `spender` over `owner`'s balance
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.balances.values().filter(|b| **b > 0).count()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Issue new tokens (minter only)
    pub fn mint(&mut self, caller: &Address, to: &Address, amount: u128) -> Result<()> {
        self.require_minter(caller, "token-mint")?;
        self.require_unrestricted(to)?;

        let new_supply = safe_add(self.total_supply, amount)?;
        let new_balance = safe_add(self.balance_of(to), amount)?;

        self.total_supply = new_supply;
        self.balances.insert(*to, new_balance);
        Ok(())
    }

    /// Destroy tokens held by `from` (minter only)
    pub fn burn(&mut self, caller: &Address, from: &Address, amount: u128) -> Result<()> {
        self.require_minter(caller, "token-burn")?;

        let balance = self.balance_of(from);
        if balance < amount {
            return Err(Error::insufficient("balance", amount, balance));
        }

        self.balances.insert(*from, balance - amount);
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSFERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move tokens between accounts
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        self.require_unrestricted(from)?;
        self.require_unrestricted(to)?;

        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(Error::insufficient("balance", amount, from_balance));
        }
        if from == to {
            return Ok(());
        }

        let to_balance = safe_add(self.balance_of(to), amount)?;
        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, to_balance);
        Ok(())
    }

    /// Set the allowance of `spender` over `owner`'s balance
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        self.require_unrestricted(owner)?;
        self.allowances.entry(*owner).or_default().insert(*spender, amount);
        Ok(())
    }

    /// Move tokens on behalf of `from`, spending `spender`'s allowance
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(Error::insufficient("allowance", amount, allowance));
        }

        self.transfer(from, to, amount)?;

        // u128::MAX is an unlimited approval
        if allowance != u128::MAX {
            self.allowances
                .entry(*from)
                .or_default()
                .insert(*spender, allowance - amount);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RESTRICTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Block an account (issuer only)
    pub fn restrict(&mut self, caller: &Address, account: &Address) -> Result<()> {
        if caller != &self.issuer {
            return Err(Error::Unauthorized { action: "token-restrict" });
        }
        self.restricted.insert(*account);
        Ok(())
    }

    /// Unblock an account (issuer only)
    pub fn unrestrict(&mut self, caller: &Address, account: &Address) -> Result<()> {
        if caller != &self.issuer {
            return Err(Error::Unauthorized { action: "token-restrict" });
        }
        self.restricted.remove(account);
        Ok(())
    }

    fn require_minter(&self, caller: &Address, action: &'static str) -> Result<()> {
        if caller != &self.minter {
            return Err(Error::Unauthorized { action });
        }
        Ok(())
    }

    fn require_unrestricted(&self, account: &Address) -> Result<()> {
        if self.restricted.contains(account) {
            return Err(Error::Unauthorized { action: "restricted-account" });
        }
        Ok(())
    }
}

impl RestrictionList for TokenLedger {
    fn is_restricted(&self, account: &Address) -> bool {
        self.restricted.contains(account)
    }
}
