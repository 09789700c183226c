//! Address directory.
//!
//! Components never hardcode each other's addresses. A read-only directory
//! is injected at construction and consulted whenever a caller must be
//! checked against a registered role.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::address::Address;

/// Read-only directory of protocol addresses
pub trait Registry {
    /// Collateral (reference) asset
    fn collateral(&self) -> Address;
    /// Managed stable asset
    fn stable(&self) -> Address;
    /// Yield-bearing share pool
    fn yield_pool(&self) -> Address;
    /// Price oracle
    fn oracle(&self) -> Address;
    /// Stabilizer flywheel
    fn stabilizer(&self) -> Address;
    /// Reserve comptroller
    fn reserve(&self) -> Address;
    /// Current governance authority
    fn authority(&self) -> Address;
}

/// Fail with `Unauthorized` unless `caller` is the registered authority
pub fn require_authority(registry: &dyn Registry, caller: &Address, action: &'static str) -> Result<()> {
    if *caller != registry.authority() {
        return Err(Error::Unauthorized { action });
    }
    Ok(())
}

/// Fail with `Unauthorized` unless `caller` is the registered stabilizer
pub fn require_stabilizer(registry: &dyn Registry, caller: &Address, action: &'static str) -> Result<()> {
    if *caller != registry.stabilizer() {
        return Err(Error::Unauthorized { action });
    }
    Ok(())
}

/// Plain directory of fixed addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Collateral asset
    pub collateral: Address,
    /// Stable asset
    pub stable: Address,
    /// Yield pool
    pub yield_pool: Address,
    /// Oracle
    pub oracle: Address,
    /// Stabilizer
    pub stabilizer: Address,
    /// Reserve
    pub reserve: Address,
    /// Authority
    pub authority: Address,
}

impl Directory {
    /// Derive every address from a deployment namespace
    pub fn derive(namespace: &str) -> Self {
        let at = |role: &str| Address::derive(&format!("{namespace}/{role}"));
        Self {
            collateral: at("collateral"),
            stable: at("stable"),
            yield_pool: at("yield-pool"),
            oracle: at("oracle"),
            stabilizer: at("stabilizer"),
            reserve: at("reserve"),
            authority: at("authority"),
        }
    }
}

impl Registry for Directory {
    fn collateral(&self) -> Address {
        self.collateral
    }

    fn stable(&self) -> Address {
        self.stable
    }

    fn yield_pool(&self) -> Address {
        self.yield_pool
    }

    fn oracle(&self) -> Address {
        self.oracle
    }

    fn stabilizer(&self) -> Address {
        self.stabilizer
    }

    fn reserve(&self) -> Address {
        self.reserve
    }

    fn authority(&self) -> Address {
        self.authority
    }
}
