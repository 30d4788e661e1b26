/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Monitored protocol definitions and the on-chain reads each one requires.
//!
//! A [`Protocol`] is immutable for the life of a deployment. Its
//! [`ProtocolType`] selects the adapter family, and [`Protocol::read_plan`]
//! lists the point reads ([`ReadCall`]) that adapter needs.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address};
use serde::{Deserialize, Serialize};

use crate::error::{ReserveError, Result};

// ---------------------------------------------------------------------------
// ProtocolType
// ---------------------------------------------------------------------------

/// Adapter family of a monitored protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Aave-style money market (aToken + variable debt token).
    Aave,
    /// Compound-style money market (single market contract).
    Compound,
    /// Lido-style liquid staking token, denominated in ETH.
    Lido,
    /// ERC-4626 share vault.
    Erc4626,
}

impl ProtocolType {
    /// Stable lowercase name used in configuration and ledger batches.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::Aave => "aave",
            ProtocolType::Compound => "compound",
            ProtocolType::Lido => "lido",
            ProtocolType::Erc4626 => "erc4626",
        }
    }

    /// Return `true` for liquid staking tokens.
    #[inline(always)]
    pub fn is_liquid_staking(&self) -> bool {
        matches!(self, ProtocolType::Lido)
    }

    /// Whether amounts of this type are summed into the aggregate reserves.
    ///
    /// Liquid staking amounts are in ETH rather than USD and stay out of the
    /// totals.
    #[inline(always)]
    pub fn contributes_to_reserves(&self) -> bool {
        !self.is_liquid_staking()
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolType {
    type Err = ReserveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aave" => Ok(ProtocolType::Aave),
            "compound" => Ok(ProtocolType::Compound),
            "lido" => Ok(ProtocolType::Lido),
            "erc4626" => Ok(ProtocolType::Erc4626),
            other => Err(ReserveError::UnsupportedProtocolType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ReadCall
// ---------------------------------------------------------------------------

/// One point-in-time view call against a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadCall {
    /// `totalSupply()` of an ERC-20 style token.
    TotalSupply { token: Address },
    /// `balanceOf(holder)` on `token`.
    BalanceOf { token: Address, holder: Address },
    /// `totalBorrow()` on a Compound-style market.
    TotalBorrow { market: Address },
    /// `getTotalPooledEther()` on a Lido-style staking token.
    TotalPooledEther { token: Address },
    /// `totalAssets()` on an ERC-4626 vault.
    TotalAssets { vault: Address },
    /// `totalChecks()` on the reserve ledger contract.
    CheckCounter { ledger: Address },
}

impl ReadCall {
    /// Contract the call is made against.
    pub fn target(&self) -> Address {
        match *self {
            ReadCall::TotalSupply { token } => token,
            ReadCall::BalanceOf { token, .. } => token,
            ReadCall::TotalBorrow { market } => market,
            ReadCall::TotalPooledEther { token } => token,
            ReadCall::TotalAssets { vault } => vault,
            ReadCall::CheckCounter { ledger } => ledger,
        }
    }

    /// Solidity function signature.
    pub fn signature(&self) -> &'static str {
        match self {
            ReadCall::TotalSupply { .. } => "totalSupply()",
            ReadCall::BalanceOf { .. } => "balanceOf(address)",
            ReadCall::TotalBorrow { .. } => "totalBorrow()",
            ReadCall::TotalPooledEther { .. } => "getTotalPooledEther()",
            ReadCall::TotalAssets { .. } => "totalAssets()",
            ReadCall::CheckCounter { .. } => "totalChecks()",
        }
    }

    /// 4-byte function selector.
    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// ABI-encoded call arguments (excluding the selector).
    pub fn args(&self) -> Vec<u8> {
        match self {
            ReadCall::BalanceOf { holder, .. } => {
                let mut word = vec![0u8; 12];
                word.extend_from_slice(holder.as_slice());
                word
            }
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Contract addresses an adapter reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolContracts {
    /// Deposit token, market, staking token or vault.
    pub primary: Address,
    /// Underlying asset held by `primary` (money markets only).
    #[serde(default)]
    pub underlying: Option<Address>,
    /// Variable debt token (Aave only).
    #[serde(default)]
    pub debt_token: Option<Address>,
}

/// A monitored protocol deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    /// Unique key across the deployment.
    pub name: String,
    /// Adapter family.
    pub kind: ProtocolType,
    /// Chain the contracts live on; reads are anchored per chain.
    pub chain: String,
    /// Token decimals of the amounts returned by the reads.
    pub decimals: u8,
    /// Key of the external reference total (e.g. a TVL slug).
    pub reference_slug: String,
    /// Contracts the adapter reads.
    pub contracts: ProtocolContracts,
}

impl Protocol {
    /// Return the reads this protocol's adapter needs, in adapter order.
    ///
    /// Fails with [`ReserveError::MissingContract`] when the configured
    /// contracts cannot satisfy the adapter.
    pub fn read_plan(&self) -> Result<Vec<ReadCall>> {
        let primary = self.contracts.primary;
        let plan = match self.kind {
            ProtocolType::Aave => vec![
                ReadCall::TotalSupply { token: primary },
                ReadCall::BalanceOf {
                    token: self.require(self.contracts.underlying, "underlying")?,
                    holder: primary,
                },
                ReadCall::TotalSupply {
                    token: self.require(self.contracts.debt_token, "debt token")?,
                },
            ],
            ProtocolType::Compound => vec![
                ReadCall::TotalSupply { token: primary },
                ReadCall::BalanceOf {
                    token: self.require(self.contracts.underlying, "underlying")?,
                    holder: primary,
                },
                ReadCall::TotalBorrow { market: primary },
            ],
            ProtocolType::Lido => vec![
                ReadCall::TotalSupply { token: primary },
                ReadCall::TotalPooledEther { token: primary },
            ],
            ProtocolType::Erc4626 => vec![
                ReadCall::TotalSupply { token: primary },
                ReadCall::TotalAssets { vault: primary },
            ],
        };
        Ok(plan)
    }

    fn require(&self, contract: Option<Address>, role: &'static str) -> Result<Address> {
        contract.ok_or_else(|| ReserveError::MissingContract {
            name: self.name.clone(),
            role,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
