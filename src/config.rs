/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Deployment configuration loaded from JSON.
//!
//! A deployment picks one scoring profile (or supplies its own weights),
//! optional threshold overrides, and the list of monitored protocols.
//! Protocols are validated once, up front: an unknown `type` aborts loading
//! rather than silently dropping that protocol from every later cycle.

use std::collections::HashSet;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::engine::{RiskEngine, RiskWeights};
use crate::error::{ReserveError, Result};
use crate::limit::RiskLimits;
use crate::protocol::{Protocol, ProtocolContracts, ProtocolType};

/// Largest decimals value whose scale fits in a `u128`.
const MAX_DECIMALS: u8 = 38;

// ---------------------------------------------------------------------------
// ScoringProfile
// ---------------------------------------------------------------------------

/// Which built-in weight preset a deployment scores with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringProfile {
    /// Heavy per-protocol weights, utilization tiers, 3%..50% reference band.
    SingleProtocol,
    /// Light per-protocol weights, velocity scoring, 0.5%..200% reference band.
    #[default]
    MultiProtocol,
}

impl ScoringProfile {
    /// Preset weights for this profile.
    pub fn weights(&self) -> RiskWeights {
        match self {
            ScoringProfile::SingleProtocol => RiskWeights::single_protocol(),
            ScoringProfile::MultiProtocol => RiskWeights::multi_protocol(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// One monitored protocol as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Unique protocol name.
    pub name: String,
    /// Adapter family: `aave`, `compound`, `lido` or `erc4626`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Chain the contracts live on.
    pub chain: String,
    /// Token decimals; defaults to 18.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Key into the reference source.
    pub reference_slug: String,
    /// Contracts the adapter reads.
    pub contracts: ProtocolContracts,
}

/// Location of the on-ledger check counter used for the advisory read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerContract {
    /// Chain hosting the ledger contract.
    pub chain: String,
    /// Ledger contract address.
    pub address: Address,
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitored protocols, in evaluation order.
    pub protocols: Vec<ProtocolConfig>,
    /// Weight preset; `multi_protocol` unless set.
    #[serde(default)]
    pub scoring: ScoringProfile,
    /// Replaces the profile's weights entirely when present.
    #[serde(default)]
    pub weights: Option<RiskWeights>,
    /// Threshold overrides; missing fields keep their defaults.
    #[serde(default)]
    pub limits: RiskLimits,
    /// Source of the advisory check counter, if any.
    #[serde(default)]
    pub ledger_contract: Option<LedgerContract>,
}

fn default_decimals() -> u8 {
    18
}

impl MonitorConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ReserveError::InvalidConfig(e.to_string()))
    }

    /// Weights in effect: the explicit override, else the profile preset.
    pub fn risk_weights(&self) -> RiskWeights {
        self.weights.clone().unwrap_or_else(|| self.scoring.weights())
    }

    /// Build the scoring engine from the effective weights and limits.
    pub fn engine(&self) -> RiskEngine {
        RiskEngine::new(self.risk_weights(), self.limits.clone())
    }

    /// Validate every protocol entry and build the runtime definitions.
    pub fn build_protocols(&self) -> Result<Vec<Protocol>> {
        if self.protocols.is_empty() {
            return Err(ReserveError::EmptyCycle);
        }
        let mut names = HashSet::with_capacity(self.protocols.len());
        let mut protocols = Vec::with_capacity(self.protocols.len());

        for entry in &self.protocols {
            if entry.name.is_empty() {
                return Err(ReserveError::InvalidConfig("protocol with empty name".into()));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(ReserveError::InvalidConfig(format!(
                    "duplicate protocol name {}",
                    entry.name
                )));
            }
            if entry.decimals > MAX_DECIMALS {
                return Err(ReserveError::InvalidConfig(format!(
                    "{} declares {} decimals, maximum is {MAX_DECIMALS}",
                    entry.name, entry.decimals
                )));
            }
            let kind: ProtocolType = entry.kind.parse()?;

            let protocol = Protocol {
                name: entry.name.clone(),
                kind,
                chain: entry.chain.clone(),
                decimals: entry.decimals,
                reference_slug: entry.reference_slug.clone(),
                contracts: entry.contracts.clone(),
            };
            // Surface missing contracts at load time, not mid-cycle.
            protocol.read_plan()?;
            protocols.push(protocol);
        }
        Ok(protocols)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
