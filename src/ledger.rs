/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Append-only record of every evaluation cycle.
//!
//! [`ReserveLedger`] is the single source of truth for what past cycles
//! reported. Each [`ReserveLedger::record_cycle`] call validates the whole
//! submission before touching any state, so a cycle is either committed in
//! full (aggregate report, every per-protocol row, statistics) or not at all.
//!
//! After a commit the ledger pushes the cycle's severity and per-protocol
//! solvency into a [`CircuitBreaker`]. That push is best-effort: its outcome
//! is reported in the [`CycleReceipt`] and never undoes the commit.

use std::collections::{BTreeMap, HashSet};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{CycleAssessment, HealthReport, Severity, MAX_RISK_SCORE};
use crate::error::{ReserveError, Result};
use crate::guard::{CircuitBreaker, CycleUpdate, GuardTransitions};
use crate::protocol::ProtocolType;
use crate::registry::KeyedRegistry;
use crate::velocity::{Direction, UtilizationBaseline};

// ---------------------------------------------------------------------------
// ProtocolBatch
// ---------------------------------------------------------------------------

/// Per-protocol submission payload: parallel arrays, one index per protocol.
///
/// Every array must have the same length as `names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolBatch {
    /// Check number the submitter expects; advisory only.
    pub check_number: u64,
    /// Protocol names, unique within the batch.
    pub names: Vec<String>,
    /// Adapter family names, parsed on validation.
    pub types: Vec<String>,
    /// Chain per protocol.
    pub chains: Vec<String>,
    /// Claimed amount per protocol.
    pub claimed: Vec<u128>,
    /// Actual backing per protocol.
    pub actual: Vec<u128>,
    /// Solvency per protocol (bps).
    pub solvency_bps: Vec<u32>,
    /// Utilization per protocol (bps).
    pub utilization_bps: Vec<u32>,
    /// Absolute utilization move per protocol (bps).
    pub velocity_bps: Vec<u32>,
    /// Direction of each move.
    pub velocity_direction: Vec<Direction>,
}

impl ProtocolBatch {
    /// Flatten an engine assessment into a submission payload.
    pub fn from_assessment(check_number: u64, assessment: &CycleAssessment) -> Self {
        let mut batch = ProtocolBatch {
            check_number,
            ..Default::default()
        };
        for (result, velocity) in assessment.results.iter().zip(&assessment.velocities) {
            batch.names.push(result.name.clone());
            batch.types.push(result.kind.as_str().to_string());
            batch.chains.push(result.chain.clone());
            batch.claimed.push(result.claimed);
            batch.actual.push(result.actual);
            batch.solvency_bps.push(result.solvency_bps);
            batch.utilization_bps.push(result.utilization_bps);
            batch.velocity_bps.push(velocity.delta_bps);
            batch.velocity_direction.push(velocity.direction);
        }
        batch
    }

    /// Number of protocols in the batch.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Return `true` if the batch names no protocols.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check array shapes and names, and parse every type.
    fn validate(&self) -> Result<Vec<ProtocolType>> {
        let n = self.names.len();
        if n == 0 {
            return Err(ReserveError::MalformedBatch("batch has no protocols".into()));
        }
        let lengths = [
            ("types", self.types.len()),
            ("chains", self.chains.len()),
            ("claimed", self.claimed.len()),
            ("actual", self.actual.len()),
            ("solvency_bps", self.solvency_bps.len()),
            ("utilization_bps", self.utilization_bps.len()),
            ("velocity_bps", self.velocity_bps.len()),
            ("velocity_direction", self.velocity_direction.len()),
        ];
        if let Some((field, len)) = lengths.iter().find(|(_, len)| *len != n) {
            return Err(ReserveError::MalformedBatch(format!(
                "{field} has {len} entries, names has {n}"
            )));
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &self.names {
            if name.is_empty() {
                return Err(ReserveError::MalformedBatch("empty protocol name".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ReserveError::MalformedBatch(format!("duplicate protocol {name}")));
            }
        }

        self.types.iter().map(|t| t.parse()).collect()
    }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// One protocol's row as recorded for a given check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    /// Protocol name.
    pub name: String,
    /// Adapter family.
    pub kind: ProtocolType,
    /// Chain the protocol was read on.
    pub chain: String,
    /// Claimed amount, in whole tokens.
    pub claimed: u128,
    /// Actual backing, in whole tokens.
    pub actual: u128,
    /// Solvency (bps).
    pub solvency_bps: u32,
    /// Utilization (bps); next cycle's velocity baseline.
    pub utilization_bps: u32,
    /// Utilization move since the previous row (bps).
    pub velocity_bps: u32,
    /// Direction of that move.
    pub velocity_direction: Direction,
    /// Check this row was recorded with.
    pub check_number: u64,
    /// Report timestamp of that check.
    pub timestamp: u64,
}

/// Running statistics across every recorded cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Cycles recorded.
    pub total_checks: u64,
    /// Cycles classified healthy.
    pub healthy_count: u64,
    /// Cycles classified warning.
    pub warning_count: u64,
    /// Cycles classified critical.
    pub critical_count: u64,
    /// Cycles with the anomaly flag set.
    pub anomaly_count: u64,
    /// Score of the latest cycle.
    pub current_risk_score: u8,
    /// Highest score recorded.
    pub peak_risk_score: u8,
    /// Check at which `peak_risk_score` was first reached.
    pub peak_risk_check: u64,
}

/// Latest per-protocol figures rolled up for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRollup {
    /// Chain name.
    pub chain: String,
    /// Protocols on this chain with a recorded row.
    pub protocol_count: usize,
    /// Sums exclude protocols that do not contribute to reserves.
    pub total_claimed: u128,
    /// Sum of actual backing, excluding liquid staking.
    pub total_actual: u128,
    /// Lowest solvency on the chain (bps).
    pub worst_solvency_bps: u32,
}

/// Outcome of the best-effort guard push that follows a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardPush {
    /// The guard accepted the update.
    Applied(GuardTransitions),
    /// No guard was attached to this commit.
    Skipped,
    /// The guard rejected the update; the ledger commit stands.
    Failed(ReserveError),
}

/// Result of a committed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReceipt {
    /// Check number the ledger assigned.
    pub check_number: u64,
    /// Outcome of the guard push that followed the commit.
    pub guard: GuardPush,
}

// ---------------------------------------------------------------------------
// ReserveLedger
// ---------------------------------------------------------------------------

/// Durable, append-only store of cycle reports.
#[derive(Debug, Clone)]
pub struct ReserveLedger {
    owner: Address,
    /// Identity the ledger presents to the guard.
    identity: Address,
    submitter: Option<Address>,
    history_query_limit: usize,

    last_check_number: u64,
    reports: BTreeMap<u64, HealthReport>,
    protocol_history: BTreeMap<u64, Vec<ProtocolSnapshot>>,
    latest: KeyedRegistry<String, ProtocolSnapshot>,
    chains: KeyedRegistry<String, ()>,
    stats: LedgerStats,
}

impl ReserveLedger {
    /// Create an empty ledger administered by `owner`.
    ///
    /// No submitter is authorized until [`Self::set_submitter`] is called.
    pub fn new(owner: Address, identity: Address, history_query_limit: usize) -> Self {
        Self {
            owner,
            identity,
            submitter: None,
            history_query_limit,
            last_check_number: 0,
            reports: BTreeMap::new(),
            protocol_history: BTreeMap::new(),
            latest: KeyedRegistry::new(),
            chains: KeyedRegistry::new(),
            stats: LedgerStats::default(),
        }
    }

    /// Authorize `submitter` to record cycles. Owner only.
    pub fn set_submitter(&mut self, caller: Address, submitter: Address) -> Result<()> {
        if caller != self.owner {
            return Err(ReserveError::Unauthorized {
                caller,
                action: "set the ledger submitter",
            });
        }
        self.submitter = Some(submitter);
        Ok(())
    }

    /// Identity allowed to set the submitter.
    #[inline(always)]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Identity the ledger presents to the guard.
    #[inline(always)]
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Identity allowed to record cycles, if any.
    #[inline(always)]
    pub fn submitter(&self) -> Option<Address> {
        self.submitter
    }

    /// Check number of the last committed cycle, 0 before the first.
    #[inline(always)]
    pub fn last_check_number(&self) -> u64 {
        self.last_check_number
    }

    /// Commit one cycle and push the result into `guard`.
    ///
    /// The submission is validated in full first; on any error nothing is
    /// written. `report.check_number` and `batch.check_number` are advisory;
    /// the ledger assigns `last_check_number + 1`.
    pub fn record_cycle(
        &mut self,
        caller: Address,
        report: &HealthReport,
        batch: &ProtocolBatch,
        guard: Option<&mut CircuitBreaker>,
    ) -> Result<CycleReceipt> {
        if self.submitter != Some(caller) {
            return Err(ReserveError::Unauthorized {
                caller,
                action: "record cycles",
            });
        }
        let kinds = batch.validate()?;
        if report.risk_score > MAX_RISK_SCORE {
            return Err(ReserveError::MalformedBatch(format!(
                "risk score {} exceeds {MAX_RISK_SCORE}",
                report.risk_score
            )));
        }

        let check_number = self.last_check_number + 1;
        if batch.check_number != 0 && batch.check_number != check_number {
            warn!(
                expected = batch.check_number,
                assigned = check_number,
                "submitted check number differs from ledger counter"
            );
        }

        // Validation is complete; everything below is infallible.
        let stored = HealthReport {
            check_number,
            ..report.clone()
        };

        let mut rows = Vec::with_capacity(batch.len());
        for (i, kind) in kinds.into_iter().enumerate() {
            let row = ProtocolSnapshot {
                name: batch.names[i].clone(),
                kind,
                chain: batch.chains[i].clone(),
                claimed: batch.claimed[i],
                actual: batch.actual[i],
                solvency_bps: batch.solvency_bps[i],
                utilization_bps: batch.utilization_bps[i],
                velocity_bps: batch.velocity_bps[i],
                velocity_direction: batch.velocity_direction[i],
                check_number,
                timestamp: stored.timestamp,
            };
            self.chains.insert_if_absent(row.chain.clone(), || ());
            self.latest.upsert(row.name.clone(), row.clone());
            rows.push(row);
        }

        self.update_stats(&stored);
        self.protocol_history.insert(check_number, rows);
        self.reports.insert(check_number, stored.clone());
        self.last_check_number = check_number;

        info!(
            check_number,
            risk_score = stored.risk_score,
            severity = ?stored.severity,
            worst_solvency_bps = stored.worst_solvency_bps,
            anomaly = stored.anomaly_detected,
            "recorded reserve cycle"
        );

        let guard = match guard {
            None => GuardPush::Skipped,
            Some(guard) => {
                let update = CycleUpdate {
                    check_number,
                    severity: stored.severity,
                    timestamp: stored.timestamp,
                    protocols: batch
                        .names
                        .iter()
                        .cloned()
                        .zip(batch.solvency_bps.iter().copied())
                        .collect(),
                };
                match guard.apply_cycle(self.identity, &update) {
                    Ok(transitions) => GuardPush::Applied(transitions),
                    Err(err) => {
                        warn!(check_number, error = %err, "guard push failed");
                        GuardPush::Failed(err)
                    }
                }
            }
        };

        Ok(CycleReceipt {
            check_number,
            guard,
        })
    }

    fn update_stats(&mut self, report: &HealthReport) {
        let stats = &mut self.stats;
        match report.severity {
            Severity::Healthy => stats.healthy_count += 1,
            Severity::Warning => stats.warning_count += 1,
            Severity::Critical => stats.critical_count += 1,
        }
        if report.anomaly_detected {
            stats.anomaly_count += 1;
        }
        if stats.total_checks == 0 || report.risk_score > stats.peak_risk_score {
            stats.peak_risk_score = report.risk_score;
            stats.peak_risk_check = report.check_number;
        }
        stats.current_risk_score = report.risk_score;
        stats.total_checks += 1;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Last utilization recorded for `name`, or 0 if never recorded.
    #[inline(always)]
    pub fn get_previous(&self, name: &str) -> u32 {
        self.previous_utilization(name).unwrap_or(0)
    }

    /// Most recently recorded report.
    pub fn latest_report(&self) -> Option<&HealthReport> {
        self.reports.values().next_back()
    }

    /// Report recorded with `check_number`.
    pub fn report(&self, check_number: u64) -> Option<&HealthReport> {
        self.reports.get(&check_number)
    }

    /// Up to `count` most recent reports, oldest first, capped by the
    /// configured history query limit.
    pub fn recent_reports(&self, count: usize) -> Vec<&HealthReport> {
        let n = count.min(self.history_query_limit);
        let mut recent: Vec<_> = self.reports.values().rev().take(n).collect();
        recent.reverse();
        recent
    }

    /// Running statistics over every recorded cycle.
    #[inline(always)]
    pub fn stats(&self) -> LedgerStats {
        self.stats
    }

    /// Latest recorded row for `name`.
    pub fn protocol_by_name(&self, name: &str) -> Option<&ProtocolSnapshot> {
        self.latest.get(name)
    }

    /// Every protocol ever recorded, in first-seen order.
    #[inline(always)]
    pub fn protocol_names(&self) -> &[String] {
        self.latest.keys()
    }

    /// Per-protocol rows recorded with `check_number`.
    pub fn protocol_results_at(&self, check_number: u64) -> Option<&[ProtocolSnapshot]> {
        self.protocol_history.get(&check_number).map(Vec::as_slice)
    }

    /// Every chain ever recorded, in first-seen order.
    #[inline(always)]
    pub fn chains(&self) -> &[String] {
        self.chains.keys()
    }

    /// Roll up the latest rows of every protocol on `chain`.
    pub fn chain_rollup(&self, chain: &str) -> Option<ChainRollup> {
        let mut rollup: Option<ChainRollup> = None;
        for (_, row) in self.latest.iter().filter(|(_, row)| row.chain == chain) {
            let entry = rollup.get_or_insert_with(|| ChainRollup {
                chain: chain.to_string(),
                protocol_count: 0,
                total_claimed: 0,
                total_actual: 0,
                worst_solvency_bps: u32::MAX,
            });
            entry.protocol_count += 1;
            if row.kind.contributes_to_reserves() {
                entry.total_claimed = entry.total_claimed.saturating_add(row.claimed);
                entry.total_actual = entry.total_actual.saturating_add(row.actual);
            }
            entry.worst_solvency_bps = entry.worst_solvency_bps.min(row.solvency_bps);
        }
        rollup
    }

    /// Rollups for every known chain, in first-seen order.
    pub fn chain_rollups(&self) -> Vec<ChainRollup> {
        self.chains
            .keys()
            .iter()
            .filter_map(|chain| self.chain_rollup(chain))
            .collect()
    }
}

impl UtilizationBaseline for ReserveLedger {
    fn previous_utilization(&self, name: &str) -> Option<u32> {
        self.protocol_by_name(name).map(|row| row.utilization_bps)
    }

    fn has_recorded_cycles(&self) -> bool {
        self.last_check_number > 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
