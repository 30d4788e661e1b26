/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Aggregate risk scoring and severity classification.
//!
//! [`RiskEngine::evaluate`] folds every [`ProtocolResult`] of a cycle into one
//! [`HealthReport`]. Points are accumulated as integers from four independent
//! sources, summed, and clamped to `0..=100`:
//!
//! 1. Solvency tiers (stacking)
//! 2. Utilization tiers (stacking)
//! 3. Utilization velocity against the previous cycle
//! 4. Cross-reference of claimed amounts against an external reference total
//!
//! Severity is then decided from the score and the **worst** per-protocol
//! solvency of the batch, not from the aggregate ratio.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adapter::{ratio_bps, ProtocolResult};
use crate::error::{ReserveError, Result};
use crate::limit::RiskLimits;
use crate::velocity::{Direction, UtilizationBaseline, VelocityResult, VelocityTracker};

/// Maximum aggregate risk score.
pub const MAX_RISK_SCORE: u8 = 100;

/// External reference totals keyed by reference slug. A missing or zero entry
/// means no corroborating data.
pub type ReferenceTotals = HashMap<String, u128>;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Three-level classification of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Score under the healthy ceiling and no protocol at warning level.
    Healthy = 0,
    /// Score under the warning ceiling and no protocol at pause level.
    Warning = 1,
    /// Anything worse.
    Critical = 2,
}

// ---------------------------------------------------------------------------
// RiskWeights
// ---------------------------------------------------------------------------

/// A threshold in basis points and the points awarded when it is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Boundary in basis points; the comparison direction depends on the rule.
    pub threshold_bps: u32,
    /// Points awarded once the boundary is crossed.
    pub points: u32,
}

impl Tier {
    /// Tier of `points` at `threshold_bps`.
    #[inline(always)]
    pub const fn new(threshold_bps: u32, points: u32) -> Self {
        Self { threshold_bps, points }
    }
}

/// Point weights for every scoring rule.
///
/// Two deployments are known: a single-protocol workflow that scores one
/// aggregate position heavily, and a multi-protocol workflow whose lighter
/// per-protocol weights keep one outlier from saturating the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Awarded when solvency is strictly below the threshold. Tiers stack.
    pub solvency_tiers: Vec<Tier>,
    /// Awarded when utilization is strictly above the threshold. Tiers stack.
    pub utilization_tiers: Vec<Tier>,
    /// Increasing move of at least the alert threshold.
    pub velocity_increase_points: u32,
    /// Extra points when an increasing move reaches `alert * spike_multiple`.
    pub velocity_spike_points: u32,
    /// Multiple of the alert threshold that counts as a spike.
    pub velocity_spike_multiple: u32,
    /// Decreasing move of at least the alert threshold.
    pub velocity_decrease_points: u32,
    /// Plausible band for `claimed / reference`, in bps, inclusive.
    pub cross_ref_min_share_bps: u32,
    /// Upper edge of the plausible band.
    pub cross_ref_max_share_bps: u32,
    /// Awarded when the share falls outside the band.
    pub cross_ref_points: u32,
    /// Liquid staking tokens are cross-checked against their own backing.
    pub lst_backing_floor_bps: u32,
    /// Awarded when backing falls below the floor.
    pub lst_backing_points: u32,
    /// Awarded when no reference total is available.
    pub missing_reference_points: u32,
}

impl RiskWeights {
    /// Weights of the single-protocol, aggregate-style workflow.
    pub fn single_protocol() -> Self {
        Self {
            solvency_tiers: vec![Tier::new(9_500, 30), Tier::new(9_000, 20), Tier::new(8_000, 20)],
            utilization_tiers: vec![Tier::new(9_000, 15), Tier::new(9_500, 10)],
            velocity_increase_points: 0,
            velocity_spike_points: 0,
            velocity_spike_multiple: 3,
            velocity_decrease_points: 0,
            cross_ref_min_share_bps: 300,
            cross_ref_max_share_bps: 5_000,
            cross_ref_points: 25,
            lst_backing_floor_bps: 9_900,
            lst_backing_points: 20,
            missing_reference_points: 5,
        }
    }

    /// Weights of the multi-protocol workflow.
    pub fn multi_protocol() -> Self {
        Self {
            solvency_tiers: vec![Tier::new(9_500, 15), Tier::new(9_000, 10), Tier::new(8_000, 10)],
            utilization_tiers: Vec::new(),
            velocity_increase_points: 15,
            velocity_spike_points: 20,
            velocity_spike_multiple: 3,
            velocity_decrease_points: 10,
            cross_ref_min_share_bps: 50,
            cross_ref_max_share_bps: 20_000,
            cross_ref_points: 15,
            lst_backing_floor_bps: 9_900,
            lst_backing_points: 20,
            missing_reference_points: 5,
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self::multi_protocol()
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Points contributed by each scoring source before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Solvency tier points.
    pub solvency: u32,
    /// Utilization tier points.
    pub utilization: u32,
    /// Velocity points.
    pub velocity: u32,
    /// Cross-reference points, including missing-reference penalties.
    pub cross_reference: u32,
}

impl ScoreBreakdown {
    /// Sum of all sources, clamped to `0..=100`.
    pub fn risk_score(&self) -> u8 {
        let total = self
            .solvency
            .saturating_add(self.utilization)
            .saturating_add(self.velocity)
            .saturating_add(self.cross_reference);
        total.min(MAX_RISK_SCORE as u32) as u8
    }
}

/// Aggregate result of one cycle. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Assigned by the ledger on commit; 0 on an unrecorded draft.
    pub check_number: u64,
    /// Sum over protocols that contribute to reserves.
    pub total_actual: u128,
    /// Sum over protocols that contribute to reserves.
    pub total_claimed: u128,
    /// Minimum solvency across every protocol in the batch.
    pub worst_solvency_bps: u32,
    /// Clamped to `0..=100`.
    pub risk_score: u8,
    /// Classification from the score and the worst solvency.
    pub severity: Severity,
    /// Informational; never changes severity on its own.
    pub anomaly_detected: bool,
    /// Unix seconds at evaluation.
    pub timestamp: u64,
}

/// Everything the engine derived for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleAssessment {
    /// Aggregate report.
    pub report: HealthReport,
    /// Per-protocol results, in input order.
    pub results: Vec<ProtocolResult>,
    /// One entry per result, same order.
    pub velocities: Vec<VelocityResult>,
    /// Points per source before clamping.
    pub breakdown: ScoreBreakdown,
    /// `true` when velocity was suppressed to seed baselines.
    pub first_run: bool,
}

// ---------------------------------------------------------------------------
// RiskEngine
// ---------------------------------------------------------------------------

/// Stateless scorer; all cycle-to-cycle state lives in the ledger.
#[derive(Debug, Clone)]
pub struct RiskEngine {
    weights: RiskWeights,
    limits: RiskLimits,
    tracker: VelocityTracker,
}

impl RiskEngine {
    /// Create an engine; the velocity alert threshold comes from `limits`.
    pub fn new(weights: RiskWeights, limits: RiskLimits) -> Self {
        let tracker = VelocityTracker::new(limits.velocity_alert_bps);
        Self {
            weights,
            limits,
            tracker,
        }
    }

    /// Point weights in effect.
    #[inline(always)]
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Thresholds in effect.
    #[inline(always)]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Score one cycle.
    ///
    /// `slugs[i]` is the reference slug of `results[i]` and keys into
    /// `references`. `baseline` supplies the previous cycle's utilization.
    /// The returned report has `check_number == 0` until the ledger records
    /// it.
    pub fn evaluate(
        &self,
        results: Vec<ProtocolResult>,
        slugs: &[&str],
        baseline: &impl UtilizationBaseline,
        references: &ReferenceTotals,
        timestamp: u64,
    ) -> Result<CycleAssessment> {
        if results.is_empty() {
            return Err(ReserveError::EmptyCycle);
        }
        if slugs.len() != results.len() {
            return Err(ReserveError::MalformedBatch(format!(
                "{} reference slugs for {} protocols",
                slugs.len(),
                results.len()
            )));
        }

        let first_run = self
            .tracker
            .is_first_run(results.iter().map(|r| r.name.as_str()), baseline);

        let mut breakdown = ScoreBreakdown::default();
        let mut velocities = Vec::with_capacity(results.len());
        let mut total_claimed: u128 = 0;
        let mut total_actual: u128 = 0;
        let mut worst_solvency_bps = u32::MAX;
        let mut any_velocity_alert = false;

        for (result, slug) in results.iter().zip(slugs) {
            let velocity = self
                .tracker
                .track(&result.name, result.utilization_bps, baseline, first_run);

            let solvency = self.solvency_points(result.solvency_bps);
            let utilization = self.utilization_points(result.utilization_bps);
            let velocity_pts = if velocity.is_scored(first_run) {
                self.velocity_points(&velocity)
            } else {
                0
            };
            let cross_ref = self.cross_reference_points(result, references.get(*slug).copied());

            debug!(
                protocol = %result.name,
                solvency_bps = result.solvency_bps,
                utilization_bps = result.utilization_bps,
                solvency,
                utilization,
                velocity = velocity_pts,
                cross_ref,
                "scored protocol"
            );

            // Operator-supplied weights may be arbitrarily large.
            breakdown.solvency = breakdown.solvency.saturating_add(solvency);
            breakdown.utilization = breakdown.utilization.saturating_add(utilization);
            breakdown.velocity = breakdown.velocity.saturating_add(velocity_pts);
            breakdown.cross_reference = breakdown.cross_reference.saturating_add(cross_ref);

            if result.kind.contributes_to_reserves() {
                total_claimed = total_claimed.saturating_add(result.claimed);
                total_actual = total_actual.saturating_add(result.actual);
            }
            worst_solvency_bps = worst_solvency_bps.min(result.solvency_bps);
            any_velocity_alert |= velocity.is_alert;
            velocities.push(velocity);
        }

        let risk_score = breakdown.risk_score();
        let severity = self.classify(risk_score, worst_solvency_bps);
        let anomaly_detected = breakdown.cross_reference > 0
            || self.limits.is_warning_level(worst_solvency_bps)
            || (!first_run && any_velocity_alert);

        Ok(CycleAssessment {
            report: HealthReport {
                check_number: 0,
                total_actual,
                total_claimed,
                worst_solvency_bps,
                risk_score,
                severity,
                anomaly_detected,
                timestamp,
            },
            results,
            velocities,
            breakdown,
            first_run,
        })
    }

    /// Map a score and the worst solvency of the batch to a severity.
    pub fn classify(&self, risk_score: u8, worst_solvency_bps: u32) -> Severity {
        if risk_score < self.limits.healthy_score_ceiling
            && !self.limits.is_warning_level(worst_solvency_bps)
        {
            Severity::Healthy
        } else if risk_score < self.limits.warning_score_ceiling
            && !self.limits.is_pause_level(worst_solvency_bps)
        {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }

    /// Stacked points for every solvency tier `solvency_bps` is below.
    pub fn solvency_points(&self, solvency_bps: u32) -> u32 {
        self.weights
            .solvency_tiers
            .iter()
            .filter(|t| solvency_bps < t.threshold_bps)
            .map(|t| t.points)
            .fold(0, u32::saturating_add)
    }

    /// Stacked points for every utilization tier `utilization_bps` is above.
    pub fn utilization_points(&self, utilization_bps: u32) -> u32 {
        self.weights
            .utilization_tiers
            .iter()
            .filter(|t| utilization_bps > t.threshold_bps)
            .map(|t| t.points)
            .fold(0, u32::saturating_add)
    }

    /// Points for a scored velocity result.
    ///
    /// Growth is weighted above withdrawal: a sharp utilization rise reads
    /// as a borrow run, a sharp fall as possible panic withdrawals.
    pub fn velocity_points(&self, velocity: &VelocityResult) -> u32 {
        let alert = self.tracker.alert_threshold_bps();
        if velocity.delta_bps < alert {
            return 0;
        }
        match velocity.direction {
            Direction::Increasing => {
                let spike = alert.saturating_mul(self.weights.velocity_spike_multiple);
                let mut points = self.weights.velocity_increase_points;
                if velocity.delta_bps >= spike {
                    points = points.saturating_add(self.weights.velocity_spike_points);
                }
                points
            }
            Direction::Decreasing => self.weights.velocity_decrease_points,
        }
    }

    /// Cross-reference points for one protocol against its reference total.
    ///
    /// Liquid staking tokens are checked against their own backing instead.
    pub fn cross_reference_points(&self, result: &ProtocolResult, reference: Option<u128>) -> u32 {
        if result.kind.is_liquid_staking() {
            return if result.solvency_bps < self.weights.lst_backing_floor_bps {
                self.weights.lst_backing_points
            } else {
                0
            };
        }
        match reference {
            Some(total) if total > 0 => {
                let share_bps = ratio_bps(result.claimed, total);
                if share_bps < self.weights.cross_ref_min_share_bps
                    || share_bps > self.weights.cross_ref_max_share_bps
                {
                    self.weights.cross_ref_points
                } else {
                    0
                }
            }
            _ => self.weights.missing_reference_points,
        }
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new(RiskWeights::default(), RiskLimits::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
