/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Utilization velocity between consecutive cycles.
//!
//! The previous cycle's utilization comes from the ledger through the
//! [`UtilizationBaseline`] trait. A protocol with no recorded baseline never
//! raises an alert: its first observation only seeds the baseline. When no
//! protocol in the batch has a baseline and the ledger has never recorded a
//! cycle, the whole cycle is a first run and velocity is not scored at all.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UtilizationBaseline
// ---------------------------------------------------------------------------

/// Source of the previous cycle's utilization per protocol.
pub trait UtilizationBaseline {
    /// Last recorded utilization for `name`, or `None` if never recorded.
    fn previous_utilization(&self, name: &str) -> Option<u32>;

    /// Whether any cycle has ever been recorded.
    fn has_recorded_cycles(&self) -> bool;
}

// ---------------------------------------------------------------------------
// VelocityResult
// ---------------------------------------------------------------------------

/// Direction of the utilization move. A zero move reads as increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
}

/// Velocity of one protocol for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityResult {
    /// Protocol name.
    pub name: String,
    /// Utilization this cycle (bps).
    pub current_util_bps: u32,
    /// Previous utilization, 0 when no baseline exists.
    pub previous_util_bps: u32,
    /// Absolute move `|current - previous|`.
    pub delta_bps: u32,
    /// Direction of the move.
    pub direction: Direction,
    /// `true` when the move reached the alert threshold and is scored.
    pub is_alert: bool,
    /// `true` when no prior record existed and this observation seeds one.
    pub seeds_baseline: bool,
}

impl VelocityResult {
    /// Whether this result may contribute to the risk score.
    #[inline(always)]
    pub fn is_scored(&self, first_run: bool) -> bool {
        !first_run && !self.seeds_baseline
    }
}

// ---------------------------------------------------------------------------
// VelocityTracker
// ---------------------------------------------------------------------------

/// Compares current utilization to the ledger's previous value.
#[derive(Debug, Clone, Copy)]
pub struct VelocityTracker {
    alert_threshold_bps: u32,
}

impl VelocityTracker {
    /// Create a tracker that alerts on moves of at least `alert_threshold_bps`.
    #[inline(always)]
    pub fn new(alert_threshold_bps: u32) -> Self {
        Self { alert_threshold_bps }
    }

    /// Minimum move that raises an alert (bps).
    #[inline(always)]
    pub fn alert_threshold_bps(&self) -> u32 {
        self.alert_threshold_bps
    }

    /// Return `true` when this batch only seeds baselines.
    ///
    /// That is the case when the ledger has never recorded a cycle and every
    /// protocol's previous value is the 0 sentinel.
    pub fn is_first_run<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        baseline: &impl UtilizationBaseline,
    ) -> bool {
        !baseline.has_recorded_cycles()
            && names
                .into_iter()
                .all(|name| baseline.previous_utilization(name).unwrap_or(0) == 0)
    }

    /// Measure one protocol's move. Alerts are forced off on a first run and
    /// for protocols without a baseline.
    pub fn track(
        &self,
        name: &str,
        current_util_bps: u32,
        baseline: &impl UtilizationBaseline,
        first_run: bool,
    ) -> VelocityResult {
        let previous = baseline.previous_utilization(name);
        let previous_util_bps = previous.unwrap_or(0);
        let seeds_baseline = previous.is_none();

        let (delta_bps, direction) = if current_util_bps >= previous_util_bps {
            (current_util_bps - previous_util_bps, Direction::Increasing)
        } else {
            (previous_util_bps - current_util_bps, Direction::Decreasing)
        };

        let is_alert = !first_run && !seeds_baseline && delta_bps >= self.alert_threshold_bps;

        VelocityResult {
            name: name.to_string(),
            current_util_bps,
            previous_util_bps,
            delta_bps,
            direction,
            is_alert,
            seeds_baseline,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
