/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Solvency, velocity and severity thresholds shared by the engine and the guard.

use serde::{Deserialize, Serialize};

/// One basis point is 0.01%; 10000 bps is fully backed.
pub const BPS_DENOMINATOR: u32 = 10_000;

// ---------------------------------------------------------------------------
// RiskLimits
// ---------------------------------------------------------------------------

/// Thresholds that turn ratios and scores into flags and severities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// A protocol is paused when its solvency falls below this (bps).
    pub pause_threshold_bps: u32,
    /// A protocol is flagged as warning when its solvency falls below this (bps).
    pub warning_threshold_bps: u32,
    /// Utilization move per cycle that raises a velocity alert (bps).
    pub velocity_alert_bps: u32,
    /// Scores strictly below this may classify as healthy.
    pub healthy_score_ceiling: u8,
    /// Scores strictly below this may classify as warning.
    pub warning_score_ceiling: u8,
    /// Maximum protocols a single consumer may watch.
    pub max_watched_protocols: usize,
    /// Maximum reports returned by a recent-history query.
    pub history_query_limit: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            pause_threshold_bps: 9_000,
            warning_threshold_bps: 9_500,
            velocity_alert_bps: 500,
            healthy_score_ceiling: 30,
            warning_score_ceiling: 60,
            max_watched_protocols: 10,
            history_query_limit: 100,
        }
    }
}

impl RiskLimits {
    /// Return `true` when `solvency_bps` is low enough to pause a protocol.
    #[inline(always)]
    pub fn is_pause_level(&self, solvency_bps: u32) -> bool {
        solvency_bps < self.pause_threshold_bps
    }

    /// Return `true` when `solvency_bps` is low enough to warn on a protocol.
    #[inline(always)]
    pub fn is_warning_level(&self, solvency_bps: u32) -> bool {
        solvency_bps < self.warning_threshold_bps
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RiskLimits::default();
        assert_eq!(limits.pause_threshold_bps, 9_000);
        assert_eq!(limits.warning_threshold_bps, 9_500);
        assert_eq!(limits.velocity_alert_bps, 500);
        assert_eq!(limits.healthy_score_ceiling, 30);
        assert_eq!(limits.warning_score_ceiling, 60);
        assert_eq!(limits.max_watched_protocols, 10);
        assert_eq!(limits.history_query_limit, 100);
    }

    #[test]
    fn test_threshold_boundaries_are_exclusive() {
        let limits = RiskLimits::default();
        assert!(!limits.is_pause_level(9_000));
        assert!(limits.is_pause_level(8_999));
        assert!(!limits.is_warning_level(9_500));
        assert!(limits.is_warning_level(9_499));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let limits: RiskLimits = serde_json::from_str(r#"{"pause_threshold_bps": 8500}"#).unwrap();
        assert_eq!(limits.pause_threshold_bps, 8_500);
        assert_eq!(limits.warning_threshold_bps, 9_500);
    }
}
