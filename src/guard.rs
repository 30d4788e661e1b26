/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Circuit breaker that third-party consumers gate deposits and withdrawals on.
//!
//! [`CircuitBreaker`] keeps two independent kinds of state:
//!
//! - Per protocol: `paused` (solvency below the pause threshold) and
//!   `warning` (solvency below the warning threshold). Both flags are derived
//!   from the most recently pushed solvency and can be true at once.
//! - Global: paused while the latest pushed severity is critical.
//!
//! Consumers opt in with [`CircuitBreaker::register`]. An address that never
//! registers (or has deregistered) always reads safe; a registered consumer
//! reads unsafe while the guard is globally paused or any protocol on its
//! watch list is paused.
//!
//! Only the configured updater (the ledger's identity) may push cycle state,
//! and only the admin may unpause by hand. A manual unpause holds until the
//! next push recomputes the flag.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::Severity;
use crate::error::{ReserveError, Result};
use crate::limit::RiskLimits;
use crate::registry::KeyedRegistry;

// ---------------------------------------------------------------------------
// State records
// ---------------------------------------------------------------------------

/// Guard state for one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    /// Solvency below the pause threshold.
    pub paused: bool,
    /// Solvency below the warning threshold.
    pub warning: bool,
    /// Last pushed solvency.
    pub solvency_bps: u32,
    /// Check number of the last push.
    pub last_check_number: u64,
    /// Unix seconds of the last push or manual unpause.
    pub last_updated: u64,
}

/// A consumer's opt-in record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// `false` after deregistration; inactive consumers read safe.
    pub active: bool,
    /// Ordered, duplicate-free.
    pub watched_protocols: Vec<String>,
    /// Unix seconds of the first registration.
    pub registered_at: u64,
}

/// State pushed by the ledger after a committed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleUpdate {
    /// Ledger-assigned check number.
    pub check_number: u64,
    /// Aggregate severity of the cycle.
    pub severity: Severity,
    /// Unix seconds of the cycle.
    pub timestamp: u64,
    /// `(name, solvency_bps)` per protocol in the cycle.
    pub protocols: Vec<(String, u32)>,
}

/// Transitions caused by one [`CycleUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardTransitions {
    /// The global flag went from clear to paused.
    pub global_paused: bool,
    /// The global flag went from paused to clear.
    pub global_resumed: bool,
    /// Protocols that entered the paused state.
    pub newly_paused: Vec<String>,
    /// Protocols that left the paused state.
    pub resumed: Vec<String>,
}

/// Notifications emitted by the guard, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardEvent {
    GlobalPaused {
        check_number: u64,
        affected_registrants: usize,
    },
    GlobalResumed {
        check_number: u64,
    },
    ProtocolPaused {
        name: String,
        solvency_bps: u32,
        check_number: u64,
        affected_registrants: usize,
    },
    ProtocolResumed {
        name: String,
        check_number: u64,
    },
    /// Admin override; `target` is empty for the global flag.
    ManualUnpause {
        target: String,
        by: Address,
    },
    Registered {
        consumer: Address,
        watched: usize,
    },
    Deregistered {
        consumer: Address,
    },
}

// ---------------------------------------------------------------------------
// CircuitBreaker
// ---------------------------------------------------------------------------

/// Global and per-protocol pause state plus the consumer registry.
///
/// Every transition, registration and manual unpause appends a
/// [`GuardEvent`] to an outbox that only [`CircuitBreaker::drain_events`]
/// empties. [`crate::cycle::ReserveMonitor::run_cycle`] drains it after each
/// push; callers that drive the guard directly own draining.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    admin: Address,
    updater: Option<Address>,
    limits: RiskLimits,

    global_paused: bool,
    global_severity: Severity,
    global_check_number: u64,
    global_updated: u64,

    statuses: KeyedRegistry<String, ProtocolStatus>,
    registrations: KeyedRegistry<Address, Registration>,

    pause_events: u64,
    events: Vec<GuardEvent>,
}

impl CircuitBreaker {
    /// Create an unpaused guard administered by `admin`.
    ///
    /// No updater is trusted until [`Self::set_updater`] is called.
    pub fn new(admin: Address, limits: RiskLimits) -> Self {
        Self {
            admin,
            updater: None,
            limits,
            global_paused: false,
            global_severity: Severity::Healthy,
            global_check_number: 0,
            global_updated: 0,
            statuses: KeyedRegistry::new(),
            registrations: KeyedRegistry::new(),
            pause_events: 0,
            events: Vec::new(),
        }
    }

    /// Trust `updater` to push cycle state. Admin only.
    pub fn set_updater(&mut self, caller: Address, updater: Address) -> Result<()> {
        self.require_admin(caller, "set the guard updater")?;
        self.updater = Some(updater);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Updates from the ledger
    // -----------------------------------------------------------------------

    /// Apply a whole cycle: every protocol's solvency, then the global severity.
    ///
    /// The caller is checked before anything changes, so the update is either
    /// applied in full or rejected.
    pub fn apply_cycle(
        &mut self,
        caller: Address,
        update: &CycleUpdate,
    ) -> Result<GuardTransitions> {
        self.require_updater(caller)?;

        let mut transitions = GuardTransitions::default();
        for (name, solvency_bps) in &update.protocols {
            let (paused, resumed) = self.set_protocol_solvency(
                name,
                *solvency_bps,
                update.check_number,
                update.timestamp,
            );
            if paused {
                transitions.newly_paused.push(name.clone());
            }
            if resumed {
                transitions.resumed.push(name.clone());
            }
        }
        let (paused, resumed) =
            self.set_global_severity(update.severity, update.check_number, update.timestamp);
        transitions.global_paused = paused;
        transitions.global_resumed = resumed;
        Ok(transitions)
    }

    /// Push the aggregate severity of a cycle. Returns `true` if this call
    /// paused the guard.
    pub fn update_global_severity(
        &mut self,
        caller: Address,
        severity: Severity,
        check_number: u64,
        now: u64,
    ) -> Result<bool> {
        self.require_updater(caller)?;
        Ok(self.set_global_severity(severity, check_number, now).0)
    }

    /// Push one protocol's solvency. Returns `true` if this call paused it.
    pub fn update_protocol_solvency(
        &mut self,
        caller: Address,
        name: &str,
        solvency_bps: u32,
        check_number: u64,
        now: u64,
    ) -> Result<bool> {
        self.require_updater(caller)?;
        Ok(self.set_protocol_solvency(name, solvency_bps, check_number, now).0)
    }

    fn set_global_severity(
        &mut self,
        severity: Severity,
        check_number: u64,
        now: u64,
    ) -> (bool, bool) {
        let was_paused = self.global_paused;
        let paused = severity == Severity::Critical;

        self.global_paused = paused;
        self.global_severity = severity;
        self.global_check_number = check_number;
        self.global_updated = now;

        if paused && !was_paused {
            let affected = self.active_registrant_count();
            self.pause_events += 1;
            warn!(check_number, affected, "global circuit breaker paused");
            self.events.push(GuardEvent::GlobalPaused {
                check_number,
                affected_registrants: affected,
            });
            (true, false)
        } else if !paused && was_paused {
            info!(check_number, ?severity, "global circuit breaker resumed");
            self.events.push(GuardEvent::GlobalResumed { check_number });
            (false, true)
        } else {
            (false, false)
        }
    }

    fn set_protocol_solvency(
        &mut self,
        name: &str,
        solvency_bps: u32,
        check_number: u64,
        now: u64,
    ) -> (bool, bool) {
        let paused = self.limits.is_pause_level(solvency_bps);
        let warning = self.limits.is_warning_level(solvency_bps);

        let status = self.statuses.insert_if_absent(name.to_string(), || ProtocolStatus {
            paused: false,
            warning: false,
            solvency_bps: 0,
            last_check_number: 0,
            last_updated: 0,
        });
        let was_paused = status.paused;
        *status = ProtocolStatus {
            paused,
            warning,
            solvency_bps,
            last_check_number: check_number,
            last_updated: now,
        };

        if paused && !was_paused {
            let affected = self.affected_registrants(name);
            self.pause_events += 1;
            warn!(protocol = name, solvency_bps, affected, "protocol paused");
            self.events.push(GuardEvent::ProtocolPaused {
                name: name.to_string(),
                solvency_bps,
                check_number,
                affected_registrants: affected,
            });
            (true, false)
        } else if !paused && was_paused {
            info!(protocol = name, solvency_bps, "protocol resumed");
            self.events.push(GuardEvent::ProtocolResumed {
                name: name.to_string(),
                check_number,
            });
            (false, true)
        } else {
            (false, false)
        }
    }

    // -----------------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------------

    /// Clear a pause by hand. Admin only.
    ///
    /// An empty `target` clears the global pause; otherwise the named
    /// protocol's pause is cleared. The override lasts until the next push.
    pub fn manual_unpause(&mut self, caller: Address, target: &str, now: u64) -> Result<()> {
        self.require_admin(caller, "unpause")?;
        if target.is_empty() {
            self.global_paused = false;
            self.global_updated = now;
        } else {
            let status = self
                .statuses
                .get_mut(target)
                .ok_or_else(|| ReserveError::UnknownProtocol(target.to_string()))?;
            status.paused = false;
            status.last_updated = now;
        }
        warn!(unpause_target = target, by = %caller, "manual unpause");
        self.events.push(GuardEvent::ManualUnpause {
            target: target.to_string(),
            by: caller,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Consumer registry
    // -----------------------------------------------------------------------

    /// Register `caller` (or replace its watch list) with `watch_list`.
    ///
    /// Duplicates are dropped keeping first occurrence; more than
    /// `max_watched_protocols` distinct names is rejected. A returning
    /// consumer keeps its original registration time.
    pub fn register(&mut self, caller: Address, watch_list: &[&str], now: u64) -> Result<()> {
        let mut watched: Vec<String> = Vec::with_capacity(watch_list.len());
        for name in watch_list {
            if !watched.iter().any(|w| w == name) {
                watched.push(name.to_string());
            }
        }
        let limit = self.limits.max_watched_protocols;
        if watched.len() > limit {
            return Err(ReserveError::WatchListTooLong {
                count: watched.len(),
                limit,
            });
        }

        let count = watched.len();
        let registration = self.registrations.insert_if_absent(caller, || Registration {
            active: true,
            watched_protocols: Vec::new(),
            registered_at: now,
        });
        registration.active = true;
        registration.watched_protocols = watched;

        info!(consumer = %caller, watched = count, "consumer registered");
        self.events.push(GuardEvent::Registered {
            consumer: caller,
            watched: count,
        });
        Ok(())
    }

    /// Mark `caller` inactive. A caller that never registered is a no-op.
    pub fn deregister(&mut self, caller: Address) {
        if let Some(registration) = self.registrations.get_mut(&caller) {
            if registration.active {
                registration.active = false;
                info!(consumer = %caller, "consumer deregistered");
                self.events.push(GuardEvent::Deregistered { consumer: caller });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether `consumer` may proceed. Never fails; unregistered reads safe.
    pub fn is_safe(&self, consumer: Address) -> bool {
        let Some(registration) = self.registrations.get(&consumer) else {
            return true;
        };
        if !registration.active {
            return true;
        }
        if self.global_paused {
            return false;
        }
        registration
            .watched_protocols
            .iter()
            .all(|name| self.is_protocol_safe(name))
    }

    /// Whether the last push (or manual unpause) left the guard globally paused.
    #[inline(always)]
    pub fn is_globally_paused(&self) -> bool {
        self.global_paused
    }

    /// `false` only when `name` is tracked and currently paused.
    pub fn is_protocol_safe(&self, name: &str) -> bool {
        self.statuses.get(name).map_or(true, |s| !s.paused)
    }

    /// Stored flags for `name`.
    pub fn protocol_status(&self, name: &str) -> Option<&ProtocolStatus> {
        self.statuses.get(name)
    }

    /// Protocols ever pushed, in first-seen order.
    #[inline(always)]
    pub fn tracked_protocols(&self) -> &[String] {
        self.statuses.keys()
    }

    /// Registration record for `consumer`, active or not.
    pub fn registration(&self, consumer: Address) -> Option<&Registration> {
        self.registrations.get(&consumer)
    }

    /// Number of active registrants.
    pub fn active_registrant_count(&self) -> usize {
        self.registrations.iter().filter(|(_, r)| r.active).count()
    }

    /// Active registrants whose watch list contains `name`.
    pub fn affected_registrants(&self, name: &str) -> usize {
        self.registrations
            .iter()
            .filter(|(_, r)| r.active && r.watched_protocols.iter().any(|w| w == name))
            .count()
    }

    /// Transitions into a paused state since creation, global and per protocol.
    #[inline(always)]
    pub fn pause_event_count(&self) -> u64 {
        self.pause_events
    }

    /// Severity of the last global push.
    #[inline(always)]
    pub fn global_severity(&self) -> Severity {
        self.global_severity
    }

    /// Check number of the last global push.
    #[inline(always)]
    pub fn global_check_number(&self) -> u64 {
        self.global_check_number
    }

    /// Unix seconds of the last global change.
    #[inline(always)]
    pub fn global_updated(&self) -> u64 {
        self.global_updated
    }

    /// Take every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GuardEvent> {
        std::mem::take(&mut self.events)
    }

    fn require_admin(&self, caller: Address, action: &'static str) -> Result<()> {
        if caller != self.admin {
            return Err(ReserveError::Unauthorized { caller, action });
        }
        Ok(())
    }

    fn require_updater(&self, caller: Address) -> Result<()> {
        if self.updater != Some(caller) {
            return Err(ReserveError::Unauthorized {
                caller,
                action: "push guard updates",
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: Address = Address::new([0xAD; 20]);
    const LEDGER: Address = Address::new([0x1E; 20]);
    const VAULT: Address = Address::new([0x01; 20]);
    const BRIDGE: Address = Address::new([0x02; 20]);
    const STRANGER: Address = Address::new([0x03; 20]);

    fn guard() -> CircuitBreaker {
        let mut g = CircuitBreaker::new(ADMIN, RiskLimits::default());
        g.set_updater(ADMIN, LEDGER).unwrap();
        g
    }

    fn cycle(check: u64, severity: Severity, protocols: &[(&str, u32)]) -> CycleUpdate {
        CycleUpdate {
            check_number: check,
            severity,
            timestamp: 1_000 + check,
            protocols: protocols.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Protocol flags
    // -----------------------------------------------------------------------

    #[test]
    fn test_protocol_flags_follow_solvency() {
        let mut g = guard();
        let rows = [("a", 9_200), ("b", 8_500), ("c", 9_500)];
        g.apply_cycle(LEDGER, &cycle(1, Severity::Warning, &rows)).unwrap();

        let a = g.protocol_status("a").unwrap();
        assert!(a.warning && !a.paused);
        let b = g.protocol_status("b").unwrap();
        assert!(b.warning && b.paused);
        let c = g.protocol_status("c").unwrap();
        assert!(!c.warning && !c.paused);
        assert_eq!(b.last_check_number, 1);
        assert_eq!(b.last_updated, 1_001);
        assert!(!g.is_protocol_safe("b"));
        assert!(g.is_protocol_safe("never-seen"));
    }

    #[test]
    fn test_pause_threshold_is_exclusive() {
        let mut g = guard();
        assert!(!g.update_protocol_solvency(LEDGER, "a", 9_000, 1, 0).unwrap());
        assert!(g.update_protocol_solvency(LEDGER, "a", 8_999, 2, 0).unwrap());
    }

    #[test]
    fn test_protocol_recovers_when_solvency_returns() {
        let mut g = guard();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Critical, &[("a", 7_000)])).unwrap();
        let t = g.apply_cycle(LEDGER, &cycle(2, Severity::Healthy, &[("a", 9_900)])).unwrap();
        assert_eq!(t.resumed, vec!["a".to_string()]);
        assert!(t.global_resumed);
        assert!(g.is_protocol_safe("a"));
        assert!(!g.is_globally_paused());
    }

    // -----------------------------------------------------------------------
    // Global flag
    // -----------------------------------------------------------------------

    #[test]
    fn test_critical_pauses_globally_and_lower_severity_resumes() {
        let mut g = guard();
        assert!(g.update_global_severity(LEDGER, Severity::Critical, 1, 0).unwrap());
        assert!(g.is_globally_paused());
        assert_eq!(g.global_severity(), Severity::Critical);
        assert!(!g.update_global_severity(LEDGER, Severity::Critical, 2, 0).unwrap());
        assert_eq!(g.pause_event_count(), 1);

        g.update_global_severity(LEDGER, Severity::Warning, 3, 0).unwrap();
        assert!(!g.is_globally_paused());
        assert_eq!(g.global_check_number(), 3);
    }

    #[test]
    fn test_only_updater_pushes() {
        let mut g = guard();
        let err = g
            .apply_cycle(STRANGER, &cycle(1, Severity::Critical, &[("a", 1)]))
            .unwrap_err();
        assert!(matches!(err, ReserveError::Unauthorized { .. }));
        assert!(!g.is_globally_paused());
        assert!(g.tracked_protocols().is_empty());
        assert!(g.set_updater(STRANGER, STRANGER).is_err());
    }

    // -----------------------------------------------------------------------
    // Manual unpause
    // -----------------------------------------------------------------------

    #[test]
    fn test_manual_global_unpause_is_immediate_until_next_cycle() {
        let mut g = guard();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Critical, &[])).unwrap();
        g.manual_unpause(ADMIN, "", 50).unwrap();
        assert!(!g.is_globally_paused());

        // The following critical cycle pauses again and counts a new event.
        g.apply_cycle(LEDGER, &cycle(2, Severity::Critical, &[])).unwrap();
        assert!(g.is_globally_paused());
        assert_eq!(g.pause_event_count(), 2);
    }

    #[test]
    fn test_manual_protocol_unpause_overrides_until_recomputed() {
        let mut g = guard();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Warning, &[("a", 8_000)])).unwrap();
        g.manual_unpause(ADMIN, "a", 60).unwrap();
        assert!(g.is_protocol_safe("a"));
        assert_eq!(g.protocol_status("a").unwrap().solvency_bps, 8_000);

        g.apply_cycle(LEDGER, &cycle(2, Severity::Warning, &[("a", 8_000)])).unwrap();
        assert!(!g.is_protocol_safe("a"));
    }

    #[test]
    fn test_manual_unpause_requires_admin_and_known_protocol() {
        let mut g = guard();
        assert!(matches!(
            g.manual_unpause(LEDGER, "", 0),
            Err(ReserveError::Unauthorized { .. })
        ));
        assert_eq!(
            g.manual_unpause(ADMIN, "ghost", 0),
            Err(ReserveError::UnknownProtocol("ghost".into()))
        );
    }

    // -----------------------------------------------------------------------
    // Registry and is_safe
    // -----------------------------------------------------------------------

    #[test]
    fn test_unregistered_consumer_is_always_safe() {
        let mut g = guard();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Critical, &[("a", 1_000)])).unwrap();
        assert!(g.is_globally_paused());
        assert!(g.is_safe(STRANGER));
    }

    #[test]
    fn test_registered_consumer_blocked_by_global_pause() {
        let mut g = guard();
        g.register(VAULT, &[], 10).unwrap();
        assert!(g.is_safe(VAULT));
        g.apply_cycle(LEDGER, &cycle(1, Severity::Critical, &[])).unwrap();
        assert!(!g.is_safe(VAULT));
    }

    #[test]
    fn test_registered_consumer_blocked_only_by_watched_protocols() {
        let mut g = guard();
        g.register(VAULT, &["a"], 10).unwrap();
        g.register(BRIDGE, &["b"], 10).unwrap();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Warning, &[("a", 8_500), ("b", 9_600)]))
            .unwrap();
        assert!(!g.is_safe(VAULT));
        assert!(g.is_safe(BRIDGE));
    }

    #[test]
    fn test_register_replaces_watch_list() {
        let mut g = guard();
        g.register(VAULT, &["a", "b", "a"], 10).unwrap();
        assert_eq!(g.registration(VAULT).unwrap().watched_protocols, vec!["a", "b"]);
        g.register(VAULT, &["c"], 20).unwrap();
        let r = g.registration(VAULT).unwrap();
        assert_eq!(r.watched_protocols, vec!["c"]);
        assert_eq!(r.registered_at, 10);
    }

    #[test]
    fn test_register_enforces_watch_limit() {
        let mut g = guard();
        let names: Vec<String> = (0..11).map(|i| format!("p{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(
            g.register(VAULT, &refs, 0),
            Err(ReserveError::WatchListTooLong { count: 11, limit: 10 })
        );
        assert!(g.registration(VAULT).is_none());
        assert!(g.register(VAULT, &refs[..10], 0).is_ok());
    }

    #[test]
    fn test_deregistered_consumer_reads_safe() {
        let mut g = guard();
        g.register(VAULT, &["a"], 0).unwrap();
        g.apply_cycle(LEDGER, &cycle(1, Severity::Critical, &[("a", 100)])).unwrap();
        assert!(!g.is_safe(VAULT));
        g.deregister(VAULT);
        assert!(g.is_safe(VAULT));
        assert_eq!(g.active_registrant_count(), 0);
        g.deregister(STRANGER);
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    #[test]
    fn test_pause_events_count_affected_registrants() {
        let mut g = guard();
        g.register(VAULT, &["a"], 0).unwrap();
        g.register(BRIDGE, &["a", "b"], 0).unwrap();
        g.register(STRANGER, &["b"], 0).unwrap();
        g.deregister(STRANGER);
        g.drain_events();

        g.apply_cycle(LEDGER, &cycle(4, Severity::Critical, &[("a", 8_000)])).unwrap();
        let events = g.drain_events();
        assert_eq!(
            events,
            vec![
                GuardEvent::ProtocolPaused {
                    name: "a".into(),
                    solvency_bps: 8_000,
                    check_number: 4,
                    affected_registrants: 2,
                },
                GuardEvent::GlobalPaused {
                    check_number: 4,
                    affected_registrants: 2,
                },
            ]
        );
        assert_eq!(g.pause_event_count(), 2);
        assert!(g.drain_events().is_empty());
    }
}
