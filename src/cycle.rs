/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! One evaluation cycle, end to end.
//!
//! [`ReserveMonitor::run_cycle`] reads every protocol at a block height fixed
//! per chain at cycle start, normalizes the readings, fetches reference
//! totals, scores the batch and commits it to the ledger (which pushes the
//! guard). Chain access and reference data sit behind [`ChainReader`] and
//! [`ReferenceSource`] so the cycle itself is deterministic.
//!
//! Failure policy: a failed protocol read aborts the cycle before anything
//! is written. A failed reference fetch or advisory counter read only
//! degrades the cycle.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use crate::adapter::{normalize, ProtocolResult, RawReadings};
use crate::config::{LedgerContract, MonitorConfig};
use crate::engine::{CycleAssessment, ReferenceTotals, RiskEngine};
use crate::error::{ReserveError, Result};
use crate::guard::{CircuitBreaker, GuardEvent};
use crate::ledger::{CycleReceipt, ProtocolBatch, ReserveLedger};
use crate::protocol::{Protocol, ReadCall};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read-only access to the monitored chains.
pub trait ChainReader {
    /// Current block height of `chain`.
    fn block_height(&self, chain: &str) -> Result<u64>;

    /// Execute `call` on `chain` as of `height`.
    fn read(&self, chain: &str, call: &ReadCall, height: u64) -> Result<u128>;
}

/// Independent totals used for cross-referencing.
pub trait ReferenceSource {
    /// Reference total for `slug`, in whole tokens. `Ok(None)` means the
    /// source has no figure for it.
    fn reference_total(&self, slug: &str) -> Result<Option<u128>>;
}

// ---------------------------------------------------------------------------
// ReserveMonitor
// ---------------------------------------------------------------------------

/// What one cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Check number predicted from the on-ledger counter. The receipt holds
    /// the number the ledger actually assigned.
    pub advisory_check_number: u64,
    /// Ledger receipt, including the guard push outcome.
    pub receipt: CycleReceipt,
    /// Scored cycle, with the report's check number set from the receipt.
    pub assessment: CycleAssessment,
    /// Events drained from the guard after the push, oldest first. Empty
    /// when no guard was attached.
    pub guard_events: Vec<GuardEvent>,
}

/// Runs evaluation cycles over a fixed set of protocols.
#[derive(Debug, Clone)]
pub struct ReserveMonitor {
    protocols: Vec<Protocol>,
    engine: RiskEngine,
    submitter: Address,
    ledger_contract: Option<LedgerContract>,
}

impl ReserveMonitor {
    /// Create a monitor that submits cycles as `submitter`.
    pub fn new(protocols: Vec<Protocol>, engine: RiskEngine, submitter: Address) -> Result<Self> {
        if protocols.is_empty() {
            return Err(ReserveError::EmptyCycle);
        }
        Ok(Self {
            protocols,
            engine,
            submitter,
            ledger_contract: None,
        })
    }

    /// Build a monitor from validated configuration.
    pub fn from_config(config: &MonitorConfig, submitter: Address) -> Result<Self> {
        let mut monitor = Self::new(config.build_protocols()?, config.engine(), submitter)?;
        monitor.ledger_contract = config.ledger_contract.clone();
        Ok(monitor)
    }

    /// Read the advisory check counter from `contract` at the start of each cycle.
    pub fn with_ledger_contract(mut self, contract: LedgerContract) -> Self {
        self.ledger_contract = Some(contract);
        self
    }

    /// Protocols evaluated each cycle, in order.
    #[inline(always)]
    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Scoring engine.
    #[inline(always)]
    pub fn engine(&self) -> &RiskEngine {
        &self.engine
    }

    /// Identity cycles are submitted as.
    #[inline(always)]
    pub fn submitter(&self) -> Address {
        self.submitter
    }

    /// Run one cycle and commit it to `ledger`.
    ///
    /// `guard`, when given, receives the ledger's best-effort push; its
    /// outcome is reported in the receipt rather than as an error. The
    /// guard's event outbox is drained into the outcome.
    pub fn run_cycle(
        &self,
        reader: &impl ChainReader,
        references: &impl ReferenceSource,
        ledger: &mut ReserveLedger,
        mut guard: Option<&mut CircuitBreaker>,
        now: u64,
    ) -> Result<CycleOutcome> {
        let advisory_check_number = self.advisory_check_number(reader, ledger);
        info!(
            advisory_check_number,
            protocols = self.protocols.len(),
            "starting reserve cycle"
        );

        let results = self.read_protocols(reader)?;
        let totals = self.fetch_references(references);
        let slugs: Vec<&str> = self
            .protocols
            .iter()
            .map(|p| p.reference_slug.as_str())
            .collect();

        let mut assessment = self.engine.evaluate(results, &slugs, &*ledger, &totals, now)?;
        assessment.report.check_number = advisory_check_number;
        let batch = ProtocolBatch::from_assessment(advisory_check_number, &assessment);

        let receipt =
            ledger.record_cycle(self.submitter, &assessment.report, &batch, guard.as_deref_mut())?;
        assessment.report.check_number = receipt.check_number;
        let guard_events = guard.map(CircuitBreaker::drain_events).unwrap_or_default();

        info!(
            check_number = receipt.check_number,
            risk_score = assessment.report.risk_score,
            severity = ?assessment.report.severity,
            first_run = assessment.first_run,
            "reserve cycle complete"
        );

        Ok(CycleOutcome {
            advisory_check_number,
            receipt,
            assessment,
            guard_events,
        })
    }

    /// Predict the next check number.
    ///
    /// With a configured ledger contract this is its counter plus one, or 1
    /// if the read fails. Without one the local ledger is used.
    pub fn advisory_check_number(&self, reader: &impl ChainReader, ledger: &ReserveLedger) -> u64 {
        let Some(contract) = &self.ledger_contract else {
            return ledger.last_check_number() + 1;
        };
        let call = ReadCall::CheckCounter {
            ledger: contract.address,
        };
        let counter = reader
            .block_height(&contract.chain)
            .and_then(|height| reader.read(&contract.chain, &call, height));

        match counter.map(u64::try_from) {
            Ok(Ok(total)) => total.saturating_add(1),
            Ok(Err(_)) => {
                warn!("check counter out of range, assuming first check");
                1
            }
            Err(err) => {
                warn!(error = %err, "check counter unavailable, assuming first check");
                1
            }
        }
    }

    /// Read and normalize every protocol.
    ///
    /// Each chain's height is fetched once, before any protocol read, and all
    /// reads on that chain use it. The first failure aborts.
    pub fn read_protocols(&self, reader: &impl ChainReader) -> Result<Vec<ProtocolResult>> {
        let mut heights: HashMap<&str, u64> = HashMap::new();
        for protocol in &self.protocols {
            let chain = protocol.chain.as_str();
            if !heights.contains_key(chain) {
                let height = reader.block_height(chain)?;
                debug!(chain, height, "anchored chain height");
                heights.insert(chain, height);
            }
        }

        let mut results = Vec::with_capacity(self.protocols.len());
        for protocol in &self.protocols {
            let height = heights
                .get(protocol.chain.as_str())
                .copied()
                .ok_or_else(|| ReserveError::ExternalReadUnavailable(protocol.chain.clone()))?;

            let values = protocol
                .read_plan()?
                .iter()
                .map(|call| reader.read(&protocol.chain, call, height))
                .collect::<Result<Vec<u128>>>()?;
            let readings = RawReadings::from_plan_values(protocol, &values)?;
            let result = normalize(protocol, &readings)?;

            debug!(
                protocol = %result.name,
                height,
                claimed = %result.claimed,
                actual = %result.actual,
                solvency_bps = result.solvency_bps,
                "read protocol"
            );
            results.push(result);
        }
        Ok(results)
    }

    /// Fetch reference totals for every distinct slug that is scored against one.
    ///
    /// Errors and absent figures leave the slug out of the map.
    pub fn fetch_references(&self, source: &impl ReferenceSource) -> ReferenceTotals {
        let mut totals = ReferenceTotals::new();
        let mut seen = HashSet::new();

        for protocol in &self.protocols {
            if protocol.kind.is_liquid_staking() || !seen.insert(protocol.reference_slug.as_str()) {
                continue;
            }
            match source.reference_total(&protocol.reference_slug) {
                Ok(Some(total)) => {
                    totals.insert(protocol.reference_slug.clone(), total);
                }
                Ok(None) => warn!(slug = %protocol.reference_slug, "no reference data"),
                Err(err) => warn!(
                    slug = %protocol.reference_slug,
                    error = %err,
                    "reference fetch failed"
                ),
            }
        }
        totals
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Severity;
    use crate::guard::GuardEvent;
    use crate::ledger::GuardPush;
    use crate::limit::RiskLimits;
    use crate::protocol::{ProtocolContracts, ProtocolType};
    use crate::velocity::Direction;
    use std::cell::RefCell;

    const OWNER: Address = Address::new([0x0A; 20]);
    const IDENTITY: Address = Address::new([0x1E; 20]);
    const SUBMITTER: Address = Address::new([0x5B; 20]);
    const ADMIN: Address = Address::new([0xAD; 20]);
    const CONSUMER: Address = Address::new([0xC0; 20]);
    const STRANGER: Address = Address::new([0xEE; 20]);
    const COUNTER: Address = Address::new([0xCC; 20]);

    // -----------------------------------------------------------------------
    // Fakes
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct FakeChain {
        heights: HashMap<String, u64>,
        values: HashMap<(Address, [u8; 4]), u128>,
        failing: HashSet<Address>,
        height_calls: RefCell<Vec<String>>,
        reads: RefCell<Vec<(String, u64)>>,
    }

    impl FakeChain {
        fn with_heights(heights: &[(&str, u64)]) -> Self {
            Self {
                heights: heights.iter().map(|(c, h)| (c.to_string(), *h)).collect(),
                ..Self::default()
            }
        }

        fn set(&mut self, call: ReadCall, value: u128) {
            self.values.insert((call.target(), call.selector()), value);
        }

        fn load(&mut self, protocol: &Protocol, values: &[u128]) {
            for (call, value) in protocol.read_plan().unwrap().into_iter().zip(values) {
                self.set(call, *value);
            }
        }
    }

    impl ChainReader for FakeChain {
        fn block_height(&self, chain: &str) -> Result<u64> {
            self.height_calls.borrow_mut().push(chain.to_string());
            self.heights
                .get(chain)
                .copied()
                .ok_or_else(|| ReserveError::ExternalReadUnavailable(format!("no rpc for {chain}")))
        }

        fn read(&self, chain: &str, call: &ReadCall, height: u64) -> Result<u128> {
            self.reads.borrow_mut().push((chain.to_string(), height));
            if self.failing.contains(&call.target()) {
                return Err(ReserveError::ExternalReadUnavailable(call.signature().into()));
            }
            self.values
                .get(&(call.target(), call.selector()))
                .copied()
                .ok_or_else(|| ReserveError::ExternalReadUnavailable(call.signature().into()))
        }
    }

    #[derive(Default)]
    struct FakeReferences {
        totals: HashMap<String, u128>,
        broken: bool,
    }

    impl FakeReferences {
        fn with(totals: &[(&str, u128)]) -> Self {
            Self {
                totals: totals.iter().map(|(s, t)| (s.to_string(), *t)).collect(),
                broken: false,
            }
        }
    }

    impl ReferenceSource for FakeReferences {
        fn reference_total(&self, slug: &str) -> Result<Option<u128>> {
            if self.broken {
                return Err(ReserveError::NoReferenceData(slug.into()));
            }
            Ok(self.totals.get(slug).copied())
        }
    }

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    fn aave() -> Protocol {
        Protocol {
            name: "aave-usdc".into(),
            kind: ProtocolType::Aave,
            chain: "ethereum".into(),
            decimals: 6,
            reference_slug: "aave".into(),
            contracts: ProtocolContracts {
                primary: Address::with_last_byte(1),
                underlying: Some(Address::with_last_byte(2)),
                debt_token: Some(Address::with_last_byte(3)),
            },
        }
    }

    fn lido() -> Protocol {
        Protocol {
            name: "steth".into(),
            kind: ProtocolType::Lido,
            chain: "ethereum".into(),
            decimals: 18,
            reference_slug: "lido".into(),
            contracts: ProtocolContracts {
                primary: Address::with_last_byte(4),
                underlying: None,
                debt_token: None,
            },
        }
    }

    fn vault() -> Protocol {
        Protocol {
            name: "yield-vault".into(),
            kind: ProtocolType::Erc4626,
            chain: "base".into(),
            decimals: 0,
            reference_slug: "vault".into(),
            contracts: ProtocolContracts {
                primary: Address::with_last_byte(5),
                underlying: None,
                debt_token: None,
            },
        }
    }

    const USDC: u128 = 1_000_000;
    const ETH: u128 = 1_000_000_000_000_000_000;

    /// Aave at `idle`/`borrowed` against 1000 deposits, a fully backed stETH
    /// and a fully backed vault.
    fn chain_with_aave(idle: u128, borrowed: u128) -> FakeChain {
        let mut chain = FakeChain::with_heights(&[("ethereum", 19_000_000), ("base", 8_000_000)]);
        chain.load(&aave(), &[1_000 * USDC, idle * USDC, borrowed * USDC]);
        chain.load(&lido(), &[1_000 * ETH, 1_000 * ETH]);
        chain.load(&vault(), &[500, 500]);
        chain
    }

    fn references() -> FakeReferences {
        FakeReferences::with(&[("aave", 10_000), ("vault", 5_000)])
    }

    fn monitor() -> ReserveMonitor {
        let protocols = vec![aave(), lido(), vault()];
        ReserveMonitor::new(protocols, RiskEngine::default(), SUBMITTER).unwrap()
    }

    fn ledger() -> ReserveLedger {
        let mut ledger = ReserveLedger::new(OWNER, IDENTITY, 100);
        ledger.set_submitter(OWNER, SUBMITTER).unwrap();
        ledger
    }

    fn guard() -> CircuitBreaker {
        let mut guard = CircuitBreaker::new(ADMIN, RiskLimits::default());
        guard.set_updater(ADMIN, IDENTITY).unwrap();
        guard
    }

    // -----------------------------------------------------------------------
    // Full cycles
    // -----------------------------------------------------------------------

    #[test]
    fn test_healthy_first_cycle() {
        let mut ledger = ledger();
        let mut guard = guard();
        let outcome = monitor()
            .run_cycle(
                &chain_with_aave(400, 600),
                &references(),
                &mut ledger,
                Some(&mut guard),
                1_000,
            )
            .unwrap();

        assert_eq!(outcome.receipt.check_number, 1);
        assert_eq!(outcome.advisory_check_number, 1);
        assert!(outcome.assessment.first_run);
        let report = &outcome.assessment.report;
        assert_eq!(report.check_number, 1);
        assert_eq!(report.risk_score, 0);
        assert_eq!(report.severity, Severity::Healthy);
        assert!(!report.anomaly_detected);
        // stETH is excluded from reserve totals.
        assert_eq!(report.total_claimed, 1_500);
        assert_eq!(report.total_actual, 1_500);

        assert!(matches!(outcome.receipt.guard, GuardPush::Applied(_)));
        assert!(!guard.is_globally_paused());
        assert_eq!(ledger.get_previous("aave-usdc"), 6_000);
        assert_eq!(ledger.latest_report(), Some(report));
    }

    #[test]
    fn test_second_cycle_scores_utilization_spike() {
        let monitor = monitor();
        let mut ledger = ledger();
        monitor
            .run_cycle(&chain_with_aave(400, 600), &references(), &mut ledger, None, 1_000)
            .unwrap();
        let outcome = monitor
            .run_cycle(&chain_with_aave(200, 800), &references(), &mut ledger, None, 2_000)
            .unwrap();

        assert!(!outcome.assessment.first_run);
        let aave = &outcome.assessment.velocities[0];
        assert_eq!(aave.delta_bps, 2_000);
        assert_eq!(aave.direction, Direction::Increasing);
        assert!(aave.is_alert);
        // +15 for the alert, +20 for crossing three times the threshold.
        assert_eq!(outcome.assessment.breakdown.velocity, 35);
        assert_eq!(outcome.assessment.report.risk_score, 35);
        assert_eq!(outcome.assessment.report.severity, Severity::Warning);
        assert!(outcome.assessment.report.anomaly_detected);
        assert_eq!(outcome.receipt.check_number, 2);
        assert_eq!(outcome.receipt.guard, GuardPush::Skipped);
        assert_eq!(ledger.protocol_by_name("aave-usdc").unwrap().velocity_bps, 2_000);
    }

    #[test]
    fn test_first_run_ignores_large_utilization() {
        let mut ledger = ledger();
        let outcome = monitor()
            .run_cycle(&chain_with_aave(50, 950), &references(), &mut ledger, None, 1_000)
            .unwrap();
        assert!(outcome.assessment.first_run);
        assert_eq!(outcome.assessment.breakdown.velocity, 0);
        assert!(outcome.assessment.velocities.iter().all(|v| !v.is_alert));
    }

    #[test]
    fn test_critical_cycle_cascades_to_guard() {
        let mut ledger = ledger();
        let mut guard = guard();
        guard.register(CONSUMER, &["steth"], 0).unwrap();

        // 250 idle + 600 borrowed against 1000 deposits: 85% backed.
        let outcome = monitor()
            .run_cycle(
                &chain_with_aave(250, 600),
                &references(),
                &mut ledger,
                Some(&mut guard),
                1_000,
            )
            .unwrap();

        let report = &outcome.assessment.report;
        assert_eq!(report.worst_solvency_bps, 8_500);
        assert_eq!(report.risk_score, 25);
        assert_eq!(report.severity, Severity::Critical);
        assert!(report.anomaly_detected);

        match &outcome.receipt.guard {
            GuardPush::Applied(t) => {
                assert!(t.global_paused);
                assert_eq!(t.newly_paused, vec!["aave-usdc".to_string()]);
            }
            other => panic!("unexpected push outcome {other:?}"),
        }
        assert!(guard.is_globally_paused());
        assert!(!guard.is_protocol_safe("aave-usdc"));
        assert!(guard.is_protocol_safe("steth"));
        assert!(!guard.is_safe(CONSUMER));
        assert!(guard.is_safe(STRANGER));
        assert_eq!(guard.pause_event_count(), 2);
        assert!(outcome
            .guard_events
            .iter()
            .any(|e| matches!(e, GuardEvent::GlobalPaused { check_number: 1, .. })));
    }

    #[test]
    fn test_cycle_drains_guard_events() {
        let mut ledger = ledger();
        let mut guard = guard();
        guard.register(CONSUMER, &["aave-usdc"], 0).unwrap();

        let outcome = monitor()
            .run_cycle(
                &chain_with_aave(250, 600),
                &references(),
                &mut ledger,
                Some(&mut guard),
                1_000,
            )
            .unwrap();
        assert_eq!(
            outcome.guard_events,
            vec![
                GuardEvent::Registered {
                    consumer: CONSUMER,
                    watched: 1,
                },
                GuardEvent::ProtocolPaused {
                    name: "aave-usdc".into(),
                    solvency_bps: 8_500,
                    check_number: 1,
                    affected_registrants: 1,
                },
                GuardEvent::GlobalPaused {
                    check_number: 1,
                    affected_registrants: 1,
                },
            ]
        );
        assert!(guard.drain_events().is_empty());

        let outcome = monitor()
            .run_cycle(&chain_with_aave(400, 600), &references(), &mut ledger, None, 2_000)
            .unwrap();
        assert!(outcome.guard_events.is_empty());
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[test]
    fn test_failed_read_aborts_without_writing() {
        let mut chain = chain_with_aave(400, 600);
        chain.failing.insert(vault().contracts.primary);
        let mut ledger = ledger();
        let mut guard = guard();

        let err = monitor()
            .run_cycle(&chain, &references(), &mut ledger, Some(&mut guard), 1_000)
            .unwrap_err();
        assert!(matches!(err, ReserveError::ExternalReadUnavailable(_)));
        assert_eq!(ledger.last_check_number(), 0);
        assert_eq!(ledger.stats().total_checks, 0);
        assert!(ledger.latest_report().is_none());
        assert!(guard.tracked_protocols().is_empty());
    }

    #[test]
    fn test_unreachable_chain_aborts() {
        let mut chain = chain_with_aave(400, 600);
        chain.heights.remove("base");
        let mut ledger = ledger();
        assert!(monitor()
            .run_cycle(&chain, &references(), &mut ledger, None, 1_000)
            .is_err());
        assert_eq!(ledger.last_check_number(), 0);
    }

    #[test]
    fn test_missing_reference_adds_penalty() {
        let mut ledger = ledger();
        let refs = FakeReferences::with(&[("vault", 5_000)]);
        let outcome = monitor()
            .run_cycle(&chain_with_aave(400, 600), &refs, &mut ledger, None, 1_000)
            .unwrap();
        assert_eq!(outcome.assessment.breakdown.cross_reference, 5);
        assert_eq!(outcome.assessment.report.severity, Severity::Healthy);
        assert!(outcome.assessment.report.anomaly_detected);
    }

    #[test]
    fn test_reference_outage_degrades_cycle() {
        let mut ledger = ledger();
        let refs = FakeReferences {
            broken: true,
            ..FakeReferences::default()
        };
        let outcome = monitor()
            .run_cycle(&chain_with_aave(400, 600), &refs, &mut ledger, None, 1_000)
            .unwrap();
        // Both non-staking protocols lose their reference.
        assert_eq!(outcome.assessment.breakdown.cross_reference, 10);
        assert_eq!(outcome.receipt.check_number, 1);
    }

    #[test]
    fn test_references_skip_staking_and_duplicates() {
        let mut second = aave();
        second.name = "aave-usdt".into();
        let protocols = vec![aave(), second, lido()];
        let monitor = ReserveMonitor::new(protocols, RiskEngine::default(), SUBMITTER).unwrap();
        let totals = monitor.fetch_references(&FakeReferences::with(&[("aave", 7), ("lido", 9)]));
        assert_eq!(totals.len(), 1);
        assert_eq!(totals.get("aave"), Some(&7));
    }

    // -----------------------------------------------------------------------
    // Anchoring and advisory counter
    // -----------------------------------------------------------------------

    #[test]
    fn test_reads_anchor_one_height_per_chain() {
        let chain = chain_with_aave(400, 600);
        monitor().read_protocols(&chain).unwrap();

        let mut calls = chain.height_calls.borrow().clone();
        calls.sort();
        assert_eq!(calls, vec!["base".to_string(), "ethereum".to_string()]);
        for (name, height) in chain.reads.borrow().iter() {
            assert_eq!(Some(height), chain.heights.get(name));
        }
        // 3 aave reads, 2 lido, 2 vault.
        assert_eq!(chain.reads.borrow().len(), 7);
    }

    #[test]
    fn test_advisory_counter_read() {
        let mut chain = chain_with_aave(400, 600);
        chain.set(ReadCall::CheckCounter { ledger: COUNTER }, 41);
        let monitor = monitor().with_ledger_contract(LedgerContract {
            chain: "ethereum".into(),
            address: COUNTER,
        });
        let mut ledger = ledger();
        let outcome = monitor
            .run_cycle(&chain, &references(), &mut ledger, None, 1_000)
            .unwrap();
        assert_eq!(outcome.advisory_check_number, 42);
        // The ledger still assigns its own sequence.
        assert_eq!(outcome.receipt.check_number, 1);
    }

    #[test]
    fn test_advisory_counter_failure_degrades_to_one() {
        let chain = chain_with_aave(400, 600);
        let monitor = monitor().with_ledger_contract(LedgerContract {
            chain: "ethereum".into(),
            address: COUNTER,
        });
        assert_eq!(monitor.advisory_check_number(&chain, &ledger()), 1);
    }

    #[test]
    fn test_advisory_without_contract_follows_ledger() {
        let monitor = monitor();
        let mut ledger = ledger();
        let chain = chain_with_aave(400, 600);
        monitor.run_cycle(&chain, &references(), &mut ledger, None, 1).unwrap();
        assert_eq!(monitor.advisory_check_number(&chain, &ledger), 2);
    }

    #[test]
    fn test_empty_monitor_rejected() {
        assert_eq!(
            ReserveMonitor::new(Vec::new(), RiskEngine::default(), SUBMITTER).unwrap_err(),
            ReserveError::EmptyCycle
        );
    }

    #[test]
    fn test_from_config() {
        let json = r#"{
            "ledger_contract": {
                "chain": "ethereum",
                "address": "0xcccccccccccccccccccccccccccccccccccccccc"
            },
            "protocols": [{
                "name": "yield-vault",
                "type": "erc4626",
                "chain": "base",
                "decimals": 0,
                "reference_slug": "vault",
                "contracts": { "primary": "0x0000000000000000000000000000000000000005" }
            }]
        }"#;
        let config = MonitorConfig::from_json(json).unwrap();
        let monitor = ReserveMonitor::from_config(&config, SUBMITTER).unwrap();
        assert_eq!(monitor.protocols(), &[vault()]);
        assert_eq!(monitor.submitter(), SUBMITTER);

        let mut chain = chain_with_aave(400, 600);
        chain.set(ReadCall::CheckCounter { ledger: COUNTER }, 6);
        assert_eq!(monitor.advisory_check_number(&chain, &ledger()), 7);
    }
}
