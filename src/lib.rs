/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! # ALICE-Reserve
//!
//! Proof-of-reserves monitoring for DeFi lending, staking and vault protocols.
//!
//! Each cycle reads claimed liabilities and actual backing for every
//! configured protocol, scores the batch 0..=100, records it in an
//! append-only ledger and pushes pause flags into a circuit breaker that
//! downstream consumers gate on.
//!
//! - [`protocol`] / [`adapter`]: protocol definitions, read plans and
//!   normalization to [`ProtocolResult`]
//! - [`velocity`]: utilization change tracking between cycles
//! - [`engine`]: [`RiskEngine`] scoring and severity classification
//! - [`ledger`]: [`ReserveLedger`], the append-only record of cycles
//! - [`guard`]: [`CircuitBreaker`] with per-protocol and global pause state
//! - [`config`] / [`cycle`]: JSON configuration and the [`ReserveMonitor`] cycle driver
//!
//! ## Example
//!
//! ```rust
//! use alloy_primitives::Address;
//! use alice_reserve::{
//!     adapter::{normalize, RawReadings},
//!     engine::{ReferenceTotals, RiskEngine, Severity},
//!     guard::CircuitBreaker,
//!     ledger::{ProtocolBatch, ReserveLedger},
//!     limit::RiskLimits,
//!     protocol::{Protocol, ProtocolContracts, ProtocolType},
//! };
//!
//! let owner = Address::repeat_byte(0x0a);
//! let ledger_id = Address::repeat_byte(0x1e);
//! let consumer = Address::repeat_byte(0xc0);
//!
//! let mut ledger = ReserveLedger::new(owner, ledger_id, 100);
//! ledger.set_submitter(owner, owner).unwrap();
//! let mut guard = CircuitBreaker::new(owner, RiskLimits::default());
//! guard.set_updater(owner, ledger_id).unwrap();
//! guard.register(consumer, &["aave-usdc"], 0).unwrap();
//!
//! let aave = Protocol {
//!     name: "aave-usdc".into(),
//!     kind: ProtocolType::Aave,
//!     chain: "ethereum".into(),
//!     decimals: 6,
//!     reference_slug: "aave".into(),
//!     contracts: ProtocolContracts {
//!         primary: Address::with_last_byte(1),
//!         underlying: Some(Address::with_last_byte(2)),
//!         debt_token: Some(Address::with_last_byte(3)),
//!     },
//! };
//!
//! // 1000 deposited, 250 idle, 600 lent out: 85% backed.
//! let readings = RawReadings::MoneyMarket {
//!     deposit_supply: 1_000_000_000,
//!     idle_liquidity: 250_000_000,
//!     total_borrowed: 600_000_000,
//! };
//! let result = normalize(&aave, &readings).unwrap();
//!
//! let mut references = ReferenceTotals::new();
//! references.insert("aave".into(), 10_000);
//! let engine = RiskEngine::default();
//! let assessment = engine
//!     .evaluate(vec![result], &["aave"], &ledger, &references, 1_700_000_000)
//!     .unwrap();
//! assert_eq!(assessment.report.severity, Severity::Critical);
//!
//! let batch = ProtocolBatch::from_assessment(1, &assessment);
//! ledger
//!     .record_cycle(owner, &assessment.report, &batch, Some(&mut guard))
//!     .unwrap();
//!
//! assert_eq!(ledger.last_check_number(), 1);
//! assert!(!guard.is_safe(consumer));
//! assert!(guard.is_safe(Address::ZERO));
//! ```

pub mod adapter;
pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod limit;
pub mod protocol;
pub mod registry;
pub mod velocity;

pub use adapter::ProtocolResult;
pub use config::{MonitorConfig, ScoringProfile};
pub use cycle::{ChainReader, CycleOutcome, ReferenceSource, ReserveMonitor};
pub use engine::{HealthReport, RiskEngine, RiskWeights, Severity};
pub use error::{ReserveError, Result};
pub use guard::CircuitBreaker;
pub use ledger::{GuardPush, ReserveLedger};
pub use limit::RiskLimits;
pub use protocol::{Protocol, ProtocolType};

/// ALICE-Reserve crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
