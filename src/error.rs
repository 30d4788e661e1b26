/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Error taxonomy shared by the adapters, the engine, the ledger and the guard.
//!
//! Adapter- and batch-level errors abort the cycle that raised them. Advisory
//! reads and missing reference data are degraded locally by the caller and
//! never reach this type unless the caller chooses to surface them.

use alloy_primitives::Address;
use thiserror::Error;

use crate::protocol::ProtocolType;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ReserveError>;

// ---------------------------------------------------------------------------
// ReserveError
// ---------------------------------------------------------------------------

/// Every failure the reserve core can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReserveError {
    /// A protocol `type` string did not name a known adapter.
    #[error("unsupported protocol type: {0}")]
    UnsupportedProtocolType(String),

    /// A ledger submission failed validation; no state was written.
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// A single point read against a chain failed.
    #[error("external read unavailable: {0}")]
    ExternalReadUnavailable(String),

    /// No reference total exists for the given slug.
    #[error("no reference data for {0}")]
    NoReferenceData(String),

    /// The calling identity does not hold the capability for `action`.
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        /// Identity that attempted the call.
        caller: Address,
        /// Privileged operation that was refused.
        action: &'static str,
    },

    /// A consumer tried to watch more protocols than the guard allows.
    #[error("watch list has {count} protocols, limit is {limit}")]
    WatchListTooLong {
        /// Number of distinct names supplied.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The named protocol has never been reported to this component.
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    /// A protocol configuration lacks a contract its adapter must read.
    #[error("protocol {name} is missing its {role} contract")]
    MissingContract {
        /// Protocol name.
        name: String,
        /// Contract role, e.g. `"underlying"`.
        role: &'static str,
    },

    /// Raw readings were shaped for a different adapter family.
    #[error("readings for {name} do not match the {kind} adapter")]
    ReadingsMismatch {
        /// Protocol name.
        name: String,
        /// Adapter the protocol is configured for.
        kind: ProtocolType,
    },

    /// A cycle was started with no protocols to evaluate.
    #[error("cycle has no protocols")]
    EmptyCycle,

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
