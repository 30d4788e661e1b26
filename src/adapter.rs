/*
    ALICE-Reserve
    Copyright (C) 2026 Moroya Sakamoto
*/

//! Protocol adapters: raw on-chain balances to `(claimed, actual)` amounts.
//!
//! Each adapter family reads a different pair of balances but produces the
//! same [`ProtocolResult`]. Raw values are divided by `10^decimals` before any
//! ratio is taken, and every ratio is an integer basis-point value computed
//! with `u128` intermediates so large supplies cannot overflow.

use serde::{Deserialize, Serialize};

use crate::error::{ReserveError, Result};
use crate::limit::BPS_DENOMINATOR;
use crate::protocol::{Protocol, ProtocolType};

const BPS: u128 = BPS_DENOMINATOR as u128;

// ---------------------------------------------------------------------------
// Ratio helpers
// ---------------------------------------------------------------------------

/// `floor(actual * 10000 / claimed)`, or 10000 when nothing is claimed.
///
/// An empty pool is defined as fully backed rather than a division error.
/// Over-collateralised pools report values above 10000.
#[inline(always)]
pub fn solvency_bps(claimed: u128, actual: u128) -> u32 {
    if claimed == 0 {
        return BPS_DENOMINATOR;
    }
    ratio_bps(actual, claimed)
}

/// `floor(part * 10000 / whole)`, or 0 when `whole` is zero.
#[inline(always)]
pub fn ratio_bps(part: u128, whole: u128) -> u32 {
    if whole == 0 {
        return 0;
    }
    let bps = part.saturating_mul(BPS) / whole;
    bps.min(u32::MAX as u128) as u32
}

/// Divide a raw token amount by `10^decimals`.
#[inline(always)]
pub fn normalize_amount(raw: u128, decimals: u8) -> u128 {
    match 10u128.checked_pow(decimals as u32) {
        Some(scale) => raw / scale,
        None => 0,
    }
}

// ---------------------------------------------------------------------------
// RawReadings
// ---------------------------------------------------------------------------

/// Raw balances read for one protocol, shaped by adapter family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReadings {
    /// Aave / Compound style money market.
    MoneyMarket {
        deposit_supply: u128,
        idle_liquidity: u128,
        total_borrowed: u128,
    },
    /// Lido style liquid staking token.
    LiquidStaking {
        token_supply: u128,
        pooled_underlying: u128,
    },
    /// ERC-4626 style share vault.
    ShareVault { total_shares: u128, total_assets: u128 },
}

impl RawReadings {
    /// Assemble readings from values returned for [`Protocol::read_plan`], in
    /// plan order.
    pub fn from_plan_values(protocol: &Protocol, values: &[u128]) -> Result<Self> {
        let mismatch = || ReserveError::ReadingsMismatch {
            name: protocol.name.clone(),
            kind: protocol.kind,
        };
        match (protocol.kind, values) {
            (ProtocolType::Aave | ProtocolType::Compound, &[supply, idle, borrowed]) => {
                Ok(RawReadings::MoneyMarket {
                    deposit_supply: supply,
                    idle_liquidity: idle,
                    total_borrowed: borrowed,
                })
            }
            (ProtocolType::Lido, &[supply, pooled]) => Ok(RawReadings::LiquidStaking {
                token_supply: supply,
                pooled_underlying: pooled,
            }),
            (ProtocolType::Erc4626, &[shares, assets]) => Ok(RawReadings::ShareVault {
                total_shares: shares,
                total_assets: assets,
            }),
            _ => Err(mismatch()),
        }
    }
}

// ---------------------------------------------------------------------------
// ProtocolResult
// ---------------------------------------------------------------------------

/// Per-protocol metrics for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolResult {
    /// Protocol name, unique within the deployment.
    pub name: String,
    /// Adapter family that produced this result.
    pub kind: ProtocolType,
    /// Chain the protocol was read on.
    pub chain: String,
    /// Liability owed to depositors, in whole tokens.
    pub claimed: u128,
    /// Backing accounted for, in whole tokens.
    pub actual: u128,
    /// `actual / claimed` in basis points; 10000 when nothing is claimed.
    pub solvency_bps: u32,
    /// Borrowed share of deposits, backing gap for staking tokens, 0 for vaults.
    pub utilization_bps: u32,
}

/// Run the adapter for `protocol` over its raw `readings`.
///
/// Fails with [`ReserveError::ReadingsMismatch`] if the readings belong to a
/// different adapter family.
pub fn normalize(protocol: &Protocol, readings: &RawReadings) -> Result<ProtocolResult> {
    let scale = |raw: u128| normalize_amount(raw, protocol.decimals);

    let (claimed, actual, utilization) = match (protocol.kind, *readings) {
        (
            ProtocolType::Aave | ProtocolType::Compound,
            RawReadings::MoneyMarket {
                deposit_supply,
                idle_liquidity,
                total_borrowed,
            },
        ) => {
            let claimed = scale(deposit_supply);
            let borrowed = scale(total_borrowed);
            // Lent-out funds count as backing even though the pool does not hold them.
            let actual = scale(idle_liquidity).saturating_add(borrowed);
            (claimed, actual, Some(ratio_bps(borrowed, claimed)))
        }
        (
            ProtocolType::Lido,
            RawReadings::LiquidStaking {
                token_supply,
                pooled_underlying,
            },
        ) => (scale(token_supply), scale(pooled_underlying), None),
        (
            ProtocolType::Erc4626,
            RawReadings::ShareVault {
                total_shares,
                total_assets,
            },
        ) => (scale(total_shares), scale(total_assets), Some(0)),
        (kind, _) => {
            return Err(ReserveError::ReadingsMismatch {
                name: protocol.name.clone(),
                kind,
            })
        }
    };

    let solvency = solvency_bps(claimed, actual);
    // Staking tokens have no borrow side; the backing gap stands in for utilization.
    let utilization_bps = utilization.unwrap_or_else(|| BPS_DENOMINATOR.saturating_sub(solvency));

    Ok(ProtocolResult {
        name: protocol.name.clone(),
        kind: protocol.kind,
        chain: protocol.chain.clone(),
        claimed,
        actual,
        solvency_bps: solvency,
        utilization_bps,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
