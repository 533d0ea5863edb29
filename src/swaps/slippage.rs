/// Slippage enforcement
///
/// The tolerance becomes a hard limit in the transaction: a minimum output
/// for exact-in swaps and a maximum input for exact-out swaps. Before a swap
/// is broadcast the route is re-quoted and checked against that limit.
use super::types::{Quote, SwapMode};
use crate::errors::{EngineResult, ExecutionError, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::math::{mul_div, mul_div_up, BPS_DENOMINATOR};
use ethers::types::U256;
use std::time::Duration;

pub fn validate_slippage_bps(bps: u16, max_bps: u16) -> EngineResult<()> {
    let max_bps = max_bps.min(BPS_DENOMINATOR as u16);
    if bps == 0 || bps > max_bps {
        return Err(SwapEngineError::Execution(ExecutionError::InvalidSlippage { bps, max_bps }));
    }
    Ok(())
}

/// `floor(amount * (10000 - bps) / 10000)`, never below one raw unit
pub fn min_output(amount: U256, bps: u16) -> EngineResult<U256> {
    if bps as u64 > BPS_DENOMINATOR {
        return Err(SwapEngineError::Execution(ExecutionError::InvalidSlippage {
            bps,
            max_bps: BPS_DENOMINATOR as u16,
        }));
    }
    let minimum = mul_div(
        amount,
        U256::from(BPS_DENOMINATOR - bps as u64),
        U256::from(BPS_DENOMINATOR),
    )?;
    Ok(minimum.max(U256::one()))
}

/// `ceil(amount * (10000 + bps) / 10000)`
pub fn max_input(amount: U256, bps: u16) -> EngineResult<U256> {
    mul_div_up(
        amount,
        U256::from(BPS_DENOMINATOR + bps as u64),
        U256::from(BPS_DENOMINATOR),
    )
}

/// Compare a fresh quote with the limits of the quote being executed
pub fn check_fresh_quote(executing: &Quote, fresh: &Quote) -> EngineResult<()> {
    match executing.swap_mode {
        SwapMode::ExactIn => {
            let minimum = executing.min_output()?;
            if fresh.output_amount < minimum {
                logger::warning(
                    LogTag::Slippage,
                    &format!(
                        "Pre-flight {}: fresh output {} below minimum {} (quoted {})",
                        executing.router_id, fresh.output_amount, minimum, executing.output_amount
                    ),
                );
                return Err(SwapEngineError::slippage_exceeded(fresh.output_amount, minimum));
            }
        }
        SwapMode::ExactOut => {
            let maximum = executing.max_input()?;
            if fresh.input_amount > maximum {
                logger::warning(
                    LogTag::Slippage,
                    &format!(
                        "Pre-flight {}: fresh input {} above maximum {} (quoted {})",
                        executing.router_id, fresh.input_amount, maximum, executing.input_amount
                    ),
                );
                return Err(SwapEngineError::excessive_input(fresh.input_amount, maximum));
            }
        }
    }
    logger::debug(
        LogTag::Slippage,
        &format!(
            "Pre-flight {} ok: quoted out {}, fresh out {}",
            executing.router_id, executing.output_amount, fresh.output_amount
        ),
    );
    Ok(())
}

/// Slippage steps for sell retries
///
/// Without an explicit tolerance the configured ladder is used as is. An
/// explicit tolerance is tried first, followed by the wider ladder steps.
pub fn sell_ladder(explicit: Option<u16>, configured: &[u16]) -> Vec<u16> {
    match explicit {
        None => configured.to_vec(),
        Some(first) => std::iter::once(first)
            .chain(configured.iter().copied().filter(|bps| *bps > first))
            .collect(),
    }
}

/// Delay before retry `attempt` (0-based): grows linearly with the attempt
pub fn retry_delay(attempt: usize, base_secs: u64) -> Duration {
    Duration::from_secs(base_secs.saturating_mul(attempt as u64 + 1))
}
