/// Liquidity checks applied to every quote before it can win
use super::types::{Quote, RouteHop};
use crate::config::LiquidityConfig;
use crate::errors::{EngineResult, RoutingError, SwapEngineError};
use crate::tokens::{apply_percentage, short_address};
use ethers::types::U256;

#[derive(Debug, Clone, PartialEq)]
pub struct LiquidityLimits {
    pub max_price_impact_pct: f64,
    pub max_reserve_usage_pct: f64,
    pub min_output_amount: U256,
}

impl LiquidityLimits {
    pub fn from_config(config: &LiquidityConfig) -> Self {
        Self {
            max_price_impact_pct: config.max_price_impact_pct,
            max_reserve_usage_pct: config.max_reserve_usage_pct,
            min_output_amount: U256::from(config.min_output_amount.max(1)),
        }
    }
}

pub fn check_hop(hop: &RouteHop, limits: &LiquidityLimits) -> EngineResult<()> {
    let pool = short_address(&hop.pool);
    if hop.reserve_in.is_zero() || hop.reserve_out.is_zero() {
        return Err(SwapEngineError::insufficient_liquidity(pool, "empty reserves"));
    }
    let usable = apply_percentage(hop.reserve_in, limits.max_reserve_usage_pct)?;
    if hop.amount_in > usable {
        return Err(SwapEngineError::insufficient_liquidity(
            pool,
            format!(
                "input {} is more than {:.1}% of reserve {}",
                hop.amount_in, limits.max_reserve_usage_pct, hop.reserve_in
            ),
        ));
    }
    if hop.amount_out.is_zero() || hop.amount_out >= hop.reserve_out {
        return Err(SwapEngineError::insufficient_liquidity(
            pool,
            format!("output {} against reserve {}", hop.amount_out, hop.reserve_out),
        ));
    }
    Ok(())
}

/// Hop checks, price impact cap and minimum output
pub fn check_quote(quote: &Quote, limits: &LiquidityLimits) -> EngineResult<()> {
    for hop in &quote.hops {
        check_hop(hop, limits)?;
    }
    if quote.price_impact_pct > limits.max_price_impact_pct {
        return Err(SwapEngineError::Routing(RoutingError::PriceImpactTooHigh {
            impact_pct: quote.price_impact_pct,
            max_pct: limits.max_price_impact_pct,
        }));
    }
    if quote.output_amount < limits.min_output_amount {
        return Err(SwapEngineError::Routing(RoutingError::OutputTooSmall {
            output: quote.output_amount,
            minimum: limits.min_output_amount,
        }));
    }
    Ok(())
}
