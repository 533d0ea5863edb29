/// Gas-aware decisioning
///
/// Gas limits and the gas price come from config and the chain. Routes are
/// compared net of gas, which needs the gas cost expressed in the token being
/// scored; `gas_cost_in_token` does that conversion when a rate is known.
use crate::config::GasConfig;
use crate::errors::{EngineResult, ExecutionError, RoutingError, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::math::mul_div;
use crate::rpc::ChainClient;
use crate::tokens::{f64_to_u256, gwei_to_wei, u256_to_f64, wei_to_gwei, Token};
use ethers::types::U256;

#[derive(Debug, Clone, PartialEq)]
pub struct GasPolicy {
    pub swap_gas_limit: u64,
    pub extra_hop_gas: u64,
    pub approve_gas_limit: u64,
    pub fallback_gas_price: U256,
    pub use_network_gas_price: bool,
    pub max_gas_price: U256,
    pub max_gas_share_pct: f64,
}

impl GasPolicy {
    pub fn from_config(config: &GasConfig) -> EngineResult<Self> {
        Ok(Self {
            swap_gas_limit: config.swap_gas_limit,
            extra_hop_gas: config.extra_hop_gas,
            approve_gas_limit: config.approve_gas_limit,
            fallback_gas_price: gwei_to_wei(config.fallback_gas_price_gwei)?,
            use_network_gas_price: config.use_network_gas_price,
            max_gas_price: gwei_to_wei(config.max_gas_price_gwei)?,
            max_gas_share_pct: config.max_gas_share_pct,
        })
    }

    /// Gas limit of a router swap through `hops` pools
    pub fn swap_gas(&self, hops: usize) -> u64 {
        let extra = hops.saturating_sub(1) as u64;
        self.swap_gas_limit
            .saturating_add(self.extra_hop_gas.saturating_mul(extra))
    }

    /// Network gas price (or the fallback), capped by `max_gas_price`
    pub async fn resolve_gas_price(&self, chain: &dyn ChainClient) -> EngineResult<U256> {
        let gas_price = if self.use_network_gas_price {
            match chain.gas_price().await {
                Ok(price) if !price.is_zero() => price,
                Ok(_) => self.fallback_gas_price,
                Err(e) => {
                    logger::warning(
                        LogTag::Gas,
                        &format!(
                            "eth_gasPrice failed, using fallback {:.2} gwei: {}",
                            wei_to_gwei(self.fallback_gas_price),
                            e
                        ),
                    );
                    self.fallback_gas_price
                }
            }
        } else {
            self.fallback_gas_price
        };

        if gas_price > self.max_gas_price {
            return Err(SwapEngineError::Execution(ExecutionError::GasPriceTooHigh {
                gas_price,
                max_gas_price: self.max_gas_price,
            }));
        }
        logger::debug(
            LogTag::Gas,
            &format!("Gas price {:.2} gwei", wei_to_gwei(gas_price)),
        );
        Ok(gas_price)
    }

    /// Share of `value` eaten by gas, in percent; fails above `max_gas_share_pct`
    pub fn check_gas_share(&self, gas_cost: U256, value: U256) -> EngineResult<f64> {
        let share_pct = if value.is_zero() {
            100.0
        } else {
            u256_to_f64(gas_cost) / u256_to_f64(value) * 100.0
        };
        if share_pct > self.max_gas_share_pct {
            return Err(SwapEngineError::Routing(RoutingError::GasExceedsValue {
                share_pct,
                max_share_pct: self.max_gas_share_pct,
            }));
        }
        Ok(share_pct)
    }
}

pub fn gas_cost_wei(gas: u64, gas_price: U256) -> EngineResult<U256> {
    gas_price
        .checked_mul(U256::from(gas))
        .ok_or_else(|| SwapEngineError::overflow("gas cost"))
}

/// Gas cost in raw units of `token`
///
/// - `token` is native: the cost itself
/// - the other side of the trade is native: the trade's own rate
///   (`token_amount / other_amount`)
/// - otherwise the native→token spot rate from the pools, if any
pub fn gas_cost_in_token(
    cost_wei: U256,
    token: &Token,
    token_amount: U256,
    other: &Token,
    other_amount: U256,
    native_spot_rate: Option<f64>,
) -> Option<U256> {
    if token.is_native() {
        return Some(cost_wei);
    }
    if other.is_native() && !other_amount.is_zero() {
        return mul_div(cost_wei, token_amount, other_amount).ok();
    }
    native_spot_rate.and_then(|rate| f64_to_u256(u256_to_f64(cost_wei) * rate))
}
