// Config schema submodule - one file per config section

use crate::config_struct;
use crate::errors::ConfigurationError;
use ethers::types::{Address, U256};

mod gas;
mod network;
mod routers;
mod routing;
mod swaps;
mod tokens;

pub use gas::*;
pub use network::*;
pub use routers::*;
pub use routing::*;
pub use swaps::*;
pub use tokens::*;

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration structure containing all sub-configurations
    pub struct Config {
        /// Chain connection
        network: NetworkConfig = NetworkConfig::default(),

        /// Signing wallet
        wallet: WalletConfig = WalletConfig::default(),

        /// Swap behaviour (slippage, deadlines, dry run)
        swaps: SwapsConfig = SwapsConfig::default(),

        /// Gas limits, prices and gas-aware route rejection
        gas: GasConfig = GasConfig::default(),

        /// Liquidity and price impact checks
        liquidity: LiquidityConfig = LiquidityConfig::default(),

        /// Split routing across AMM paths
        split: SplitConfig = SplitConfig::default(),

        /// Path search limits
        routing: RoutingConfig = RoutingConfig::default(),

        /// Router definitions
        routers: RoutersConfig = RoutersConfig::default(),

        /// Known tokens (symbol lookup and display)
        tokens: Vec<TokenConfig> = default_tokens(),
    }
}

/// Accepted keys for a top-level table, `None` for unknown sections
pub fn section_fields(section: &str) -> Option<&'static [&'static str]> {
    match section {
        "network" => Some(NetworkConfig::FIELDS),
        "wallet" => Some(WalletConfig::FIELDS),
        "swaps" => Some(SwapsConfig::FIELDS),
        "gas" => Some(GasConfig::FIELDS),
        "liquidity" => Some(LiquidityConfig::FIELDS),
        "split" => Some(SplitConfig::FIELDS),
        "routing" => Some(RoutingConfig::FIELDS),
        "routers" => Some(RoutersConfig::FIELDS),
        _ => None,
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

impl Config {
    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        url::Url::parse(&self.network.rpc_url)
            .map_err(|e| invalid("network.rpc_url", e.to_string()))?;
        check_address("network.wrapped_native", &self.network.wrapped_native)?;
        if self.network.request_timeout_secs == 0 {
            return Err(invalid("network.request_timeout_secs", "must be at least 1"));
        }

        let swaps = &self.swaps;
        if swaps.max_slippage_bps == 0 || swaps.max_slippage_bps > 10_000 {
            return Err(invalid("swaps.max_slippage_bps", "must be within 1..=10000"));
        }
        if swaps.default_slippage_bps == 0 || swaps.default_slippage_bps > swaps.max_slippage_bps {
            return Err(invalid(
                "swaps.default_slippage_bps",
                format!("must be within 1..={}", swaps.max_slippage_bps),
            ));
        }
        if swaps.sell_retry_slippage_bps.is_empty() {
            return Err(invalid("swaps.sell_retry_slippage_bps", "must not be empty"));
        }
        if let Some(bad) = swaps
            .sell_retry_slippage_bps
            .iter()
            .find(|bps| **bps == 0 || **bps > swaps.max_slippage_bps)
        {
            return Err(invalid(
                "swaps.sell_retry_slippage_bps",
                format!("{} bps is outside 1..={}", bad, swaps.max_slippage_bps),
            ));
        }

        let gas = &self.gas;
        if gas.swap_gas_limit == 0 || gas.approve_gas_limit == 0 {
            return Err(invalid("gas", "gas limits must be positive"));
        }
        if !(gas.fallback_gas_price_gwei > 0.0) {
            return Err(invalid("gas.fallback_gas_price_gwei", "must be positive"));
        }
        if gas.max_gas_price_gwei < gas.fallback_gas_price_gwei {
            return Err(invalid(
                "gas.max_gas_price_gwei",
                "must not be below fallback_gas_price_gwei",
            ));
        }
        if !(gas.max_gas_share_pct > 0.0) {
            return Err(invalid("gas.max_gas_share_pct", "must be positive"));
        }

        let liquidity = &self.liquidity;
        if !(liquidity.max_price_impact_pct > 0.0 && liquidity.max_price_impact_pct <= 100.0) {
            return Err(invalid("liquidity.max_price_impact_pct", "must be within (0, 100]"));
        }
        if !(liquidity.max_reserve_usage_pct > 0.0 && liquidity.max_reserve_usage_pct <= 100.0) {
            return Err(invalid("liquidity.max_reserve_usage_pct", "must be within (0, 100]"));
        }
        if liquidity.min_output_amount == 0 {
            return Err(invalid("liquidity.min_output_amount", "must be at least 1"));
        }

        if self.split.parts == 0 || self.split.max_legs == 0 {
            return Err(invalid("split", "parts and max_legs must be at least 1"));
        }
        if self.routing.max_hops == 0 || self.routing.max_hops > 4 {
            return Err(invalid("routing.max_hops", "must be within 1..=4"));
        }
        for (i, connector) in self.routing.connector_tokens.iter().enumerate() {
            check_address(&format!("routing.connector_tokens[{}]", i), connector)?;
        }

        let mut ids = std::collections::HashSet::new();
        for (i, router) in self.routers.amm.iter().enumerate() {
            let prefix = format!("routers.amm[{}]", i);
            if router.id.trim().is_empty() {
                return Err(invalid(&format!("{}.id", prefix), "must not be empty"));
            }
            if !ids.insert(router.id.clone()) {
                return Err(invalid(&format!("{}.id", prefix), format!("duplicate id '{}'", router.id)));
            }
            check_address(&format!("{}.router_address", prefix), &router.router_address)?;
            if router.fee_bps >= 10_000 {
                return Err(invalid(&format!("{}.fee_bps", prefix), "must be below 10000"));
            }
            for (j, pool) in router.pools.iter().enumerate() {
                let pool_prefix = format!("{}.pools[{}]", prefix, j);
                check_address(&format!("{}.address", pool_prefix), &pool.address)?;
                check_address(&format!("{}.token0", pool_prefix), &pool.token0)?;
                check_address(&format!("{}.token1", pool_prefix), &pool.token1)?;
                if pool.token0.eq_ignore_ascii_case(&pool.token1) {
                    return Err(invalid(&pool_prefix, "token0 and token1 must differ"));
                }
                for (field, value) in [("reserve0", &pool.reserve0), ("reserve1", &pool.reserve1)] {
                    U256::from_dec_str(value.trim()).map_err(|e| {
                        invalid(&format!("{}.{}", pool_prefix, field), e.to_string())
                    })?;
                }
            }
        }

        let aggregator = &self.routers.aggregator;
        if aggregator.enabled {
            if ids.contains(&aggregator.id) {
                return Err(invalid(
                    "routers.aggregator.id",
                    format!("duplicate id '{}'", aggregator.id),
                ));
            }
            url::Url::parse(&aggregator.api_url)
                .map_err(|e| invalid("routers.aggregator.api_url", e.to_string()))?;
        }

        for (i, token) in self.tokens.iter().enumerate() {
            check_address(&format!("tokens[{}].address", i), &token.address)?;
            if token.symbol.trim().is_empty() {
                return Err(invalid(&format!("tokens[{}].symbol", i), "must not be empty"));
            }
            if token.decimals > 36 {
                return Err(invalid(&format!("tokens[{}].decimals", i), "must be at most 36"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_address(field: &str, value: &str) -> Result<(), ConfigurationError> {
    value
        .trim()
        .parse::<Address>()
        .map(|_| ())
        .map_err(|e| invalid(field, format!("'{}' is not an address: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.swaps.deadline_secs, 1_200);
        assert_eq!(config.gas.swap_gas_limit, 250_000);
        assert_eq!(config.gas.approve_gas_limit, 80_000);
        assert_eq!(config.swaps.sell_retry_slippage_bps, vec![1_500, 2_500, 3_500, 5_000]);
    }

    #[test]
    fn test_generated_field_lists() {
        assert!(SwapsConfig::FIELDS.contains(&"deadline_secs"));
        assert!(Config::FIELDS.contains(&"routers"));
        assert_eq!(section_fields("split"), Some(SplitConfig::FIELDS));
        assert_eq!(section_fields("trader"), None);
    }

    #[test]
    fn test_rejects_default_slippage_above_cap() {
        let mut config = Config::default();
        config.swaps.default_slippage_bps = 6_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("swaps.default_slippage_bps"));
    }

    #[test]
    fn test_rejects_duplicate_router_ids() {
        let mut config = Config::default();
        config.routers.amm.push(AmmRouterConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate id"));
    }

    #[test]
    fn test_rejects_bad_pool_reserve() {
        let mut config = Config::default();
        config.routers.amm[0].pools.push(PoolConfig {
            address: "0x0000000000000000000000000000000000000001".to_string(),
            token0: "0x0000000000000000000000000000000000000002".to_string(),
            token1: "0x0000000000000000000000000000000000000003".to_string(),
            reserve0: "12abc".to_string(),
            reserve1: "1".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("reserve0"));
    }
}
