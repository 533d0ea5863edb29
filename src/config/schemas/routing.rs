/// Routing, liquidity and split configuration
use crate::config_struct;

config_struct! {
    /// Liquidity and price impact limits
    pub struct LiquidityConfig {
        max_price_impact_pct: f64 = 15.0,
        /// Maximum share of a pool's input reserve a single hop may consume
        max_reserve_usage_pct: f64 = 30.0,
        /// Minimum output in raw units for a quote to be usable
        min_output_amount: u64 = 1,
    }
}

config_struct! {
    /// Split routing across several AMM paths
    pub struct SplitConfig {
        enabled: bool = true,
        /// Number of chunks the order is divided into
        parts: u32 = 10,
        /// Maximum number of distinct legs
        max_legs: usize = 3,
        /// Minimum net improvement over the best single route
        min_improvement_bps: u16 = 10,
    }
}

config_struct! {
    /// Path search limits
    pub struct RoutingConfig {
        max_hops: usize = 3,
        /// Allowed intermediate tokens; empty allows any token
        connector_tokens: Vec<String> = Vec::new(),
    }
}
