/// Gas configuration
use crate::config_struct;

config_struct! {
    /// Gas limits, pricing and gas-aware decisioning
    pub struct GasConfig {
        /// Gas limit for a single-hop router swap
        swap_gas_limit: u64 = 250_000,
        /// Additional gas per extra hop in a multi-hop path
        extra_hop_gas: u64 = 100_000,
        /// Gas limit for an ERC-20 approve
        approve_gas_limit: u64 = 80_000,
        /// Gas price used when the network price is disabled or unavailable
        fallback_gas_price_gwei: f64 = 5.0,
        use_network_gas_price: bool = true,
        /// Refuse to sign above this gas price
        max_gas_price_gwei: f64 = 300.0,
        /// Reject routes whose gas cost exceeds this share of the output value
        max_gas_share_pct: f64 = 50.0,
    }
}
