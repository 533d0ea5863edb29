/// Router definitions
use crate::config_struct;

/// Uniswap V2 router on Ethereum mainnet
pub const UNISWAP_V2_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";

config_struct! {
    /// All configured routers
    pub struct RoutersConfig {
        amm: Vec<AmmRouterConfig> = vec![AmmRouterConfig::default()],
        aggregator: AggregatorConfig = AggregatorConfig::default(),
    }
}

config_struct! {
    /// Uniswap-V2 style router contract and the pools it trades through
    pub struct AmmRouterConfig {
        id: String = "uniswap_v2".to_string(),
        name: String = "Uniswap V2".to_string(),
        router_address: String = UNISWAP_V2_ROUTER.to_string(),
        /// LP fee in basis points applied to every pool of this router
        fee_bps: u16 = 30,
        /// Lower value wins ties
        priority: u8 = 0,
        enabled: bool = true,
        pools: Vec<PoolConfig> = Vec::new(),
    }
}

config_struct! {
    /// Pair contract; reserves are a snapshot refreshed from chain when enabled
    pub struct PoolConfig {
        address: String = String::new(),
        token0: String = String::new(),
        token1: String = String::new(),
        reserve0: String = "0".to_string(),
        reserve1: String = "0".to_string(),
    }
}

config_struct! {
    /// Off-chain aggregator with a 0x-style quote API
    pub struct AggregatorConfig {
        enabled: bool = false,
        id: String = "aggregator".to_string(),
        name: String = "0x API".to_string(),
        api_url: String = "https://api.0x.org".to_string(),
        api_key: String = String::new(),
        priority: u8 = 1,
    }
}
