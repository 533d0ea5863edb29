/// Chain connection and wallet configuration
use crate::config_struct;

/// Canonical WETH on Ethereum mainnet
pub const MAINNET_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

config_struct! {
    /// JSON-RPC endpoint and chain identity
    pub struct NetworkConfig {
        rpc_url: String = "http://127.0.0.1:8545".to_string(),
        chain_id: u64 = 1,
        /// Symbol accepted on the command line for the native coin
        native_symbol: String = "ETH".to_string(),
        /// Wrapped native token used inside pool paths
        wrapped_native: String = MAINNET_WETH.to_string(),
        request_timeout_secs: u64 = 15,
        retry_attempts: u32 = 3,
        retry_delay_ms: u64 = 500,
    }
}

config_struct! {
    /// Signing wallet
    pub struct WalletConfig {
        /// Hex private key (with or without 0x prefix)
        private_key: String = String::new(),
    }
}
