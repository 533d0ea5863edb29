/// Known token list
use super::network::MAINNET_WETH;
use crate::config_struct;

config_struct! {
    /// Token metadata used for symbol lookup and display
    pub struct TokenConfig {
        address: String = String::new(),
        symbol: String = String::new(),
        decimals: u8 = 18,
    }
}

pub fn default_tokens() -> Vec<TokenConfig> {
    vec![
        TokenConfig {
            address: MAINNET_WETH.to_string(),
            symbol: "WETH".to_string(),
            decimals: 18,
        },
        TokenConfig {
            address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            symbol: "USDC".to_string(),
            decimals: 6,
        },
        TokenConfig {
            address: "0x6B175474E89094C44Da98b954EedeAC495271d0F".to_string(),
            symbol: "DAI".to_string(),
            decimals: 18,
        },
    ]
}
