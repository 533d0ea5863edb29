/// Core token types
use crate::errors::{EngineResult, SwapEngineError};
use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel address standing for the chain's native coin
pub const NATIVE_TOKEN: Address = H160([0xEE; 20]);

/// Decimals of the native coin on every EVM chain
pub const NATIVE_DECIMALS: u8 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn native(symbol: impl Into<String>) -> Self {
        Self::new(NATIVE_TOKEN, symbol, NATIVE_DECIMALS)
    }

    pub fn is_native(&self) -> bool {
        is_native(&self.address)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

pub fn is_native(address: &Address) -> bool {
    *address == NATIVE_TOKEN
}

/// Parse a hex address with or without the 0x prefix
pub fn parse_address(value: &str) -> EngineResult<Address> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex.len() != 40 {
        return Err(SwapEngineError::invalid_address(
            value,
            format!("expected 40 hex characters, got {}", hex.len()),
        ));
    }
    hex.parse::<Address>()
        .map_err(|e| SwapEngineError::invalid_address(value, e.to_string()))
}

/// `0x1234..abcd` form for log lines
pub fn short_address(address: &Address) -> String {
    let full = format!("{:?}", address);
    format!("{}..{}", &full[..6], &full[full.len() - 4..])
}
