/// Known tokens and command-line token resolution
use super::types::{parse_address, short_address, Token, NATIVE_TOKEN};
use crate::config::Config;
use crate::errors::{DataError, EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::rpc::{erc20, ChainClient};
use ethers::types::Address;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TokenRegistry {
    native: Token,
    wrapped_native: Address,
    by_address: HashMap<Address, Token>,
    by_symbol: HashMap<String, Address>,
}

impl TokenRegistry {
    pub fn new(native_symbol: &str, wrapped_native: Address) -> Self {
        Self {
            native: Token::native(native_symbol),
            wrapped_native,
            by_address: HashMap::new(),
            by_symbol: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> EngineResult<Self> {
        let wrapped_native = parse_address(&config.network.wrapped_native)?;
        let mut registry = Self::new(&config.network.native_symbol, wrapped_native);
        for token in &config.tokens {
            registry.insert(Token::new(
                parse_address(&token.address)?,
                token.symbol.clone(),
                token.decimals,
            ));
        }
        Ok(registry)
    }

    /// Later inserts win on symbol clashes
    pub fn insert(&mut self, token: Token) {
        self.by_symbol
            .insert(token.symbol.to_ascii_uppercase(), token.address);
        self.by_address.insert(token.address, token);
    }

    pub fn native(&self) -> &Token {
        &self.native
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    /// Address used inside pool paths (native maps to the wrapped token)
    pub fn path_address(&self, address: Address) -> Address {
        if address == NATIVE_TOKEN {
            self.wrapped_native
        } else {
            address
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Token> {
        if *address == NATIVE_TOKEN {
            return Some(&self.native);
        }
        self.by_address.get(address)
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.by_symbol
            .get(&symbol.trim().to_ascii_uppercase())
            .and_then(|address| self.by_address.get(address))
    }

    pub fn symbol_of(&self, address: &Address) -> String {
        self.get(address)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| short_address(address))
    }

    fn is_native_keyword(&self, input: &str) -> bool {
        input.eq_ignore_ascii_case(&self.native.symbol) || input.eq_ignore_ascii_case("native")
    }

    /// Resolve an address, known symbol or native keyword from known tokens only
    pub fn resolve(&self, input: &str) -> EngineResult<Token> {
        let input = input.trim();
        if self.is_native_keyword(input) {
            return Ok(self.native.clone());
        }
        if let Some(token) = self.by_symbol(input) {
            return Ok(token.clone());
        }
        if looks_like_address(input) {
            let address = parse_address(input)?;
            if let Some(token) = self.get(&address) {
                return Ok(token.clone());
            }
        }
        Err(SwapEngineError::Data(DataError::UnknownToken {
            token: input.to_string(),
        }))
    }

    /// Like `resolve`, but unknown addresses are looked up on chain and cached
    pub async fn resolve_on_chain(&mut self, input: &str, chain: &dyn ChainClient) -> EngineResult<Token> {
        match self.resolve(input) {
            Ok(token) => return Ok(token),
            Err(e) if !looks_like_address(input.trim()) => return Err(e),
            Err(_) => {}
        }

        let address = parse_address(input)?;
        let decimals = erc20::decimals(chain, address).await?;
        let symbol = erc20::symbol(chain, address)
            .await
            .unwrap_or_else(|_| short_address(&address));
        let token = Token::new(address, symbol, decimals);
        logger::debug(
            LogTag::Wallet,
            &format!(
                "Resolved {} on chain: {} ({} decimals)",
                short_address(&address),
                token.symbol,
                decimals
            ),
        );
        self.insert(token.clone());
        Ok(token)
    }
}

fn looks_like_address(input: &str) -> bool {
    let hex = input.strip_prefix("0x").unwrap_or(input);
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
