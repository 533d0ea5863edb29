/// ERC-20 and V2 pair call helpers
use super::ChainClient;
use crate::errors::{EngineResult, SwapEngineError};
use ethers::abi::{decode, encode, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, U256};
use ethers::utils::id;

pub const BALANCE_OF: &str = "balanceOf(address)";
pub const DECIMALS: &str = "decimals()";
pub const SYMBOL: &str = "symbol()";
pub const ALLOWANCE: &str = "allowance(address,address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const GET_RESERVES: &str = "getReserves()";
pub const TOKEN0: &str = "token0()";
pub const TOKEN1: &str = "token1()";

/// Selector followed by ABI-encoded arguments
pub fn calldata(signature: &str, args: &[AbiToken]) -> Bytes {
    let mut data = id(signature).to_vec();
    data.extend(encode(args));
    Bytes::from(data)
}

pub fn balance_of_call(owner: Address) -> Bytes {
    calldata(BALANCE_OF, &[AbiToken::Address(owner)])
}

pub fn allowance_call(owner: Address, spender: Address) -> Bytes {
    calldata(ALLOWANCE, &[AbiToken::Address(owner), AbiToken::Address(spender)])
}

pub fn approve_call(spender: Address, amount: U256) -> Bytes {
    calldata(APPROVE, &[AbiToken::Address(spender), AbiToken::Uint(amount)])
}

/// `(spender, amount)` when `data` is an `approve` call
pub fn decode_approve(data: &[u8]) -> Option<(Address, U256)> {
    if data.len() < 4 || data[..4] != id(APPROVE) {
        return None;
    }
    let tokens = decode(&[ParamType::Address, ParamType::Uint(256)], &data[4..]).ok()?;
    match tokens.as_slice() {
        [AbiToken::Address(spender), AbiToken::Uint(amount)] => Some((*spender, *amount)),
        _ => None,
    }
}

fn malformed(method: &str, data: &[u8]) -> SwapEngineError {
    SwapEngineError::parse_error(
        format!("{} result", method),
        format!("unexpected return data 0x{}", ethers::utils::hex::encode(data)),
    )
}

fn decode_uint(method: &str, data: &[u8]) -> EngineResult<U256> {
    let tokens = decode(&[ParamType::Uint(256)], data).map_err(|_| malformed(method, data))?;
    match tokens.first() {
        Some(AbiToken::Uint(value)) => Ok(*value),
        _ => Err(malformed(method, data)),
    }
}

fn decode_address(method: &str, data: &[u8]) -> EngineResult<Address> {
    let tokens = decode(&[ParamType::Address], data).map_err(|_| malformed(method, data))?;
    match tokens.first() {
        Some(AbiToken::Address(value)) => Ok(*value),
        _ => Err(malformed(method, data)),
    }
}

pub async fn balance_of(chain: &dyn ChainClient, token: Address, owner: Address) -> EngineResult<U256> {
    let data = chain.call(token, balance_of_call(owner)).await?;
    decode_uint(BALANCE_OF, &data)
}

pub async fn allowance(
    chain: &dyn ChainClient,
    token: Address,
    owner: Address,
    spender: Address,
) -> EngineResult<U256> {
    let data = chain.call(token, allowance_call(owner, spender)).await?;
    decode_uint(ALLOWANCE, &data)
}

pub async fn decimals(chain: &dyn ChainClient, token: Address) -> EngineResult<u8> {
    let data = chain.call(token, calldata(DECIMALS, &[])).await?;
    let value = decode_uint(DECIMALS, &data)?;
    if value > U256::from(u8::MAX) {
        return Err(malformed(DECIMALS, &data));
    }
    Ok(value.as_u32() as u8)
}

/// Token symbol; tolerates the old `bytes32` return type
pub async fn symbol(chain: &dyn ChainClient, token: Address) -> EngineResult<String> {
    let data = chain.call(token, calldata(SYMBOL, &[])).await?;
    if let Ok(tokens) = decode(&[ParamType::String], &data) {
        if let Some(AbiToken::String(symbol)) = tokens.into_iter().next() {
            return Ok(symbol);
        }
    }
    if data.len() == 32 {
        let trimmed: Vec<u8> = data.iter().copied().take_while(|b| *b != 0).collect();
        if let Ok(symbol) = String::from_utf8(trimmed) {
            return Ok(symbol);
        }
    }
    Err(malformed(SYMBOL, &data))
}

/// `(reserve0, reserve1)` of a V2 pair
pub async fn get_reserves(chain: &dyn ChainClient, pair: Address) -> EngineResult<(U256, U256)> {
    let data = chain.call(pair, calldata(GET_RESERVES, &[])).await?;
    let tokens = decode(
        &[ParamType::Uint(112), ParamType::Uint(112), ParamType::Uint(32)],
        &data,
    )
    .map_err(|_| malformed(GET_RESERVES, &data))?;
    match tokens.as_slice() {
        [AbiToken::Uint(reserve0), AbiToken::Uint(reserve1), _] => Ok((*reserve0, *reserve1)),
        _ => Err(malformed(GET_RESERVES, &data)),
    }
}

pub async fn pair_tokens(chain: &dyn ChainClient, pair: Address) -> EngineResult<(Address, Address)> {
    let token0 = decode_address(TOKEN0, &chain.call(pair, calldata(TOKEN0, &[])).await?)?;
    let token1 = decode_address(TOKEN1, &chain.call(pair, calldata(TOKEN1, &[])).await?)?;
    Ok((token0, token1))
}
