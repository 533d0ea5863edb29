//! In-memory EVM chain
//!
//! Holds native balances, ERC-20 state, V2 pairs and routers, and executes the
//! signed transactions it receives: `approve` on tokens, the six V2 router swap
//! functions on routers, and plain native transfers. Every transaction is
//! decoded and its signature recovered, so nonce, chain id, balance, allowance,
//! deadline and minimum-output checks behave like a node that rejects reverting
//! transactions at submission. Used by the demo, dry runs and tests.

use super::erc20;
use super::router_abi::{RouterCall, RouterFunction};
use super::ChainClient;
use crate::errors::{EngineResult, RpcProviderError, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::math::{get_amount_in, get_amount_out};
use async_trait::async_trait;
use ethers::abi::{encode, Token as AbiToken};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{id, keccak256, rlp::Rlp};
use parking_lot::Mutex;
use std::collections::HashMap;

const GWEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Default)]
struct TokenState {
    symbol: String,
    decimals: u8,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

#[derive(Debug, Clone)]
struct PairState {
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
}

#[derive(Debug, Clone)]
struct RouterState {
    weth: Address,
    fee_bps: u16,
    pairs: Vec<Address>,
}

/// A transaction accepted by the simulated chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: H256,
    pub from: Address,
    pub to: Address,
    pub nonce: U256,
    pub value: U256,
    pub gas_limit: U256,
    pub gas_price: U256,
    /// Selector name for known calls, e.g. `approve` or `swapExactETHForTokens`
    pub method: String,
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    timestamp: u64,
    gas_price: U256,
    native: HashMap<Address, U256>,
    tokens: HashMap<Address, TokenState>,
    pairs: HashMap<Address, PairState>,
    routers: HashMap<Address, RouterState>,
    nonces: HashMap<Address, U256>,
    sent: Vec<SentTransaction>,
}

pub struct SimulatedChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

fn revert(reason: impl Into<String>) -> SwapEngineError {
    SwapEngineError::RpcProvider(RpcProviderError::TransactionRejected {
        reason: format!("execution reverted: {}", reason.into()),
    })
}

fn call_error(message: impl Into<String>) -> SwapEngineError {
    SwapEngineError::RpcProvider(RpcProviderError::ErrorResponse {
        method: "eth_call".to_string(),
        code: -32000,
        message: message.into(),
    })
}

impl SimulatedChain {
    pub fn new(chain_id: u64) -> Self {
        let state = ChainState {
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            gas_price: U256::from(5 * GWEI),
            ..Default::default()
        };
        Self {
            chain_id,
            state: Mutex::new(state),
        }
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    pub fn set_timestamp(&self, timestamp: u64) {
        self.state.lock().timestamp = timestamp;
    }

    pub fn advance_time(&self, seconds: u64) {
        self.state.lock().timestamp += seconds;
    }

    pub fn set_gas_price(&self, gas_price: U256) {
        self.state.lock().gas_price = gas_price;
    }

    pub fn set_native_balance(&self, owner: Address, amount: U256) {
        self.state.lock().native.insert(owner, amount);
    }

    pub fn add_token(&self, token: Address, symbol: &str, decimals: u8) {
        self.state.lock().tokens.insert(
            token,
            TokenState {
                symbol: symbol.to_string(),
                decimals,
                ..Default::default()
            },
        );
    }

    pub fn mint(&self, token: Address, owner: Address, amount: U256) {
        let mut state = self.state.lock();
        let entry = state.tokens.entry(token).or_default();
        let balance = entry.balances.entry(owner).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn add_pair(&self, pair: Address, token0: Address, token1: Address, reserve0: U256, reserve1: U256) {
        self.state.lock().pairs.insert(
            pair,
            PairState {
                token0,
                token1,
                reserve0,
                reserve1,
            },
        );
    }

    pub fn set_reserves(&self, pair: Address, reserve0: U256, reserve1: U256) {
        if let Some(state) = self.state.lock().pairs.get_mut(&pair) {
            state.reserve0 = reserve0;
            state.reserve1 = reserve1;
        }
    }

    /// Register a V2 router trading through `pairs`
    pub fn add_router(&self, router: Address, weth: Address, fee_bps: u16, pairs: &[Address]) {
        self.state.lock().routers.insert(
            router,
            RouterState {
                weth,
                fee_bps,
                pairs: pairs.to_vec(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn native_balance_of(&self, owner: Address) -> U256 {
        self.state.lock().native.get(&owner).copied().unwrap_or_default()
    }

    pub fn token_balance(&self, token: Address, owner: Address) -> U256 {
        self.state
            .lock()
            .tokens
            .get(&token)
            .and_then(|t| t.balances.get(&owner).copied())
            .unwrap_or_default()
    }

    pub fn allowance_of(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state
            .lock()
            .tokens
            .get(&token)
            .and_then(|t| t.allowances.get(&(owner, spender)).copied())
            .unwrap_or_default()
    }

    pub fn reserves(&self, pair: Address) -> Option<(U256, U256)> {
        self.state
            .lock()
            .pairs
            .get(&pair)
            .map(|p| (p.reserve0, p.reserve1))
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn nonce_of(&self, address: Address) -> U256 {
        self.state.lock().nonces.get(&address).copied().unwrap_or_default()
    }
}

// ----------------------------------------------------------------------
// eth_call
// ----------------------------------------------------------------------

/// Address packed in the `index`-th 32-byte argument word
fn address_argument(data: &[u8], index: usize) -> EngineResult<Address> {
    let start = 4 + index * 32;
    data.get(start + 12..start + 32)
        .map(Address::from_slice)
        .ok_or_else(|| call_error("execution reverted: short calldata"))
}

impl ChainState {
    fn call(&self, to: Address, data: &[u8]) -> EngineResult<Vec<u8>> {
        if data.len() < 4 {
            return Err(call_error("execution reverted: missing selector"));
        }
        let selector = &data[..4];
        let address_arg = |index: usize| address_argument(data, index);

        if let Some(token) = self.tokens.get(&to) {
            if selector == id(erc20::BALANCE_OF) {
                let owner = address_arg(0)?;
                let balance = token.balances.get(&owner).copied().unwrap_or_default();
                return Ok(encode(&[AbiToken::Uint(balance)]));
            }
            if selector == id(erc20::DECIMALS) {
                return Ok(encode(&[AbiToken::Uint(U256::from(token.decimals))]));
            }
            if selector == id(erc20::SYMBOL) {
                return Ok(encode(&[AbiToken::String(token.symbol.clone())]));
            }
            if selector == id(erc20::ALLOWANCE) {
                let key = (address_arg(0)?, address_arg(1)?);
                let allowance = token.allowances.get(&key).copied().unwrap_or_default();
                return Ok(encode(&[AbiToken::Uint(allowance)]));
            }
        }

        if let Some(pair) = self.pairs.get(&to) {
            if selector == id(erc20::GET_RESERVES) {
                return Ok(encode(&[
                    AbiToken::Uint(pair.reserve0),
                    AbiToken::Uint(pair.reserve1),
                    AbiToken::Uint(U256::from(self.timestamp as u32)),
                ]));
            }
            if selector == id(erc20::TOKEN0) {
                return Ok(encode(&[AbiToken::Address(pair.token0)]));
            }
            if selector == id(erc20::TOKEN1) {
                return Ok(encode(&[AbiToken::Address(pair.token1)]));
            }
        }

        Err(call_error("execution reverted"))
    }
}

// ----------------------------------------------------------------------
// Transaction execution
// ----------------------------------------------------------------------

impl ChainState {
    fn native_mut(&mut self, owner: Address) -> &mut U256 {
        self.native.entry(owner).or_default()
    }

    fn debit_native(&mut self, owner: Address, amount: U256) -> EngineResult<()> {
        let balance = self.native_mut(owner);
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| revert("insufficient funds for gas * price + value"))?;
        Ok(())
    }

    fn debit_token(&mut self, token: Address, owner: Address, amount: U256) -> EngineResult<()> {
        let state = self
            .tokens
            .get_mut(&token)
            .ok_or_else(|| revert("TransferHelper: TRANSFER_FROM_FAILED"))?;
        let balance = state.balances.entry(owner).or_default();
        *balance = balance
            .checked_sub(amount)
            .ok_or_else(|| revert("TransferHelper: TRANSFER_FROM_FAILED"))?;
        Ok(())
    }

    fn credit_token(&mut self, token: Address, owner: Address, amount: U256) {
        let balance = self.tokens.entry(token).or_default().balances.entry(owner).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn spend_allowance(&mut self, token: Address, owner: Address, spender: Address, amount: U256) -> EngineResult<()> {
        let state = self
            .tokens
            .get_mut(&token)
            .ok_or_else(|| revert("TransferHelper: TRANSFER_FROM_FAILED"))?;
        let allowance = state.allowances.entry((owner, spender)).or_default();
        if *allowance < amount {
            return Err(revert("TransferHelper: TRANSFER_FROM_FAILED"));
        }
        if *allowance != U256::MAX {
            *allowance -= amount;
        }
        Ok(())
    }

    fn pair_for(&self, router: &RouterState, a: Address, b: Address) -> EngineResult<Address> {
        router
            .pairs
            .iter()
            .copied()
            .find(|pair| {
                self.pairs.get(pair).map_or(false, |p| {
                    (p.token0 == a && p.token1 == b) || (p.token0 == b && p.token1 == a)
                })
            })
            .ok_or_else(|| revert("UniswapV2Library: PAIR_NOT_FOUND"))
    }

    fn pair_reserves(&self, pair: Address, token_in: Address) -> EngineResult<(U256, U256)> {
        let state = self
            .pairs
            .get(&pair)
            .ok_or_else(|| revert("UniswapV2Library: PAIR_NOT_FOUND"))?;
        if state.token0 == token_in {
            Ok((state.reserve0, state.reserve1))
        } else {
            Ok((state.reserve1, state.reserve0))
        }
    }

    fn execute_swap(&mut self, from: Address, router_address: Address, value: U256, data: &[u8]) -> EngineResult<String> {
        let router = self
            .routers
            .get(&router_address)
            .cloned()
            .ok_or_else(|| revert("unknown router"))?;
        let call = RouterCall::decode(data, value)?;
        let function = call.function;

        if U256::from(self.timestamp) > call.deadline {
            return Err(revert("UniswapV2Router: EXPIRED"));
        }
        if call.path.len() < 2 {
            return Err(revert("UniswapV2Library: INVALID_PATH"));
        }
        let first = call.path[0];
        let last = call.path[call.path.len() - 1];
        if (function.native_in() && first != router.weth) || (function.native_out() && last != router.weth) {
            return Err(revert("UniswapV2Router: INVALID_PATH"));
        }

        let mut pairs = Vec::with_capacity(call.path.len() - 1);
        for window in call.path.windows(2) {
            pairs.push(self.pair_for(&router, window[0], window[1])?);
        }

        let mut amounts = vec![U256::zero(); call.path.len()];
        if function.exact_in() {
            amounts[0] = call.amount;
            for i in 0..pairs.len() {
                let (reserve_in, reserve_out) = self.pair_reserves(pairs[i], call.path[i])?;
                amounts[i + 1] = get_amount_out(amounts[i], reserve_in, reserve_out, router.fee_bps)
                    .map_err(|_| revert("UniswapV2Library: INSUFFICIENT_LIQUIDITY"))?;
            }
            if amounts[amounts.len() - 1] < call.limit {
                return Err(revert("UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT"));
            }
        } else {
            let last_index = amounts.len() - 1;
            amounts[last_index] = call.amount;
            for i in (0..pairs.len()).rev() {
                let (reserve_in, reserve_out) = self.pair_reserves(pairs[i], call.path[i])?;
                amounts[i] = get_amount_in(amounts[i + 1], reserve_in, reserve_out, router.fee_bps)
                    .map_err(|_| revert("UniswapV2Library: INSUFFICIENT_LIQUIDITY"))?;
            }
            if amounts[0] > call.limit {
                return Err(revert("UniswapV2Router: EXCESSIVE_INPUT_AMOUNT"));
            }
        }

        // Pull input
        if function.native_in() {
            // value already debited by the caller; refund what the swap did not use
            let refund = value.saturating_sub(amounts[0]);
            if !refund.is_zero() {
                *self.native_mut(from) += refund;
            }
        } else {
            self.spend_allowance(first, from, router_address, amounts[0])?;
            self.debit_token(first, from, amounts[0])?;
        }

        // Move reserves
        for i in 0..pairs.len() {
            let token_in = call.path[i];
            let state = self
                .pairs
                .get_mut(&pairs[i])
                .ok_or_else(|| revert("UniswapV2Library: PAIR_NOT_FOUND"))?;
            if state.token0 == token_in {
                state.reserve0 += amounts[i];
                state.reserve1 -= amounts[i + 1];
            } else {
                state.reserve1 += amounts[i];
                state.reserve0 -= amounts[i + 1];
            }
        }

        // Pay output
        let output = amounts[amounts.len() - 1];
        if function.native_out() {
            *self.native_mut(call.to) += output;
        } else {
            self.credit_token(last, call.to, output);
        }

        Ok(function.name().to_string())
    }

    fn execute(&mut self, from: Address, to: Address, value: U256, data: &[u8]) -> EngineResult<String> {
        // Native value leaves the sender before the call, as on chain
        self.debit_native(from, value)?;

        if self.tokens.contains_key(&to) {
            let (spender, amount) = erc20::decode_approve(data)
                .ok_or_else(|| revert("unsupported token call"))?;
            if let Some(token) = self.tokens.get_mut(&to) {
                token.allowances.insert((from, spender), amount);
            }
            return Ok("approve".to_string());
        }

        if self.routers.contains_key(&to) {
            return self.execute_swap(from, to, value, data);
        }

        *self.native_mut(to) += value;
        Ok("transfer".to_string())
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn chain_id(&self) -> EngineResult<u64> {
        Ok(self.chain_id)
    }

    async fn block_timestamp(&self) -> EngineResult<u64> {
        Ok(self.state.lock().timestamp)
    }

    async fn transaction_count(&self, address: Address) -> EngineResult<U256> {
        Ok(self.nonce_of(address))
    }

    async fn gas_price(&self) -> EngineResult<U256> {
        Ok(self.state.lock().gas_price)
    }

    async fn native_balance(&self, address: Address) -> EngineResult<U256> {
        Ok(self.native_balance_of(address))
    }

    async fn call(&self, to: Address, data: Bytes) -> EngineResult<Bytes> {
        self.state.lock().call(to, &data).map(Bytes::from)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> EngineResult<H256> {
        let rlp = Rlp::new(&raw);
        let (tx, signature) = TypedTransaction::decode_signed(&rlp)
            .map_err(|e| SwapEngineError::parse_error("signed transaction", e.to_string()))?;

        let from = match tx.from() {
            Some(from) => *from,
            None => signature
                .recover(tx.sighash())
                .map_err(|e| revert(format!("invalid signature: {}", e)))?,
        };
        if let Some(chain_id) = tx.chain_id() {
            if chain_id.as_u64() != self.chain_id {
                return Err(revert(format!(
                    "invalid chain id {} (expected {})",
                    chain_id, self.chain_id
                )));
            }
        }
        let to = tx
            .to_addr()
            .copied()
            .ok_or_else(|| revert("contract creation is not supported"))?;
        let value = tx.value().copied().unwrap_or_default();
        let gas_limit = tx.gas().copied().unwrap_or_default();
        let gas_price = tx.gas_price().unwrap_or_default();
        let nonce = tx.nonce().copied().unwrap_or_default();
        let data = tx.data().cloned().unwrap_or_default();

        let mut guard = self.state.lock();
        let expected_nonce = guard.nonces.get(&from).copied().unwrap_or_default();
        if nonce != expected_nonce {
            return Err(revert(format!(
                "nonce {} does not match account nonce {}",
                nonce, expected_nonce
            )));
        }

        // Execute on a copy so a revert leaves no trace
        let mut next = guard.clone();
        let fee = gas_limit
            .checked_mul(gas_price)
            .ok_or_else(|| SwapEngineError::overflow("gas fee"))?;
        next.debit_native(from, fee)?;
        let method = next.execute(from, to, value, &data)?;

        let hash = H256::from(keccak256(&raw));
        next.nonces.insert(from, nonce + U256::one());
        next.sent.push(SentTransaction {
            hash,
            from,
            to,
            nonce,
            value,
            gas_limit,
            gas_price,
            method: method.clone(),
        });
        *guard = next;
        drop(guard);

        logger::debug(
            LogTag::Rpc,
            &format!("Simulated {} from {:?} nonce {} -> {:?}", method, from, nonce, hash),
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn test_erc20_calls_by_selector() {
        let chain = SimulatedChain::new(1);
        let token = addr(10);
        let owner = addr(1);
        chain.add_token(token, "TOK", 18);
        chain.mint(token, owner, U256::from(5_000u64));

        assert_eq!(
            erc20::balance_of(&chain, token, owner).await.unwrap(),
            U256::from(5_000u64)
        );
        assert_eq!(erc20::decimals(&chain, token).await.unwrap(), 18);
        assert_eq!(erc20::symbol(&chain, token).await.unwrap(), "TOK");
        assert!(erc20::allowance(&chain, token, owner, addr(2)).await.unwrap().is_zero());
        assert!(chain.call(addr(99), erc20::balance_of_call(owner)).await.is_err());
    }

    #[tokio::test]
    async fn test_pair_calls() {
        let chain = SimulatedChain::new(1);
        chain.add_pair(addr(20), addr(10), addr(11), U256::from(7u64), U256::from(9u64));
        assert_eq!(
            erc20::get_reserves(&chain, addr(20)).await.unwrap(),
            (U256::from(7u64), U256::from(9u64))
        );
        assert_eq!(
            erc20::pair_tokens(&chain, addr(20)).await.unwrap(),
            (addr(10), addr(11))
        );
    }

    #[test]
    fn test_reverted_swap_leaves_state_untouched() {
        let chain = SimulatedChain::new(1);
        let (weth, tok, pair, router, user) = (addr(1), addr(2), addr(3), addr(4), addr(5));
        chain.add_token(tok, "TOK", 18);
        chain.add_pair(pair, weth, tok, U256::from(1_000_000u64), U256::from(1_000_000u64));
        chain.add_router(router, weth, 30, &[pair]);
        chain.set_native_balance(user, U256::from(10_000u64));

        let call = RouterCall {
            function: RouterFunction::SwapExactEthForTokens,
            amount: U256::from(1_000u64),
            limit: U256::from(10_000u64),
            path: vec![weth, tok],
            to: user,
            deadline: U256::MAX,
        };
        let (data, value) = call.encode();

        let mut state = chain.state.lock().clone();
        let err = state.execute(user, router, value, &data).unwrap_err();
        assert!(err.is_slippage_related());

        let ok_call = RouterCall {
            limit: U256::from(900u64),
            ..call
        };
        let (data, value) = ok_call.encode();
        let mut state = chain.state.lock().clone();
        assert_eq!(
            state.execute(user, router, value, &data).unwrap(),
            "swapExactETHForTokens"
        );
        assert_eq!(state.native[&user], U256::from(9_000u64));
        assert_eq!(
            state.tokens[&tok].balances[&user],
            get_amount_out(
                U256::from(1_000u64),
                U256::from(1_000_000u64),
                U256::from(1_000_000u64),
                30
            )
            .unwrap()
        );
        // Shared chain state unchanged by the detached copies
        assert_eq!(chain.native_balance_of(user), U256::from(10_000u64));
    }

    #[test]
    fn test_expired_deadline() {
        let chain = SimulatedChain::new(1);
        let (weth, tok, pair, router, user) = (addr(1), addr(2), addr(3), addr(4), addr(5));
        chain.add_pair(pair, weth, tok, U256::from(1_000u64), U256::from(1_000u64));
        chain.add_router(router, weth, 30, &[pair]);
        chain.set_native_balance(user, U256::from(100u64));
        chain.set_timestamp(2_000);

        let (data, value) = RouterCall {
            function: RouterFunction::SwapExactEthForTokens,
            amount: U256::from(10u64),
            limit: U256::one(),
            path: vec![weth, tok],
            to: user,
            deadline: U256::from(1_999u64),
        }
        .encode();
        let err = chain.state.lock().clone().execute(user, router, value, &data).unwrap_err();
        assert!(err.to_string().contains("EXPIRED"));
    }
}
