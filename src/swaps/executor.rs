/// Transaction execution
///
/// Approvals, balance checks, nonce assignment, signing and broadcast. Every
/// transaction of a swap is signed up front with consecutive nonces; a dry run
/// stops after signing.
use super::gas::gas_cost_wei;
use super::types::{Quote, SubmittedTx, TxRequest};
use crate::errors::{EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::rpc::{erc20, ChainClient};
use crate::tokens::{short_address, Token};
use crate::wallet::{token_balance, WalletSigner};
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Allowance that must be raised before the swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approval {
    pub token: Address,
    pub spender: Address,
    /// Exact amount the swap legs may pull
    pub amount: U256,
    pub current: U256,
}

impl Approval {
    pub fn to_tx(&self, gas_limit: u64) -> TxRequest {
        TxRequest {
            label: "approve".to_string(),
            to: self.token,
            data: erc20::approve_call(self.spender, self.amount),
            value: U256::zero(),
            gas_limit,
            input_amount: U256::zero(),
        }
    }
}

/// Input each spender must be allowed to pull, summed over legs
pub fn required_allowances(legs: &[&Quote]) -> EngineResult<Vec<(Address, Address, U256)>> {
    let mut required: Vec<(Address, Address, U256)> = Vec::new();
    for leg in legs {
        let Some(spender) = leg.spender() else {
            continue;
        };
        let amount = leg.max_input()?;
        match required
            .iter_mut()
            .find(|(token, s, _)| *token == leg.input.address && *s == spender)
        {
            Some(entry) => entry.2 = entry.2.saturating_add(amount),
            None => required.push((leg.input.address, spender, amount)),
        }
    }
    Ok(required)
}

/// Sum of `gas_limit * gas_price` over `txs`
pub fn gas_cost(txs: &[TxRequest], gas_price: U256) -> EngineResult<U256> {
    txs.iter().try_fold(U256::zero(), |total, tx| {
        total
            .checked_add(gas_cost_wei(tx.gas_limit, gas_price)?)
            .ok_or_else(|| SwapEngineError::overflow("gas cost"))
    })
}

/// Sum of `value + gas_limit * gas_price` over `txs`
pub fn native_cost(txs: &[TxRequest], gas_price: U256) -> EngineResult<U256> {
    txs.iter().try_fold(gas_cost(txs, gas_price)?, |total, tx| {
        total
            .checked_add(tx.value)
            .ok_or_else(|| SwapEngineError::overflow("transaction cost"))
    })
}

pub struct TransactionExecutor {
    chain: Arc<dyn ChainClient>,
    signer: WalletSigner,
}

impl TransactionExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, signer: WalletSigner) -> Self {
        Self { chain, signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Approvals whose current allowance does not cover the legs
    pub async fn approvals_needed(&self, legs: &[&Quote]) -> EngineResult<Vec<Approval>> {
        let owner = self.address();
        let mut approvals = Vec::new();
        for (token, spender, amount) in required_allowances(legs)? {
            let current = erc20::allowance(self.chain.as_ref(), token, owner, spender).await?;
            if current < amount {
                logger::debug(
                    LogTag::Wallet,
                    &format!(
                        "Allowance of {} for {} is {}, need {}",
                        short_address(&token),
                        short_address(&spender),
                        current,
                        amount
                    ),
                );
                approvals.push(Approval {
                    token,
                    spender,
                    amount,
                    current,
                });
            }
        }
        Ok(approvals)
    }

    /// Input token balance covers `required`, native balance covers every
    /// transaction's value and gas
    pub async fn check_balances(
        &self,
        input: &Token,
        required_input: U256,
        txs: &[TxRequest],
        gas_price: U256,
    ) -> EngineResult<()> {
        let owner = self.address();
        let native_needed = native_cost(txs, gas_price)?;
        let native_available = self.chain.native_balance(owner).await?;
        if native_available < native_needed {
            return Err(SwapEngineError::insufficient_balance(
                "native",
                native_needed,
                native_available,
            ));
        }

        if !input.is_native() {
            let available = token_balance(self.chain.as_ref(), input, owner).await?;
            if available < required_input {
                return Err(SwapEngineError::insufficient_balance(
                    &input.symbol,
                    required_input,
                    available,
                ));
            }
        }
        Ok(())
    }

    /// Sign `txs` with consecutive nonces starting at the pending nonce and
    /// broadcast them in order unless `broadcast` is false
    ///
    /// A failure after at least one transaction went out is reported as
    /// `PartialExecution` carrying the sent transactions and the input they
    /// could spend; nothing after the failed transaction is sent.
    pub async fn execute(&self, txs: &[TxRequest], gas_price: U256, broadcast: bool) -> EngineResult<Vec<SubmittedTx>> {
        let base_nonce = self.chain.transaction_count(self.address()).await?;

        let mut signed = Vec::with_capacity(txs.len());
        for (i, tx) in txs.iter().enumerate() {
            let nonce = base_nonce.saturating_add(U256::from(i));
            signed.push((tx, self.signer.sign(tx, nonce, gas_price)?));
        }

        let mut submitted = Vec::with_capacity(signed.len());
        let mut executed_input = U256::zero();
        for (tx, signed_tx) in signed {
            if broadcast {
                let hash = match self.chain.send_raw_transaction(signed_tx.raw.clone()).await {
                    Ok(hash) => hash,
                    Err(e) => {
                        logger::error(
                            LogTag::Swap,
                            &format!("{} (nonce {}) rejected: {}", tx.label, signed_tx.nonce, e),
                        );
                        let cause = match e {
                            SwapEngineError::RpcProvider(_) => e,
                            other => SwapEngineError::broadcast_failed(other.to_string()),
                        };
                        if submitted.is_empty() {
                            return Err(cause);
                        }
                        logger::warning(
                            LogTag::Swap,
                            &format!(
                                "{} of {} transactions already sent, {} input spent",
                                submitted.len(),
                                txs.len(),
                                executed_input
                            ),
                        );
                        return Err(SwapEngineError::partial_execution(
                            submitted,
                            txs.len(),
                            executed_input,
                            cause,
                        ));
                    }
                };
                executed_input = executed_input.saturating_add(tx.input_amount);
                logger::info(
                    LogTag::Swap,
                    &format!("Sent {} nonce {} tx {:?}", tx.label, signed_tx.nonce, hash),
                );
            } else {
                logger::info(
                    LogTag::Simulation,
                    &format!(
                        "[DRY RUN] Signed {} nonce {} tx {:?} (not sent)",
                        tx.label, signed_tx.nonce, signed_tx.hash
                    ),
                );
            }
            submitted.push(SubmittedTx {
                label: tx.label.clone(),
                hash: signed_tx.hash,
                nonce: signed_tx.nonce,
                gas_limit: tx.gas_limit,
                broadcast,
            });
        }
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionError;
    use crate::rpc::SimulatedChain;
    use crate::swaps::types::{ExecutionPlan, SwapMode};
    use crate::pools::PoolPath;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn token_leg(amount: u64, spender: u64) -> Quote {
        Quote {
            quote_id: "q".to_string(),
            router_id: "uniswap_v2".to_string(),
            router_name: "Uniswap V2".to_string(),
            input: Token::new(addr(5), "TKN", 18),
            output: Token::native("ETH"),
            swap_mode: SwapMode::ExactIn,
            input_amount: U256::from(amount),
            output_amount: U256::from(amount / 2),
            price_impact_pct: 0.1,
            gas_estimate: 250_000,
            slippage_bps: 100,
            hops: Vec::new(),
            route_plan: "TKN → ETH".to_string(),
            recipient: addr(77),
            execution: ExecutionPlan::RouterPath {
                router: addr(spender),
                path: PoolPath {
                    tokens: vec![addr(5), addr(1)],
                    pools: vec![addr(100)],
                },
            },
        }
    }

    #[test]
    fn test_allowances_are_summed_per_spender() {
        let a = token_leg(1_000, 900);
        let b = token_leg(500, 900);
        let c = token_leg(200, 901);
        let required = required_allowances(&[&a, &b, &c]).unwrap();
        assert_eq!(
            required,
            vec![
                (addr(5), addr(900), U256::from(1_500u64)),
                (addr(5), addr(901), U256::from(200u64)),
            ]
        );
    }

    #[test]
    fn test_gas_cost_leaves_out_value() {
        let tx = |value: u64, gas_limit: u64| TxRequest {
            label: "swap".to_string(),
            to: addr(900),
            data: Default::default(),
            value: U256::from(value),
            gas_limit,
            input_amount: U256::zero(),
        };
        let txs = [tx(0, 80_000), tx(1_000_000, 250_000)];
        let price = U256::from(3u64);
        assert_eq!(gas_cost(&txs, price).unwrap(), U256::from(990_000u64));
        assert_eq!(native_cost(&txs, price).unwrap(), U256::from(1_990_000u64));
    }

    #[tokio::test]
    async fn test_approvals_skip_covered_allowance() {
        let chain = Arc::new(SimulatedChain::new(1));
        chain.add_token(addr(5), "TKN", 18);
        let signer = WalletSigner::random(1);
        let owner = signer.address();
        let executor = TransactionExecutor::new(chain.clone(), signer);

        let leg = token_leg(1_000, 900);
        let approvals = executor.approvals_needed(&[&leg]).await.unwrap();
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].amount, U256::from(1_000u64));

        // approve for real and check again
        chain.set_native_balance(owner, U256::exp10(18));
        let tx = approvals[0].to_tx(80_000);
        executor.execute(&[tx], U256::from(1u64), true).await.unwrap();
        assert_eq!(chain.allowance_of(addr(5), owner, addr(900)), U256::from(1_000u64));
        assert!(executor.approvals_needed(&[&leg]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_balance_checks() {
        let chain = Arc::new(SimulatedChain::new(1));
        chain.add_token(addr(5), "TKN", 18);
        let signer = WalletSigner::random(1);
        let owner = signer.address();
        let executor = TransactionExecutor::new(chain.clone(), signer);
        let tx = TxRequest {
            label: "swap".to_string(),
            to: addr(900),
            data: Default::default(),
            value: U256::from(1_000u64),
            gas_limit: 100,
            input_amount: U256::zero(),
        };

        // 1_000 value + 100 gas * 2 wei
        chain.set_native_balance(owner, U256::from(1_199u64));
        let token = Token::new(addr(5), "TKN", 18);
        let err = executor
            .check_balances(&token, U256::zero(), &[tx.clone()], U256::from(2u64))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("native"));

        chain.set_native_balance(owner, U256::from(1_200u64));
        let err = executor
            .check_balances(&token, U256::from(10u64), &[tx.clone()], U256::from(2u64))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TKN"));

        chain.mint(addr(5), owner, U256::from(10u64));
        assert!(executor
            .check_balances(&token, U256::from(10u64), &[tx], U256::from(2u64))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_dry_run_signs_without_sending() {
        let chain = Arc::new(SimulatedChain::new(1));
        let signer = WalletSigner::random(1);
        let owner = signer.address();
        chain.set_native_balance(owner, U256::exp10(18));
        let executor = TransactionExecutor::new(chain.clone(), signer);
        let tx = TxRequest {
            label: "transfer".to_string(),
            to: addr(42),
            data: Default::default(),
            value: U256::from(5u64),
            gas_limit: 21_000,
            input_amount: U256::zero(),
        };

        let dry = executor
            .execute(&[tx.clone(), tx.clone()], U256::from(1u64), false)
            .await
            .unwrap();
        assert_eq!(dry.len(), 2);
        assert_eq!(dry[1].nonce, U256::one());
        assert!(!dry[0].broadcast);
        assert!(chain.sent_transactions().is_empty());

        let sent = executor.execute(&[tx], U256::from(1u64), true).await.unwrap();
        assert_eq!(sent[0].nonce, U256::zero());
        assert_eq!(chain.nonce_of(owner), U256::one());
        assert_eq!(chain.native_balance_of(addr(42)), U256::from(5u64));
    }

    #[tokio::test]
    async fn test_failure_after_first_send_keeps_sent_transactions() {
        let chain = Arc::new(SimulatedChain::new(1));
        let signer = WalletSigner::random(1);
        let owner = signer.address();
        chain.set_native_balance(owner, U256::exp10(18));
        let executor = TransactionExecutor::new(chain.clone(), signer);
        let leg = |value: U256, input: u64| TxRequest {
            label: "transfer".to_string(),
            to: addr(42),
            data: Default::default(),
            value,
            gas_limit: 21_000,
            input_amount: U256::from(input),
        };
        let first = leg(U256::from(5u64), 700);
        // more than the wallet holds
        let second = leg(U256::exp10(30), 300);

        let err = executor
            .execute(&[first, second.clone()], U256::from(1u64), true)
            .await
            .unwrap_err();
        match &err {
            SwapEngineError::Execution(ExecutionError::PartialExecution {
                sent,
                total,
                submitted,
                executed_input,
                ..
            }) => {
                assert_eq!((*sent, *total), (1, 2));
                assert_eq!(submitted[0].nonce, U256::zero());
                assert!(submitted[0].broadcast);
                assert_eq!(*executed_input, U256::from(700u64));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.executed_input(), Some(U256::from(700u64)));
        assert_eq!(chain.sent_transactions().len(), 1);
        assert_eq!(chain.nonce_of(owner), U256::one());

        // nothing went out: the plain rejection comes back
        let err = executor.execute(&[second], U256::from(1u64), true).await.unwrap_err();
        assert_eq!(err.executed_input(), None);
        assert!(matches!(err, SwapEngineError::RpcProvider(_)));
    }
}
