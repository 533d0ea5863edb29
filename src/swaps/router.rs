/// Router abstraction
///
/// Every liquidity source (a V2 router contract with its pools, or an HTTP
/// aggregator) implements `SwapRouter`. The optimizer only sees this trait.
use super::routers::AmmRouter;
use super::types::{ExecutionContext, Quote, QuoteRequest, TxRequest};
use crate::errors::EngineResult;
use crate::tokens::Token;
use async_trait::async_trait;

#[async_trait]
pub trait SwapRouter: Send + Sync {
    /// Stable id used in config, stats and logs (e.g. "uniswap_v2")
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Lower is preferred when scores tie
    fn priority(&self) -> u8;

    fn supports_pair(&self, input: &Token, output: &Token) -> bool;

    async fn get_quote(&self, request: &QuoteRequest) -> EngineResult<Quote>;

    /// Swap transactions for a quote; approvals are added by the engine
    fn build_transactions(&self, quote: &Quote, context: &ExecutionContext) -> EngineResult<Vec<TxRequest>>;

    /// Access to pool-level routing for split planning and replays
    fn as_amm(&self) -> Option<&AmmRouter> {
        None
    }
}
