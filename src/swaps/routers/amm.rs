/// Uniswap-V2 style router contract with its own pool set
///
/// Quotes are computed locally from the shared pool registry, restricted to
/// the pools tagged with this router's id. Transactions call the router's
/// `swapExact*` / `swap*ForExact*` functions with the slippage limit encoded.
use crate::config::{AmmRouterConfig, Config};
use crate::errors::{EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::{PathQuery, PoolPath, PoolRegistry};
use crate::rpc::router_abi::{RouterCall, RouterFunction};
use crate::swaps::router::SwapRouter;
use crate::swaps::types::{
    ExecutionContext, ExecutionPlan, Quote, QuoteRequest, RouteHop, SwapMode, TxRequest,
};
use crate::tokens::{parse_address, short_address, Token};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub struct AmmRouter {
    id: String,
    name: String,
    router_address: Address,
    priority: u8,
    enabled: bool,
    wrapped_native: Address,
    max_hops: usize,
    connectors: Vec<Address>,
    swap_gas: u64,
    extra_hop_gas: u64,
    symbols: HashMap<Address, String>,
    pools: Arc<RwLock<PoolRegistry>>,
}

impl AmmRouter {
    pub fn from_config(
        router: &AmmRouterConfig,
        config: &Config,
        pools: Arc<RwLock<PoolRegistry>>,
    ) -> EngineResult<Self> {
        let connectors = config
            .routing
            .connector_tokens
            .iter()
            .map(|c| parse_address(c))
            .collect::<EngineResult<Vec<_>>>()?;
        let mut symbols = HashMap::new();
        for token in &config.tokens {
            symbols.insert(parse_address(&token.address)?, token.symbol.clone());
        }

        Ok(Self {
            id: router.id.clone(),
            name: router.name.clone(),
            router_address: parse_address(&router.router_address)?,
            priority: router.priority,
            enabled: router.enabled,
            wrapped_native: parse_address(&config.network.wrapped_native)?,
            max_hops: config.routing.max_hops,
            connectors,
            swap_gas: config.gas.swap_gas_limit,
            extra_hop_gas: config.gas.extra_hop_gas,
            symbols,
            pools,
        })
    }

    pub fn router_address(&self) -> Address {
        self.router_address
    }

    pub fn pools(&self) -> &Arc<RwLock<PoolRegistry>> {
        &self.pools
    }

    /// Address used in pool paths for `token`
    fn path_token(&self, token: &Token) -> Address {
        if token.is_native() {
            self.wrapped_native
        } else {
            token.address
        }
    }

    fn symbol(&self, address: &Address, request: &QuoteRequest) -> String {
        if *address == self.path_token(&request.input) {
            return request.input.symbol.clone();
        }
        if *address == self.path_token(&request.output) {
            return request.output.symbol.clone();
        }
        self.symbols
            .get(address)
            .cloned()
            .unwrap_or_else(|| short_address(address))
    }

    fn gas_for(&self, hops: usize) -> u64 {
        self.swap_gas
            .saturating_add(self.extra_hop_gas.saturating_mul(hops.saturating_sub(1) as u64))
    }

    /// Every pool path this router can take from `input` to `output`
    pub fn candidate_paths(&self, registry: &PoolRegistry, input: &Token, output: &Token) -> Vec<PoolPath> {
        let query = PathQuery {
            max_hops: self.max_hops,
            connectors: &self.connectors,
            dex: Some(&self.id),
        };
        registry.find_paths(self.path_token(input), self.path_token(output), &query)
    }

    /// Quote one specific path against `registry`
    pub fn quote_path(&self, registry: &PoolRegistry, request: &QuoteRequest, path: &PoolPath) -> EngineResult<Quote> {
        let amounts = match request.swap_mode {
            SwapMode::ExactIn => registry.simulate_exact_in(path, request.amount)?,
            SwapMode::ExactOut => registry.simulate_exact_out(path, request.amount)?,
        };
        let price_impact_pct = registry.price_impact_pct(path, &amounts)?;

        let mut hops = Vec::with_capacity(path.hops());
        for (i, pool_address) in path.pools.iter().enumerate() {
            let pool = registry.get(pool_address).ok_or_else(|| {
                SwapEngineError::insufficient_liquidity(short_address(pool_address), "unknown pool")
            })?;
            let (reserve_in, reserve_out) = pool.reserves_for(&path.tokens[i]).unwrap_or_default();
            hops.push(RouteHop {
                pool: *pool_address,
                dex: pool.dex.clone(),
                token_in: path.tokens[i],
                token_out: path.tokens[i + 1],
                amount_in: amounts[i],
                amount_out: amounts[i + 1],
                reserve_in,
                reserve_out,
            });
        }

        let route_plan = path
            .tokens
            .iter()
            .map(|t| self.symbol(t, request))
            .collect::<Vec<_>>()
            .join(" → ");

        Ok(Quote {
            quote_id: uuid::Uuid::new_v4().to_string(),
            router_id: self.id.clone(),
            router_name: self.name.clone(),
            input: request.input.clone(),
            output: request.output.clone(),
            swap_mode: request.swap_mode,
            input_amount: amounts[0],
            output_amount: amounts[amounts.len() - 1],
            price_impact_pct,
            gas_estimate: self.gas_for(path.hops()),
            slippage_bps: request.slippage_bps,
            hops,
            route_plan,
            recipient: request.recipient,
            execution: ExecutionPlan::RouterPath {
                router: self.router_address,
                path: path.clone(),
            },
        })
    }

    /// Best path for `request`: most output (ExactIn) or least input (ExactOut)
    pub fn best_quote(&self, registry: &PoolRegistry, request: &QuoteRequest) -> EngineResult<Quote> {
        let paths = self.candidate_paths(registry, &request.input, &request.output);
        if paths.is_empty() {
            return Err(SwapEngineError::router_failed(
                &self.id,
                format!("no pool path for {}", request.pair_label()),
            ));
        }

        let mut best: Option<Quote> = None;
        let mut last_error = None;
        for path in &paths {
            match self.quote_path(registry, request, path) {
                Ok(quote) => {
                    let better = match (&best, request.swap_mode) {
                        (None, _) => true,
                        (Some(b), SwapMode::ExactIn) => quote.output_amount > b.output_amount,
                        (Some(b), SwapMode::ExactOut) => quote.input_amount < b.input_amount,
                    };
                    if better {
                        best = Some(quote);
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        match best {
            Some(quote) => {
                logger::debug(
                    LogTag::Router,
                    &format!(
                        "{}: best of {} paths is {} (in {}, out {})",
                        self.id,
                        paths.len(),
                        quote.route_plan,
                        quote.input_amount,
                        quote.output_amount
                    ),
                );
                Ok(quote)
            }
            None => Err(last_error.unwrap_or_else(|| {
                SwapEngineError::router_failed(&self.id, "no quotable path")
            })),
        }
    }

    /// Re-quote the path of `quote` on `registry` and apply the swap to it
    ///
    /// Used to replay legs in order on a cloned pool state.
    pub fn replay(&self, registry: &mut PoolRegistry, quote: &Quote) -> EngineResult<Quote> {
        let ExecutionPlan::RouterPath { path, .. } = &quote.execution else {
            return Err(SwapEngineError::router_failed(
                &self.id,
                "quote has no pool path to replay",
            ));
        };
        let fresh = self.quote_path(registry, &quote.to_request(), path)?;
        let amounts: Vec<U256> = std::iter::once(fresh.input_amount)
            .chain(fresh.hops.iter().map(|h| h.amount_out))
            .collect();
        registry.apply_path(path, &amounts)?;
        Ok(fresh)
    }
}

#[async_trait]
impl SwapRouter for AmmRouter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn supports_pair(&self, input: &Token, output: &Token) -> bool {
        let (from, to) = (self.path_token(input), self.path_token(output));
        if from == to {
            return false;
        }
        let registry = self.pools.read();
        registry.has_token(&from, Some(&self.id)) && registry.has_token(&to, Some(&self.id))
    }

    async fn get_quote(&self, request: &QuoteRequest) -> EngineResult<Quote> {
        let registry = self.pools.read();
        self.best_quote(&registry, request)
    }

    fn build_transactions(&self, quote: &Quote, context: &ExecutionContext) -> EngineResult<Vec<TxRequest>> {
        let ExecutionPlan::RouterPath { router, path } = &quote.execution else {
            return Err(SwapEngineError::router_failed(
                &self.id,
                "quote was not produced by an AMM router",
            ));
        };

        let exact_in = quote.swap_mode == SwapMode::ExactIn;
        let function = RouterFunction::select(quote.input.is_native(), quote.output.is_native(), exact_in);
        let (amount, limit) = if exact_in {
            (quote.input_amount, quote.min_output()?)
        } else {
            (quote.output_amount, quote.max_input()?)
        };

        let call = RouterCall {
            function,
            amount,
            limit,
            path: path.tokens.clone(),
            to: context.recipient,
            deadline: U256::from(context.deadline),
        };
        let (data, value) = call.encode();
        logger::debug(
            LogTag::Router,
            &format!(
                "{}: {} amount {} limit {} deadline {}",
                self.id,
                function.name(),
                amount,
                limit,
                context.deadline
            ),
        );

        Ok(vec![TxRequest {
            label: function.name().to_string(),
            to: *router,
            data,
            value,
            gas_limit: quote.gas_estimate,
            input_amount: quote.max_input()?,
        }])
    }

    fn as_amm(&self) -> Option<&AmmRouter> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::tokens::NATIVE_TOKEN;

    const WETH: u64 = 1;
    const USDC: u64 = 2;
    const DAI: u64 = 3;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn pool_config(address: u64, a: u64, b: u64, r0: &str, r1: &str) -> PoolConfig {
        PoolConfig {
            address: format!("{:?}", addr(address)),
            token0: format!("{:?}", addr(a)),
            token1: format!("{:?}", addr(b)),
            reserve0: r0.to_string(),
            reserve1: r1.to_string(),
        }
    }

    fn setup() -> (AmmRouter, Config) {
        let mut config = Config::default();
        config.network.wrapped_native = format!("{:?}", addr(WETH));
        config.tokens = vec![crate::config::TokenConfig {
            address: format!("{:?}", addr(DAI)),
            symbol: "DAI".to_string(),
            decimals: 18,
        }];
        let mut router = AmmRouterConfig::default();
        router.router_address = format!("{:?}", addr(900));
        router.pools = vec![
            // thin direct pool and a deep two-hop route through DAI
            pool_config(100, WETH, USDC, "1000000000000000000", "2000000000"),
            pool_config(101, WETH, DAI, "100000000000000000000", "200000000000000000000000"),
            pool_config(102, DAI, USDC, "1000000000000000000000000", "1000000000000"),
        ];
        config.routers.amm = vec![router.clone()];
        let registry = PoolRegistry::from_config(&config.routers.amm).unwrap();
        let amm = AmmRouter::from_config(&router, &config, Arc::new(RwLock::new(registry))).unwrap();
        (amm, config)
    }

    fn request(amount: U256, mode: SwapMode) -> QuoteRequest {
        QuoteRequest {
            input: Token::native("ETH"),
            output: Token::new(addr(USDC), "USDC", 6),
            amount,
            slippage_bps: 100,
            swap_mode: mode,
            recipient: addr(77),
        }
    }

    #[tokio::test]
    async fn test_quote_picks_deeper_two_hop_path() {
        let (amm, _) = setup();
        let one_eth = U256::from(10u64).pow(U256::from(17u64)); // 0.1 ETH
        let quote = amm.get_quote(&request(one_eth, SwapMode::ExactIn)).await.unwrap();
        assert_eq!(quote.route_plan, "ETH → DAI → USDC");
        assert_eq!(quote.hops.len(), 2);
        assert_eq!(quote.gas_estimate, 350_000);
        assert_eq!(quote.input.address, NATIVE_TOKEN);
        assert!(quote.output_amount > U256::from(190_000_000u64));
    }

    #[tokio::test]
    async fn test_build_exact_in_transaction_encodes_minimum() {
        let (amm, _) = setup();
        let amount = U256::from(10u64).pow(U256::from(17u64));
        let quote = amm.get_quote(&request(amount, SwapMode::ExactIn)).await.unwrap();
        let context = ExecutionContext {
            sender: addr(77),
            recipient: addr(77),
            deadline: 1_700_001_200,
        };
        let txs = amm.build_transactions(&quote, &context).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].label, "swapExactETHForTokens");
        assert_eq!(txs[0].to, addr(900));
        assert_eq!(txs[0].value, amount);

        let call = RouterCall::decode(&txs[0].data, txs[0].value).unwrap();
        assert_eq!(call.limit, quote.min_output().unwrap());
        assert!(!call.limit.is_zero());
        assert_eq!(call.path, vec![addr(WETH), addr(DAI), addr(USDC)]);
        assert_eq!(call.deadline, U256::from(1_700_001_200u64));
    }

    #[tokio::test]
    async fn test_exact_out_quote_and_transaction() {
        let (amm, _) = setup();
        let wanted = U256::from(50_000_000u64); // 50 USDC
        let quote = amm.get_quote(&request(wanted, SwapMode::ExactOut)).await.unwrap();
        assert_eq!(quote.output_amount, wanted);

        let context = ExecutionContext {
            sender: addr(77),
            recipient: addr(77),
            deadline: 1,
        };
        let txs = amm.build_transactions(&quote, &context).unwrap();
        assert_eq!(txs[0].label, "swapETHForExactTokens");
        assert_eq!(txs[0].value, quote.max_input().unwrap());
    }

    #[test]
    fn test_supports_pair_and_replay() {
        let (amm, _) = setup();
        let eth = Token::native("ETH");
        let usdc = Token::new(addr(USDC), "USDC", 6);
        let unknown = Token::new(addr(55), "UNK", 18);
        assert!(amm.supports_pair(&eth, &usdc));
        assert!(!amm.supports_pair(&eth, &unknown));
        assert!(!amm.supports_pair(&eth, &Token::new(addr(WETH), "WETH", 18)));

        let mut registry = amm.pools().read().clone();
        let req = request(U256::from(10u64).pow(U256::from(17u64)), SwapMode::ExactIn);
        let quote = amm.best_quote(&registry, &req).unwrap();
        let first = amm.replay(&mut registry, &quote).unwrap();
        let second = amm.replay(&mut registry, &quote).unwrap();
        assert_eq!(first.output_amount, quote.output_amount);
        assert!(second.output_amount < first.output_amount);
    }
}
