/// Swap engine
///
/// Owns the routers, the shared pool registry and the wallet, and runs the
/// full pipeline: resolve tokens, quote every router, pick the best single or
/// split route, approve, re-quote, sign and broadcast (or dry run).
use super::executor::{gas_cost, required_allowances, TransactionExecutor};
use super::gas::GasPolicy;
use super::liquidity::LiquidityLimits;
use super::optimizer::{select_route, ScoringContext};
use super::router::SwapRouter;
use super::routers::{AggregatorRouter, AmmRouter};
use super::simulation::{build_report, replay_plan, SimulationReport};
use super::slippage::{check_fresh_quote, retry_delay, sell_ladder, validate_slippage_bps};
use super::split::plan_split;
use super::stats::{StatsTracker, SwapStats};
use super::types::{
    ExecutionContext, QuoteRequest, RoutePlan, RouteSelection, SwapMode, SwapResult, TxRequest,
};
use crate::config::Config;
use crate::errors::{ConfigurationError, EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::{refresh_reserves, PoolRegistry};
use crate::rpc::ChainClient;
use crate::tokens::{apply_percentage, format_amount, to_raw_units, Token, TokenRegistry};
use crate::wallet::{token_balance, WalletSigner};
use ethers::types::{Address, U256};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct SwapEngine {
    config: Config,
    chain: Arc<dyn ChainClient>,
    executor: Option<TransactionExecutor>,
    routers: Vec<Arc<dyn SwapRouter>>,
    pools: Arc<RwLock<PoolRegistry>>,
    tokens: RwLock<TokenRegistry>,
    gas: GasPolicy,
    limits: LiquidityLimits,
    stats: StatsTracker,
}

impl SwapEngine {
    pub fn new(
        config: Config,
        chain: Arc<dyn ChainClient>,
        signer: Option<WalletSigner>,
        routers: Vec<Arc<dyn SwapRouter>>,
        pools: Arc<RwLock<PoolRegistry>>,
    ) -> EngineResult<Self> {
        config.validate().map_err(SwapEngineError::Configuration)?;
        let tokens = TokenRegistry::from_config(&config)?;
        let gas = GasPolicy::from_config(&config.gas)?;
        let limits = LiquidityLimits::from_config(&config.liquidity);
        let executor = signer.map(|signer| TransactionExecutor::new(chain.clone(), signer));

        logger::info(
            LogTag::Swap,
            &format!(
                "Swap engine ready on {} (chain {}): {} routers, {} pools{}",
                chain.name(),
                config.network.chain_id,
                routers.len(),
                pools.read().len(),
                if config.swaps.dry_run { ", DRY RUN" } else { "" }
            ),
        );

        Ok(Self {
            config,
            chain,
            executor,
            routers,
            pools,
            tokens: RwLock::new(tokens),
            gas,
            limits,
            stats: StatsTracker::new(),
        })
    }

    /// Routers and pools built from the `routers` config section
    pub fn from_config(config: Config, chain: Arc<dyn ChainClient>, signer: Option<WalletSigner>) -> EngineResult<Self> {
        let pools = Arc::new(RwLock::new(PoolRegistry::from_config(&config.routers.amm)?));

        let mut routers: Vec<Arc<dyn SwapRouter>> = Vec::new();
        for amm in &config.routers.amm {
            routers.push(Arc::new(AmmRouter::from_config(amm, &config, pools.clone())?));
        }
        if config.routers.aggregator.enabled {
            routers.push(Arc::new(AggregatorRouter::from_config(
                &config.routers.aggregator,
                &config,
            )?));
        }
        Self::new(config, chain, signer, routers, pools)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn routers(&self) -> &[Arc<dyn SwapRouter>] {
        &self.routers
    }

    pub fn native_token(&self) -> Token {
        self.tokens.read().native().clone()
    }

    pub fn wallet_address(&self) -> EngineResult<Address> {
        self.executor()
            .map(|executor| executor.address())
    }

    fn executor(&self) -> EngineResult<&TransactionExecutor> {
        self.executor.as_ref().ok_or_else(|| {
            SwapEngineError::Configuration(ConfigurationError::MissingConfig {
                field: "wallet.private_key".to_string(),
            })
        })
    }

    fn router(&self, id: &str) -> EngineResult<&Arc<dyn SwapRouter>> {
        self.routers
            .iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| SwapEngineError::router_failed(id, "router not registered"))
    }

    /// Symbol, address or native keyword; unknown addresses are looked up on chain
    pub async fn resolve_token(&self, input: &str) -> EngineResult<Token> {
        let mut registry = self.tokens.read().clone();
        let token = registry.resolve_on_chain(input, self.chain.as_ref()).await?;
        self.tokens.write().insert(token.clone());
        Ok(token)
    }

    /// Request from command-line style arguments; `amount` is in human units
    /// of the input token (ExactIn) or the output token (ExactOut)
    pub async fn build_request(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        slippage_bps: Option<u16>,
        swap_mode: SwapMode,
    ) -> EngineResult<QuoteRequest> {
        let input = self.resolve_token(from).await?;
        let output = self.resolve_token(to).await?;
        if input.address == output.address {
            return Err(SwapEngineError::invalid_address(
                to,
                "input and output are the same token",
            ));
        }

        let decimals = match swap_mode {
            SwapMode::ExactIn => input.decimals,
            SwapMode::ExactOut => output.decimals,
        };
        let raw = to_raw_units(amount, decimals)?;
        if raw.is_zero() {
            return Err(SwapEngineError::invalid_amount(amount, "amount must be positive"));
        }

        let slippage_bps = slippage_bps.unwrap_or(self.config.swaps.default_slippage_bps);
        validate_slippage_bps(slippage_bps, self.config.swaps.max_slippage_bps)?;

        let recipient = self
            .executor
            .as_ref()
            .map(|e| e.address())
            .unwrap_or_default();

        Ok(QuoteRequest {
            input,
            output,
            amount: raw,
            slippage_bps,
            swap_mode,
            recipient,
        })
    }

    async fn refresh_pools(&self) {
        let has_pools = !self.pools.read().is_empty();
        if self.config.swaps.refresh_pools && has_pools {
            refresh_reserves(self.chain.as_ref(), &self.pools).await;
        }
    }

    /// Native→token spot rate used to price gas in `token`
    fn native_spot_rate(&self, token: &Token) -> Option<f64> {
        let tokens = self.tokens.read();
        let wrapped = tokens.wrapped_native();
        let target = tokens.path_address(token.address);
        self.pools
            .read()
            .spot_rate(wrapped, target, self.config.routing.max_hops)
    }

    fn scored_token<'a>(request: &'a QuoteRequest) -> &'a Token {
        match request.swap_mode {
            SwapMode::ExactIn => &request.output,
            SwapMode::ExactOut => &request.input,
        }
    }

    /// Best route across every router, with all candidates and rejections
    pub async fn quote(&self, request: &QuoteRequest) -> EngineResult<RouteSelection> {
        self.refresh_pools().await;
        let gas_price = self.gas.resolve_gas_price(self.chain.as_ref()).await?;
        let context = ScoringContext {
            gas: &self.gas,
            gas_price,
            native_spot_rate: self.native_spot_rate(Self::scored_token(request)),
            limits: &self.limits,
        };
        let timeout = Duration::from_secs(self.config.swaps.quote_timeout_secs.max(1));

        let result = select_route(&self.routers, request, timeout, &context).await;
        match &result {
            Ok(selection) => {
                let ok: Vec<String> = selection
                    .candidates
                    .iter()
                    .map(|c| c.quote.router_id.clone())
                    .collect();
                let failed: Vec<String> = selection.rejected.iter().map(|(id, _)| id.clone()).collect();
                self.stats.record_quote_round(&ok, &failed).await;
            }
            Err(SwapEngineError::Routing(crate::errors::RoutingError::NoRoute { .. })) => {
                let ids: Vec<String> = self.routers.iter().map(|r| r.id().to_string()).collect();
                self.stats.record_quote_round(&[], &ids).await;
            }
            Err(_) => {}
        }
        result
    }

    /// Best route, upgraded to a split plan when splitting pays off
    pub async fn plan(&self, request: &QuoteRequest) -> EngineResult<(RouteSelection, RoutePlan)> {
        let selection = self.quote(request).await?;

        let amms: Vec<&AmmRouter> = self
            .routers
            .iter()
            .filter(|r| r.is_enabled())
            .filter_map(|r| r.as_amm())
            .collect();
        let split = if request.swap_mode == SwapMode::ExactIn && !amms.is_empty() {
            let registry = self.pools.read().clone();
            let context = ScoringContext {
                gas: &self.gas,
                gas_price: selection.gas_price,
                native_spot_rate: self.native_spot_rate(&request.output),
                limits: &self.limits,
            };
            plan_split(&amms, &registry, request, &selection.best, &self.config.split, &context)?
        } else {
            None
        };

        let plan = match split {
            Some(split) => RoutePlan::Split(split),
            None => RoutePlan::Single(selection.best.quote.clone()),
        };
        self.stats.record_win(&plan.router_ids()).await;
        logger::info(LogTag::Route, &format!("Route plan: {}", plan.describe()));
        Ok((selection, plan))
    }

    /// Approvals the plan needs: checked on chain when a wallet is configured,
    /// assumed for every token spender otherwise
    async fn approval_count(&self, plan: &RoutePlan) -> EngineResult<usize> {
        let legs = plan.legs();
        match &self.executor {
            Some(executor) => Ok(executor.approvals_needed(&legs).await?.len()),
            None => Ok(required_allowances(&legs)?.len()),
        }
    }

    /// Dry-run preview: route, replayed outputs, limits and gas
    pub async fn simulate(&self, request: &QuoteRequest) -> EngineResult<SimulationReport> {
        let (selection, plan) = self.plan(request).await?;
        let registry = self.pools.read().clone();
        let replayed = replay_plan(&plan, &self.routers, &registry)?;
        let approvals = self.approval_count(&plan).await?;
        let approval_gas = self.gas.approve_gas_limit.saturating_mul(approvals as u64);
        build_report(
            plan,
            &replayed,
            selection.gas_price,
            approval_gas,
            self.native_spot_rate(&request.output),
        )
    }

    /// Re-quote every leg right before broadcast and compare with its limit
    ///
    /// AMM legs are replayed in order on a copy of the refreshed pools, so
    /// later split legs see the impact of earlier ones.
    pub(crate) async fn preflight(&self, plan: &RoutePlan) -> EngineResult<()> {
        self.refresh_pools().await;
        let mut state = self.pools.read().clone();
        for leg in plan.legs() {
            let router = self.router(&leg.router_id)?;
            let fresh = match router.as_amm() {
                Some(amm) => amm.replay(&mut state, leg)?,
                None => router.get_quote(&leg.to_request()).await?,
            };
            check_fresh_quote(leg, &fresh)?;
        }
        Ok(())
    }

    /// Select, approve, re-quote and send a swap
    pub async fn swap(&self, request: &QuoteRequest) -> EngineResult<SwapResult> {
        let start = Instant::now();
        self.executor()?;
        let (selection, plan) = self.plan(request).await?;
        let dry_run = self.config.swaps.dry_run;

        let result = self.execute_plan(request, &plan, selection.gas_price, start).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.stats
            .record_swap(&plan.router_ids(), result.is_ok(), dry_run, plan.is_split(), elapsed_ms)
            .await;
        if let Err(e) = &result {
            if matches!(e.executed_input(), Some(spent) if !spent.is_zero()) {
                self.stats.record_partial().await;
            }
        }

        match &result {
            Ok(swap) => logger::info(LogTag::Swap, &format!("Swap complete: {}", swap.summary())),
            Err(e) => logger::error(
                LogTag::Swap,
                &format!("Swap {} failed: {}", request.pair_label(), e),
            ),
        }
        result
    }

    async fn execute_plan(
        &self,
        request: &QuoteRequest,
        plan: &RoutePlan,
        gas_price: U256,
        start: Instant,
    ) -> EngineResult<SwapResult> {
        let executor = self.executor()?;
        let sender = executor.address();
        let legs = plan.legs();

        let approvals = executor.approvals_needed(&legs).await?;
        let deadline = self
            .chain
            .block_timestamp()
            .await?
            .saturating_add(self.config.swaps.deadline_secs);
        let context = ExecutionContext {
            sender,
            recipient: request.recipient,
            deadline,
        };

        let mut txs: Vec<TxRequest> = approvals
            .iter()
            .map(|a| a.to_tx(self.gas.approve_gas_limit))
            .collect();
        for leg in &legs {
            txs.extend(self.router(&leg.router_id)?.build_transactions(leg, &context)?);
        }

        let required_input = plan.max_input()?;
        executor
            .check_balances(&request.input, required_input, &txs, gas_price)
            .await?;

        if self.config.swaps.preflight_requote {
            self.preflight(plan).await?;
        }

        let dry_run = self.config.swaps.dry_run;
        let before = token_balance(self.chain.as_ref(), &request.output, request.recipient).await?;
        let transactions = executor.execute(&txs, gas_price, !dry_run).await?;
        let gas_cost_wei = gas_cost(&txs, gas_price)?;

        let actual_output = if dry_run {
            None
        } else {
            let after = token_balance(self.chain.as_ref(), &request.output, request.recipient).await?;
            // the sender paid gas out of the same native balance
            let after = if request.output.is_native() && request.recipient == sender {
                after.saturating_add(gas_cost_wei)
            } else {
                after
            };
            Some(after.saturating_sub(before))
        };

        Ok(SwapResult {
            success: true,
            dry_run,
            routers: plan.router_ids(),
            route: plan.describe(),
            input: request.input.clone(),
            output: request.output.clone(),
            input_amount: plan.input_amount(),
            expected_output: plan.output_amount(),
            min_output: plan.min_output()?,
            actual_output,
            slippage_bps: request.slippage_bps,
            gas_price,
            gas_cost_wei,
            transactions,
            execution_time: start.elapsed().as_secs_f64(),
        })
    }

    /// Spend `native_amount` (human units) of the native coin on `token`
    pub async fn buy(&self, token: &str, native_amount: &str, slippage_bps: Option<u16>) -> EngineResult<SwapResult> {
        let native = self.native_token();
        let request = self
            .build_request(&native.symbol, token, native_amount, slippage_bps, SwapMode::ExactIn)
            .await?;
        logger::info(
            LogTag::Swap,
            &format!(
                "Buying {} with {}",
                request.output.symbol,
                format_amount(request.amount, native.decimals, &native.symbol)
            ),
        );
        self.swap(&request).await
    }

    /// Sell `percentage` of the wallet's `token` balance for the native coin
    ///
    /// Slippage failures are retried with the wider steps of the sell ladder.
    pub async fn sell(&self, token: &str, percentage: f64, slippage_bps: Option<u16>) -> EngineResult<SwapResult> {
        let owner = self.wallet_address()?;
        let token = self.resolve_token(token).await?;
        if token.is_native() {
            return Err(SwapEngineError::invalid_address(
                &token.symbol,
                "the native coin cannot be sold for itself",
            ));
        }

        let balance = token_balance(self.chain.as_ref(), &token, owner).await?;
        if balance.is_zero() {
            return Err(SwapEngineError::insufficient_balance(&token.symbol, U256::one(), balance));
        }
        let amount = apply_percentage(balance, percentage)?;
        if amount.is_zero() {
            return Err(SwapEngineError::invalid_amount(
                percentage.to_string(),
                "percentage of the balance rounds to zero",
            ));
        }

        let ladder = sell_ladder(slippage_bps, &self.config.swaps.sell_retry_slippage_bps);
        logger::info(
            LogTag::Swap,
            &format!(
                "Selling {:.1}% of {} ({}), slippage ladder {:?} bps",
                percentage,
                token.symbol,
                format_amount(amount, token.decimals, &token.symbol),
                ladder
            ),
        );

        let native = self.native_token();
        // legs that went through before a failure are not sold again
        let mut remaining = amount;
        let mut last_error = None;
        for (attempt, bps) in ladder.iter().copied().enumerate() {
            validate_slippage_bps(bps, self.config.swaps.max_slippage_bps)?;
            let request = QuoteRequest::exact_in(token.clone(), native.clone(), remaining, bps, owner);
            match self.swap(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_slippage_related() && attempt + 1 < ladder.len() => {
                    if let Some(spent) = e.executed_input().filter(|spent| !spent.is_zero()) {
                        remaining = remaining.saturating_sub(spent);
                        if remaining.is_zero() {
                            return Err(e);
                        }
                        logger::warning(
                            LogTag::Slippage,
                            &format!(
                                "{} already sold, {} left to sell",
                                format_amount(spent, token.decimals, &token.symbol),
                                format_amount(remaining, token.decimals, &token.symbol)
                            ),
                        );
                    }
                    let delay = retry_delay(attempt, self.config.swaps.retry_delay_secs);
                    logger::warning(
                        LogTag::Slippage,
                        &format!(
                            "Sell attempt {} at {} bps failed ({}), retrying in {}s with {} bps",
                            attempt + 1,
                            bps,
                            e,
                            delay.as_secs(),
                            ladder[attempt + 1]
                        ),
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            SwapEngineError::configuration_error("swaps.sell_retry_slippage_bps", "empty ladder")
        }))
    }

    pub async fn stats(&self) -> SwapStats {
        self.stats.snapshot().await
    }
}
