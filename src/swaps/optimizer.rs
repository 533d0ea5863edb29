/// Multi-router route optimization
///
/// Quotes are requested from every enabled router concurrently, each bounded
/// by the quote timeout. Surviving quotes are checked for liquidity, priced
/// net of gas and ranked.
use super::gas::{gas_cost_in_token, gas_cost_wei, GasPolicy};
use super::liquidity::{check_quote, LiquidityLimits};
use super::router::SwapRouter;
use super::types::{Quote, QuoteRequest, RouteSelection, ScoredQuote, SwapMode};
use crate::errors::{EngineResult, RoutingError, SwapEngineError};
use crate::logger::{self, LogTag};
use ethers::types::U256;
use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything needed to turn a quote into a score
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub gas: &'a GasPolicy,
    pub gas_price: U256,
    /// Native→scored-token spot rate (output for ExactIn, input for ExactOut)
    pub native_spot_rate: Option<f64>,
    pub limits: &'a LiquidityLimits,
}

/// Quotes from every enabled router supporting the pair, with failures
pub async fn collect_quotes(
    routers: &[Arc<dyn SwapRouter>],
    request: &QuoteRequest,
    timeout: Duration,
) -> (Vec<(u8, Quote)>, Vec<(String, String)>) {
    let eligible: Vec<&Arc<dyn SwapRouter>> = routers
        .iter()
        .filter(|r| r.is_enabled() && r.supports_pair(&request.input, &request.output))
        .collect();

    logger::debug(
        LogTag::Route,
        &format!(
            "Requesting {} quotes from {}/{} routers",
            request.pair_label(),
            eligible.len(),
            routers.len()
        ),
    );

    let results = join_all(eligible.into_iter().map(|router| async move {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, router.get_quote(request)).await {
            Ok(result) => result,
            Err(_) => Err(SwapEngineError::Routing(RoutingError::QuoteTimeout {
                router: router.id().to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })),
        };
        (router.id().to_string(), router.priority(), start.elapsed(), result)
    }))
    .await;

    let mut quotes = Vec::new();
    let mut failures = Vec::new();
    for (id, priority, elapsed, result) in results {
        match result {
            Ok(quote) => {
                logger::debug(
                    LogTag::Route,
                    &format!("{} quoted in {}ms: {}", id, elapsed.as_millis(), quote.summary()),
                );
                quotes.push((priority, quote));
            }
            Err(e) => {
                logger::warning(LogTag::Route, &format!("{} quote failed: {}", id, e));
                failures.push((id, e.to_string()));
            }
        }
    }
    (quotes, failures)
}

/// Gas cost, conversion and net amount for one quote
pub fn score_quote(quote: Quote, priority: u8, context: &ScoringContext<'_>) -> EngineResult<ScoredQuote> {
    let gas_cost = gas_cost_wei(quote.gas_estimate, context.gas_price)?;

    let (gas_in_token, net_amount) = match quote.swap_mode {
        SwapMode::ExactIn => {
            let converted = gas_cost_in_token(
                gas_cost,
                &quote.output,
                quote.output_amount,
                &quote.input,
                quote.input_amount,
                context.native_spot_rate,
            );
            if let Some(cost) = converted {
                context.gas.check_gas_share(cost, quote.output_amount)?;
            }
            let net = quote
                .output_amount
                .saturating_sub(converted.unwrap_or_default());
            (converted, net)
        }
        SwapMode::ExactOut => {
            let converted = gas_cost_in_token(
                gas_cost,
                &quote.input,
                quote.input_amount,
                &quote.output,
                quote.output_amount,
                context.native_spot_rate,
            );
            if let Some(cost) = converted {
                context.gas.check_gas_share(cost, quote.input_amount)?;
            }
            let net = quote
                .input_amount
                .saturating_add(converted.unwrap_or_default());
            (converted, net)
        }
    };

    Ok(ScoredQuote {
        quote,
        priority,
        gas_cost_wei: gas_cost,
        gas_cost_in_token: gas_in_token,
        net_amount,
    })
}

/// Best first: net amount, then router priority, then lower gas
pub fn compare_scored(a: &ScoredQuote, b: &ScoredQuote) -> Ordering {
    let by_amount = match a.quote.swap_mode {
        SwapMode::ExactIn => b.net_amount.cmp(&a.net_amount),
        SwapMode::ExactOut => a.net_amount.cmp(&b.net_amount),
    };
    by_amount
        .then(a.priority.cmp(&b.priority))
        .then(a.quote.gas_estimate.cmp(&b.quote.gas_estimate))
}

/// Liquidity-check, score and rank quotes
pub fn rank_quotes(
    quotes: Vec<(u8, Quote)>,
    context: &ScoringContext<'_>,
    rejected: &mut Vec<(String, String)>,
) -> Vec<ScoredQuote> {
    let mut candidates = Vec::with_capacity(quotes.len());
    for (priority, quote) in quotes {
        if let Err(e) = check_quote(&quote, context.limits) {
            logger::info(
                LogTag::Liquidity,
                &format!("Rejected {} quote: {}", quote.router_id, e),
            );
            rejected.push((quote.router_id.clone(), e.to_string()));
            continue;
        }
        let router_id = quote.router_id.clone();
        match score_quote(quote, priority, context) {
            Ok(scored) => candidates.push(scored),
            Err(e) => {
                logger::info(LogTag::Gas, &format!("Rejected {} quote: {}", router_id, e));
                rejected.push((router_id, e.to_string()));
            }
        }
    }
    candidates.sort_by(compare_scored);
    candidates
}

pub async fn select_route(
    routers: &[Arc<dyn SwapRouter>],
    request: &QuoteRequest,
    quote_timeout: Duration,
    context: &ScoringContext<'_>,
) -> EngineResult<RouteSelection> {
    let (quotes, mut rejected) = collect_quotes(routers, request, quote_timeout).await;
    let candidates = rank_quotes(quotes, context, &mut rejected);

    let Some(best) = candidates.first().cloned() else {
        return Err(SwapEngineError::Routing(RoutingError::NoRoute {
            input: request.input.symbol.clone(),
            output: request.output.symbol.clone(),
            reasons: rejected
                .iter()
                .map(|(id, reason)| format!("{}: {}", id, reason))
                .collect(),
        }));
    };

    logger::info(
        LogTag::Route,
        &format!(
            "Best route for {}: {} (net {}, {} candidates, {} rejected)",
            request.pair_label(),
            best.quote.summary(),
            best.net_amount,
            candidates.len(),
            rejected.len()
        ),
    );

    Ok(RouteSelection {
        request: request.clone(),
        best,
        candidates,
        rejected,
        gas_price: context.gas_price,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{GasConfig, LiquidityConfig};
    use crate::pools::PoolPath;
    use crate::swaps::types::{ExecutionContext, ExecutionPlan, TxRequest};
    use crate::tokens::Token;
    use async_trait::async_trait;
    use ethers::types::Address;

    /// Router answering with a fixed output, optionally slowly or not at all
    pub(crate) struct FixedRouter {
        pub id: &'static str,
        pub priority: u8,
        pub output: u64,
        pub gas: u64,
        pub delay: Duration,
        pub fail: bool,
    }

    impl FixedRouter {
        pub(crate) fn new(id: &'static str, output: u64, gas: u64) -> Self {
            Self {
                id,
                priority: 0,
                output,
                gas,
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl SwapRouter for FixedRouter {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn supports_pair(&self, _input: &Token, _output: &Token) -> bool {
            true
        }

        async fn get_quote(&self, request: &QuoteRequest) -> EngineResult<Quote> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SwapEngineError::router_failed(self.id, "no pool"));
            }
            Ok(Quote {
                quote_id: self.id.to_string(),
                router_id: self.id.to_string(),
                router_name: self.id.to_string(),
                input: request.input.clone(),
                output: request.output.clone(),
                swap_mode: request.swap_mode,
                input_amount: request.amount,
                output_amount: U256::from(self.output),
                price_impact_pct: 0.1,
                gas_estimate: self.gas,
                slippage_bps: request.slippage_bps,
                hops: Vec::new(),
                route_plan: "direct".to_string(),
                recipient: request.recipient,
                execution: ExecutionPlan::RouterPath {
                    router: Address::from_low_u64_be(900),
                    path: PoolPath {
                        tokens: Vec::new(),
                        pools: Vec::new(),
                    },
                },
            })
        }

        fn build_transactions(&self, _quote: &Quote, _context: &ExecutionContext) -> EngineResult<Vec<TxRequest>> {
            Ok(Vec::new())
        }
    }

    fn request() -> QuoteRequest {
        // 2000 USDC in, ETH out; output units are wei
        QuoteRequest::exact_in(
            Token::new(Address::from_low_u64_be(2), "USDC", 6),
            Token::native("ETH"),
            U256::from(2_000_000_000u64),
            100,
            Address::from_low_u64_be(77),
        )
    }

    fn scoring<'a>(gas: &'a GasPolicy, limits: &'a LiquidityLimits) -> ScoringContext<'a> {
        ScoringContext {
            gas,
            gas_price: U256::from(1_000_000_000u64),
            native_spot_rate: None,
            limits,
        }
    }

    #[tokio::test]
    async fn test_best_route_is_net_of_gas() {
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        // output is native: gas converts one to one
        let routers: Vec<Arc<dyn SwapRouter>> = vec![
            Arc::new(FixedRouter::new("heavy", 1_000_000_000_000_000, 300_000)),
            Arc::new(FixedRouter::new("light", 999_900_000_000_000, 100_000)),
        ];
        let selection = select_route(&routers, &request(), Duration::from_secs(1), &scoring(&gas, &limits))
            .await
            .unwrap();
        assert_eq!(selection.best.quote.router_id, "light");
        assert_eq!(selection.candidates.len(), 2);
        assert_eq!(
            selection.best.net_amount,
            U256::from(999_900_000_000_000u64 - 100_000_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_timeouts_and_failures_are_skipped() {
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let mut slow = FixedRouter::new("slow", 10_000_000_000_000_000, 100_000);
        slow.delay = Duration::from_secs(5);
        let mut broken = FixedRouter::new("broken", 1, 1);
        broken.fail = true;
        let routers: Vec<Arc<dyn SwapRouter>> = vec![
            Arc::new(slow),
            Arc::new(broken),
            Arc::new(FixedRouter::new("ok", 1_000_000_000_000_000, 100_000)),
        ];
        let selection = select_route(&routers, &request(), Duration::from_millis(50), &scoring(&gas, &limits))
            .await
            .unwrap();
        assert_eq!(selection.best.quote.router_id, "ok");
        assert_eq!(selection.rejected.len(), 2);
        assert!(selection
            .rejected
            .iter()
            .any(|(id, reason)| id == "slow" && reason.contains("timed out")));
    }

    #[tokio::test]
    async fn test_no_route_lists_every_reason() {
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let mut broken = FixedRouter::new("broken", 1, 1);
        broken.fail = true;
        // gas of 0.1 ETH against 0.001 ETH output
        let expensive = FixedRouter::new("expensive", 1_000_000_000_000_000, 100_000_000);
        let routers: Vec<Arc<dyn SwapRouter>> = vec![Arc::new(broken), Arc::new(expensive)];

        let err = select_route(&routers, &request(), Duration::from_secs(1), &scoring(&gas, &limits))
            .await
            .unwrap_err();
        match err {
            SwapEngineError::Routing(RoutingError::NoRoute { reasons, .. }) => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons.iter().any(|r| r.starts_with("expensive:") && r.contains("Gas cost")));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_ties_break_on_priority_then_gas() {
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let context = ScoringContext {
            gas_price: U256::zero(),
            ..scoring(&gas, &limits)
        };
        let quote = |id: &str, gas_estimate: u64| {
            let mut q = futures::executor::block_on(
                FixedRouter::new("x", 5_000, gas_estimate).get_quote(&request()),
            )
            .unwrap();
            q.router_id = id.to_string();
            q
        };
        let mut rejected = Vec::new();
        let ranked = rank_quotes(
            vec![(2, quote("b", 100)), (1, quote("a", 200)), (1, quote("c", 150))],
            &context,
            &mut rejected,
        );
        let order: Vec<&str> = ranked.iter().map(|s| s.quote.router_id.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
