/// Split routing across AMM paths
///
/// The order is cut into equal chunks and each chunk goes to the leg with
/// the best marginal output on a shared pool state, so legs that share a pool
/// see each other's impact. Leg quotes are then recomputed in execution order
/// on a fresh copy of the pools.
use super::gas::{gas_cost_in_token, gas_cost_wei};
use super::liquidity::{check_quote, LiquidityLimits};
use super::optimizer::ScoringContext;
use super::routers::AmmRouter;
use super::types::{Quote, QuoteRequest, ScoredQuote, SplitPlan, SwapMode};
use crate::config::SplitConfig;
use crate::errors::EngineResult;
use crate::logger::{self, LogTag};
use crate::pools::{PoolPath, PoolRegistry};
use crate::tokens::u256_to_f64;
use ethers::types::U256;

struct Leg<'a> {
    router: &'a AmmRouter,
    path: PoolPath,
    allocated: U256,
}

/// Amount entering each step of `quote`'s path
fn quote_amounts(quote: &Quote) -> Vec<U256> {
    std::iter::once(quote.input_amount)
        .chain(quote.hops.iter().map(|h| h.amount_out))
        .collect()
}

/// Greedy chunk allocation; returns the legs that received any input
fn allocate<'a>(
    routers: &[&'a AmmRouter],
    registry: &PoolRegistry,
    request: &QuoteRequest,
    settings: &SplitConfig,
) -> Vec<Leg<'a>> {
    let mut legs: Vec<Leg<'a>> = routers
        .iter()
        .copied()
        .flat_map(|router| {
            router
                .candidate_paths(registry, &request.input, &request.output)
                .into_iter()
                .map(move |path| Leg {
                    router,
                    path,
                    allocated: U256::zero(),
                })
        })
        .collect();
    if legs.len() < 2 {
        return Vec::new();
    }

    let parts = U256::from(settings.parts);
    let chunk = request.amount / parts;
    if chunk.is_zero() {
        return Vec::new();
    }
    let remainder = request.amount - chunk * parts;

    let mut state = registry.clone();
    for part in 0..settings.parts {
        let amount = if part + 1 == settings.parts {
            chunk + remainder
        } else {
            chunk
        };
        let used = legs.iter().filter(|l| !l.allocated.is_zero()).count();
        let full = used >= settings.max_legs;

        let mut best: Option<(usize, Vec<U256>)> = None;
        for (i, leg) in legs.iter().enumerate() {
            if full && leg.allocated.is_zero() {
                continue;
            }
            let Ok(amounts) = state.simulate_exact_in(&leg.path, amount) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, current)) => amounts.last() > current.last(),
            };
            if better {
                best = Some((i, amounts));
            }
        }

        let Some((index, amounts)) = best else {
            return Vec::new();
        };
        if state.apply_path(&legs[index].path, &amounts).is_err() {
            return Vec::new();
        }
        legs[index].allocated = legs[index].allocated.saturating_add(amount);
    }

    legs.retain(|l| !l.allocated.is_zero());
    legs
}

/// Net output of a route: output minus gas when the gas can be priced
fn net_output(
    output_amount: U256,
    input_amount: U256,
    gas_estimate: u64,
    request: &QuoteRequest,
    context: &ScoringContext<'_>,
) -> EngineResult<U256> {
    let cost = gas_cost_wei(gas_estimate, context.gas_price)?;
    let converted = gas_cost_in_token(
        cost,
        &request.output,
        output_amount,
        &request.input,
        input_amount,
        context.native_spot_rate,
    );
    Ok(output_amount.saturating_sub(converted.unwrap_or_default()))
}

/// A split plan that beats `baseline` by at least `min_improvement_bps`
///
/// `Ok(None)` whenever splitting does not apply or does not pay for its
/// extra gas.
pub fn plan_split(
    routers: &[&AmmRouter],
    registry: &PoolRegistry,
    request: &QuoteRequest,
    baseline: &ScoredQuote,
    settings: &SplitConfig,
    context: &ScoringContext<'_>,
) -> EngineResult<Option<SplitPlan>> {
    if !settings.enabled
        || request.swap_mode != SwapMode::ExactIn
        || settings.parts < 2
        || settings.max_legs < 2
    {
        return Ok(None);
    }

    let legs = allocate(routers, registry, request, settings);
    if legs.len() < 2 {
        logger::debug(
            LogTag::Route,
            &format!("No split for {}: allocation kept a single leg", request.pair_label()),
        );
        return Ok(None);
    }

    // execution order on a fresh state
    let mut state = registry.clone();
    let mut quotes = Vec::with_capacity(legs.len());
    for leg in &legs {
        let quote = leg
            .router
            .quote_path(&state, &request.with_amount(leg.allocated), &leg.path)?;
        if let Err(e) = check_quote(&quote, context.limits) {
            logger::debug(
                LogTag::Liquidity,
                &format!("Split leg {} rejected: {}", quote.route_plan, e),
            );
            return Ok(None);
        }
        state.apply_path(&leg.path, &quote_amounts(&quote))?;
        quotes.push(quote);
    }

    let output_amount = quotes
        .iter()
        .fold(U256::zero(), |total, q| total.saturating_add(q.output_amount));
    let gas_estimate = quotes
        .iter()
        .fold(0u64, |total, q| total.saturating_add(q.gas_estimate));
    let price_impact_pct = quotes
        .iter()
        .map(|q| q.price_impact_pct * u256_to_f64(q.input_amount))
        .sum::<f64>()
        / u256_to_f64(request.amount).max(1.0);

    let split_net = net_output(output_amount, request.amount, gas_estimate, request, context)?;
    let single_net = baseline.net_amount;
    if single_net.is_zero() || split_net <= single_net {
        logger::debug(
            LogTag::Route,
            &format!(
                "Split net {} does not beat single route net {}",
                split_net, single_net
            ),
        );
        return Ok(None);
    }
    let improvement_bps =
        (u256_to_f64(split_net) - u256_to_f64(single_net)) / u256_to_f64(single_net) * 10_000.0;
    if improvement_bps < f64::from(settings.min_improvement_bps) {
        logger::debug(
            LogTag::Route,
            &format!(
                "Split improvement {:.1} bps below threshold {} bps",
                improvement_bps, settings.min_improvement_bps
            ),
        );
        return Ok(None);
    }

    logger::info(
        LogTag::Route,
        &format!(
            "Split {} across {} legs: output {} vs {} single (+{:.1} bps net)",
            request.pair_label(),
            quotes.len(),
            output_amount,
            baseline.quote.output_amount,
            improvement_bps
        ),
    );

    Ok(Some(SplitPlan {
        legs: quotes,
        input_amount: request.amount,
        output_amount,
        gas_estimate,
        price_impact_pct,
        improvement_bps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AmmRouterConfig, Config, GasConfig, LiquidityConfig, PoolConfig};
    use crate::swaps::gas::GasPolicy;
    use crate::swaps::optimizer::score_quote;
    use crate::tokens::Token;
    use ethers::types::Address;
    use parking_lot::RwLock;
    use std::sync::Arc;

    const WETH: u64 = 1;
    const USDC: u64 = 2;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn router_config(id: &str, router: u64, pool: u64, weth: &str, usdc: &str) -> AmmRouterConfig {
        let mut config = AmmRouterConfig::default();
        config.id = id.to_string();
        config.name = id.to_string();
        config.router_address = format!("{:?}", addr(router));
        config.pools = vec![PoolConfig {
            address: format!("{:?}", addr(pool)),
            token0: format!("{:?}", addr(WETH)),
            token1: format!("{:?}", addr(USDC)),
            reserve0: weth.to_string(),
            reserve1: usdc.to_string(),
        }];
        config
    }

    /// Two routers with one WETH/USDC pool each
    fn setup(second_weth: &str, second_usdc: &str) -> (Vec<AmmRouter>, PoolRegistry) {
        let mut config = Config::default();
        config.network.wrapped_native = format!("{:?}", addr(WETH));
        config.routers.amm = vec![
            router_config("uniswap_v2", 900, 100, "100000000000000000000", "200000000000"),
            router_config("sushiswap", 901, 101, second_weth, second_usdc),
        ];
        let registry = PoolRegistry::from_config(&config.routers.amm).unwrap();
        let shared = Arc::new(RwLock::new(registry.clone()));
        let routers = config
            .routers
            .amm
            .iter()
            .map(|r| AmmRouter::from_config(r, &config, shared.clone()).unwrap())
            .collect();
        (routers, registry)
    }

    fn request(eth: u64) -> QuoteRequest {
        QuoteRequest::exact_in(
            Token::native("ETH"),
            Token::new(addr(USDC), "USDC", 6),
            U256::from(eth) * U256::exp10(18),
            100,
            addr(77),
        )
    }

    fn baseline(routers: &[AmmRouter], registry: &PoolRegistry, request: &QuoteRequest, context: &ScoringContext<'_>) -> ScoredQuote {
        let quote = routers[0].best_quote(registry, request).unwrap();
        score_quote(quote, 0, context).unwrap()
    }

    #[test]
    fn test_equal_pools_split_evenly() {
        let (routers, registry) = setup("100000000000000000000", "200000000000");
        let refs: Vec<&AmmRouter> = routers.iter().collect();
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let context = ScoringContext {
            gas: &gas,
            gas_price: U256::from(1_000_000_000u64),
            native_spot_rate: None,
            limits: &limits,
        };
        let request = request(10);
        let single = baseline(&routers, &registry, &request, &context);

        let plan = plan_split(&refs, &registry, &request, &single, &SplitConfig::default(), &context)
            .unwrap()
            .expect("split should win");
        assert_eq!(plan.legs.len(), 2);
        assert_eq!(plan.input_amount, request.amount);
        assert_eq!(plan.legs[0].input_amount, plan.legs[1].input_amount);
        assert!(plan.output_amount > single.quote.output_amount);
        assert!(plan.improvement_bps > 100.0);
        assert_eq!(plan.gas_estimate, 500_000);
    }

    #[test]
    fn test_small_order_stays_single() {
        let (routers, registry) = setup("100000000000000000000", "200000000000");
        let refs: Vec<&AmmRouter> = routers.iter().collect();
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let context = ScoringContext {
            gas: &gas,
            gas_price: U256::from(50_000_000_000u64),
            native_spot_rate: None,
            limits: &limits,
        };
        // 0.1 ETH: the extra leg's gas outweighs the tiny impact saving
        let request = QuoteRequest::exact_in(
            Token::native("ETH"),
            Token::new(addr(USDC), "USDC", 6),
            U256::exp10(17),
            100,
            addr(77),
        );
        let single = baseline(&routers, &registry, &request, &context);
        let plan = plan_split(&refs, &registry, &request, &single, &SplitConfig::default(), &context).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn test_exact_out_and_disabled_never_split() {
        let (routers, registry) = setup("100000000000000000000", "200000000000");
        let refs: Vec<&AmmRouter> = routers.iter().collect();
        let gas = GasPolicy::from_config(&GasConfig::default()).unwrap();
        let limits = LiquidityLimits::from_config(&LiquidityConfig::default());
        let context = ScoringContext {
            gas: &gas,
            gas_price: U256::zero(),
            native_spot_rate: None,
            limits: &limits,
        };
        let request = request(10);
        let single = baseline(&routers, &registry, &request, &context);

        let mut disabled = SplitConfig::default();
        disabled.enabled = false;
        assert!(plan_split(&refs, &registry, &request, &single, &disabled, &context)
            .unwrap()
            .is_none());

        let mut exact_out = request.clone();
        exact_out.swap_mode = SwapMode::ExactOut;
        assert!(plan_split(&refs, &registry, &exact_out, &single, &SplitConfig::default(), &context)
            .unwrap()
            .is_none());
    }
}
