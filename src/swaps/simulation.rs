/// Dry-run simulation of a route
///
/// AMM legs are replayed in order on a copy of the pool state; aggregator
/// quotes are taken as returned. Nothing is signed or sent here.
use super::gas::{gas_cost_in_token, gas_cost_wei};
use super::router::SwapRouter;
use super::types::{effective_price, Quote, RoutePlan, SwapMode};
use crate::errors::{EngineResult, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::pools::PoolRegistry;
use crate::tokens::{format_amount, Token};
use ethers::types::U256;
use std::sync::Arc;

/// Price impact above which a warning is attached
pub const HIGH_PRICE_IMPACT_PCT: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub route: RoutePlan,
    pub input: Token,
    pub output: Token,
    pub swap_mode: SwapMode,
    pub input_amount: U256,
    pub expected_output: U256,
    pub min_output: U256,
    pub max_input: U256,
    pub price_impact_pct: f64,
    /// Swap gas plus approvals when needed
    pub gas_limit: u64,
    pub gas_price: U256,
    pub gas_cost_wei: U256,
    /// Expected output minus gas, when the gas can be priced in the output token
    pub net_output: Option<U256>,
    pub effective_price: f64,
    pub needs_approval: bool,
    pub warnings: Vec<String>,
}

impl SimulationReport {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Route:          {}", self.route.describe()),
            format!(
                "Input:          {}",
                format_amount(self.input_amount, self.input.decimals, &self.input.symbol)
            ),
            format!(
                "Expected out:   {}",
                format_amount(self.expected_output, self.output.decimals, &self.output.symbol)
            ),
        ];
        match self.swap_mode {
            SwapMode::ExactIn => lines.push(format!(
                "Minimum out:    {}",
                format_amount(self.min_output, self.output.decimals, &self.output.symbol)
            )),
            SwapMode::ExactOut => lines.push(format!(
                "Maximum in:     {}",
                format_amount(self.max_input, self.input.decimals, &self.input.symbol)
            )),
        }
        lines.push(format!("Price impact:   {:.3}%", self.price_impact_pct));
        lines.push(format!(
            "Gas:            {} @ {:.2} gwei = {}",
            self.gas_limit,
            crate::tokens::wei_to_gwei(self.gas_price),
            format_amount(self.gas_cost_wei, crate::tokens::NATIVE_DECIMALS, "native")
        ));
        if let Some(net) = self.net_output {
            lines.push(format!(
                "Net of gas:     {}",
                format_amount(net, self.output.decimals, &self.output.symbol)
            ));
        }
        lines.push(format!("Price:          {:.8} {}/{}", self.effective_price, self.output.symbol, self.input.symbol));
        lines.push(format!("Approval:       {}", if self.needs_approval { "required" } else { "not needed" }));
        for warning in &self.warnings {
            lines.push(format!("Warning:        {}", warning));
        }
        lines
    }
}

/// Replay every leg of `plan` in order on a copy of `registry`
pub fn replay_plan(
    plan: &RoutePlan,
    routers: &[Arc<dyn SwapRouter>],
    registry: &PoolRegistry,
) -> EngineResult<Vec<Quote>> {
    let mut state = registry.clone();
    let mut replayed = Vec::new();
    for leg in plan.legs() {
        let router = routers
            .iter()
            .find(|r| r.id() == leg.router_id)
            .ok_or_else(|| SwapEngineError::router_failed(&leg.router_id, "router not registered"))?;
        match router.as_amm() {
            Some(amm) => replayed.push(amm.replay(&mut state, leg)?),
            None => replayed.push(leg.clone()),
        }
    }
    Ok(replayed)
}

/// Build the report for `plan` from its replayed legs
pub fn build_report(
    plan: RoutePlan,
    replayed: &[Quote],
    gas_price: U256,
    approval_gas: u64,
    native_spot_rate: Option<f64>,
) -> EngineResult<SimulationReport> {
    let first = plan
        .legs()
        .first()
        .map(|q| (*q).clone())
        .ok_or_else(|| SwapEngineError::router_failed("simulation", "route has no legs"))?;
    let (input, output, swap_mode) = (first.input, first.output, first.swap_mode);

    let input_amount = replayed
        .iter()
        .fold(U256::zero(), |total, q| total.saturating_add(q.input_amount));
    let expected_output = replayed
        .iter()
        .fold(U256::zero(), |total, q| total.saturating_add(q.output_amount));
    let min_output = plan.min_output()?;
    let max_input = plan.max_input()?;

    let gas_limit = plan.gas_estimate().saturating_add(approval_gas);
    let gas_cost = gas_cost_wei(gas_limit, gas_price)?;
    let net_output = gas_cost_in_token(
        gas_cost,
        &output,
        expected_output,
        &input,
        input_amount,
        native_spot_rate,
    )
    .map(|gas| expected_output.saturating_sub(gas));

    let mut warnings = Vec::new();
    match swap_mode {
        SwapMode::ExactIn => {
            if expected_output < plan.output_amount() {
                warnings.push(format!(
                    "pool state moved: replayed output {} below quoted {}",
                    expected_output,
                    plan.output_amount()
                ));
            }
            if expected_output < min_output {
                warnings.push(format!(
                    "replayed output {} below minimum {}: the swap would revert",
                    expected_output, min_output
                ));
            }
        }
        SwapMode::ExactOut => {
            if input_amount > max_input {
                warnings.push(format!(
                    "replayed input {} above maximum {}: the swap would revert",
                    input_amount, max_input
                ));
            }
        }
    }
    let price_impact_pct = plan.price_impact_pct();
    if price_impact_pct > HIGH_PRICE_IMPACT_PCT {
        warnings.push(format!("high price impact {:.2}%", price_impact_pct));
    }
    if net_output.is_none() {
        warnings.push(format!("gas cost could not be priced in {}", output.symbol));
    }

    for warning in &warnings {
        logger::warning(LogTag::Simulation, warning);
    }
    logger::info(
        LogTag::Simulation,
        &format!(
            "Simulated {} -> {}: in {} out {} gas {}",
            input.symbol, output.symbol, input_amount, expected_output, gas_limit
        ),
    );

    Ok(SimulationReport {
        effective_price: effective_price(&input, input_amount, &output, expected_output),
        route: plan,
        input,
        output,
        swap_mode,
        input_amount,
        expected_output,
        min_output,
        max_input,
        price_impact_pct,
        gas_limit,
        gas_price,
        gas_cost_wei: gas_cost,
        net_output,
        needs_approval: approval_gas > 0,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AmmRouterConfig, Config, PoolConfig};
    use crate::swaps::routers::AmmRouter;
    use crate::swaps::types::QuoteRequest;
    use ethers::types::Address;
    use parking_lot::RwLock;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn setup() -> (Arc<dyn SwapRouter>, Arc<RwLock<PoolRegistry>>) {
        let mut config = Config::default();
        config.network.wrapped_native = format!("{:?}", addr(1));
        let mut router = AmmRouterConfig::default();
        router.router_address = format!("{:?}", addr(900));
        router.pools = vec![PoolConfig {
            address: format!("{:?}", addr(100)),
            token0: format!("{:?}", addr(1)),
            token1: format!("{:?}", addr(2)),
            reserve0: "100000000000000000000".to_string(),
            reserve1: "200000000000".to_string(),
        }];
        config.routers.amm = vec![router.clone()];
        let pools = Arc::new(RwLock::new(PoolRegistry::from_config(&config.routers.amm).unwrap()));
        let amm = AmmRouter::from_config(&router, &config, pools.clone()).unwrap();
        (Arc::new(amm), pools)
    }

    fn request() -> QuoteRequest {
        QuoteRequest::exact_in(
            Token::native("ETH"),
            Token::new(addr(2), "USDC", 6),
            U256::exp10(18),
            100,
            addr(77),
        )
    }

    #[tokio::test]
    async fn test_report_matches_untouched_pools() {
        let (router, pools) = setup();
        let quote = router.get_quote(&request()).await.unwrap();
        let plan = RoutePlan::Single(quote.clone());
        let registry = pools.read().clone();
        let replayed = replay_plan(&plan, &[router], &registry).unwrap();

        let report = build_report(plan, &replayed, U256::from(1_000_000_000u64), 0, None).unwrap();
        assert_eq!(report.expected_output, quote.output_amount);
        assert_eq!(report.min_output, quote.min_output().unwrap());
        assert_eq!(report.gas_limit, 250_000);
        assert_eq!(report.gas_cost_wei, U256::from(250_000_000_000_000u64));
        assert!(!report.needs_approval);
        assert!(report.net_output.unwrap() < report.expected_output);
        assert!(report.warnings.is_empty());
        // one pool, untouched: the shared registry is not mutated
        assert_eq!(pools.read().get(&addr(100)).unwrap().reserve0, U256::exp10(20));
    }

    #[tokio::test]
    async fn test_moved_pool_warns_about_revert() {
        let (router, pools) = setup();
        let quote = router.get_quote(&request()).await.unwrap();
        // someone dumps ETH into the pool after the quote
        pools
            .write()
            .update_reserves(&addr(100), U256::exp10(20) * 2, U256::from(100_000_000_000u64));
        let registry = pools.read().clone();
        let plan = RoutePlan::Single(quote);
        let replayed = replay_plan(&plan, &[router], &registry).unwrap();

        let report = build_report(plan, &replayed, U256::zero(), 80_000, None).unwrap();
        assert!(report.needs_approval);
        assert_eq!(report.gas_limit, 330_000);
        assert!(report.warnings.iter().any(|w| w.contains("would revert")));
        assert!(report.warnings.iter().any(|w| w.contains("pool state moved")));
    }
}
