/// Core types shared by routers, the optimizer and the engine
use super::slippage;
use crate::errors::EngineResult;
use crate::pools::PoolPath;
use crate::tokens::{format_amount, from_raw_units, Token};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Swap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapMode {
    /// Spend exactly `amount` of the input token
    ExactIn,
    /// Receive exactly `amount` of the output token
    ExactOut,
}

impl SwapMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

impl std::fmt::Display for SwapMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input: Token,
    pub output: Token,
    /// Raw units of the input (ExactIn) or output (ExactOut) token
    pub amount: U256,
    pub slippage_bps: u16,
    pub swap_mode: SwapMode,
    pub recipient: Address,
}

impl QuoteRequest {
    pub fn exact_in(input: Token, output: Token, amount: U256, slippage_bps: u16, recipient: Address) -> Self {
        Self {
            input,
            output,
            amount,
            slippage_bps,
            swap_mode: SwapMode::ExactIn,
            recipient,
        }
    }

    pub fn with_amount(&self, amount: U256) -> Self {
        Self {
            amount,
            ..self.clone()
        }
    }

    pub fn with_slippage(&self, slippage_bps: u16) -> Self {
        Self {
            slippage_bps,
            ..self.clone()
        }
    }

    pub fn pair_label(&self) -> String {
        format!("{} -> {}", self.input.symbol, self.output.symbol)
    }
}

/// One pool traversal, with the reserves seen when the quote was made
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHop {
    pub pool: Address,
    pub dex: String,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub reserve_in: U256,
    pub reserve_out: U256,
}

/// How a quote turns into a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Call a V2 router contract along `path`
    RouterPath { router: Address, path: PoolPath },
    /// Send prepared calldata (aggregator quotes)
    Calldata {
        to: Address,
        data: Bytes,
        value: U256,
        allowance_target: Option<Address>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub quote_id: String,
    pub router_id: String,
    pub router_name: String,
    pub input: Token,
    pub output: Token,
    pub swap_mode: SwapMode,
    pub input_amount: U256,
    pub output_amount: U256,
    pub price_impact_pct: f64,
    pub gas_estimate: u64,
    pub slippage_bps: u16,
    pub hops: Vec<RouteHop>,
    /// Human readable route, e.g. `WETH → USDC → DAI`
    pub route_plan: String,
    pub recipient: Address,
    pub execution: ExecutionPlan,
}

impl Quote {
    /// Minimum output enforced on chain
    pub fn min_output(&self) -> EngineResult<U256> {
        match self.swap_mode {
            SwapMode::ExactIn => slippage::min_output(self.output_amount, self.slippage_bps),
            SwapMode::ExactOut => Ok(self.output_amount),
        }
    }

    /// Maximum input the transaction may spend
    pub fn max_input(&self) -> EngineResult<U256> {
        match self.swap_mode {
            SwapMode::ExactIn => Ok(self.input_amount),
            SwapMode::ExactOut => slippage::max_input(self.input_amount, self.slippage_bps),
        }
    }

    /// Address that must be approved to pull the input token
    pub fn spender(&self) -> Option<Address> {
        if self.input.is_native() {
            return None;
        }
        match &self.execution {
            ExecutionPlan::RouterPath { router, .. } => Some(*router),
            ExecutionPlan::Calldata {
                allowance_target, ..
            } => *allowance_target,
        }
    }

    /// Quote request that would reproduce this quote
    pub fn to_request(&self) -> QuoteRequest {
        let amount = match self.swap_mode {
            SwapMode::ExactIn => self.input_amount,
            SwapMode::ExactOut => self.output_amount,
        };
        QuoteRequest {
            input: self.input.clone(),
            output: self.output.clone(),
            amount,
            slippage_bps: self.slippage_bps,
            swap_mode: self.swap_mode,
            recipient: self.recipient,
        }
    }

    /// Output per unit of input, in human units
    pub fn effective_price(&self) -> f64 {
        effective_price(&self.input, self.input_amount, &self.output, self.output_amount)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} → {} via {} [{}]",
            self.router_name,
            format_amount(self.input_amount, self.input.decimals, &self.input.symbol),
            format_amount(self.output_amount, self.output.decimals, &self.output.symbol),
            self.route_plan,
            self.router_id
        )
    }
}

pub fn effective_price(input: &Token, input_amount: U256, output: &Token, output_amount: U256) -> f64 {
    let spent = from_raw_units(input_amount, input.decimals);
    if spent <= 0.0 {
        return 0.0;
    }
    from_raw_units(output_amount, output.decimals) / spent
}

/// A quote with its gas cost and score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredQuote {
    pub quote: Quote,
    pub priority: u8,
    pub gas_cost_wei: U256,
    /// Gas cost in the scored token (output for ExactIn, input for ExactOut),
    /// `None` when no conversion rate is known
    pub gas_cost_in_token: Option<U256>,
    /// ExactIn: output minus gas. ExactOut: input plus gas.
    pub net_amount: U256,
}

#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub request: QuoteRequest,
    pub best: ScoredQuote,
    /// Every accepted quote, best first
    pub candidates: Vec<ScoredQuote>,
    /// `(router or quote label, reason)` for quotes that failed or were rejected
    pub rejected: Vec<(String, String)>,
    pub gas_price: U256,
}

/// An order spread across several AMM paths
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub legs: Vec<Quote>,
    pub input_amount: U256,
    pub output_amount: U256,
    pub gas_estimate: u64,
    pub price_impact_pct: f64,
    /// Net improvement over the best single route
    pub improvement_bps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoutePlan {
    Single(Quote),
    Split(SplitPlan),
}

impl RoutePlan {
    pub fn legs(&self) -> Vec<&Quote> {
        match self {
            RoutePlan::Single(quote) => vec![quote],
            RoutePlan::Split(plan) => plan.legs.iter().collect(),
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, RoutePlan::Split(_))
    }

    pub fn input_amount(&self) -> U256 {
        match self {
            RoutePlan::Single(quote) => quote.input_amount,
            RoutePlan::Split(plan) => plan.input_amount,
        }
    }

    pub fn output_amount(&self) -> U256 {
        match self {
            RoutePlan::Single(quote) => quote.output_amount,
            RoutePlan::Split(plan) => plan.output_amount,
        }
    }

    pub fn gas_estimate(&self) -> u64 {
        match self {
            RoutePlan::Single(quote) => quote.gas_estimate,
            RoutePlan::Split(plan) => plan.gas_estimate,
        }
    }

    pub fn price_impact_pct(&self) -> f64 {
        match self {
            RoutePlan::Single(quote) => quote.price_impact_pct,
            RoutePlan::Split(plan) => plan.price_impact_pct,
        }
    }

    pub fn min_output(&self) -> EngineResult<U256> {
        self.legs().iter().try_fold(U256::zero(), |total, leg| {
            Ok(total.saturating_add(leg.min_output()?))
        })
    }

    pub fn max_input(&self) -> EngineResult<U256> {
        self.legs().iter().try_fold(U256::zero(), |total, leg| {
            Ok(total.saturating_add(leg.max_input()?))
        })
    }

    pub fn router_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for leg in self.legs() {
            if !ids.contains(&leg.router_id) {
                ids.push(leg.router_id.clone());
            }
        }
        ids
    }

    pub fn describe(&self) -> String {
        match self {
            RoutePlan::Single(quote) => format!("{} ({})", quote.route_plan, quote.router_name),
            RoutePlan::Split(plan) => plan
                .legs
                .iter()
                .map(|leg| {
                    let share = if plan.input_amount.is_zero() {
                        0.0
                    } else {
                        crate::tokens::u256_to_f64(leg.input_amount)
                            / crate::tokens::u256_to_f64(plan.input_amount)
                            * 100.0
                    };
                    format!("{:.0}% {} ({})", share, leg.route_plan, leg.router_name)
                })
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

/// A transaction to sign, before nonce and gas price are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// `approve` or the router function name
    pub label: String,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: u64,
    /// Input token amount this transaction can take from the sender; zero
    /// for approvals
    pub input_amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    pub sender: Address,
    pub recipient: Address,
    /// Unix timestamp after which the router rejects the swap
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedTx {
    pub label: String,
    pub hash: H256,
    pub nonce: U256,
    pub gas_limit: u64,
    /// `false` for dry runs: signed but never sent
    pub broadcast: bool,
}

#[derive(Debug, Clone)]
pub struct SwapResult {
    pub success: bool,
    pub dry_run: bool,
    pub routers: Vec<String>,
    pub route: String,
    pub input: Token,
    pub output: Token,
    pub input_amount: U256,
    pub expected_output: U256,
    pub min_output: U256,
    /// Measured from the recipient's balance after broadcast
    pub actual_output: Option<U256>,
    pub slippage_bps: u16,
    pub gas_price: U256,
    pub gas_cost_wei: U256,
    pub transactions: Vec<SubmittedTx>,
    pub execution_time: f64,
}

impl SwapResult {
    pub fn summary(&self) -> String {
        let output = self.actual_output.unwrap_or(self.expected_output);
        format!(
            "{}{} → {} via {} ({} tx, {:.2}s)",
            if self.dry_run { "[DRY RUN] " } else { "" },
            format_amount(self.input_amount, self.input.decimals, &self.input.symbol),
            format_amount(output, self.output.decimals, &self.output.symbol),
            self.route,
            self.transactions.len(),
            self.execution_time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::NATIVE_TOKEN;

    fn quote(mode: SwapMode, input: Token) -> Quote {
        Quote {
            quote_id: "q".to_string(),
            router_id: "uniswap_v2".to_string(),
            router_name: "Uniswap V2".to_string(),
            input,
            output: Token::new(Address::from_low_u64_be(2), "USDC", 6),
            swap_mode: mode,
            input_amount: U256::from(10_000u64),
            output_amount: U256::from(20_000u64),
            price_impact_pct: 0.5,
            gas_estimate: 250_000,
            slippage_bps: 100,
            hops: Vec::new(),
            route_plan: "WETH → USDC".to_string(),
            recipient: Address::from_low_u64_be(9),
            execution: ExecutionPlan::RouterPath {
                router: Address::from_low_u64_be(7),
                path: PoolPath {
                    tokens: vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)],
                    pools: vec![Address::from_low_u64_be(100)],
                },
            },
        }
    }

    #[test]
    fn test_limits_follow_swap_mode() {
        let exact_in = quote(SwapMode::ExactIn, Token::new(Address::from_low_u64_be(1), "WETH", 18));
        assert_eq!(exact_in.min_output().unwrap(), U256::from(19_800u64));
        assert_eq!(exact_in.max_input().unwrap(), U256::from(10_000u64));

        let exact_out = quote(SwapMode::ExactOut, Token::new(Address::from_low_u64_be(1), "WETH", 18));
        assert_eq!(exact_out.min_output().unwrap(), U256::from(20_000u64));
        assert_eq!(exact_out.max_input().unwrap(), U256::from(10_100u64));
        assert_eq!(exact_out.to_request().amount, U256::from(20_000u64));
    }

    #[test]
    fn test_native_input_needs_no_approval() {
        let token_in = quote(SwapMode::ExactIn, Token::new(Address::from_low_u64_be(1), "WETH", 18));
        assert_eq!(token_in.spender(), Some(Address::from_low_u64_be(7)));

        let native_in = quote(SwapMode::ExactIn, Token::native("ETH"));
        assert_eq!(native_in.input.address, NATIVE_TOKEN);
        assert_eq!(native_in.spender(), None);
    }

    #[test]
    fn test_split_plan_totals() {
        let leg = quote(SwapMode::ExactIn, Token::native("ETH"));
        let plan = RoutePlan::Split(SplitPlan {
            legs: vec![leg.clone(), leg],
            input_amount: U256::from(20_000u64),
            output_amount: U256::from(40_000u64),
            gas_estimate: 500_000,
            price_impact_pct: 0.5,
            improvement_bps: 12.0,
        });
        assert!(plan.is_split());
        assert_eq!(plan.min_output().unwrap(), U256::from(39_600u64));
        assert_eq!(plan.router_ids(), vec!["uniswap_v2".to_string()]);
        assert!(plan.describe().starts_with("50% WETH → USDC"));
    }
}
