/// Swap routing and execution
///
/// - `router` / `routers`: the `SwapRouter` trait and its AMM and aggregator implementations
/// - `optimizer`: concurrent quoting and gas-aware ranking
/// - `split`: splitting an order across AMM paths
/// - `liquidity`, `gas`, `slippage`: checks applied before anything is signed
/// - `simulation`: dry-run reports
/// - `executor`, `engine`: approvals, signing, broadcast, buy/sell
pub mod engine;
pub mod executor;
pub mod gas;
pub mod liquidity;
pub mod optimizer;
pub mod router;
pub mod routers;
pub mod simulation;
pub mod slippage;
pub mod split;
pub mod stats;
pub mod types;


pub use engine::SwapEngine;
pub use router::SwapRouter;
pub use routers::{AggregatorRouter, AmmRouter};
pub use simulation::SimulationReport;
pub use stats::SwapStats;
pub use types::{
    ExecutionContext, ExecutionPlan, Quote, QuoteRequest, RouteHop, RoutePlan, RouteSelection,
    ScoredQuote, SplitPlan, SubmittedTx, SwapMode, SwapResult, TxRequest,
};
