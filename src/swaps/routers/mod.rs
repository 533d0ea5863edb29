/// Router implementations
pub mod aggregator;
pub mod amm;

pub use aggregator::AggregatorRouter;
pub use amm::AmmRouter;
