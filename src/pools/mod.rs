/// Constant-product pools: math, registry and path search
pub mod math;
pub mod pathfinder;
pub mod registry;
pub mod types;

pub use pathfinder::{find_paths, PathQuery, PoolPath};
pub use registry::{refresh_reserves, PoolRegistry};
pub use types::Pool;
