pub mod arguments;
pub mod config;
pub mod errors; // Structured error handling
pub mod logger;
pub mod paths;
pub mod pools; // Constant-product pools, registry and path search
pub mod rpc; // Chain access (JSON-RPC + simulated chain)
pub mod run;
pub mod swaps;
pub mod tokens;
pub mod wallet; // Signing and balance checks
