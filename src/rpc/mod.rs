/// Chain access
///
/// `ChainClient` is the only way the engine touches a chain. `HttpRpcClient`
/// talks JSON-RPC to a node; `SimulatedChain` keeps a whole chain in memory for
/// the demo, dry runs and tests.
pub mod erc20;
pub mod http;
pub mod router_abi;
pub mod simulated;

pub use http::HttpRpcClient;
pub use simulated::{SentTransaction, SimulatedChain};

use crate::errors::EngineResult;
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    async fn chain_id(&self) -> EngineResult<u64>;

    /// Timestamp of the latest block
    async fn block_timestamp(&self) -> EngineResult<u64>;

    /// Pending nonce of `address`
    async fn transaction_count(&self, address: Address) -> EngineResult<U256>;

    async fn gas_price(&self) -> EngineResult<U256>;

    async fn native_balance(&self, address: Address) -> EngineResult<U256>;

    /// `eth_call` against the latest block
    async fn call(&self, to: Address, data: Bytes) -> EngineResult<Bytes>;

    async fn send_raw_transaction(&self, raw: Bytes) -> EngineResult<H256>;
}
