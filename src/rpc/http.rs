//! JSON-RPC 2.0 client over HTTP
//!
//! Transport failures (timeouts, connection errors, HTTP 5xx) are retried with a
//! linearly growing delay. JSON-RPC error objects are returned immediately:
//! `eth_sendRawTransaction` errors become `TransactionRejected` so reverts such
//! as `INSUFFICIENT_OUTPUT_AMOUNT` reach the slippage retry logic.

use super::ChainClient;
use crate::config::NetworkConfig;
use crate::errors::{EngineResult, NetworkError, RpcProviderError, SwapEngineError};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub struct HttpRpcClient {
    url: String,
    masked_url: String,
    client: reqwest::Client,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay: Duration,
    next_id: AtomicU64,
}

/// Scheme and host only, so API keys in paths or queries never reach the logs
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("unknown");
            let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
            let hidden = parsed.path().len() > 1 || parsed.query().is_some();
            format!(
                "{}://{}{}{}",
                parsed.scheme(),
                host,
                port,
                if hidden { "/***" } else { "" }
            )
        }
        Err(_) => "invalid-url".to_string(),
    }
}

impl HttpRpcClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        retry_attempts: u32,
        retry_delay: Duration,
    ) -> EngineResult<Self> {
        let url = url.into();
        url::Url::parse(&url)
            .map_err(|e| SwapEngineError::configuration_error("network.rpc_url", e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SwapEngineError::network_error(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            masked_url: mask_url(&url),
            url,
            client,
            timeout,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(network: &NetworkConfig) -> EngineResult<Self> {
        Self::new(
            network.rpc_url.clone(),
            Duration::from_secs(network.request_timeout_secs),
            network.retry_attempts,
            Duration::from_millis(network.retry_delay_ms),
        )
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> EngineResult<T> {
        let result = self.request_value(method, params).await?;
        serde_json::from_value(result.clone()).map_err(|_| {
            SwapEngineError::RpcProvider(RpcProviderError::MalformedResponse {
                method: method.to_string(),
                body: result.to_string(),
            })
        })
    }

    async fn request_value(&self, method: &str, params: Value) -> EngineResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut attempt = 1;
        loop {
            match self.send_once(&body).await {
                Ok(response) => return self.extract_result(method, response),
                Err(e) if matches!(e, SwapEngineError::Network(_)) && attempt < self.retry_attempts => {
                    logger::warning(
                        LogTag::Rpc,
                        &format!(
                            "{} via {} failed (attempt {}/{}): {}",
                            method, self.masked_url, attempt, self.retry_attempts, e
                        ),
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, body: &Value) -> EngineResult<Value> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.ok();
            return Err(SwapEngineError::Network(NetworkError::HttpStatusError {
                endpoint: self.masked_url.clone(),
                status: status.as_u16(),
                body: text,
            }));
        }

        response.json::<Value>().await.map_err(|e| {
            SwapEngineError::parse_error("JSON-RPC response", e.to_string())
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SwapEngineError {
        if err.is_timeout() {
            return SwapEngineError::Network(NetworkError::ConnectionTimeout {
                endpoint: self.masked_url.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            });
        }
        SwapEngineError::network_error(format!("{}: {}", self.masked_url, err))
    }

    fn extract_result(&self, method: &str, mut response: Value) -> EngineResult<Value> {
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            logger::debug(
                LogTag::Rpc,
                &format!("{} returned error {}: {}", method, code, message),
            );
            if method == "eth_sendRawTransaction" {
                return Err(SwapEngineError::RpcProvider(RpcProviderError::TransactionRejected {
                    reason: message,
                }));
            }
            return Err(SwapEngineError::RpcProvider(RpcProviderError::ErrorResponse {
                method: method.to_string(),
                code,
                message,
            }));
        }

        match response.get_mut("result").map(Value::take) {
            Some(result) => Ok(result),
            None => Err(SwapEngineError::RpcProvider(RpcProviderError::MalformedResponse {
                method: method.to_string(),
                body: response.to_string(),
            })),
        }
    }
}

#[async_trait]
impl ChainClient for HttpRpcClient {
    fn name(&self) -> &str {
        &self.masked_url
    }

    async fn chain_id(&self) -> EngineResult<u64> {
        let id: U256 = self.request("eth_chainId", json!([])).await?;
        Ok(id.low_u64())
    }

    async fn block_timestamp(&self) -> EngineResult<u64> {
        let block: Value = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let timestamp = block
            .get("timestamp")
            .cloned()
            .ok_or_else(|| {
                SwapEngineError::RpcProvider(RpcProviderError::MalformedResponse {
                    method: "eth_getBlockByNumber".to_string(),
                    body: block.to_string(),
                })
            })?;
        let timestamp: U256 = serde_json::from_value(timestamp)?;
        Ok(timestamp.low_u64())
    }

    async fn transaction_count(&self, address: Address) -> EngineResult<U256> {
        self.request("eth_getTransactionCount", json!([address, "pending"]))
            .await
    }

    async fn gas_price(&self) -> EngineResult<U256> {
        self.request("eth_gasPrice", json!([])).await
    }

    async fn native_balance(&self, address: Address) -> EngineResult<U256> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    async fn call(&self, to: Address, data: Bytes) -> EngineResult<Bytes> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> EngineResult<H256> {
        let hash: H256 = self.request("eth_sendRawTransaction", json!([raw])).await?;
        logger::info(
            LogTag::Rpc,
            &format!("Broadcast {:?} via {}", hash, self.masked_url),
        );
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer, attempts: u32) -> HttpRpcClient {
        HttpRpcClient::new(
            server.url("/"),
            Duration::from_secs(5),
            attempts,
            Duration::from_millis(1),
        )
        .unwrap()
    }

    #[test]
    fn test_mask_url_hides_keys() {
        assert_eq!(
            mask_url("https://rpc.ankr.com/multichain/f943d482902e1f86"),
            "https://rpc.ankr.com/***"
        );
        assert_eq!(mask_url("http://127.0.0.1:8545"), "http://127.0.0.1:8545");
        assert_eq!(mask_url("not a url"), "invalid-url");
    }

    #[tokio::test]
    async fn test_decodes_hex_quantities() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_chainId");
                then.status(200)
                    .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x1"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_getBlockByNumber");
                then.status(200).json_body(
                    json!({"jsonrpc": "2.0", "id": 2, "result": {"number": "0x10", "timestamp": "0x6553f100"}}),
                );
            })
            .await;

        let client = client(&server, 1);
        assert_eq!(client.chain_id().await.unwrap(), 1);
        assert_eq!(client.block_timestamp().await.unwrap(), 0x6553f100);
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32000, "message": "execution reverted: UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT"}
                }));
            })
            .await;

        let client = client(&server, 3);
        let err = client
            .send_raw_transaction(Bytes::from(vec![0x01]))
            .await
            .unwrap_err();
        assert!(err.is_slippage_related());
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_http_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(503).body("overloaded");
            })
            .await;

        let client = client(&server, 3);
        let err = client.gas_price().await.unwrap_err();
        assert!(matches!(
            err,
            SwapEngineError::Network(NetworkError::HttpStatusError { status: 503, .. })
        ));
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_missing_result_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({"jsonrpc": "2.0", "id": 1}));
            })
            .await;

        let err = client(&server, 1).gas_price().await.unwrap_err();
        assert!(matches!(
            err,
            SwapEngineError::RpcProvider(RpcProviderError::MalformedResponse { .. })
        ));
    }
}
