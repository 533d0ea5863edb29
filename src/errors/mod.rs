/// Structured error handling for the swap engine
///
/// One top-level error with a category per failure domain. Router, RPC and
/// execution code build errors through the helper constructors at the bottom
/// of this file.
use crate::swaps::types::SubmittedTx;
use ethers::types::U256;
use thiserror::Error;

pub type EngineResult<T> = Result<T, SwapEngineError>;

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum SwapEngineError {
    #[error("Network Error: {0}")]
    Network(#[from] NetworkError),

    #[error("RPC Provider Error: {0}")]
    RpcProvider(#[from] RpcProviderError),

    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Data Error: {0}")]
    Data(#[from] DataError),

    #[error("Routing Error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Execution Error: {0}")]
    Execution(#[from] ExecutionError),
}

// =============================================================================
// NETWORK ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Connection timeout to {endpoint} after {timeout_ms}ms")]
    ConnectionTimeout { endpoint: String, timeout_ms: u64 },

    #[error("HTTP {status} from {endpoint}: {}", .body.as_deref().unwrap_or("No body"))]
    HttpStatusError {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },

    #[error("{message}")]
    Generic { message: String },
}

// =============================================================================
// RPC PROVIDER ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum RpcProviderError {
    #[error("{method} returned error {code}: {message}")]
    ErrorResponse {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Malformed {method} response: {body}")]
    MalformedResponse { method: String, body: String },

    #[error("Transaction rejected: {reason}")]
    TransactionRejected { reason: String },
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("Invalid config field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing config field '{field}'")]
    MissingConfig { field: String },

    #[error("Invalid private key: {error}")]
    InvalidPrivateKey { error: String },

    #[error("Config file not found: {path}")]
    FileNotFound { path: String },

    #[error("{message}")]
    Generic { message: String },
}

// =============================================================================
// DATA ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("Failed to parse {data_type}: {error}")]
    ParseError { data_type: String, error: String },

    #[error("Invalid amount '{amount}': {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Unknown token '{token}'")]
    UnknownToken { token: String },

    #[error("Arithmetic overflow in {operation}")]
    Overflow { operation: String },
}

// =============================================================================
// ROUTING ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("No route {input} -> {output}: {}", describe_reasons(.reasons))]
    NoRoute {
        input: String,
        output: String,
        reasons: Vec<String>,
    },

    #[error("Router {router} failed: {message}")]
    RouterFailed { router: String, message: String },

    #[error("Router {router} quote timed out after {timeout_ms}ms")]
    QuoteTimeout { router: String, timeout_ms: u64 },

    #[error("Insufficient liquidity in pool {pool}: {reason}")]
    InsufficientLiquidity { pool: String, reason: String },

    #[error("Price impact {impact_pct:.2}% exceeds maximum {max_pct:.2}%")]
    PriceImpactTooHigh { impact_pct: f64, max_pct: f64 },

    #[error("Gas cost is {share_pct:.2}% of output value (max {max_share_pct:.2}%)")]
    GasExceedsValue { share_pct: f64, max_share_pct: f64 },

    #[error("Output {output} below minimum {minimum}")]
    OutputTooSmall { output: U256, minimum: U256 },
}

fn describe_reasons(reasons: &[String]) -> String {
    if reasons.is_empty() {
        "no router supports this pair".to_string()
    } else {
        reasons.join("; ")
    }
}

// =============================================================================
// EXECUTION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    #[error("Slippage exceeded: quoted {quoted}, minimum {minimum}")]
    SlippageExceeded { quoted: U256, minimum: U256 },

    #[error("Required input {required} above maximum {maximum}")]
    ExcessiveInput { required: U256, maximum: U256 },

    #[error("Invalid slippage {bps} bps (max {max_bps} bps)")]
    InvalidSlippage { bps: u16, max_bps: u16 },

    #[error("Insufficient {token} balance: required {required}, available {available}")]
    InsufficientBalance {
        token: String,
        required: U256,
        available: U256,
    },

    #[error("Gas price {gas_price} wei above cap {max_gas_price} wei")]
    GasPriceTooHigh { gas_price: U256, max_gas_price: U256 },

    #[error("Signing failed: {reason}")]
    SigningFailed { reason: String },

    #[error("Broadcast failed: {reason}")]
    BroadcastFailed { reason: String },

    /// Some transactions of a multi-transaction swap went through before one
    /// failed; the sent ones cannot be undone
    #[error("Partially executed ({sent} of {total} transactions sent): {cause}")]
    PartialExecution {
        sent: usize,
        total: usize,
        submitted: Vec<SubmittedTx>,
        /// Input token amount the sent transactions could take
        executed_input: U256,
        cause: Box<SwapEngineError>,
    },
}

// =============================================================================
// CONVERSIONS FROM LIBRARY ERRORS
// =============================================================================

impl From<reqwest::Error> for SwapEngineError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if err.is_timeout() {
            return SwapEngineError::Network(NetworkError::ConnectionTimeout {
                endpoint,
                timeout_ms: 0,
            });
        }
        if let Some(status) = err.status() {
            return SwapEngineError::Network(NetworkError::HttpStatusError {
                endpoint,
                status: status.as_u16(),
                body: None,
            });
        }
        SwapEngineError::Network(NetworkError::Generic {
            message: format!("HTTP request failed: {}", err),
        })
    }
}

impl From<serde_json::Error> for SwapEngineError {
    fn from(err: serde_json::Error) -> Self {
        SwapEngineError::Data(DataError::ParseError {
            data_type: "JSON".to_string(),
            error: err.to_string(),
        })
    }
}

impl From<ethers::abi::Error> for SwapEngineError {
    fn from(err: ethers::abi::Error) -> Self {
        SwapEngineError::Data(DataError::ParseError {
            data_type: "ABI".to_string(),
            error: err.to_string(),
        })
    }
}

impl From<ethers::utils::ConversionError> for SwapEngineError {
    fn from(err: ethers::utils::ConversionError) -> Self {
        SwapEngineError::Data(DataError::InvalidAmount {
            amount: "unknown".to_string(),
            reason: err.to_string(),
        })
    }
}

impl From<ethers::signers::WalletError> for SwapEngineError {
    fn from(err: ethers::signers::WalletError) -> Self {
        SwapEngineError::Execution(ExecutionError::SigningFailed {
            reason: err.to_string(),
        })
    }
}

// =============================================================================
// STRUCTURED ERROR BUILDERS
// =============================================================================

impl SwapEngineError {
    pub fn invalid_amount(amount: impl Into<String>, reason: impl Into<String>) -> Self {
        SwapEngineError::Data(DataError::InvalidAmount {
            amount: amount.into(),
            reason: reason.into(),
        })
    }

    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        SwapEngineError::Data(DataError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        })
    }

    pub fn parse_error(data_type: impl Into<String>, error: impl Into<String>) -> Self {
        SwapEngineError::Data(DataError::ParseError {
            data_type: data_type.into(),
            error: error.into(),
        })
    }

    pub fn overflow(operation: impl Into<String>) -> Self {
        SwapEngineError::Data(DataError::Overflow {
            operation: operation.into(),
        })
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        SwapEngineError::Network(NetworkError::Generic {
            message: message.into(),
        })
    }

    pub fn configuration_error(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SwapEngineError::Configuration(ConfigurationError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn router_failed(router: impl Into<String>, message: impl Into<String>) -> Self {
        SwapEngineError::Routing(RoutingError::RouterFailed {
            router: router.into(),
            message: message.into(),
        })
    }

    pub fn insufficient_liquidity(pool: impl Into<String>, reason: impl Into<String>) -> Self {
        SwapEngineError::Routing(RoutingError::InsufficientLiquidity {
            pool: pool.into(),
            reason: reason.into(),
        })
    }

    pub fn slippage_exceeded(quoted: U256, minimum: U256) -> Self {
        SwapEngineError::Execution(ExecutionError::SlippageExceeded { quoted, minimum })
    }

    pub fn excessive_input(required: U256, maximum: U256) -> Self {
        SwapEngineError::Execution(ExecutionError::ExcessiveInput { required, maximum })
    }

    pub fn insufficient_balance(token: impl Into<String>, required: U256, available: U256) -> Self {
        SwapEngineError::Execution(ExecutionError::InsufficientBalance {
            token: token.into(),
            required,
            available,
        })
    }

    pub fn broadcast_failed(reason: impl Into<String>) -> Self {
        SwapEngineError::Execution(ExecutionError::BroadcastFailed {
            reason: reason.into(),
        })
    }

    pub fn partial_execution(
        submitted: Vec<SubmittedTx>,
        total: usize,
        executed_input: U256,
        cause: SwapEngineError,
    ) -> Self {
        SwapEngineError::Execution(ExecutionError::PartialExecution {
            sent: submitted.len(),
            total,
            submitted,
            executed_input,
            cause: Box::new(cause),
        })
    }

    /// Input already spent when a swap stopped partway through
    pub fn executed_input(&self) -> Option<U256> {
        match self {
            SwapEngineError::Execution(ExecutionError::PartialExecution { executed_input, .. }) => {
                Some(*executed_input)
            }
            _ => None,
        }
    }

    /// Errors worth retrying with a wider slippage tolerance
    pub fn is_slippage_related(&self) -> bool {
        match self {
            SwapEngineError::Execution(ExecutionError::PartialExecution { cause, .. }) => {
                cause.is_slippage_related()
            }
            SwapEngineError::Execution(
                ExecutionError::SlippageExceeded { .. } | ExecutionError::ExcessiveInput { .. },
            ) => true,
            SwapEngineError::RpcProvider(RpcProviderError::TransactionRejected { reason }) => {
                reason.contains("INSUFFICIENT_OUTPUT_AMOUNT")
                    || reason.contains("EXCESSIVE_INPUT_AMOUNT")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = SwapEngineError::slippage_exceeded(U256::from(90u64), U256::from(95u64));
        assert_eq!(
            err.to_string(),
            "Execution Error: Slippage exceeded: quoted 90, minimum 95"
        );
    }

    #[test]
    fn test_no_route_lists_reasons() {
        let err = SwapEngineError::Routing(RoutingError::NoRoute {
            input: "ETH".to_string(),
            output: "TOK".to_string(),
            reasons: vec!["uniswap_v2: no pool".to_string(), "aggregator: HTTP 500".to_string()],
        });
        let text = err.to_string();
        assert!(text.contains("ETH -> TOK"));
        assert!(text.contains("uniswap_v2: no pool; aggregator: HTTP 500"));
    }

    #[test]
    fn test_slippage_related_errors() {
        assert!(SwapEngineError::slippage_exceeded(U256::one(), U256::from(2u64)).is_slippage_related());
        let reverted = SwapEngineError::RpcProvider(RpcProviderError::TransactionRejected {
            reason: "execution reverted: UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT".to_string(),
        });
        assert!(reverted.is_slippage_related());
        assert!(!SwapEngineError::network_error("down").is_slippage_related());
    }

    #[test]
    fn test_partial_execution_follows_its_cause() {
        let reverted = SwapEngineError::RpcProvider(RpcProviderError::TransactionRejected {
            reason: "execution reverted: UniswapV2Router: INSUFFICIENT_OUTPUT_AMOUNT".to_string(),
        });
        let partial = SwapEngineError::partial_execution(Vec::new(), 3, U256::from(40u64), reverted);
        assert!(partial.is_slippage_related());
        assert_eq!(partial.executed_input(), Some(U256::from(40u64)));
        assert!(partial.to_string().contains("0 of 3 transactions sent"));

        let down = SwapEngineError::partial_execution(
            Vec::new(),
            2,
            U256::zero(),
            SwapEngineError::network_error("down"),
        );
        assert!(!down.is_slippage_related());
    }
}
