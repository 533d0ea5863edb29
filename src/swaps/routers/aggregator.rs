/// HTTP aggregator router (0x `swap/v1/quote` API shape)
///
/// The aggregator returns ready-to-send calldata together with the amounts,
/// so quoting and building the transaction are one round trip. Amount fields
/// arrive as strings or numbers depending on the deployment.
use crate::config::{AggregatorConfig, Config};
use crate::errors::{EngineResult, NetworkError, SwapEngineError};
use crate::logger::{self, LogTag};
use crate::swaps::router::SwapRouter;
use crate::swaps::types::{ExecutionContext, ExecutionPlan, Quote, QuoteRequest, SwapMode, TxRequest};
use crate::tokens::{parse_address, Token};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256};
use reqwest::Client;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct AggregatorQuoteQuery {
    #[serde(rename = "sellToken")]
    sell_token: String,
    #[serde(rename = "buyToken")]
    buy_token: String,
    #[serde(rename = "sellAmount", skip_serializing_if = "Option::is_none")]
    sell_amount: Option<String>,
    #[serde(rename = "buyAmount", skip_serializing_if = "Option::is_none")]
    buy_amount: Option<String>,
    #[serde(rename = "slippagePercentage")]
    slippage_percentage: String,
    #[serde(rename = "takerAddress")]
    taker_address: String,
}

#[derive(Debug, Deserialize)]
struct AggregatorQuoteResponse {
    #[serde(rename = "buyAmount", deserialize_with = "string_or_number")]
    buy_amount: String,
    #[serde(rename = "sellAmount", deserialize_with = "string_or_number")]
    sell_amount: String,
    #[serde(rename = "estimatedGas", default, deserialize_with = "optional_string_or_number")]
    estimated_gas: Option<String>,
    #[serde(
        rename = "estimatedPriceImpact",
        default,
        deserialize_with = "optional_string_or_number"
    )]
    estimated_price_impact: Option<String>,
    to: String,
    data: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    value: Option<String>,
    #[serde(rename = "allowanceTarget", default)]
    allowance_target: Option<String>,
    #[serde(default)]
    sources: Vec<LiquiditySource>,
}

#[derive(Debug, Deserialize)]
struct LiquiditySource {
    name: String,
    #[serde(deserialize_with = "string_or_number")]
    proportion: String,
}

struct StringOrNumber;

impl<'de> Visitor<'de> for StringOrNumber {
    type Value = String;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a string or a number")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
        Ok(value.to_string())
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
        Ok(value.to_string())
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    deserializer.deserialize_any(StringOrNumber)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!("expected string or number, got {}", other))),
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub struct AggregatorRouter {
    id: String,
    name: String,
    api_url: String,
    api_key: String,
    priority: u8,
    enabled: bool,
    fallback_gas: u64,
    client: Client,
}

impl AggregatorRouter {
    pub fn from_config(aggregator: &AggregatorConfig, config: &Config) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.swaps.quote_timeout_secs.max(1)))
            .build()
            .map_err(|e| SwapEngineError::network_error(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            id: aggregator.id.clone(),
            name: aggregator.name.clone(),
            api_url: aggregator.api_url.trim_end_matches('/').to_string(),
            api_key: aggregator.api_key.clone(),
            priority: aggregator.priority,
            enabled: aggregator.enabled,
            fallback_gas: config.gas.swap_gas_limit,
            client,
        })
    }

    fn parse_amount(&self, field: &str, value: &str) -> EngineResult<U256> {
        U256::from_dec_str(value.trim()).map_err(|e| {
            SwapEngineError::parse_error(format!("{} {}", self.id, field), format!("'{}': {}", value, e))
        })
    }

    fn route_plan(sources: &[LiquiditySource]) -> String {
        let used: Vec<String> = sources
            .iter()
            .filter(|s| s.proportion.parse::<f64>().map_or(false, |p| p > 0.0))
            .map(|s| {
                let pct = s.proportion.parse::<f64>().unwrap_or_default() * 100.0;
                format!("{} {:.0}%", s.name, pct)
            })
            .collect();
        if used.is_empty() {
            "Aggregated".to_string()
        } else {
            used.join(" + ")
        }
    }

    fn to_quote(&self, request: &QuoteRequest, response: AggregatorQuoteResponse) -> EngineResult<Quote> {
        let input_amount = self.parse_amount("sellAmount", &response.sell_amount)?;
        let output_amount = self.parse_amount("buyAmount", &response.buy_amount)?;
        let value = match response.value.as_deref() {
            Some(v) if !v.trim().is_empty() => self.parse_amount("value", v)?,
            _ => U256::zero(),
        };
        let gas_estimate = response
            .estimated_gas
            .as_deref()
            .and_then(|g| g.trim().parse::<u64>().ok())
            .filter(|g| *g > 0)
            .unwrap_or(self.fallback_gas);
        let price_impact_pct = match response.estimated_price_impact.as_deref() {
            Some(raw) => raw.trim().parse::<f64>().unwrap_or_else(|_| {
                logger::warning(
                    LogTag::Router,
                    &format!("{}: unparsable estimatedPriceImpact '{}', using 0", self.id, raw),
                );
                0.0
            }),
            None => 0.0,
        };
        let to = parse_address(&response.to)?;
        let data: Bytes = response
            .data
            .parse()
            .map_err(|e| SwapEngineError::parse_error(format!("{} calldata", self.id), format!("{}", e)))?;
        let allowance_target = match response.allowance_target.as_deref() {
            Some(target) if !target.trim().is_empty() => {
                Some(parse_address(target)?).filter(|a| *a != Address::zero())
            }
            _ => None,
        };

        Ok(Quote {
            quote_id: uuid::Uuid::new_v4().to_string(),
            router_id: self.id.clone(),
            router_name: self.name.clone(),
            input: request.input.clone(),
            output: request.output.clone(),
            swap_mode: request.swap_mode,
            input_amount,
            output_amount,
            price_impact_pct,
            gas_estimate,
            slippage_bps: request.slippage_bps,
            hops: Vec::new(),
            route_plan: Self::route_plan(&response.sources),
            recipient: request.recipient,
            execution: ExecutionPlan::Calldata {
                to,
                data,
                value,
                allowance_target,
            },
        })
    }
}

#[async_trait]
impl SwapRouter for AggregatorRouter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn supports_pair(&self, input: &Token, output: &Token) -> bool {
        input.address != output.address
    }

    async fn get_quote(&self, request: &QuoteRequest) -> EngineResult<Quote> {
        let start = Instant::now();
        let amount = request.amount.to_string();
        let (sell_amount, buy_amount) = match request.swap_mode {
            SwapMode::ExactIn => (Some(amount), None),
            SwapMode::ExactOut => (None, Some(amount)),
        };
        let query = AggregatorQuoteQuery {
            sell_token: format!("{:?}", request.input.address),
            buy_token: format!("{:?}", request.output.address),
            sell_amount,
            buy_amount,
            slippage_percentage: format!("{}", request.slippage_bps as f64 / 10_000.0),
            taker_address: format!("{:?}", request.recipient),
        };

        let url = format!("{}/swap/v1/quote", self.api_url);
        let mut builder = self.client.get(&url).query(&query);
        if !self.api_key.is_empty() {
            builder = builder.header("0x-api-key", &self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            SwapEngineError::network_error(format!("{} quote request failed: {}", self.name, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(SwapEngineError::Network(NetworkError::HttpStatusError {
                endpoint: url,
                status: status.as_u16(),
                body,
            }));
        }

        let text = response.text().await.map_err(|e| {
            SwapEngineError::network_error(format!("Failed to read {} response: {}", self.name, e))
        })?;
        let parsed: AggregatorQuoteResponse = serde_json::from_str(&text).map_err(|e| {
            SwapEngineError::parse_error(format!("{} quote", self.id), e.to_string())
        })?;
        let quote = self.to_quote(request, parsed)?;

        logger::debug(
            LogTag::Router,
            &format!(
                "{} quote in {}ms: in {} out {} gas {} via {}",
                self.id,
                start.elapsed().as_millis(),
                quote.input_amount,
                quote.output_amount,
                quote.gas_estimate,
                quote.route_plan
            ),
        );
        Ok(quote)
    }

    fn build_transactions(&self, quote: &Quote, context: &ExecutionContext) -> EngineResult<Vec<TxRequest>> {
        let ExecutionPlan::Calldata { to, data, value, .. } = &quote.execution else {
            return Err(SwapEngineError::router_failed(
                &self.id,
                "quote was not produced by an aggregator",
            ));
        };
        if quote.recipient != context.recipient {
            return Err(SwapEngineError::router_failed(
                &self.id,
                "calldata was quoted for a different taker",
            ));
        }
        Ok(vec![TxRequest {
            label: format!("{} swap", self.id),
            to: *to,
            data: data.clone(),
            value: *value,
            gas_limit: quote.gas_estimate,
            input_amount: quote.max_input()?,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DataError;
    use httpmock::prelude::*;
    use serde_json::json;

    fn router(server: &MockServer, api_key: &str) -> AggregatorRouter {
        let aggregator = AggregatorConfig {
            enabled: true,
            api_url: server.base_url(),
            api_key: api_key.to_string(),
            ..Default::default()
        };
        AggregatorRouter::from_config(&aggregator, &Config::default()).unwrap()
    }

    fn request() -> QuoteRequest {
        QuoteRequest::exact_in(
            Token::native("ETH"),
            Token::new(Address::from_low_u64_be(2), "USDC", 6),
            U256::from(10_000_000_000_000_000u64),
            50,
            Address::from_low_u64_be(77),
        )
    }

    #[tokio::test]
    async fn test_quote_parses_0x_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/swap/v1/quote")
                    .query_param("sellToken", "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee")
                    .query_param("sellAmount", "10000000000000000")
                    .query_param("slippagePercentage", "0.005")
                    .header("0x-api-key", "secret");
                then.status(200).json_body(json!({
                    "buyAmount": "19750000",
                    "sellAmount": "10000000000000000",
                    "estimatedGas": 180000,
                    "estimatedPriceImpact": "0.12",
                    "to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
                    "data": "0xd9627aa4",
                    "value": "10000000000000000",
                    "allowanceTarget": "0x0000000000000000000000000000000000000000",
                    "sources": [
                        {"name": "Uniswap_V2", "proportion": "0.6"},
                        {"name": "SushiSwap", "proportion": "0.4"},
                        {"name": "Curve", "proportion": "0"}
                    ]
                }));
            })
            .await;

        let router = router(&server, "secret");
        let quote = router.get_quote(&request()).await.unwrap();
        mock.assert_async().await;

        assert_eq!(quote.output_amount, U256::from(19_750_000u64));
        assert_eq!(quote.gas_estimate, 180_000);
        assert!((quote.price_impact_pct - 0.12).abs() < 1e-9);
        assert_eq!(quote.route_plan, "Uniswap_V2 60% + SushiSwap 40%");
        assert_eq!(quote.spender(), None);

        let context = ExecutionContext {
            sender: Address::from_low_u64_be(77),
            recipient: Address::from_low_u64_be(77),
            deadline: 0,
        };
        let txs = router.build_transactions(&quote, &context).unwrap();
        assert_eq!(txs[0].value, U256::from(10_000_000_000_000_000u64));
        assert_eq!(txs[0].data, Bytes::from(vec![0xd9, 0x62, 0x7a, 0xa4]));
        assert_eq!(txs[0].gas_limit, 180_000);

        let elsewhere = ExecutionContext {
            recipient: Address::from_low_u64_be(78),
            ..context
        };
        assert!(router.build_transactions(&quote, &elsewhere).is_err());
    }

    #[tokio::test]
    async fn test_http_failure_is_network_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/swap/v1/quote");
                then.status(400).body("{\"reason\":\"INSUFFICIENT_ASSET_LIQUIDITY\"}");
            })
            .await;

        let err = router(&server, "").get_quote(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            SwapEngineError::Network(NetworkError::HttpStatusError { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_numbers_are_data_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/swap/v1/quote");
                then.status(200).json_body(json!({
                    "buyAmount": "lots",
                    "sellAmount": "1",
                    "to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
                    "data": "0x"
                }));
            })
            .await;

        let err = router(&server, "").get_quote(&request()).await.unwrap_err();
        assert!(matches!(err, SwapEngineError::Data(DataError::ParseError { .. })));

        let garbled = MockServer::start_async().await;
        garbled
            .mock_async(|when, then| {
                when.method(GET).path("/swap/v1/quote");
                then.status(200).body("not json");
            })
            .await;
        let err = router(&garbled, "").get_quote(&request()).await.unwrap_err();
        assert!(matches!(err, SwapEngineError::Data(DataError::ParseError { .. })));
    }
}
