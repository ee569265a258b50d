//! Market-data provider seam.
//!
//! [`MarketDataProvider`] is the only place that knows upstream paths and
//! payload shapes. Fetchers above it work with domain types.

use std::collections::HashMap;

use async_trait::async_trait;
use meridian_common::constants::{
    ENDPOINT_BALANCES, ENDPOINT_PRICES, ENDPOINT_TOKENS, ENDPOINT_TOKENS_CUSTOM,
};
use meridian_common::types::normalize_address;
use meridian_common::{Chain, PortfolioError, PortfolioResult, TokenMetadata};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::client::RateLimitedClient;

/// Upstream operations the portfolio pipeline depends on.
///
/// All maps are keyed by lower-cased token address.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Raw balances as the provider reports them (decimal or `0x` hex strings).
    async fn balances(&self, chain: Chain, address: &str) -> PortfolioResult<HashMap<String, String>>;

    /// Bulk token catalog for a chain.
    async fn token_catalog(&self, chain: Chain) -> PortfolioResult<HashMap<String, TokenMetadata>>;

    /// Metadata for specific tokens not present in the bulk catalog.
    async fn custom_tokens(
        &self,
        chain: Chain,
        addresses: &[String],
    ) -> PortfolioResult<HashMap<String, TokenMetadata>>;

    /// Unit prices in `currency`.
    async fn prices(
        &self,
        chain: Chain,
        addresses: &[String],
        currency: &str,
    ) -> PortfolioResult<HashMap<String, f64>>;
}

// ═══════════════════════════════════════════════════════════════════════
//  HTTP PROVIDER
// ═══════════════════════════════════════════════════════════════════════

/// [`MarketDataProvider`] over the REST surface:
///
/// ```text
/// GET /balances/{chainId}/{address}
/// GET /tokens/{chainId}
/// GET /tokens/{chainId}/custom?addresses=a,b
/// GET /prices/{chainId}?addresses=a,b&currency=USD
/// ```
#[derive(Clone)]
pub struct HttpProvider {
    client: RateLimitedClient,
}

impl HttpProvider {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }
}

#[async_trait]
impl MarketDataProvider for HttpProvider {
    async fn balances(&self, chain: Chain, address: &str) -> PortfolioResult<HashMap<String, String>> {
        let path = format!("/balances/{}/{}", chain.id(), address.trim());
        let value = self.client.get(ENDPOINT_BALANCES, &path, &[]).await?;
        parse_string_map(unwrap_envelope(value, "balances"))
    }

    async fn token_catalog(&self, chain: Chain) -> PortfolioResult<HashMap<String, TokenMetadata>> {
        let path = format!("/tokens/{}", chain.id());
        let value = self.client.get(ENDPOINT_TOKENS, &path, &[]).await?;
        parse_token_map(chain, unwrap_envelope(value, "tokens"))
    }

    async fn custom_tokens(
        &self,
        chain: Chain,
        addresses: &[String],
    ) -> PortfolioResult<HashMap<String, TokenMetadata>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let path = format!("/tokens/{}/custom", chain.id());
        let params = [("addresses", addresses.join(","))];
        let value = self.client.get(ENDPOINT_TOKENS_CUSTOM, &path, &params).await?;
        parse_token_map(chain, unwrap_envelope(value, "tokens"))
    }

    async fn prices(
        &self,
        chain: Chain,
        addresses: &[String],
        currency: &str,
    ) -> PortfolioResult<HashMap<String, f64>> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }
        let path = format!("/prices/{}", chain.id());
        let params = [
            ("addresses", addresses.join(",")),
            ("currency", currency.to_string()),
        ];
        let value = self.client.get(ENDPOINT_PRICES, &path, &params).await?;
        let raw = parse_string_map(unwrap_envelope(value, "prices"))?;
        Ok(raw
            .into_iter()
            .filter_map(|(addr, price)| match price.parse::<f64>() {
                Ok(p) if p.is_finite() && p >= 0.0 => Some((addr, p)),
                _ => {
                    debug!(%addr, %price, "skipping unparseable price");
                    None
                }
            })
            .collect())
    }
}

// ─── Payload parsing ────────────────────────────────────────────────

/// Accept both `{addr: ...}` and `{"<field>": {addr: ...}}`.
fn unwrap_envelope(value: Value, field: &str) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.get(field).is_some_and(Value::is_object) => {
            map.remove(field).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Object of string-or-number values. Null entries are dropped.
fn parse_string_map(value: Value) -> PortfolioResult<HashMap<String, String>> {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(HashMap::new()),
        other => {
            return Err(PortfolioError::Decode(format!(
                "expected an object keyed by token address, got {}",
                json_kind(&other)
            )))
        }
    };
    Ok(map
        .into_iter()
        .filter_map(|(addr, v)| {
            let s = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((normalize_address(&addr), s))
        })
        .collect())
}

#[derive(Deserialize)]
struct WireToken {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    decimals: u8,
    #[serde(default, rename = "logoURI", alias = "logoUri", alias = "logo")]
    logo_uri: Option<String>,
}

/// Token entries that do not decode are skipped.
fn parse_token_map(chain: Chain, value: Value) -> PortfolioResult<HashMap<String, TokenMetadata>> {
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(HashMap::new()),
        other => {
            return Err(PortfolioError::Decode(format!(
                "expected an object keyed by token address, got {}",
                json_kind(&other)
            )))
        }
    };
    Ok(map
        .into_iter()
        .filter_map(|(addr, v)| {
            let wire: WireToken = match serde_json::from_value(v) {
                Ok(t) => t,
                Err(e) => {
                    debug!(%addr, error = %e, "skipping malformed token entry");
                    return None;
                }
            };
            let address = normalize_address(&addr);
            let meta = TokenMetadata {
                address: address.clone(),
                chain_id: chain,
                name: wire.name.unwrap_or_else(|| wire.symbol.clone()),
                symbol: wire.symbol,
                decimals: wire.decimals,
                logo_uri: wire.logo_uri,
            };
            Some((address, meta))
        })
        .collect())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_map_accepts_strings_and_numbers() {
        let v = json!({"0xAbC": "1000", "0xdef": 42, "0x0": null, "0x1": true});
        let map = parse_string_map(v).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["0xabc"], "1000");
        assert_eq!(map["0xdef"], "42");
    }

    #[test]
    fn test_string_map_rejects_arrays() {
        let err = parse_string_map(json!(["0xabc"])).unwrap_err();
        assert!(matches!(err, PortfolioError::Decode(_)));
        assert!(parse_string_map(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let v = unwrap_envelope(json!({"tokens": {"0xa": {}}}), "tokens");
        assert!(v.get("0xa").is_some());
        // a token literally keyed "tokens" with siblings is left alone
        let v = unwrap_envelope(json!({"tokens": {}, "0xb": {}}), "tokens");
        assert!(v.get("0xb").is_some());
    }

    mod http {
        use super::*;
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        use axum::extract::{Path, Query, State};
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::get;
        use axum::{Json, Router};
        use meridian_common::error::UpstreamBody;
        use meridian_types::config::{ProviderConfig, RateLimitConfig};

        const KEY: &str = "test-key";

        /// Requests seen by the stub upstream, as `"<chain> <auth> <query>"`.
        type Seen = Arc<Mutex<Vec<String>>>;

        async fn prices(
            State(seen): State<Seen>,
            Path(chain_id): Path<u64>,
            headers: HeaderMap,
            Query(query): Query<HashMap<String, String>>,
        ) -> (StatusCode, Json<Value>) {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let addresses = query.get("addresses").cloned().unwrap_or_default();
            let currency = query.get("currency").cloned().unwrap_or_default();
            seen.lock()
                .unwrap()
                .push(format!("{chain_id} {auth} {addresses} {currency}"));
            if auth != format!("Bearer {KEY}") {
                return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
            }
            let body: serde_json::Map<String, Value> = addresses
                .split(',')
                .map(|a| (a.to_string(), json!("1.5")))
                .collect();
            (StatusCode::OK, Json(json!({ "prices": body })))
        }

        async fn balances() -> (StatusCode, Json<Value>) {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "maintenance", "retryIn": 30})),
            )
        }

        async fn tokens() -> Json<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }

        async fn serve() -> (String, Seen) {
            let seen: Seen = Arc::default();
            let app = Router::new()
                .route("/prices/:chain_id", get(prices))
                .route("/balances/:chain_id/:address", get(balances))
                .route("/tokens/:chain_id", get(tokens))
                .with_state(Arc::clone(&seen));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            (format!("http://{addr}"), seen)
        }

        fn provider(base_url: &str, timeout_ms: u64) -> HttpProvider {
            let config = ProviderConfig {
                api_key: Some(KEY.into()),
                base_url: base_url.into(),
                request_timeout_ms: timeout_ms,
                ..ProviderConfig::default()
            };
            HttpProvider::new(RateLimitedClient::new(&config, &RateLimitConfig::default()).unwrap())
        }

        #[tokio::test]
        async fn test_prices_request_shape() {
            let (base, seen) = serve().await;
            let provider = provider(&base, 2_000);
            let addrs = vec!["0xaaa".to_string(), "0xbbb".to_string()];

            let prices = provider.prices(Chain::Polygon, &addrs, "USD").await.unwrap();
            assert_eq!(prices.len(), 2);
            assert_eq!(prices["0xbbb"], 1.5);

            let seen = seen.lock().unwrap();
            assert_eq!(seen.as_slice(), ["137 Bearer test-key 0xaaa,0xbbb USD"]);
        }

        #[tokio::test]
        async fn test_error_status_keeps_json_body() {
            let (base, _) = serve().await;
            let err = provider(&base, 2_000)
                .balances(Chain::Ethereum, "0xwallet")
                .await
                .unwrap_err();
            match err {
                PortfolioError::Upstream {
                    status,
                    body: UpstreamBody::Json(body),
                } => {
                    assert_eq!(status, 503);
                    assert_eq!(body["error"], "maintenance");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_hung_upstream_times_out_as_network_error() {
            let (base, _) = serve().await;
            let err = provider(&base, 200)
                .token_catalog(Chain::Ethereum)
                .await
                .unwrap_err();
            assert!(matches!(err, PortfolioError::Network(_)), "got {err}");
        }
    }

    #[test]
    fn test_token_map_fills_address_and_chain() {
        let v = json!({
            "0xA0b8": {"symbol": "USDC", "name": "USD Coin", "decimals": 6, "logoURI": "https://x/usdc.png"},
            "0xbad": {"symbol": "BAD"},
            "0xc0de": {"symbol": "CODE", "decimals": 18}
        });
        let map = parse_token_map(Chain::Polygon, v).unwrap();
        assert_eq!(map.len(), 2);
        let usdc = &map["0xa0b8"];
        assert_eq!(usdc.address, "0xa0b8");
        assert_eq!(usdc.chain_id, Chain::Polygon);
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.logo_uri.as_deref(), Some("https://x/usdc.png"));
        assert_eq!(map["0xc0de"].name, "CODE");
    }
}
