//! Rate-limited HTTP client for the market-data provider.
//!
//! Every request is counted against a fixed window keyed by endpoint. When a
//! window is exhausted the call fails immediately with
//! [`PortfolioError::RateLimitExceeded`]; this layer never sleeps or retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use meridian_common::error::UpstreamBody;
use meridian_common::{PortfolioError, PortfolioResult};
use meridian_types::config::{ProviderConfig, RateLimitConfig};
use reqwest::{Client, Method};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

// ═══════════════════════════════════════════════════════════════════════
//  RATE LIMITER
// ═══════════════════════════════════════════════════════════════════════

/// Request count for one endpoint key inside the current window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitWindow {
    pub count: u32,
    pub reset_at: Instant,
}

/// Remaining quota for an endpoint key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub remaining: u32,
    pub resets_in: Duration,
}

/// Fixed-window request counter, one window per endpoint key.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests_per_window, config.window())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one request against `endpoint_key`, or reject it.
    pub fn check(&self, endpoint_key: &str) -> PortfolioResult<()> {
        self.check_at(endpoint_key, Instant::now())
    }

    /// [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, endpoint_key: &str, now: Instant) -> PortfolioResult<()> {
        let mut windows = self.lock();
        match windows.get_mut(endpoint_key) {
            Some(w) if now <= w.reset_at => {
                if w.count >= self.max_requests {
                    let wait = w.reset_at.saturating_duration_since(now);
                    return Err(PortfolioError::RateLimitExceeded {
                        endpoint: endpoint_key.to_string(),
                        retry_after_secs: ceil_secs(wait),
                    });
                }
                w.count += 1;
            }
            _ => {
                windows.insert(
                    endpoint_key.to_string(),
                    RateLimitWindow {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
            }
        }
        Ok(())
    }

    /// Quota left for `endpoint_key`. Unseen or expired keys report a full window.
    pub fn status(&self, endpoint_key: &str) -> RateLimitStatus {
        let now = Instant::now();
        match self.lock().get(endpoint_key) {
            Some(w) if now <= w.reset_at => RateLimitStatus {
                remaining: self.max_requests.saturating_sub(w.count),
                resets_in: w.reset_at.saturating_duration_since(now),
            },
            _ => RateLimitStatus {
                remaining: self.max_requests,
                resets_in: self.window,
            },
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let millis = d.as_millis().div_ceil(1000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}

// ═══════════════════════════════════════════════════════════════════════
//  HTTP CLIENT
// ═══════════════════════════════════════════════════════════════════════

/// Authenticated JSON client with a per-endpoint request quota.
#[derive(Clone)]
pub struct RateLimitedClient {
    http: Client,
    base_url: String,
    api_key: String,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedClient {
    /// Fails with `Configuration` when no API key is set.
    pub fn new(provider: &ProviderConfig, limits: &RateLimitConfig) -> PortfolioResult<Self> {
        let api_key = provider
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PortfolioError::Configuration(
                    "provider API key is not set (MERIDIAN_API_KEY)".into(),
                )
            })?
            .to_string();

        url::Url::parse(&provider.base_url).map_err(|e| {
            PortfolioError::Configuration(format!(
                "invalid provider base URL '{}': {e}",
                provider.base_url
            ))
        })?;

        let http = Client::builder()
            .timeout(provider.request_timeout())
            .build()
            .map_err(|e| PortfolioError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key,
            limiter: Arc::new(RateLimiter::from_config(limits)),
        })
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and decode the JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    pub async fn request(
        &self,
        endpoint_key: &str,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> PortfolioResult<Value> {
        self.limiter.check(endpoint_key)?;

        let url = format!("{}{}", self.base_url, path);
        debug!(endpoint = endpoint_key, %method, %url, "upstream request");

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_key)
            .query(params);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| PortfolioError::Network(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| PortfolioError::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(endpoint = endpoint_key, status = status.as_u16(), "upstream returned error status");
            return Err(PortfolioError::Upstream {
                status: status.as_u16(),
                body: UpstreamBody::from_raw(text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| PortfolioError::Decode(format!("{path}: {e}")))
    }

    pub async fn get(
        &self,
        endpoint_key: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> PortfolioResult<Value> {
        self.request(endpoint_key, Method::GET, path, params, None)
            .await
    }
}
