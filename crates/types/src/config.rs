use std::time::Duration;

use meridian_common::constants::{
    DEFAULT_CHAIN_IDS, DEFAULT_CURRENCY, DEFAULT_DUST_THRESHOLD_WEI, DEFAULT_TOP_HOLDINGS,
};
use meridian_common::{PortfolioError, PortfolioResult};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
//  APP CONFIG: top-level, stored at ~/.meridian/config.toml
// ═══════════════════════════════════════════════════════════════════════

/// Top-level configuration.
///
/// ```toml
/// [provider]
/// api_key = "..."
/// base_url = "http://127.0.0.1:8787"
/// request_timeout_ms = 10000
/// currency = "USD"
///
/// [rate_limit]
/// max_requests_per_window = 30
/// window_ms = 60000
///
/// [cache]
/// token_cache_ttl_ms = 3600000
/// price_cache_ttl_ms = 60000
///
/// [portfolio]
/// dust_threshold_wei = 1000000
/// default_chain_ids = [1, 137, 10, 42161]
/// top_holdings = 10
/// ```
///
/// Every `MERIDIAN_*` environment variable overrides its file value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
}

// ═══════════════════════════════════════════════════════════════════════
//  PROVIDER
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bearer credential for the upstream provider. Required to build a client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of the balance / token / price gateway.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. A timed-out fetch counts as a failed fetch.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Quote currency for price lookups.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            currency: default_currency(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  RATE LIMIT
// ═══════════════════════════════════════════════════════════════════════

/// Fixed-window request quota, applied per endpoint key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests_per_window: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_max_requests() -> u32 {
    30
}
fn default_window_ms() -> u64 {
    60_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_window: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  CACHE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Token catalogs change rarely: 1h.
    #[serde(default = "default_token_ttl_ms")]
    pub token_cache_ttl_ms: u64,
    /// Prices are volatile: 60s.
    #[serde(default = "default_price_ttl_ms")]
    pub price_cache_ttl_ms: u64,
}

fn default_token_ttl_ms() -> u64 {
    3_600_000
}
fn default_price_ttl_ms() -> u64 {
    60_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            token_cache_ttl_ms: default_token_ttl_ms(),
            price_cache_ttl_ms: default_price_ttl_ms(),
        }
    }
}

impl CacheConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_millis(self.token_cache_ttl_ms)
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_millis(self.price_cache_ttl_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  PORTFOLIO
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Balances at or below this many base units are dropped as dust.
    #[serde(default = "default_dust_threshold")]
    pub dust_threshold_wei: u64,
    /// Chains queried when the caller does not specify any.
    #[serde(default = "default_chain_ids")]
    pub default_chain_ids: Vec<u64>,
    /// Size of the cross-chain top holdings view.
    #[serde(default = "default_top_holdings")]
    pub top_holdings: usize,
}

fn default_dust_threshold() -> u64 {
    DEFAULT_DUST_THRESHOLD_WEI
}
fn default_chain_ids() -> Vec<u64> {
    DEFAULT_CHAIN_IDS.to_vec()
}
fn default_top_holdings() -> usize {
    DEFAULT_TOP_HOLDINGS
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            dust_threshold_wei: default_dust_threshold(),
            default_chain_ids: default_chain_ids(),
            top_holdings: default_top_holdings(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  LOADING / VALIDATION
// ═══════════════════════════════════════════════════════════════════════

impl AppConfig {
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Apply `MERIDIAN_*` overrides. `lookup` is usually `std::env::var(..).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> PortfolioResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MERIDIAN_API_KEY") {
            let v = v.trim().to_string();
            self.provider.api_key = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup("MERIDIAN_API_URL") {
            self.provider.base_url = v.trim().to_string();
        }
        if let Some(v) = lookup("MERIDIAN_CURRENCY") {
            self.provider.currency = v.trim().to_uppercase();
        }
        if let Some(v) = lookup("MERIDIAN_REQUEST_TIMEOUT_MS") {
            self.provider.request_timeout_ms = parse_env("MERIDIAN_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_MAX_REQUESTS_PER_WINDOW") {
            self.rate_limit.max_requests_per_window =
                parse_env("MERIDIAN_MAX_REQUESTS_PER_WINDOW", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_WINDOW_MS") {
            self.rate_limit.window_ms = parse_env("MERIDIAN_WINDOW_MS", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_TOKEN_CACHE_TTL_MS") {
            self.cache.token_cache_ttl_ms = parse_env("MERIDIAN_TOKEN_CACHE_TTL_MS", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_PRICE_CACHE_TTL_MS") {
            self.cache.price_cache_ttl_ms = parse_env("MERIDIAN_PRICE_CACHE_TTL_MS", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_DUST_THRESHOLD_WEI") {
            self.portfolio.dust_threshold_wei = parse_env("MERIDIAN_DUST_THRESHOLD_WEI", &v)?;
        }
        if let Some(v) = lookup("MERIDIAN_DEFAULT_CHAIN_IDS") {
            self.portfolio.default_chain_ids = parse_chain_list(&v)?;
        }
        if let Some(v) = lookup("MERIDIAN_TOP_HOLDINGS") {
            self.portfolio.top_holdings = parse_env("MERIDIAN_TOP_HOLDINGS", &v)?;
        }
        Ok(())
    }

    /// Set one setting by its config-file key, e.g. `top_holdings` or
    /// `portfolio.top_holdings`. Values parse the same way as the matching
    /// `MERIDIAN_*` variable.
    pub fn set(&mut self, key: &str, value: &str) -> PortfolioResult<()> {
        let field = key.trim().rsplit('.').next().unwrap_or_default();
        let Some(&(_, var)) = SETTABLE_KEYS.iter().find(|(k, _)| *k == field) else {
            let known: Vec<&str> = SETTABLE_KEYS.iter().map(|(k, _)| *k).collect();
            return Err(PortfolioError::Configuration(format!(
                "unknown setting '{key}' (expected one of: {})",
                known.join(", ")
            )));
        };
        self.apply_env_overrides(|name| (name == var).then(|| value.to_string()))
    }

    /// Reject settings that would make the pipeline misbehave.
    pub fn validate(&self) -> PortfolioResult<()> {
        url::Url::parse(&self.provider.base_url).map_err(|e| {
            PortfolioError::Configuration(format!(
                "invalid provider.base_url '{}': {e}",
                self.provider.base_url
            ))
        })?;
        if self.provider.request_timeout_ms == 0 {
            return Err(PortfolioError::Configuration(
                "provider.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.rate_limit.max_requests_per_window == 0 || self.rate_limit.window_ms == 0 {
            return Err(PortfolioError::Configuration(
                "rate_limit.max_requests_per_window and rate_limit.window_ms must be > 0".into(),
            ));
        }
        if self.portfolio.top_holdings == 0 {
            return Err(PortfolioError::Configuration(
                "portfolio.top_holdings must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Config-file field → environment variable carrying the same setting.
pub const SETTABLE_KEYS: [(&str, &str); 11] = [
    ("api_key", "MERIDIAN_API_KEY"),
    ("base_url", "MERIDIAN_API_URL"),
    ("currency", "MERIDIAN_CURRENCY"),
    ("request_timeout_ms", "MERIDIAN_REQUEST_TIMEOUT_MS"),
    ("max_requests_per_window", "MERIDIAN_MAX_REQUESTS_PER_WINDOW"),
    ("window_ms", "MERIDIAN_WINDOW_MS"),
    ("token_cache_ttl_ms", "MERIDIAN_TOKEN_CACHE_TTL_MS"),
    ("price_cache_ttl_ms", "MERIDIAN_PRICE_CACHE_TTL_MS"),
    ("dust_threshold_wei", "MERIDIAN_DUST_THRESHOLD_WEI"),
    ("default_chain_ids", "MERIDIAN_DEFAULT_CHAIN_IDS"),
    ("top_holdings", "MERIDIAN_TOP_HOLDINGS"),
];

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> PortfolioResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .replace('_', "")
        .parse()
        .map_err(|e| PortfolioError::Configuration(format!("{name}='{raw}': {e}")))
}

/// Parse a comma-separated chain ID list such as `1, 137,10`.
pub fn parse_chain_list(raw: &str) -> PortfolioResult<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| PortfolioError::Configuration(format!("invalid chain id '{s}': {e}")))
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
//  TESTS
// ═══════════════════════════════════════════════════════════════════════
