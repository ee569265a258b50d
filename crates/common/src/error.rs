//! Error taxonomy for Meridian.
//!
//! Every error carries a structured detail for API / CLI output:
//! - **code**: machine-readable error code (e.g. `RATE_LIMIT_EXCEEDED`)
//! - **category**: error class (`config`, `rate_limit`, `upstream`, `network`, `validation`)
//! - **recoverable**: whether the caller can retry or fix
//! - **hints**: actionable suggestions for recovery
//!
//! JSON output format:
//! ```json
//! {
//!   "ok": false,
//!   "error": {
//!     "code": "RATE_LIMIT_EXCEEDED",
//!     "message": "Rate limit exceeded for 'prices', retry after 12s",
//!     "category": "rate_limit",
//!     "recoverable": true,
//!     "hints": ["Retry after 12s"]
//!   }
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Error category: determines exit code and recovery strategy.
///
/// Exit codes:
/// - `0`: success
/// - `1`: user error (config, validation)
/// - `2`: network / upstream / rate limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    RateLimit,
    Upstream,
    Network,
    Validation,
}

impl ErrorCategory {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Config | ErrorCategory::Validation => 1,
            ErrorCategory::RateLimit | ErrorCategory::Upstream | ErrorCategory::Network => 2,
        }
    }
}

/// Structured error detail for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    pub category: ErrorCategory,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

/// Body of a non-2xx upstream response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamBody {
    /// Body parsed as JSON.
    Json(serde_json::Value),
    /// Body that was not valid JSON, kept verbatim.
    Text(String),
}

impl UpstreamBody {
    /// Parse a raw response body, keeping it as text if it is not JSON.
    pub fn from_raw(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(value) => UpstreamBody::Json(value),
            Err(_) => UpstreamBody::Text(raw),
        }
    }
}

impl std::fmt::Display for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamBody::Json(v) => write!(f, "{v}"),
            UpstreamBody::Text(t) => write!(f, "{t}"),
        }
    }
}

/// Top-level error type for all Meridian operations.
#[derive(Debug, Error)]
pub enum PortfolioError {
    /// Missing or invalid configuration, detected at construction time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local request quota for an endpoint is exhausted. No request was sent.
    #[error("Rate limit exceeded for '{endpoint}', retry after {retry_after_secs}s")]
    RateLimitExceeded {
        endpoint: String,
        retry_after_secs: u64,
    },

    /// Provider answered with a non-2xx status.
    #[error("Upstream error {status}: {body}")]
    Upstream { status: u16, body: UpstreamBody },

    /// Transport failure: connect, timeout, TLS, truncated body.
    #[error("Network error: {0}")]
    Network(String),

    /// 2xx response whose body did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),
}

impl PortfolioError {
    /// Get the structured error detail for JSON output.
    pub fn detail(&self) -> ErrorDetail {
        match self {
            PortfolioError::Configuration(msg) => ErrorDetail {
                code: "CONFIGURATION_ERROR".into(),
                message: msg.clone(),
                category: ErrorCategory::Config,
                recoverable: false,
                hints: vec![
                    "Set MERIDIAN_API_KEY or provider.api_key in ~/.meridian/config.toml".into(),
                ],
            },
            PortfolioError::RateLimitExceeded {
                retry_after_secs, ..
            } => ErrorDetail {
                code: "RATE_LIMIT_EXCEEDED".into(),
                message: self.to_string(),
                category: ErrorCategory::RateLimit,
                recoverable: true,
                hints: vec![format!("Retry after {retry_after_secs}s")],
            },
            PortfolioError::Upstream { status, .. } => ErrorDetail {
                code: "UPSTREAM_ERROR".into(),
                message: self.to_string(),
                category: ErrorCategory::Upstream,
                recoverable: *status >= 500,
                hints: if *status >= 500 {
                    vec!["Provider-side failure, retry later".into()]
                } else {
                    vec![]
                },
            },
            PortfolioError::Network(msg) => ErrorDetail {
                code: "NETWORK_ERROR".into(),
                message: msg.clone(),
                category: ErrorCategory::Network,
                recoverable: true,
                hints: vec!["Check network connectivity".into()],
            },
            PortfolioError::Decode(msg) => ErrorDetail {
                code: "DECODE_ERROR".into(),
                message: msg.clone(),
                category: ErrorCategory::Upstream,
                recoverable: false,
                hints: vec![],
            },
            PortfolioError::UnsupportedChain(id) => ErrorDetail {
                code: "UNSUPPORTED_CHAIN".into(),
                message: format!("Chain {id} is not supported"),
                category: ErrorCategory::Validation,
                recoverable: true,
                hints: vec!["Supported chains: 1, 10, 56, 137, 8453, 42161, 43114".into()],
            },
        }
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PortfolioError::RateLimitExceeded { .. } | PortfolioError::Network(_) => true,
            PortfolioError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Exit code: 0 success, 1 user error, 2 network.
    pub fn exit_code(&self) -> i32 {
        self.detail().category.exit_code()
    }

    /// Serialize this error as the JSON error envelope.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ok": false,
            "error": self.detail(),
        })
    }
}

pub type PortfolioResult<T> = Result<T, PortfolioError>;
