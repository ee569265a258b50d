//! JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use meridian_common::PortfolioError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: bad address, chain list or targets.
    BadRequest(String),
    Portfolio(PortfolioError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Portfolio(e) => match e {
                PortfolioError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PortfolioError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                PortfolioError::UnsupportedChain(_) => StatusCode::BAD_REQUEST,
                PortfolioError::Upstream { .. } | PortfolioError::Decode(_) => StatusCode::BAD_GATEWAY,
                PortfolioError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
            },
        }
    }
}

impl From<PortfolioError> for ApiError {
    fn from(e: PortfolioError) -> Self {
        ApiError::Portfolio(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<PortfolioError>() {
            Ok(pe) => ApiError::Portfolio(pe),
            Err(e) => ApiError::BadRequest(format!("{e:#}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(msg) => json!({
                "error": { "code": "BAD_REQUEST", "message": msg }
            }),
            ApiError::Portfolio(e) => e.to_json(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Portfolio(PortfolioError::RateLimitExceeded {
                    endpoint: "prices".into(),
                    retry_after_secs: 3,
                }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::Portfolio(PortfolioError::Network("timeout".into())),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::Portfolio(PortfolioError::UnsupportedChain(999)),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::BadRequest("nope".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_anyhow_keeps_portfolio_errors() {
        let e = anyhow::Error::new(PortfolioError::Decode("bad".into()));
        assert!(matches!(ApiError::from(e), ApiError::Portfolio(PortfolioError::Decode(_))));
        let e = anyhow::anyhow!("Invalid address");
        assert!(matches!(ApiError::from(e), ApiError::BadRequest(_)));
    }
}
