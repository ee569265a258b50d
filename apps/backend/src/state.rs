//! Shared application state for the API server.

use std::sync::Arc;

use meridian_common::PortfolioResult;
use meridian_core::PortfolioAggregator;
use meridian_types::config::AppConfig;

/// Backend application state: shared across all request handlers.
///
/// One aggregator per process, so every request shares the same caches and
/// rate-limit windows.
pub struct AppState {
    pub config: AppConfig,
    pub aggregator: Arc<PortfolioAggregator>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> PortfolioResult<Self> {
        Ok(Self::new(
            config.clone(),
            Arc::new(PortfolioAggregator::from_config(config)?),
        ))
    }

    pub fn new(config: AppConfig, aggregator: Arc<PortfolioAggregator>) -> Self {
        Self { config, aggregator }
    }
}
