//! Portfolio pipeline: rate-limited provider access, response caches, the
//! three fetchers and the aggregator that ties them together.

pub mod aggregator;
pub mod balances;
pub mod cache;
pub mod client;
pub mod prices;
pub mod provider;
pub mod resolution;
pub mod tokens;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::PortfolioAggregator;
pub use balances::{BalanceFetcher, ChainBalances};
pub use cache::ResponseCache;
pub use client::{RateLimitedClient, RateLimiter};
pub use prices::PriceOracleClient;
pub use provider::{HttpProvider, MarketDataProvider};
pub use resolution::Resolution;
pub use tokens::TokenCatalog;
pub use workspace::{init_workspace, load_config};
