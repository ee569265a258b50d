//! Configuration and portfolio value objects.

pub mod config;
pub mod portfolio;

pub use config::AppConfig;
pub use portfolio::{ChainPortfolio, FetchReport, Portfolio, RiskLevel, TokenHolding};
