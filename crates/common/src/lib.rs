//! Shared building blocks: errors, constants, chains and token types.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{PortfolioError, PortfolioResult};
pub use types::{Chain, PriceQuote, TokenMetadata};
