//! Universal types shared across the portfolio pipeline.
//!
//! Upstream payloads are converted into these types at the provider
//! boundary; fetchers, aggregator and analytics never see wire structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::NATIVE_TOKEN_ADDRESS;
use crate::error::PortfolioError;

/// Supported chains. Closed set: unknown chain IDs are rejected at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u64", try_from = "u64")]
pub enum Chain {
    Ethereum,
    Optimism,
    Bsc,
    Polygon,
    Base,
    Arbitrum,
    Avalanche,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Optimism,
        Chain::Bsc,
        Chain::Polygon,
        Chain::Base,
        Chain::Arbitrum,
        Chain::Avalanche,
    ];

    /// Numeric EVM chain ID.
    pub fn id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Optimism => 10,
            Chain::Bsc => 56,
            Chain::Polygon => 137,
            Chain::Base => 8453,
            Chain::Arbitrum => 42161,
            Chain::Avalanche => 43114,
        }
    }

    /// Human-readable network name.
    pub fn name(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Optimism => "Optimism",
            Chain::Bsc => "BSC",
            Chain::Polygon => "Polygon",
            Chain::Base => "Base",
            Chain::Arbitrum => "Arbitrum",
            Chain::Avalanche => "Avalanche",
        }
    }

    /// Symbol of the native gas asset.
    pub fn native_symbol(self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Optimism | Chain::Base | Chain::Arbitrum => "ETH",
            Chain::Bsc => "BNB",
            Chain::Polygon => "MATIC",
            Chain::Avalanche => "AVAX",
        }
    }

    /// Full name of the native gas asset.
    pub fn native_name(self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Optimism | Chain::Base | Chain::Arbitrum => "Ether",
            Chain::Bsc => "BNB",
            Chain::Polygon => "Polygon",
            Chain::Avalanche => "Avalanche",
        }
    }

    /// Metadata for the native asset, used when the catalog has no entry for it.
    pub fn native_metadata(self) -> TokenMetadata {
        TokenMetadata {
            address: NATIVE_TOKEN_ADDRESS.to_string(),
            chain_id: self,
            symbol: self.native_symbol().to_string(),
            name: self.native_name().to_string(),
            decimals: crate::constants::NATIVE_DEFAULT_DECIMALS,
            logo_uri: None,
        }
    }
}

impl From<Chain> for u64 {
    fn from(chain: Chain) -> u64 {
        chain.id()
    }
}

impl TryFrom<u64> for Chain {
    type Error = PortfolioError;

    fn try_from(id: u64) -> Result<Self, Self::Error> {
        Chain::ALL
            .into_iter()
            .find(|c| c.id() == id)
            .ok_or(PortfolioError::UnsupportedChain(id))
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

/// Token metadata, scoped to one chain. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub address: String,
    pub chain_id: Chain,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
}

/// A USD unit price for one token at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub token_address: String,
    pub chain_id: Chain,
    pub usd_price: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Canonical form of an EVM address: trimmed, lowercase.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Whether `address` is the native-asset sentinel.
pub fn is_native(address: &str) -> bool {
    address.trim().eq_ignore_ascii_case(NATIVE_TOKEN_ADDRESS)
}
