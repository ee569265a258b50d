//! Portfolio value objects.
//!
//! These carry no reference to caches or clients. Totals are always derived
//! from holdings at construction time, and `allocation_pct` is rebased
//! whenever the denominator changes (chain scope → portfolio scope).

use chrono::{DateTime, Utc};
use meridian_common::{Chain, TokenMetadata};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
//  TOKEN HOLDING
// ═══════════════════════════════════════════════════════════════════════

/// One priced token balance on one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Balance in base units, serialized as a decimal string.
    #[serde(with = "raw_balance_string")]
    pub raw_balance: u128,
    pub human_balance: f64,
    pub usd_price: f64,
    pub usd_value: f64,
    pub chain_id: Chain,
    pub chain_name: String,
    #[serde(rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Share of the current denominator, in percent. Not intrinsic.
    pub allocation_pct: f64,
}

impl TokenHolding {
    /// Build a holding from resolved metadata, a raw balance and a unit price.
    pub fn new(meta: &TokenMetadata, chain: Chain, raw_balance: u128, usd_price: f64) -> Self {
        let human_balance = human_balance(raw_balance, meta.decimals);
        Self {
            address: meta.address.clone(),
            symbol: meta.symbol.clone(),
            name: meta.name.clone(),
            decimals: meta.decimals,
            raw_balance,
            human_balance,
            usd_price,
            usd_value: human_balance * usd_price,
            chain_id: chain,
            chain_name: chain.name().to_string(),
            logo_uri: meta.logo_uri.clone(),
            allocation_pct: 0.0,
        }
    }
}

/// `raw / 10^decimals` as a float.
pub fn human_balance(raw: u128, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(i32::from(decimals))
}

/// Percentage of `value` in `total`; 0 when the total is not positive.
pub fn percent_of(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

fn rebase(holdings: &mut [TokenHolding], total: f64) {
    for h in holdings {
        h.allocation_pct = percent_of(h.usd_value, total);
    }
}

fn sort_by_value_desc(holdings: &mut [TokenHolding]) {
    holdings.sort_by(|a, b| b.usd_value.total_cmp(&a.usd_value));
}

mod raw_balance_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  CHAIN PORTFOLIO
// ═══════════════════════════════════════════════════════════════════════

/// Holdings on one chain, sorted by descending USD value.
/// Serialize-only. Build through `ChainPortfolio::new`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainPortfolio {
    chain_id: Chain,
    chain_name: String,
    total_usd_value: f64,
    holdings: Vec<TokenHolding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    native_holding: Option<TokenHolding>,
}

impl ChainPortfolio {
    /// Sort holdings, derive the chain total and chain-scoped allocations.
    pub fn new(chain: Chain, mut holdings: Vec<TokenHolding>) -> Self {
        sort_by_value_desc(&mut holdings);
        let total_usd_value = holdings.iter().map(|h| h.usd_value).sum();
        rebase(&mut holdings, total_usd_value);
        let native_holding = holdings
            .iter()
            .find(|h| meridian_common::types::is_native(&h.address))
            .cloned();
        Self {
            chain_id: chain,
            chain_name: chain.name().to_string(),
            total_usd_value,
            holdings,
            native_holding,
        }
    }

    pub fn chain_id(&self) -> Chain {
        self.chain_id
    }

    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    pub fn total_usd_value(&self) -> f64 {
        self.total_usd_value
    }

    pub fn holdings(&self) -> &[TokenHolding] {
        &self.holdings
    }

    pub fn native_holding(&self) -> Option<&TokenHolding> {
        self.native_holding.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Recompute every allocation against a wider total (the whole portfolio).
    fn rebase_to(&mut self, total: f64) {
        rebase(&mut self.holdings, total);
        if let Some(native) = self.native_holding.as_mut() {
            native.allocation_pct = percent_of(native.usd_value, total);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  PORTFOLIO
// ═══════════════════════════════════════════════════════════════════════

/// Coarse risk classification derived from diversification and concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Unified cross-chain view of one wallet.
/// Serialize-only. Build through `Portfolio::from_chains`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    address: String,
    total_usd_value: f64,
    chains: Vec<ChainPortfolio>,
    top_holdings: Vec<TokenHolding>,
    pub diversification_score: u32,
    pub risk_level: RiskLevel,
    pub last_updated: DateTime<Utc>,
}

impl Portfolio {
    /// Merge per-chain results into one portfolio.
    ///
    /// Chains are ordered by descending value, every holding is rebased to
    /// the portfolio total, and `top_holdings` is an independent copy of the
    /// `top_n` most valuable holdings across all chains. Analytics fields start
    /// at their empty values and are attached by the caller.
    pub fn from_chains(address: &str, mut chains: Vec<ChainPortfolio>, top_n: usize) -> Self {
        chains.retain(|c| !c.is_empty());
        chains.sort_by(|a, b| b.total_usd_value.total_cmp(&a.total_usd_value));

        let total_usd_value: f64 = chains.iter().map(|c| c.total_usd_value).sum();
        for chain in &mut chains {
            chain.rebase_to(total_usd_value);
        }

        let mut all: Vec<TokenHolding> = chains
            .iter()
            .flat_map(|c| c.holdings.iter().cloned())
            .collect();
        sort_by_value_desc(&mut all);
        all.truncate(top_n);

        Self {
            address: address.to_string(),
            total_usd_value,
            chains,
            top_holdings: all,
            diversification_score: 0,
            risk_level: RiskLevel::Medium,
            last_updated: Utc::now(),
        }
    }

    /// A well-formed portfolio with no chains and zero value.
    pub fn empty(address: &str) -> Self {
        Self::from_chains(address, Vec::new(), 0)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn total_usd_value(&self) -> f64 {
        self.total_usd_value
    }

    pub fn chains(&self) -> &[ChainPortfolio] {
        &self.chains
    }

    pub fn top_holdings(&self) -> &[TokenHolding] {
        &self.top_holdings
    }

    /// Every holding across every chain, in chain order.
    pub fn all_holdings(&self) -> impl Iterator<Item = &TokenHolding> {
        self.chains.iter().flat_map(|c| c.holdings.iter())
    }

    pub fn holding_count(&self) -> usize {
        self.chains.iter().map(|c| c.holdings.len()).sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  FETCH REPORT
// ═══════════════════════════════════════════════════════════════════════

/// Side channel describing how a portfolio fetch went, so callers can tell
/// "no holdings" apart from "every fetch failed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    /// Supported chains the aggregator attempted.
    pub chains_requested: Vec<u64>,
    /// Chains that produced at least one priced holding.
    pub chains_succeeded: Vec<u64>,
    /// Chains whose balance fetch failed.
    pub chains_failed: Vec<u64>,
    /// Chains that answered but had nothing worth reporting.
    pub chains_empty: Vec<u64>,
    /// Requested IDs outside the supported chain set.
    pub unsupported_chain_ids: Vec<u64>,
}

impl FetchReport {
    /// True when at least one chain was attempted and none answered.
    pub fn all_failed(&self) -> bool {
        !self.chains_requested.is_empty() && self.chains_failed.len() == self.chains_requested.len()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  TESTS
// ═══════════════════════════════════════════════════════════════════════
