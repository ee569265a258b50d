//! Raw wallet balances per chain.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use meridian_common::types::normalize_address;
use meridian_common::{Chain, PortfolioResult};
use serde::Serialize;
use tracing::{debug, warn};

use crate::provider::MarketDataProvider;

/// Non-dust balances for one chain, keyed by normalized token address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBalances {
    pub chain_id: Chain,
    #[serde(with = "raw_balance_map")]
    pub balances: HashMap<String, u128>,
}

mod raw_balance_map {
    use std::collections::HashMap;

    use serde::ser::SerializeMap;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(map: &HashMap<String, u128>, s: S) -> Result<S::Ok, S::Error> {
        let mut out = s.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            out.serialize_entry(k, &v.to_string())?;
        }
        out.end()
    }
}

/// Parse a provider balance: decimal digits or `0x`-prefixed hex.
pub fn parse_raw_balance(raw: &str) -> Option<u128> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(0);
        }
        return u128::from_str_radix(hex, 16).ok();
    }
    raw.parse().ok()
}

pub struct BalanceFetcher {
    provider: Arc<dyn MarketDataProvider>,
    dust_threshold: u128,
}

impl BalanceFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>, dust_threshold_wei: u64) -> Self {
        Self {
            provider,
            dust_threshold: u128::from(dust_threshold_wei),
        }
    }

    pub fn dust_threshold(&self) -> u128 {
        self.dust_threshold
    }

    /// All balances the provider reports. Unparseable entries are skipped.
    pub async fn get_balances(
        &self,
        chain: Chain,
        address: &str,
    ) -> PortfolioResult<HashMap<String, u128>> {
        let raw = self.provider.balances(chain, address).await?;
        Ok(raw
            .into_iter()
            .filter_map(|(token, value)| match parse_raw_balance(&value) {
                Some(v) => Some((normalize_address(&token), v)),
                None => {
                    debug!(%chain, %token, %value, "skipping unparseable balance");
                    None
                }
            })
            .collect())
    }

    /// Balances strictly above the dust threshold.
    pub async fn get_non_zero_balances(
        &self,
        chain: Chain,
        address: &str,
    ) -> PortfolioResult<HashMap<String, u128>> {
        let mut balances = self.get_balances(chain, address).await?;
        balances.retain(|_, v| *v > 0 && *v > self.dust_threshold);
        Ok(balances)
    }

    /// One concurrent fetch per chain, each with its own outcome, in input order.
    pub async fn fetch_all_non_zero(
        &self,
        address: &str,
        chains: &[Chain],
    ) -> Vec<(Chain, PortfolioResult<HashMap<String, u128>>)> {
        let futs = chains.iter().map(|&chain| async move {
            (chain, self.get_non_zero_balances(chain, address).await)
        });
        join_all(futs).await
    }

    /// Non-dust balances for every chain whose fetch succeeded.
    ///
    /// Failing chains are omitted.
    pub async fn get_all_non_zero_balances(&self, address: &str, chains: &[Chain]) -> Vec<ChainBalances> {
        self.fetch_all_non_zero(address, chains)
            .await
            .into_iter()
            .filter_map(|(chain, result)| match result {
                Ok(balances) => Some(ChainBalances {
                    chain_id: chain,
                    balances,
                }),
                Err(e) => {
                    warn!(%chain, error = %e, "balance fetch failed");
                    None
                }
            })
            .collect()
    }
}
