//! Scripted in-memory provider for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use meridian_common::types::normalize_address;
use meridian_common::{Chain, PortfolioError, PortfolioResult, TokenMetadata};

use crate::provider::MarketDataProvider;

#[derive(Default)]
pub struct FakeProvider {
    pub balances: HashMap<Chain, HashMap<String, String>>,
    pub catalog: HashMap<Chain, HashMap<String, TokenMetadata>>,
    pub custom: HashMap<Chain, HashMap<String, TokenMetadata>>,
    pub prices: HashMap<Chain, HashMap<String, f64>>,

    pub failing_balances: HashSet<Chain>,
    pub failing_catalog: HashSet<Chain>,
    pub failing_custom: HashSet<Chain>,
    pub failing_prices: HashSet<Chain>,

    /// Per-chain latency applied before a balance call answers (or fails).
    pub balance_delays: HashMap<Chain, Duration>,

    pub balance_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub custom_calls: AtomicUsize,
    pub price_calls: AtomicUsize,
    pub price_requests: Mutex<Vec<Vec<String>>>,
}

pub fn meta(chain: Chain, address: &str, symbol: &str, decimals: u8) -> TokenMetadata {
    TokenMetadata {
        address: normalize_address(address),
        chain_id: chain,
        symbol: symbol.into(),
        name: format!("{symbol} Token"),
        decimals,
        logo_uri: None,
    }
}

impl FakeProvider {
    pub fn with_balance(mut self, chain: Chain, address: &str, raw: &str) -> Self {
        self.balances
            .entry(chain)
            .or_default()
            .insert(normalize_address(address), raw.into());
        self
    }

    pub fn with_token(mut self, chain: Chain, address: &str, symbol: &str, decimals: u8) -> Self {
        self.catalog
            .entry(chain)
            .or_default()
            .insert(normalize_address(address), meta(chain, address, symbol, decimals));
        self
    }

    pub fn with_custom_token(mut self, chain: Chain, address: &str, symbol: &str, decimals: u8) -> Self {
        self.custom
            .entry(chain)
            .or_default()
            .insert(normalize_address(address), meta(chain, address, symbol, decimals));
        self
    }

    pub fn with_price(mut self, chain: Chain, address: &str, price: f64) -> Self {
        self.prices
            .entry(chain)
            .or_default()
            .insert(normalize_address(address), price);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn upstream_down(chain: Chain) -> PortfolioError {
    PortfolioError::Network(format!("{chain} unreachable"))
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn balances(&self, chain: Chain, _address: &str) -> PortfolioResult<HashMap<String, String>> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(&delay) = self.balance_delays.get(&chain) {
            tokio::time::sleep(delay).await;
        }
        if self.failing_balances.contains(&chain) {
            return Err(upstream_down(chain));
        }
        Ok(self.balances.get(&chain).cloned().unwrap_or_default())
    }

    async fn token_catalog(&self, chain: Chain) -> PortfolioResult<HashMap<String, TokenMetadata>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_catalog.contains(&chain) {
            return Err(upstream_down(chain));
        }
        Ok(self.catalog.get(&chain).cloned().unwrap_or_default())
    }

    async fn custom_tokens(
        &self,
        chain: Chain,
        addresses: &[String],
    ) -> PortfolioResult<HashMap<String, TokenMetadata>> {
        self.custom_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_custom.contains(&chain) {
            return Err(upstream_down(chain));
        }
        let known = self.custom.get(&chain);
        Ok(addresses
            .iter()
            .filter_map(|a| known.and_then(|m| m.get(a)).map(|m| (a.clone(), m.clone())))
            .collect())
    }

    async fn prices(
        &self,
        chain: Chain,
        addresses: &[String],
        _currency: &str,
    ) -> PortfolioResult<HashMap<String, f64>> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.price_requests.lock() {
            log.push(addresses.to_vec());
        }
        if self.failing_prices.contains(&chain) {
            return Err(upstream_down(chain));
        }
        let known = self.prices.get(&chain);
        Ok(addresses
            .iter()
            .filter_map(|a| known.and_then(|m| m.get(a)).map(|p| (a.clone(), *p)))
            .collect())
    }
}
