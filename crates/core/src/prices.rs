//! USD price resolution with a short-lived cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use meridian_common::constants::NATIVE_DEFAULT_DECIMALS;
use meridian_common::types::normalize_address;
use meridian_common::{Chain, PortfolioResult, PriceQuote};
use meridian_types::portfolio::human_balance;
use tracing::warn;

use crate::cache::{CacheStats, PriceKey, ResponseCache};
use crate::provider::MarketDataProvider;
use crate::resolution::Resolution;

pub struct PriceOracleClient {
    provider: Arc<dyn MarketDataProvider>,
    cache: ResponseCache<PriceKey, Arc<HashMap<String, f64>>>,
    ttl: Duration,
    currency: String,
}

impl PriceOracleClient {
    pub fn new(provider: Arc<dyn MarketDataProvider>, ttl: Duration, currency: &str) -> Self {
        Self {
            provider,
            cache: ResponseCache::new(),
            ttl,
            currency: currency.trim().to_uppercase(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Prices keyed by normalized address. A failed fetch marks every
    /// requested address as failed; an address without a quote is absent.
    pub async fn get_prices_detailed<S: AsRef<str>>(
        &self,
        chain: Chain,
        addresses: &[S],
    ) -> Resolution<f64> {
        let key = PriceKey::new(chain, addresses, &self.currency);
        let mut out = Resolution::default();
        if key.addresses.is_empty() {
            return out;
        }

        let requested = key.addresses.clone();
        let provider = Arc::clone(&self.provider);
        let wanted = requested.clone();
        let currency = key.currency.clone();
        let result = self
            .cache
            .get_or_fetch(key, self.ttl, || async move {
                let prices = provider.prices(chain, &wanted, &currency).await?;
                let prices = prices
                    .into_iter()
                    .map(|(k, v)| (normalize_address(&k), v))
                    .collect::<HashMap<_, _>>();
                PortfolioResult::Ok(Arc::new(prices))
            })
            .await;

        match result {
            Ok(prices) => {
                for addr in requested {
                    if let Some(&p) = prices.get(&addr) {
                        if p.is_finite() && p >= 0.0 {
                            out.resolved.insert(addr, p);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(%chain, count = requested.len(), error = %e, "price lookup failed");
                out.failed.extend(requested);
            }
        }
        out
    }

    /// Prices keyed by normalized address. Empty when the lookup fails.
    pub async fn get_prices<S: AsRef<str>>(&self, chain: Chain, addresses: &[S]) -> HashMap<String, f64> {
        self.get_prices_detailed(chain, addresses).await.into_resolved()
    }

    pub async fn get_price(&self, chain: Chain, address: &str) -> Option<f64> {
        let addr = normalize_address(address);
        self.get_prices(chain, &[addr.as_str()]).await.get(&addr).copied()
    }

    /// Timestamped quotes for the addresses that have a price.
    pub async fn get_quotes<S: AsRef<str>>(&self, chain: Chain, addresses: &[S]) -> Vec<PriceQuote> {
        let fetched_at = Utc::now();
        let mut quotes: Vec<PriceQuote> = self
            .get_prices(chain, addresses)
            .await
            .into_iter()
            .map(|(token_address, usd_price)| PriceQuote {
                token_address,
                chain_id: chain,
                usd_price,
                fetched_at,
            })
            .collect();
        quotes.sort_by(|a, b| a.token_address.cmp(&b.token_address));
        quotes
    }

    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Sum of `balance / 10^decimals * price` over addresses with a known price.
///
/// Decimals default to 18. Zero balances and unpriced tokens contribute 0.
pub fn calculate_total_value(
    balances: &HashMap<String, u128>,
    decimals: &HashMap<String, u8>,
    prices: &HashMap<String, f64>,
) -> f64 {
    balances
        .iter()
        .filter(|(_, &raw)| raw > 0)
        .filter_map(|(addr, &raw)| {
            let addr = normalize_address(addr);
            let price = *prices.get(&addr)?;
            let dec = decimals.get(&addr).copied().unwrap_or(NATIVE_DEFAULT_DECIMALS);
            Some(human_balance(raw, dec) * price)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;

    const TTL: Duration = Duration::from_secs(60);
    const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn oracle(fake: FakeProvider) -> (Arc<FakeProvider>, PriceOracleClient) {
        let fake = Arc::new(fake);
        let oracle = PriceOracleClient::new(fake.clone(), TTL, "usd");
        (fake, oracle)
    }

    #[tokio::test]
    async fn test_get_prices() {
        let (_, oracle) = oracle(
            FakeProvider::default()
                .with_price(Chain::Ethereum, WETH, 2000.0)
                .with_price(Chain::Ethereum, USDC, 1.0),
        );
        assert_eq!(oracle.currency(), "USD");
        let prices = oracle.get_prices(Chain::Ethereum, &[WETH, USDC]).await;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[WETH], 2000.0);
    }

    #[tokio::test]
    async fn test_request_order_shares_cache_entry() {
        let (fake, oracle) = oracle(
            FakeProvider::default()
                .with_price(Chain::Ethereum, WETH, 2000.0)
                .with_price(Chain::Ethereum, USDC, 1.0),
        );
        oracle.get_prices(Chain::Ethereum, &[WETH, USDC]).await;
        oracle
            .get_prices(Chain::Ethereum, &[USDC.to_uppercase().replace("0X", "0x"), WETH.to_string()])
            .await;
        assert_eq!(FakeProvider::calls(&fake.price_calls), 1);

        // upstream sees the canonical, sorted list
        let requests = fake.price_requests.lock().unwrap();
        assert_eq!(requests[0], vec![USDC.to_string(), WETH.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prices_expire_after_ttl() {
        let (fake, oracle) = oracle(FakeProvider::default().with_price(Chain::Ethereum, WETH, 2000.0));
        oracle.get_price(Chain::Ethereum, WETH).await;
        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        oracle.get_price(Chain::Ethereum, WETH).await;
        assert_eq!(FakeProvider::calls(&fake.price_calls), 2);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty() {
        let mut fake = FakeProvider::default().with_price(Chain::Polygon, WETH, 2000.0);
        fake.failing_prices.insert(Chain::Polygon);
        let (_, oracle) = oracle(fake);

        assert!(oracle.get_prices(Chain::Polygon, &[WETH]).await.is_empty());
        assert_eq!(oracle.get_price(Chain::Polygon, WETH).await, None);

        let detailed = oracle.get_prices_detailed(Chain::Polygon, &[WETH]).await;
        assert!(detailed.failed.contains(WETH));
    }

    #[tokio::test]
    async fn test_unknown_price_is_not_a_failure() {
        let (_, oracle) = oracle(FakeProvider::default());
        let detailed = oracle.get_prices_detailed(Chain::Ethereum, &[WETH]).await;
        assert!(detailed.resolved.is_empty());
        assert!(!detailed.has_failures());
    }

    #[tokio::test]
    async fn test_empty_request_skips_upstream() {
        let (fake, oracle) = oracle(FakeProvider::default());
        let empty: [&str; 0] = [];
        assert!(oracle.get_prices(Chain::Ethereum, &empty).await.is_empty());
        assert_eq!(FakeProvider::calls(&fake.price_calls), 0);
    }

    #[tokio::test]
    async fn test_quotes_are_stamped() {
        let (_, oracle) = oracle(FakeProvider::default().with_price(Chain::Base, USDC, 1.0));
        let quotes = oracle.get_quotes(Chain::Base, &[USDC, WETH]).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].chain_id, Chain::Base);
        assert_eq!(quotes[0].usd_price, 1.0);
    }

    #[test]
    fn test_calculate_total_value() {
        let balances = HashMap::from([
            (WETH.to_string(), 5_000_000_000_000_000_000u128),
            (USDC.to_string(), 15_000_000_000u128),
            ("0xdead".to_string(), 10u128.pow(18)),
            ("0xzero".to_string(), 0u128),
        ]);
        let decimals = HashMap::from([(USDC.to_string(), 6u8)]);
        let prices = HashMap::from([
            (WETH.to_string(), 2000.0),
            (USDC.to_string(), 1.0),
            ("0xzero".to_string(), 5.0),
        ]);
        let total = calculate_total_value(&balances, &decimals, &prices);
        assert!((total - 25_000.0).abs() < 1e-6);
    }
}
