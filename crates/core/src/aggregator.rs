//! Portfolio aggregation: the orchestration core.
//!
//! ```text
//!   chain ids ──► BalanceFetcher (fan-out over chains)
//!                    │
//!                    ▼  per surviving chain, concurrently:
//!            TokenCatalog::resolve_many ║ PriceOracleClient::get_prices_detailed
//!                    │
//!                    ▼
//!              ChainPortfolio ──► Portfolio ──► analytics (score, risk)
//! ```
//!
//! Nothing below `get_portfolio` fails the whole call. Chains and tokens that
//! cannot be resolved are left out and recorded in the [`FetchReport`].

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use meridian_common::types::is_native;
use meridian_common::{Chain, PortfolioResult};
use meridian_types::config::AppConfig;
use meridian_types::portfolio::{ChainPortfolio, FetchReport, Portfolio, TokenHolding};
use meridian_utils::analytics;
use tracing::{debug, info, warn};

use crate::balances::BalanceFetcher;
use crate::client::RateLimitedClient;
use crate::prices::PriceOracleClient;
use crate::provider::{HttpProvider, MarketDataProvider};
use crate::tokens::TokenCatalog;

pub struct PortfolioAggregator {
    balances: BalanceFetcher,
    tokens: TokenCatalog,
    prices: PriceOracleClient,
    top_n: usize,
}

impl PortfolioAggregator {
    pub fn new(
        balances: BalanceFetcher,
        tokens: TokenCatalog,
        prices: PriceOracleClient,
        top_n: usize,
    ) -> Self {
        Self {
            balances,
            tokens,
            prices,
            top_n,
        }
    }

    /// Wire every fetcher to one shared provider.
    pub fn with_provider(provider: Arc<dyn MarketDataProvider>, config: &AppConfig) -> Self {
        Self::new(
            BalanceFetcher::new(Arc::clone(&provider), config.portfolio.dust_threshold_wei),
            TokenCatalog::new(Arc::clone(&provider), config.cache.token_ttl()),
            PriceOracleClient::new(provider, config.cache.price_ttl(), &config.provider.currency),
            config.portfolio.top_holdings,
        )
    }

    /// Build the HTTP provider from config. Fails when no API key is set.
    pub fn from_config(config: &AppConfig) -> PortfolioResult<Self> {
        let client = RateLimitedClient::new(&config.provider, &config.rate_limit)?;
        info!(base_url = client.base_url(), "market data provider ready");
        Ok(Self::with_provider(Arc::new(HttpProvider::new(client)), config))
    }

    pub fn tokens(&self) -> &TokenCatalog {
        &self.tokens
    }

    pub fn prices(&self) -> &PriceOracleClient {
        &self.prices
    }

    pub fn balances(&self) -> &BalanceFetcher {
        &self.balances
    }

    /// Drop expired entries from both caches.
    pub fn purge_caches(&self) -> usize {
        self.tokens.purge_expired() + self.prices.purge_expired()
    }

    /// Unified portfolio for `address` across `chain_ids`.
    pub async fn get_portfolio(&self, address: &str, chain_ids: &[u64]) -> Portfolio {
        self.get_portfolio_with_report(address, chain_ids).await.0
    }

    /// [`get_portfolio`](Self::get_portfolio) plus a per-chain outcome report.
    pub async fn get_portfolio_with_report(
        &self,
        address: &str,
        chain_ids: &[u64],
    ) -> (Portfolio, FetchReport) {
        let address = address.trim();
        let mut report = FetchReport::default();

        let mut chains: Vec<Chain> = Vec::with_capacity(chain_ids.len());
        for &id in chain_ids {
            match Chain::try_from(id) {
                Ok(chain) if !chains.contains(&chain) => chains.push(chain),
                Ok(_) => {}
                Err(_) => {
                    warn!(chain_id = id, "skipping unsupported chain");
                    report.unsupported_chain_ids.push(id);
                }
            }
        }
        report.chains_requested = chains.iter().map(|c| c.id()).collect();

        let fetched = self.balances.fetch_all_non_zero(address, &chains).await;

        let mut pending = Vec::new();
        for (chain, result) in fetched {
            match result {
                Ok(balances) if balances.is_empty() => report.chains_empty.push(chain.id()),
                Ok(balances) => pending.push((chain, balances)),
                Err(e) => {
                    warn!(%chain, error = %e, "balance fetch failed, chain omitted");
                    report.chains_failed.push(chain.id());
                }
            }
        }

        let built = join_all(
            pending
                .into_iter()
                .map(|(chain, balances)| self.build_chain(chain, balances)),
        )
        .await;

        let mut chain_portfolios = Vec::with_capacity(built.len());
        for cp in built {
            if cp.is_empty() {
                report.chains_empty.push(cp.chain_id().id());
            } else {
                report.chains_succeeded.push(cp.chain_id().id());
                chain_portfolios.push(cp);
            }
        }

        let mut portfolio = Portfolio::from_chains(address, chain_portfolios, self.top_n);
        analytics::apply(&mut portfolio);

        if report.all_failed() {
            warn!(%address, "every chain failed, returning empty portfolio");
        }
        info!(
            %address,
            total_usd = portfolio.total_usd_value(),
            chains = portfolio.chains().len(),
            holdings = portfolio.holding_count(),
            score = portfolio.diversification_score,
            risk = %portfolio.risk_level,
            "portfolio aggregated"
        );
        (portfolio, report)
    }

    /// Resolve metadata and prices for one chain's balances, concurrently.
    async fn build_chain(&self, chain: Chain, balances: HashMap<String, u128>) -> ChainPortfolio {
        let addresses: Vec<&str> = balances.keys().map(String::as_str).collect();
        let (metadata, prices) = tokio::join!(
            self.tokens.resolve_many(chain, &addresses),
            self.prices.get_prices_detailed(chain, &addresses),
        );

        if metadata.has_failures() || prices.has_failures() {
            warn!(
                %chain,
                metadata_failed = metadata.failed.len(),
                prices_failed = prices.failed.len(),
                "partial resolution, affected tokens omitted"
            );
        }

        let holdings: Vec<TokenHolding> = balances
            .iter()
            .filter_map(|(addr, &raw)| {
                let meta = match metadata.get(addr) {
                    Some(m) => m.clone(),
                    None if is_native(addr) => chain.native_metadata(),
                    None => {
                        debug!(%chain, %addr, "no metadata, token omitted");
                        return None;
                    }
                };
                let Some(&price) = prices.get(addr) else {
                    debug!(%chain, %addr, "no price, token omitted");
                    return None;
                };
                Some(TokenHolding::new(&meta, chain, raw, price))
            })
            .collect();

        ChainPortfolio::new(chain, holdings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use meridian_common::constants::NATIVE_TOKEN_ADDRESS;
    use meridian_types::RiskLevel;
    use std::time::Duration;

    const WALLET: &str = "0x000000000000000000000000000000000000beef";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
    const WBTC: &str = "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599";
    const PEPE: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

    const ETH_5: &str = "5000000000000000000";
    const USDC_15K: &str = "15000000000";

    fn aggregator(fake: FakeProvider) -> PortfolioAggregator {
        PortfolioAggregator::with_provider(Arc::new(fake), &AppConfig::default())
    }

    fn eth_usdc(fake: FakeProvider, chain: Chain) -> FakeProvider {
        fake.with_balance(chain, NATIVE_TOKEN_ADDRESS, ETH_5)
            .with_balance(chain, USDC, USDC_15K)
            .with_token(chain, NATIVE_TOKEN_ADDRESS, chain.native_symbol(), 18)
            .with_token(chain, USDC, "USDC", 6)
            .with_price(chain, NATIVE_TOKEN_ADDRESS, 2000.0)
            .with_price(chain, USDC, 1.0)
    }

    #[tokio::test]
    async fn test_eth_usdc_scenario() {
        let agg = aggregator(eth_usdc(FakeProvider::default(), Chain::Ethereum));
        let p = agg.get_portfolio(WALLET, &[1]).await;

        assert!((p.total_usd_value() - 25_000.0).abs() < 1e-6);
        assert_eq!(p.chains().len(), 1);

        let holdings = p.chains()[0].holdings();
        assert_eq!(holdings[0].symbol, "USDC");
        assert!((holdings[0].allocation_pct - 60.0).abs() < 1e-6);
        assert_eq!(holdings[1].symbol, "ETH");
        assert!((holdings[1].allocation_pct - 40.0).abs() < 1e-6);
        assert!((holdings[1].human_balance - 5.0).abs() < 1e-12);

        assert_eq!(p.diversification_score, 48);
        assert_eq!(p.risk_level, RiskLevel::High);
        assert!(p.chains()[0].native_holding().is_some());
    }

    #[tokio::test]
    async fn test_partial_chain_failure() {
        let mut fake = FakeProvider::default();
        for chain in [Chain::Ethereum, Chain::Polygon, Chain::Optimism, Chain::Arbitrum] {
            fake = eth_usdc(fake, chain);
        }
        fake.failing_balances.insert(Chain::Optimism);
        let agg = aggregator(fake);

        let (p, report) = agg.get_portfolio_with_report(WALLET, &[1, 137, 10, 42161]).await;
        let mut ids: Vec<u64> = p.chains().iter().map(|c| c.chain_id().id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 137, 42161]);
        assert!((p.total_usd_value() - 75_000.0).abs() < 1e-6);
        assert_eq!(report.chains_failed, vec![10]);
        assert_eq!(report.chains_succeeded.len(), 3);
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_all_chains_failing_yields_empty_portfolio() {
        let mut fake = FakeProvider::default();
        fake.failing_balances.extend([Chain::Ethereum, Chain::Polygon]);
        let agg = aggregator(fake);

        let (p, report) = agg.get_portfolio_with_report(WALLET, &[1, 137]).await;
        assert_eq!(p.total_usd_value(), 0.0);
        assert!(p.chains().is_empty());
        assert!(p.top_holdings().is_empty());
        assert_eq!(p.diversification_score, 0);
        assert!(report.all_failed());
    }

    #[tokio::test]
    async fn test_token_without_metadata_or_price_is_excluded() {
        let fake = eth_usdc(FakeProvider::default(), Chain::Ethereum)
            // priced but unknown to both catalogs
            .with_balance(Chain::Ethereum, PEPE, "1000000000000000000000")
            .with_price(Chain::Ethereum, PEPE, 0.00001)
            // known but unpriced
            .with_balance(Chain::Ethereum, WBTC, "100000000")
            .with_token(Chain::Ethereum, WBTC, "WBTC", 8);
        let agg = aggregator(fake);

        let p = agg.get_portfolio(WALLET, &[1]).await;
        let symbols: Vec<&str> = p.all_holdings().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols.len(), 2);
        assert!(!symbols.contains(&"WBTC"));
        assert!((p.total_usd_value() - 25_000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_native_falls_back_to_default_decimals() {
        // catalog has nothing for the native sentinel
        let fake = FakeProvider::default()
            .with_balance(Chain::Polygon, NATIVE_TOKEN_ADDRESS, "2000000000000000000")
            .with_price(Chain::Polygon, NATIVE_TOKEN_ADDRESS, 0.5);
        let agg = aggregator(fake);

        let p = agg.get_portfolio(WALLET, &[137]).await;
        let native = p.chains()[0].native_holding().unwrap();
        assert_eq!(native.decimals, 18);
        assert_eq!(native.symbol, Chain::Polygon.native_symbol());
        assert!((native.usd_value - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_allocations_sum_to_100() {
        let mut fake = eth_usdc(FakeProvider::default(), Chain::Ethereum);
        fake = fake
            .with_balance(Chain::Arbitrum, WBTC, "50000000")
            .with_token(Chain::Arbitrum, WBTC, "WBTC", 8)
            .with_price(Chain::Arbitrum, WBTC, 60_000.0)
            .with_balance(Chain::Base, USDC, "1234567890")
            .with_token(Chain::Base, USDC, "USDC", 6)
            .with_price(Chain::Base, USDC, 1.0);
        let agg = aggregator(fake);

        let p = agg.get_portfolio(WALLET, &[1, 42161, 8453]).await;
        let sum: f64 = p.all_holdings().map(|h| h.allocation_pct).sum();
        assert!((sum - 100.0).abs() < 1e-6, "sum = {sum}");

        let chain_total: f64 = p.chains().iter().map(|c| c.total_usd_value()).sum();
        assert!((chain_total - p.total_usd_value()).abs() < 1e-6);

        // chains ordered by value
        assert_eq!(p.chains()[0].chain_id(), Chain::Arbitrum);
    }

    #[tokio::test]
    async fn test_unsupported_and_duplicate_chain_ids() {
        let agg = aggregator(eth_usdc(FakeProvider::default(), Chain::Ethereum));
        let (p, report) = agg.get_portfolio_with_report(WALLET, &[1, 1, 999]).await;
        assert_eq!(p.chains().len(), 1);
        assert_eq!(report.chains_requested, vec![1]);
        assert_eq!(report.unsupported_chain_ids, vec![999]);
    }

    #[tokio::test]
    async fn test_dust_only_chain_is_empty() {
        let fake = FakeProvider::default().with_balance(Chain::Base, USDC, "500000");
        let agg = aggregator(fake);
        let (p, report) = agg.get_portfolio_with_report(WALLET, &[8453]).await;
        assert!(p.chains().is_empty());
        assert_eq!(report.chains_empty, vec![8453]);
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_repeat_calls_hit_caches() {
        let fake = Arc::new(eth_usdc(FakeProvider::default(), Chain::Ethereum));
        let agg = PortfolioAggregator::with_provider(fake.clone(), &AppConfig::default());
        agg.get_portfolio(WALLET, &[1]).await;
        agg.get_portfolio(WALLET, &[1]).await;
        assert_eq!(FakeProvider::calls(&fake.balance_calls), 2);
        assert_eq!(FakeProvider::calls(&fake.catalog_calls), 1);
        assert_eq!(FakeProvider::calls(&fake.price_calls), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_chain_does_not_hold_up_the_others() {
        let mut fake = FakeProvider::default();
        for chain in [Chain::Ethereum, Chain::Polygon, Chain::Arbitrum] {
            fake = eth_usdc(fake, chain);
        }
        fake.balance_delays.insert(Chain::Ethereum, Duration::from_secs(2));
        fake.balance_delays.insert(Chain::Polygon, Duration::from_secs(2));
        // hangs until the client timeout, then errors
        fake.balance_delays.insert(Chain::Arbitrum, Duration::from_secs(10));
        fake.failing_balances.insert(Chain::Arbitrum);
        let agg = aggregator(fake);

        let started = tokio::time::Instant::now();
        let (p, report) = agg.get_portfolio_with_report(WALLET, &[1, 137, 42161]).await;
        let elapsed = started.elapsed();

        // chains run side by side: bounded by the slowest, not the sum
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11), "elapsed {elapsed:?}");

        assert_eq!(p.chains().len(), 2);
        assert!((p.total_usd_value() - 50_000.0).abs() < 1e-6);
        assert_eq!(report.chains_failed, vec![42161]);
        assert_eq!(report.chains_succeeded.len(), 2);
    }

    #[test]
    fn test_from_config_requires_api_key() {
        assert!(PortfolioAggregator::from_config(&AppConfig::default()).is_err());
    }
}
