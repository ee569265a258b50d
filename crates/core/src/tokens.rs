//! Token metadata resolution.
//!
//! The bulk catalog per chain is cached with a long TTL. Addresses missing
//! from it go through the per-address lookup, which has its own cache and is
//! never merged back into the bulk entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use meridian_common::types::{is_native, normalize_address};
use meridian_common::{Chain, PortfolioResult, TokenMetadata};
use tracing::{debug, warn};

use crate::cache::{canonical_addresses, CacheStats, ResponseCache, TokenLookupKey};
use crate::provider::MarketDataProvider;
use crate::resolution::Resolution;

type TokenMap = Arc<HashMap<String, TokenMetadata>>;

pub struct TokenCatalog {
    provider: Arc<dyn MarketDataProvider>,
    catalog: ResponseCache<Chain, TokenMap>,
    custom: ResponseCache<TokenLookupKey, TokenMap>,
    ttl: Duration,
}

impl TokenCatalog {
    pub fn new(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            catalog: ResponseCache::new(),
            custom: ResponseCache::new(),
            ttl,
        }
    }

    /// Full catalog for `chain`. Empty when the upstream fetch fails.
    pub async fn get_tokens(&self, chain: Chain) -> TokenMap {
        match self.fetch_catalog(chain).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(%chain, error = %e, "token catalog unavailable");
                Arc::default()
            }
        }
    }

    async fn fetch_catalog(&self, chain: Chain) -> PortfolioResult<TokenMap> {
        let provider = Arc::clone(&self.provider);
        self.catalog
            .get_or_fetch(chain, self.ttl, || async move {
                let tokens = provider.token_catalog(chain).await?;
                debug!(%chain, count = tokens.len(), "token catalog fetched");
                PortfolioResult::Ok(Arc::new(lowercase_keys(tokens)))
            })
            .await
    }

    async fn lookup_custom(&self, chain: Chain, addresses: &[String]) -> PortfolioResult<TokenMap> {
        let key = TokenLookupKey::new(chain, addresses);
        let provider = Arc::clone(&self.provider);
        let wanted = key.addresses.clone();
        self.custom
            .get_or_fetch(key, self.ttl, || async move {
                let tokens = provider.custom_tokens(chain, &wanted).await?;
                PortfolioResult::Ok(Arc::new(lowercase_keys(tokens)))
            })
            .await
    }

    /// Metadata for `addresses`, keyed by normalized address.
    ///
    /// Served from the bulk catalog first; the rest go through the custom
    /// lookup. Addresses whose custom lookup failed land in `failed`. The
    /// native sentinel is never sent to the custom lookup.
    ///
    /// When the bulk catalog itself cannot be fetched, anything the custom
    /// lookup does not return (the native sentinel included) is in `failed`
    /// rather than silently unknown.
    pub async fn resolve_many<S: AsRef<str>>(
        &self,
        chain: Chain,
        addresses: &[S],
    ) -> Resolution<TokenMetadata> {
        let mut out = Resolution::default();
        let wanted = canonical_addresses(addresses);
        if wanted.is_empty() {
            return out;
        }

        let (catalog, catalog_failed) = match self.fetch_catalog(chain).await {
            Ok(tokens) => (tokens, false),
            Err(e) => {
                warn!(%chain, error = %e, "token catalog unavailable");
                (TokenMap::default(), true)
            }
        };

        let mut missing = Vec::new();
        for addr in wanted {
            match catalog.get(&addr) {
                Some(meta) => {
                    out.resolved.insert(addr, meta.clone());
                }
                None if is_native(&addr) => {
                    if catalog_failed {
                        out.failed.insert(addr);
                    }
                }
                None => missing.push(addr),
            }
        }

        if missing.is_empty() {
            return out;
        }

        match self.lookup_custom(chain, &missing).await {
            Ok(found) => {
                for addr in missing {
                    match found.get(&addr) {
                        Some(meta) => {
                            out.resolved.insert(addr, meta.clone());
                        }
                        None if catalog_failed => {
                            out.failed.insert(addr);
                        }
                        None => {}
                    }
                }
            }
            Err(e) => {
                warn!(%chain, count = missing.len(), error = %e, "custom token lookup failed");
                out.failed.extend(missing);
            }
        }
        out
    }

    /// Single-address convenience over [`resolve_many`](Self::resolve_many).
    pub async fn resolve(&self, chain: Chain, address: &str) -> Option<TokenMetadata> {
        let addr = normalize_address(address);
        self.resolve_many(chain, &[addr.as_str()])
            .await
            .resolved
            .remove(&addr)
    }

    pub fn purge_expired(&self) -> usize {
        self.catalog.purge_expired() + self.custom.purge_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        let a = self.catalog.stats();
        let b = self.custom.stats();
        CacheStats {
            hits: a.hits + b.hits,
            misses: a.misses + b.misses,
            entries: a.entries + b.entries,
        }
    }
}

fn lowercase_keys(tokens: HashMap<String, TokenMetadata>) -> HashMap<String, TokenMetadata> {
    tokens
        .into_iter()
        .map(|(k, v)| (normalize_address(&k), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProvider;
    use meridian_common::constants::NATIVE_TOKEN_ADDRESS;

    const TTL: Duration = Duration::from_secs(3600);
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const PEPE: &str = "0x6982508145454ce325ddbe47a25d4ec3d2311933";

    fn catalog(fake: FakeProvider) -> (Arc<FakeProvider>, TokenCatalog) {
        let fake = Arc::new(fake);
        let catalog = TokenCatalog::new(fake.clone(), TTL);
        (fake, catalog)
    }

    #[tokio::test]
    async fn test_get_tokens_is_cached() {
        let (fake, catalog) =
            catalog(FakeProvider::default().with_token(Chain::Ethereum, USDC, "USDC", 6));
        let first = catalog.get_tokens(Chain::Ethereum).await;
        let second = catalog.get_tokens(Chain::Ethereum).await;
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(FakeProvider::calls(&fake.catalog_calls), 1);
    }

    #[tokio::test]
    async fn test_get_tokens_failure_returns_empty() {
        let mut fake = FakeProvider::default().with_token(Chain::Ethereum, USDC, "USDC", 6);
        fake.failing_catalog.insert(Chain::Ethereum);
        let (_, catalog) = catalog(fake);
        assert!(catalog.get_tokens(Chain::Ethereum).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_many_matches_case_insensitively() {
        let (fake, catalog) =
            catalog(FakeProvider::default().with_token(Chain::Ethereum, USDC, "USDC", 6));
        let res = catalog
            .resolve_many(Chain::Ethereum, &[USDC.to_uppercase().replace("0X", "0x")])
            .await;
        let usdc = res.get(&normalize_address(USDC)).unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);
        assert!(!res.has_failures());
        assert_eq!(FakeProvider::calls(&fake.custom_calls), 0);
    }

    #[tokio::test]
    async fn test_missing_tokens_use_custom_lookup_without_touching_catalog() {
        let (fake, catalog) = catalog(
            FakeProvider::default()
                .with_token(Chain::Ethereum, USDC, "USDC", 6)
                .with_custom_token(Chain::Ethereum, PEPE, "PEPE", 18),
        );
        let res = catalog.resolve_many(Chain::Ethereum, &[USDC, PEPE]).await;
        assert_eq!(res.resolved.len(), 2);
        assert_eq!(res.get(PEPE).unwrap().symbol, "PEPE");

        // bulk catalog entry is unchanged
        let bulk = catalog.get_tokens(Chain::Ethereum).await;
        assert!(!bulk.contains_key(PEPE));

        // second lookup is served from the custom cache
        catalog.resolve_many(Chain::Ethereum, &[PEPE]).await;
        assert_eq!(FakeProvider::calls(&fake.custom_calls), 1);
    }

    #[tokio::test]
    async fn test_unknown_token_is_neither_resolved_nor_failed() {
        let (_, catalog) = catalog(FakeProvider::default());
        let res = catalog.resolve_many(Chain::Ethereum, &[PEPE]).await;
        assert!(res.resolved.is_empty());
        assert!(res.failed.is_empty());
    }

    #[tokio::test]
    async fn test_custom_lookup_failure_is_reported() {
        let mut fake = FakeProvider::default().with_token(Chain::Ethereum, USDC, "USDC", 6);
        fake.failing_custom.insert(Chain::Ethereum);
        let (_, catalog) = catalog(fake);

        let res = catalog.resolve_many(Chain::Ethereum, &[USDC, PEPE]).await;
        assert_eq!(res.resolved.len(), 1);
        assert!(res.failed.contains(PEPE));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_reported() {
        let mut fake = FakeProvider::default()
            .with_token(Chain::Ethereum, USDC, "USDC", 6)
            .with_custom_token(Chain::Ethereum, PEPE, "PEPE", 18);
        fake.failing_catalog.insert(Chain::Ethereum);
        let (fake, catalog) = catalog(fake);

        let res = catalog
            .resolve_many(Chain::Ethereum, &[USDC, PEPE, NATIVE_TOKEN_ADDRESS])
            .await;
        assert_eq!(res.get(PEPE).unwrap().symbol, "PEPE");
        assert_eq!(res.resolved.len(), 1);
        assert!(res.failed.contains(&normalize_address(USDC)));
        assert!(res.failed.contains(NATIVE_TOKEN_ADDRESS));
        assert_eq!(res.failed.len(), 2);
        assert_eq!(FakeProvider::calls(&fake.custom_calls), 1);
    }

    #[tokio::test]
    async fn test_native_sentinel_skips_custom_lookup() {
        let (fake, catalog) = catalog(FakeProvider::default());
        let res = catalog
            .resolve_many(Chain::Ethereum, &[NATIVE_TOKEN_ADDRESS])
            .await;
        assert!(res.resolved.is_empty());
        assert_eq!(FakeProvider::calls(&fake.custom_calls), 0);
    }

    #[tokio::test]
    async fn test_resolve_single() {
        let (_, catalog) =
            catalog(FakeProvider::default().with_token(Chain::Base, USDC, "USDC", 6));
        assert!(catalog.resolve(Chain::Base, USDC).await.is_some());
        assert!(catalog.resolve(Chain::Ethereum, USDC).await.is_none());
    }
}
