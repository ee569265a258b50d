//! Shared constants for Meridian.

/// Sentinel address standing in for a chain's native asset (ETH, MATIC, ...).
pub const NATIVE_TOKEN_ADDRESS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Decimals assumed for the native asset when metadata is unavailable.
pub const NATIVE_DEFAULT_DECIMALS: u8 = 18;

/// Quote currency used for price lookups.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Chains queried when the caller does not name any.
pub const DEFAULT_CHAIN_IDS: &[u64] = &[1, 137, 10, 42161];

/// Balances at or below this many base units are dust.
pub const DEFAULT_DUST_THRESHOLD_WEI: u64 = 1_000_000;

/// Number of holdings exposed in `Portfolio::top_holdings`.
pub const DEFAULT_TOP_HOLDINGS: usize = 10;

/// Upstream endpoint keys: one rate-limit window per key.
pub const ENDPOINT_BALANCES: &str = "balances";
pub const ENDPOINT_TOKENS: &str = "tokens";
pub const ENDPOINT_TOKENS_CUSTOM: &str = "tokens_custom";
pub const ENDPOINT_PRICES: &str = "prices";
