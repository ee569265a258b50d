use std::collections::HashMap;

use anyhow::{bail, Result};

/// Parse a numeric percentage, stripping an optional trailing '%'.
pub fn parse_pct(s: &str) -> Result<f64> {
    let cleaned = s.trim().trim_end_matches('%').trim();
    let pct: f64 = cleaned
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid percentage: '{s}'"))?;
    if !(0.0..=100.0).contains(&pct) {
        bail!("Percentage out of range (0-100): '{s}'");
    }
    Ok(pct)
}

/// Parse target weights into `SYMBOL → percent`.
///
/// Each entry is `SYM=PCT` or `SYM:PCT`; entries may also be comma-separated
/// inside one string, e.g. `"ETH:50,USDC:50"`. Symbols are upper-cased.
/// Weights must not sum to more than 100.
pub fn parse_targets<S: AsRef<str>>(entries: &[S]) -> Result<HashMap<String, f64>> {
    let mut targets = HashMap::new();
    for part in entries
        .iter()
        .flat_map(|e| e.as_ref().split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let Some((symbol, pct)) = part.split_once(['=', ':']) else {
            bail!("Invalid target '{part}'. Use SYMBOL=PERCENT, e.g. ETH=50");
        };
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            bail!("Missing symbol in target '{part}'");
        }
        if targets.insert(symbol.clone(), parse_pct(pct)?).is_some() {
            bail!("Duplicate target for {symbol}");
        }
    }
    if targets.is_empty() {
        bail!("At least one target is required");
    }
    let sum: f64 = targets.values().sum();
    if sum > 100.0 + 1e-6 {
        bail!("Target weights sum to {sum:.2}%, must not exceed 100%");
    }
    Ok(targets)
}

/// Validate an EVM address (`0x` + 40 hex digits) and return it lower-cased.
pub fn parse_address(s: &str) -> Result<String> {
    let trimmed = s.trim();
    let valid = trimmed.len() == 42
        && (trimmed.starts_with("0x") || trimmed.starts_with("0X"))
        && trimmed[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        bail!("Invalid address '{s}'. Expected 0x followed by 40 hex digits");
    }
    Ok(trimmed.to_ascii_lowercase())
}
