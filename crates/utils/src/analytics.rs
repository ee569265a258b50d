//! Portfolio analytics: pure functions over a completed [`Portfolio`].
//!
//! Nothing here performs I/O. The risk table is a product policy and is
//! applied literally, including its Medium/High boundary behaviour.

use std::collections::HashMap;

use meridian_types::portfolio::{percent_of, Portfolio, RiskLevel, TokenHolding};
use serde::Serialize;

// ═══════════════════════════════════════════════════════════════════════
//  DIVERSIFICATION
// ═══════════════════════════════════════════════════════════════════════

/// Herfindahl–Hirschman index over allocation percentages.
///
/// ```text
///   HHI = Σ (pᵢ / 100)²
/// ```
pub fn hhi(allocation_pcts: &[f64]) -> f64 {
    allocation_pcts.iter().map(|p| (p / 100.0).powi(2)).sum()
}

/// `round((1 - HHI) * 100)` over raw percentages, clamped to `0..=100`.
///
/// Percentages are shares of the whole portfolio, so when only the top-N
/// holdings are scored the unscored remainder counts as further spread.
pub fn diversification_score_from_pcts(allocation_pcts: &[f64]) -> u32 {
    if allocation_pcts.is_empty() {
        return 0;
    }
    let score = ((1.0 - hhi(allocation_pcts)) * 100.0).round();
    score.clamp(0.0, 100.0) as u32
}

/// Diversification score of a holding set, using each holding's `allocation_pct`.
///
/// A set worth nothing scores 0, like an empty one.
pub fn diversification_score(holdings: &[TokenHolding]) -> u32 {
    let value: f64 = holdings.iter().map(|h| h.usd_value).sum();
    if value <= 0.0 {
        return 0;
    }
    let pcts: Vec<f64> = holdings.iter().map(|h| h.allocation_pct).collect();
    diversification_score_from_pcts(&pcts)
}

// ═══════════════════════════════════════════════════════════════════════
//  RISK
// ═══════════════════════════════════════════════════════════════════════

/// Rule table:
///
/// | condition                                   | level  |
/// |---------------------------------------------|--------|
/// | score ≥ 70 **and** largest < 40             | Low    |
/// | score ≥ 50 **or** largest < 60              | Medium |
/// | otherwise                                   | High   |
pub fn risk_level(diversification_score: u32, largest_allocation_pct: f64) -> RiskLevel {
    if diversification_score >= 70 && largest_allocation_pct < 40.0 {
        RiskLevel::Low
    } else if diversification_score >= 50 || largest_allocation_pct < 60.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

/// Largest single allocation in a holding set, 0 when empty.
pub fn largest_allocation_pct(holdings: &[TokenHolding]) -> f64 {
    holdings
        .iter()
        .map(|h| h.allocation_pct)
        .fold(0.0, f64::max)
}

/// Score the portfolio's top holdings and attach score + risk level.
pub fn apply(portfolio: &mut Portfolio) {
    let score = diversification_score(portfolio.top_holdings());
    let largest = largest_allocation_pct(portfolio.top_holdings());
    portfolio.diversification_score = score;
    portfolio.risk_level = risk_level(score, largest);
}

// ═══════════════════════════════════════════════════════════════════════
//  RISK BREAKDOWN
// ═══════════════════════════════════════════════════════════════════════

pub const STABLECOIN_SYMBOLS: [&str; 6] = ["USDT", "USDC", "DAI", "BUSD", "TUSD", "FRAX"];
pub const MAJOR_SYMBOLS: [&str; 8] = ["ETH", "WETH", "WBTC", "BTC", "BNB", "MATIC", "AVAX", "SOL"];

/// Composition figures behind a [`RiskBreakdown`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub stablecoin_pct: f64,
    pub major_token_pct: f64,
    /// Share of the portfolio held in its five largest positions.
    pub top5_concentration_pct: f64,
    pub position_count: usize,
}

/// Points-based risk assessment with human-readable factors.
///
/// Separate from [`Portfolio::risk_level`], which follows the HHI rule table.
/// `level` is `None` for a portfolio with no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBreakdown {
    pub score: u32,
    pub level: Option<RiskLevel>,
    pub factors: Vec<String>,
    pub metrics: RiskMetrics,
}

/// Score stablecoin share, major-token share, top-5 concentration and
/// position count.
///
/// | points | level  |
/// |--------|--------|
/// | ≥ 70   | High   |
/// | ≥ 40   | Medium |
/// | < 40   | Low    |
pub fn risk_breakdown(portfolio: &Portfolio) -> RiskBreakdown {
    let total = portfolio.total_usd_value();
    if total <= 0.0 {
        return RiskBreakdown::default();
    }

    let mut stable = 0.0;
    let mut major = 0.0;
    let mut values: Vec<f64> = Vec::new();
    for h in portfolio.all_holdings() {
        let symbol = h.symbol.to_uppercase();
        if STABLECOIN_SYMBOLS.contains(&symbol.as_str()) {
            stable += h.usd_value;
        } else if MAJOR_SYMBOLS.contains(&symbol.as_str()) {
            major += h.usd_value;
        }
        values.push(h.usd_value);
    }
    values.sort_by(|a, b| b.total_cmp(a));

    let metrics = RiskMetrics {
        stablecoin_pct: percent_of(stable, total),
        major_token_pct: percent_of(major, total),
        top5_concentration_pct: percent_of(values.iter().take(5).sum(), total),
        position_count: values.len(),
    };

    let mut points = 0u32;
    let mut factors = Vec::new();

    points += match metrics.stablecoin_pct {
        p if p < 10.0 => {
            factors.push("Low stablecoin allocation (<10%)".to_string());
            30
        }
        p if p < 20.0 => {
            factors.push("Moderate stablecoin allocation (10-20%)".to_string());
            20
        }
        _ => 10,
    };

    points += match metrics.major_token_pct {
        p if p < 30.0 => {
            factors.push("Low allocation to major tokens".to_string());
            25
        }
        p if p < 50.0 => 15,
        _ => 5,
    };

    points += match metrics.top5_concentration_pct {
        p if p > 90.0 => {
            factors.push("High concentration in top 5 tokens (>90%)".to_string());
            30
        }
        p if p > 80.0 => {
            factors.push("Moderate concentration in top 5 tokens (80-90%)".to_string());
            20
        }
        _ => 10,
    };

    points += match metrics.position_count {
        n if n < 5 => {
            factors.push("Low number of positions (<5)".to_string());
            15
        }
        n if n < 10 => 10,
        _ => 0,
    };

    let level = if points >= 70 {
        RiskLevel::High
    } else if points >= 40 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    RiskBreakdown {
        score: points.min(100),
        level: Some(level),
        factors,
        metrics,
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ALLOCATION BREAKDOWN
// ═══════════════════════════════════════════════════════════════════════

/// One slice of an allocation chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSlice {
    pub label: String,
    pub chain_id: Option<u64>,
    pub usd_value: f64,
    pub allocation_pct: f64,
}

/// Label used for the synthetic remainder slice.
pub const OTHER_LABEL: &str = "Other";

/// Top `n` holdings across all chains plus an "Other" slice for the remainder.
///
/// The "Other" slice is omitted when there is no remainder.
pub fn allocation_breakdown(portfolio: &Portfolio, n: usize) -> Vec<AllocationSlice> {
    let total = portfolio.total_usd_value();
    let mut holdings: Vec<&TokenHolding> = portfolio.all_holdings().collect();
    holdings.sort_by(|a, b| b.usd_value.total_cmp(&a.usd_value));

    let mut slices: Vec<AllocationSlice> = holdings
        .iter()
        .take(n)
        .map(|h| AllocationSlice {
            label: h.symbol.clone(),
            chain_id: Some(h.chain_id.id()),
            usd_value: h.usd_value,
            allocation_pct: percent_of(h.usd_value, total),
        })
        .collect();

    if holdings.len() > n {
        let rest: f64 = holdings.iter().skip(n).map(|h| h.usd_value).sum();
        slices.push(AllocationSlice {
            label: OTHER_LABEL.to_string(),
            chain_id: None,
            usd_value: rest,
            allocation_pct: percent_of(rest, total),
        });
    }
    slices
}

/// USD value per chain, as `(chain_id, value, pct)`, in the portfolio's order.
pub fn chain_allocation(portfolio: &Portfolio) -> Vec<(u64, f64, f64)> {
    let total = portfolio.total_usd_value();
    portfolio
        .chains()
        .iter()
        .map(|c| {
            (
                c.chain_id().id(),
                c.total_usd_value(),
                percent_of(c.total_usd_value(), total),
            )
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
//  REBALANCING
// ═══════════════════════════════════════════════════════════════════════

/// Deviations at or below this many percentage points are ignored.
pub const REBALANCE_TOLERANCE_PCT: f64 = 2.0;
/// Deviations above this many percentage points are high priority.
pub const REBALANCE_HIGH_PRIORITY_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebalancePriority {
    High,
    Medium,
}

/// A previewed trade bringing one symbol towards its target weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSuggestion {
    pub symbol: String,
    pub action: RebalanceAction,
    pub current_pct: f64,
    pub target_pct: f64,
    /// `target - current`, in percentage points.
    pub difference_pct: f64,
    /// Absolute USD amount to buy or sell.
    pub difference_usd: f64,
    pub priority: RebalancePriority,
}

/// Target key standing for every symbol not named in the targets.
pub const OTHER_TARGET: &str = "OTHER";

/// Targets used when the caller gives none.
///
/// Wrapped and native ETH are targeted separately, so the weights add up to
/// more than 100.
pub fn default_targets() -> HashMap<String, f64> {
    [
        ("ETH", 30.0),
        ("WETH", 30.0),
        ("USDC", 20.0),
        ("USDT", 20.0),
        ("WBTC", 10.0),
        (OTHER_TARGET, 10.0),
    ]
    .into_iter()
    .map(|(s, pct)| (s.to_string(), pct))
    .collect()
}

/// Current USD value per upper-cased symbol, summed across chains.
pub fn value_by_symbol(portfolio: &Portfolio) -> HashMap<String, f64> {
    let mut out: HashMap<String, f64> = HashMap::new();
    for h in portfolio.all_holdings() {
        *out.entry(h.symbol.to_uppercase()).or_default() += h.usd_value;
    }
    out
}

/// Compare current weights with `targets` (symbol → percent).
///
/// An [`OTHER_TARGET`] entry is compared against everything not named.
///
/// Sorted high priority first, then by absolute deviation, largest first.
pub fn rebalancing_suggestions(
    portfolio: &Portfolio,
    targets: &HashMap<String, f64>,
) -> Vec<RebalanceSuggestion> {
    let total = portfolio.total_usd_value();
    if total <= 0.0 {
        return Vec::new();
    }
    let current = value_by_symbol(portfolio);
    let named: Vec<String> = targets.keys().map(|s| s.to_uppercase()).collect();
    let other_value: f64 = current
        .iter()
        .filter(|(symbol, _)| !named.contains(symbol))
        .map(|(_, v)| v)
        .sum();

    let mut suggestions: Vec<RebalanceSuggestion> = targets
        .iter()
        .filter_map(|(symbol, &target_pct)| {
            let symbol = symbol.to_uppercase();
            let current_value = if symbol == OTHER_TARGET {
                other_value
            } else {
                current.get(&symbol).copied().unwrap_or(0.0)
            };
            let current_pct = percent_of(current_value, total);
            let diff = target_pct - current_pct;
            if diff.abs() <= REBALANCE_TOLERANCE_PCT {
                return None;
            }
            Some(RebalanceSuggestion {
                symbol,
                action: if diff > 0.0 {
                    RebalanceAction::Buy
                } else {
                    RebalanceAction::Sell
                },
                current_pct,
                target_pct,
                difference_pct: diff,
                difference_usd: (diff / 100.0 * total).abs(),
                priority: if diff.abs() > REBALANCE_HIGH_PRIORITY_PCT {
                    RebalancePriority::High
                } else {
                    RebalancePriority::Medium
                },
            })
        })
        .collect();

    suggestions.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.difference_pct.abs().total_cmp(&a.difference_pct.abs()))
    });
    suggestions
}
