//! Unified output rendering: JSON or human-readable table.
//!
//! Usage:
//! ```ignore
//! use meridian_utils::output::{OutputFormat, render};
//!
//! let data = PortfolioOutput::new(portfolio, report, 5);
//! render(format, &data)?;
//! ```

use std::collections::HashMap;

use anyhow::Result;
use meridian_types::{FetchReport, Portfolio};
use serde::Serialize;

use crate::analytics::{
    allocation_breakdown, rebalancing_suggestions, risk_breakdown, AllocationSlice, RebalanceAction,
    RebalancePriority, RebalanceSuggestion, RiskBreakdown,
};
use crate::format::{format_balance, format_pct, format_timestamp, format_usd, short_address};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default).
    Table,
    /// Compact JSON (for piping to jq, scripts).
    Json,
    /// Pretty-printed JSON (for reading).
    JsonPretty,
}

/// Trait for types that can render as a human-readable table.
pub trait TableDisplay {
    fn print_table(&self);
}

/// Render structured output: JSON or table depending on format.
pub fn render<T: Serialize + TableDisplay>(format: OutputFormat, data: &T) -> Result<()> {
    match format {
        OutputFormat::Table => {
            data.print_table();
            Ok(())
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(data)?);
            Ok(())
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
            Ok(())
        }
    }
}

// ─── Output types ───────────────────────────────────────────────────

/// A portfolio snapshot with its allocation chart, risk breakdown and fetch report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioOutput {
    pub portfolio: Portfolio,
    pub allocation: Vec<AllocationSlice>,
    pub risk: RiskBreakdown,
    pub report: FetchReport,
}

impl PortfolioOutput {
    pub fn new(portfolio: Portfolio, report: FetchReport, chart_slices: usize) -> Self {
        let allocation = allocation_breakdown(&portfolio, chart_slices);
        let risk = risk_breakdown(&portfolio);
        Self {
            portfolio,
            allocation,
            risk,
            report,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceOutput {
    pub address: String,
    pub total_usd_value: f64,
    pub targets: HashMap<String, f64>,
    pub default_targets: bool,
    pub suggestions: Vec<RebalanceSuggestion>,
}

impl RebalanceOutput {
    /// `default_targets` records whether the caller left the targets out.
    pub fn new(portfolio: &Portfolio, targets: HashMap<String, f64>, default_targets: bool) -> Self {
        Self {
            address: portfolio.address().to_string(),
            total_usd_value: portfolio.total_usd_value(),
            suggestions: rebalancing_suggestions(portfolio, &targets),
            targets,
            default_targets,
        }
    }
}

// ─── TableDisplay implementations ───────────────────────────────────

impl TableDisplay for PortfolioOutput {
    fn print_table(&self) {
        let p = &self.portfolio;
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║  PORTFOLIO                                               ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║  Address     : {:<42}║", short_address(p.address()));
        println!("║  Total Value : {:<42}║", format_usd(p.total_usd_value()));
        println!("║  Diversity   : {:<42}║", format!("{}/100", p.diversification_score));
        println!("║  Risk        : {:<42}║", p.risk_level);
        println!("║  Updated     : {:<42}║", format_timestamp(&p.last_updated));
        println!("╚══════════════════════════════════════════════════════════╝");

        if p.chains().is_empty() {
            println!("No priced holdings found.");
        }

        for chain in p.chains() {
            println!();
            println!(
                "{} — {}",
                chain.chain_id(),
                format_usd(chain.total_usd_value())
            );
            println!("┌──────────┬──────────────────┬──────────────┬──────────────┬──────────┐");
            println!("│ Token    │ Balance          │ Price        │ Value        │ Alloc    │");
            println!("├──────────┼──────────────────┼──────────────┼──────────────┼──────────┤");
            for h in chain.holdings() {
                println!(
                    "│ {:<8} │ {:>16} │ {:>12} │ {:>12} │ {:>8} │",
                    h.symbol,
                    format_balance(h.human_balance),
                    format_usd(h.usd_price),
                    format_usd(h.usd_value),
                    format_pct(h.allocation_pct),
                );
            }
            println!("└──────────┴──────────────────┴──────────────┴──────────────┴──────────┘");
        }

        if let Some(level) = self.risk.level {
            let m = &self.risk.metrics;
            println!();
            println!("Risk: {level} ({}/100)", self.risk.score);
            println!(
                "  Stablecoins {}  Majors {}  Top 5 {}  Positions {}",
                format_pct(m.stablecoin_pct),
                format_pct(m.major_token_pct),
                format_pct(m.top5_concentration_pct),
                m.position_count
            );
            for factor in &self.risk.factors {
                println!("  • {factor}");
            }
        }

        if !self.allocation.is_empty() {
            println!();
            println!("Allocation:");
            for slice in &self.allocation {
                println!(
                    "  {:<8} {:>10}  {}",
                    slice.label,
                    format_pct(slice.allocation_pct),
                    format_usd(slice.usd_value)
                );
            }
        }

        let r = &self.report;
        if !r.chains_failed.is_empty() || !r.unsupported_chain_ids.is_empty() {
            println!();
            if !r.chains_failed.is_empty() {
                println!("⚠ Chains unavailable: {:?}", r.chains_failed);
            }
            if !r.unsupported_chain_ids.is_empty() {
                println!("⚠ Unsupported chain IDs: {:?}", r.unsupported_chain_ids);
            }
        }
    }
}

impl TableDisplay for RebalanceOutput {
    fn print_table(&self) {
        if self.default_targets {
            println!("No targets given, using the default allocation.");
        }
        if self.suggestions.is_empty() {
            println!("Portfolio is within tolerance of all targets.");
            return;
        }

        println!("Rebalance preview for {} ({})", short_address(&self.address), format_usd(self.total_usd_value));
        println!("┌──────────┬──────┬──────────┬──────────┬──────────────┬──────────┐");
        println!("│ Token    │ Side │ Current  │ Target   │ Amount       │ Priority │");
        println!("├──────────┼──────┼──────────┼──────────┼──────────────┼──────────┤");
        for s in &self.suggestions {
            let side = match s.action {
                RebalanceAction::Buy => "BUY",
                RebalanceAction::Sell => "SELL",
            };
            let priority = match s.priority {
                RebalancePriority::High => "high",
                RebalancePriority::Medium => "medium",
            };
            println!(
                "│ {:<8} │ {:<4} │ {:>8} │ {:>8} │ {:>12} │ {:<8} │",
                s.symbol,
                side,
                format_pct(s.current_pct),
                format_pct(s.target_pct),
                format_usd(s.difference_usd),
                priority,
            );
        }
        println!("└──────────┴──────┴──────────┴──────────┴──────────────┴──────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_output() -> PortfolioOutput {
        PortfolioOutput::new(Portfolio::empty("0xwallet"), FetchReport::default(), 5)
    }

    #[test]
    fn test_render_json() {
        render(OutputFormat::Json, &empty_output()).unwrap();
    }

    #[test]
    fn test_render_json_pretty() {
        render(OutputFormat::JsonPretty, &empty_output()).unwrap();
    }

    #[test]
    fn test_render_table() {
        render(OutputFormat::Table, &empty_output()).unwrap();
        let rebalance = RebalanceOutput::new(&Portfolio::empty("0xwallet"), HashMap::new(), false);
        render(OutputFormat::Table, &rebalance).unwrap();
    }

    #[test]
    fn test_portfolio_output_shape() {
        let v = serde_json::to_value(empty_output()).unwrap();
        assert!(v["portfolio"].is_object());
        assert!(v["allocation"].as_array().unwrap().is_empty());
        assert!(v["report"].is_object());
        assert_eq!(v["risk"]["score"], 0);
        assert!(v["risk"]["level"].is_null());
    }

    #[test]
    fn test_rebalance_output_keeps_targets() {
        let targets = crate::analytics::default_targets();
        let out = RebalanceOutput::new(&Portfolio::empty("0xwallet"), targets, true);
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["defaultTargets"], true);
        assert_eq!(v["targets"]["WBTC"], 10.0);
        assert!(v["suggestions"].as_array().unwrap().is_empty());
    }
}
