use anyhow::Result;
use meridian_core::{load_config, PortfolioAggregator};
use meridian_utils::analytics::default_targets;
use meridian_utils::output::{render, OutputFormat, RebalanceOutput};
use meridian_utils::parse::{parse_address, parse_targets};
use tracing::debug;

/// `meridian rebalance <address> [--target SYM=PCT ...]`: trade preview only.
pub async fn run(
    address: &str,
    targets: &[String],
    chains: Option<Vec<u64>>,
    fmt: OutputFormat,
) -> Result<()> {
    let address = parse_address(address)?;
    let defaulted = targets.is_empty();
    let targets = if defaulted {
        default_targets()
    } else {
        parse_targets(targets)?
    };
    let config = load_config()?;
    let chain_ids = chains.unwrap_or_else(|| config.portfolio.default_chain_ids.clone());

    debug!(%address, ?targets, defaulted, "computing rebalance preview");

    let aggregator = PortfolioAggregator::from_config(&config)?;
    let portfolio = aggregator.get_portfolio(&address, &chain_ids).await;

    render(fmt, &RebalanceOutput::new(&portfolio, targets, defaulted))
}
