use anyhow::Result;
use meridian_core::{load_config, PortfolioAggregator};
use meridian_utils::output::{render, OutputFormat, PortfolioOutput};
use meridian_utils::parse::parse_address;
use tracing::debug;

/// `meridian portfolio <address>`: unified multi-chain snapshot.
pub async fn run(address: &str, chains: Option<Vec<u64>>, top: usize, fmt: OutputFormat) -> Result<()> {
    let address = parse_address(address)?;
    let config = load_config()?;
    let chain_ids = chains.unwrap_or_else(|| config.portfolio.default_chain_ids.clone());

    debug!(%address, ?chain_ids, "fetching portfolio");

    let aggregator = PortfolioAggregator::from_config(&config)?;
    let (portfolio, report) = aggregator.get_portfolio_with_report(&address, &chain_ids).await;

    if report.all_failed() && fmt == OutputFormat::Table {
        eprintln!("Warning: every chain failed to load; showing an empty portfolio.");
    }

    render(fmt, &PortfolioOutput::new(portfolio, report, top))
}
