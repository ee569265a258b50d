use anyhow::Result;
use meridian_common::Chain;
use meridian_core::workspace;
use meridian_types::AppConfig;
use meridian_utils::output::{render, OutputFormat, TableDisplay};
use serde::Serialize;

/// Effective config with the credential masked.
#[derive(Serialize)]
struct ConfigOutput {
    path: String,
    api_key: Option<String>,
    #[serde(flatten)]
    config: AppConfig,
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("****{visible}")
}

impl TableDisplay for ConfigOutput {
    fn print_table(&self) {
        let c = &self.config;
        let dash = "—";
        let chains = c
            .portfolio
            .default_chain_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║  MERIDIAN CONFIGURATION                                  ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║  File         : {:<41}║", self.path);
        println!("║  API Key      : {:<41}║", self.api_key.as_deref().unwrap_or(dash));
        println!("║  API URL      : {:<41}║", c.provider.base_url);
        println!("║  Currency     : {:<41}║", c.provider.currency);
        println!("║  Timeout      : {:<41}║", format!("{} ms", c.provider.request_timeout_ms));
        println!("╠══════════════════════════════════════════════════════════╣");
        println!(
            "║  Rate Limit   : {:<41}║",
            format!("{} req / {} ms", c.rate_limit.max_requests_per_window, c.rate_limit.window_ms)
        );
        println!("║  Token TTL    : {:<41}║", format!("{} ms", c.cache.token_cache_ttl_ms));
        println!("║  Price TTL    : {:<41}║", format!("{} ms", c.cache.price_cache_ttl_ms));
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║  Dust (wei)   : {:<41}║", c.portfolio.dust_threshold_wei);
        println!("║  Chains       : {:<41}║", chains);
        println!("║  Top Holdings : {:<41}║", c.portfolio.top_holdings);
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

/// `meridian config show`
pub fn show(fmt: OutputFormat) -> Result<()> {
    let mut config = workspace::load_config()?;
    let api_key = config.provider.api_key.take().map(|k| mask(&k));
    let output = ConfigOutput {
        path: workspace::config_path()?.display().to_string(),
        api_key,
        config,
    };
    render(fmt, &output)?;

    if fmt == OutputFormat::Table && output.api_key.is_none() {
        println!();
        println!("Tip: set MERIDIAN_API_KEY (or provider.api_key in the config file) before fetching portfolios.");
    }
    Ok(())
}

/// `meridian config init`
pub fn init() -> Result<()> {
    let path = workspace::init_workspace()?;
    println!("✓ Config ready at {}", path.display());
    Ok(())
}

/// `meridian config path`
pub fn path() -> Result<()> {
    println!("{}", workspace::config_path()?.display());
    Ok(())
}

/// `meridian config set <key> <value>`
pub fn set(key: &str, value: &str) -> Result<()> {
    let path = workspace::set_config_value(key, value)?;
    let shown = if key.ends_with("api_key") { mask(value) } else { value.to_string() };
    println!("✓ {key} = {shown} ({})", path.display());
    Ok(())
}

#[derive(Serialize)]
struct ChainRow {
    id: u64,
    name: &'static str,
    native: &'static str,
}

#[derive(Serialize)]
struct ChainsOutput {
    chains: Vec<ChainRow>,
}

impl TableDisplay for ChainsOutput {
    fn print_table(&self) {
        println!("┌──────────┬──────────────┬────────┐");
        println!("│ ID       │ Name         │ Native │");
        println!("├──────────┼──────────────┼────────┤");
        for c in &self.chains {
            println!("│ {:<8} │ {:<12} │ {:<6} │", c.id, c.name, c.native);
        }
        println!("└──────────┴──────────────┴────────┘");
    }
}

/// `meridian chains`
pub fn chains(fmt: OutputFormat) -> Result<()> {
    let output = ChainsOutput {
        chains: Chain::ALL
            .iter()
            .map(|&c| ChainRow {
                id: c.id(),
                name: c.name(),
                native: c.native_symbol(),
            })
            .collect(),
    };
    render(fmt, &output)
}
