mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use meridian_common::PortfolioError;
use meridian_utils::output::OutputFormat;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "meridian",
    about = "Meridian — multi-chain wallet portfolio aggregator.\nBalances, metadata and prices across EVM chains, merged into one view.",
    version,
    propagate_version = true
)]
struct Cli {
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: CliOutputFormat,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Table,
    Json,
    JsonPretty,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> OutputFormat {
        match f {
            CliOutputFormat::Table => OutputFormat::Table,
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::JsonPretty => OutputFormat::JsonPretty,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a wallet's holdings across chains.
    Portfolio {
        /// Wallet address.
        address: String,
        /// Comma-separated chain IDs (default: config `default_chain_ids`).
        #[arg(long, short = 'c', value_delimiter = ',')]
        chains: Option<Vec<u64>>,
        /// Slices in the allocation chart before the "Other" bucket.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Preview trades that move a wallet towards target weights.
    Rebalance {
        address: String,
        /// Target weight, e.g. `--target ETH=50 --target USDC=50`.
        /// Without targets a default ETH/stablecoin/WBTC mix is used.
        #[arg(long = "target", short = 't')]
        targets: Vec<String>,
        #[arg(long, short = 'c', value_delimiter = ',')]
        chains: Option<Vec<u64>>,
    },

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List supported chains.
    Chains,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (file + environment).
    Show,
    /// Write a default config file if none exists.
    Init,
    /// Print the config file path.
    Path,
    /// Change one setting in the config file, e.g. `set top_holdings 5`.
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let fmt: OutputFormat = cli.output.into();
    if let Err(e) = run(cli.command, fmt).await {
        std::process::exit(report_error(&e, fmt));
    }
}

async fn run(command: Commands, fmt: OutputFormat) -> Result<()> {
    match command {
        Commands::Portfolio {
            address,
            chains,
            top,
        } => commands::portfolio::run(&address, chains, top, fmt).await,
        Commands::Rebalance {
            address,
            targets,
            chains,
        } => commands::rebalance::run(&address, &targets, chains, fmt).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::configure::show(fmt),
            ConfigAction::Init => commands::configure::init(),
            ConfigAction::Path => commands::configure::path(),
            ConfigAction::Set { key, value } => commands::configure::set(&key, &value),
        },
        Commands::Chains => commands::configure::chains(fmt),
    }
}

/// Print the error in the requested format and pick an exit code.
fn report_error(e: &anyhow::Error, fmt: OutputFormat) -> i32 {
    let portfolio_err = e.downcast_ref::<PortfolioError>();
    match fmt {
        OutputFormat::Table => eprintln!("Error: {e:#}"),
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let json = match portfolio_err {
                Some(pe) => pe.to_json(),
                None => serde_json::json!({ "error": { "code": "INTERNAL", "message": format!("{e:#}") } }),
            };
            println!("{json}");
        }
    }
    portfolio_err.map_or(1, PortfolioError::exit_code)
}
