#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand, ValueEnum};
use eyre::Context as _;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod adapters;
mod config;
mod decode;
mod engine;
mod errors;
mod financial_math;
mod model;
mod oracle;
mod positions;
mod provider;
mod registry;
mod service;
#[cfg(test)]
mod testutil;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliRateKind {
    Supply,
    Borrow,
}

impl From<CliRateKind> for model::RateKind {
    fn from(v: CliRateKind) -> Self {
        match v {
            CliRateKind::Supply => Self::Supply,
            CliRateKind::Borrow => Self::Borrow,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "lendlens", version)]
struct Cli {
    /// Config file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate lending rates across every supported market.
    Rates {
        /// Restrict to these chains (comma-separated).
        #[arg(long, value_delimiter = ',')]
        chains: Option<Vec<String>>,
        /// Restrict to these protocols (comma-separated).
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
    },

    /// Best market for one asset, plus runner-up alternatives.
    Best {
        asset: String,
        /// Optimize for supply yield or borrow cost.
        #[arg(long = "type", value_enum, default_value_t = CliRateKind::Supply)]
        kind: CliRateKind,
        /// Position size to echo back in the answer.
        #[arg(long)]
        amount: Option<f64>,
    },

    /// Side-by-side rate comparison for one asset.
    Compare {
        asset: String,
        #[arg(long, value_delimiter = ',')]
        chains: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
    },

    /// Available and total liquidity per market.
    Liquidity {
        #[arg(long, value_delimiter = ',')]
        chains: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
    },

    /// Utilization per market with the cross-market average.
    Utilization {
        #[arg(long, value_delimiter = ',')]
        chains: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
    },

    /// Market-wide totals and top protocols/assets.
    Overview,

    /// A wallet's supply and borrow positions across protocols.
    Positions {
        wallet: String,
        #[arg(long, value_delimiter = ',')]
        chains: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        protocols: Option<Vec<String>>,
    },

    /// A wallet's cross-protocol health factor and risk level.
    Health { wallet: String },

    /// The supported chain/protocol/asset matrix. Never touches the network.
    Supported,
}

fn init_logging() {
    // Stdout carries the response envelope; everything else goes to stderr.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(tracing_subscriber::EnvFilter::from_default_env());
    tracing_subscriber::registry().with(stderr_layer).init();
}

fn print_envelope<T: Serialize>(resp: &model::ApiResponse<T>) -> eyre::Result<()> {
    use std::io::Write as _;
    let s = serde_json::to_string(resp).context("serialize response")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write response")?;
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    init_logging();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::LendlensConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => config::LendlensConfig::default(),
    };

    let provider = std::sync::Arc::new(provider::RpcChainData::new(&cfg.rpc));
    let oracle = std::sync::Arc::new(oracle::ConfiguredOracle::from_config(&cfg));
    let svc = service::LendingService::new(provider, oracle, registry::Registry::new());

    match cli.cmd {
        Command::Rates { chains, protocols } => {
            print_envelope(&svc.rates(chains.as_deref(), protocols.as_deref()).await)
        }
        Command::Best {
            asset,
            kind,
            amount,
        } => print_envelope(&svc.best_rates(&asset, kind.into(), amount).await),
        Command::Compare {
            asset,
            chains,
            protocols,
        } => print_envelope(
            &svc.compare_rates(&asset, chains.as_deref(), protocols.as_deref())
                .await,
        ),
        Command::Liquidity { chains, protocols } => {
            print_envelope(&svc.liquidity(chains.as_deref(), protocols.as_deref()).await)
        }
        Command::Utilization { chains, protocols } => {
            print_envelope(&svc.utilization(chains.as_deref(), protocols.as_deref()).await)
        }
        Command::Overview => print_envelope(&svc.overview().await),
        Command::Positions {
            wallet,
            chains,
            protocols,
        } => print_envelope(
            &svc.user_positions(&wallet, chains.as_deref(), protocols.as_deref())
                .await,
        ),
        Command::Health { wallet } => print_envelope(&svc.user_health(&wallet).await),
        Command::Supported => print_envelope(&svc.supported()),
    }
}
