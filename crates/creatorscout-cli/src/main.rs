mod harvest;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "creatorscout")]
#[command(about = "Harvest trending hashtags, videos and creators")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a full harvest for one country.
    Harvest {
        /// Two-letter country code, e.g. `ID`.
        #[arg(long)]
        country: String,
        /// Industry id to search; repeat for several.
        #[arg(long = "industry", required = true)]
        industries: Vec<String>,
        /// Write the harvested records here as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Refresh the country and industry reference sets.
    SyncFilters {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = creatorscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Harvest {
            country,
            industries,
            output,
        } => harvest::run_harvest(&config, &country, &industries, output.as_deref()).await,
        Commands::SyncFilters { output } => {
            harvest::run_sync_filters(&config, output.as_deref()).await
        }
    }
}
