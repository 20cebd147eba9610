mod config;
mod error;

use clap::Parser;

use config::{Effective, SyncArgs};
use error::SiphonError;
use siphon_engine::Outcome;

#[derive(Parser)]
#[command(name = "siphon", about = "Point-to-point key-value migration tool")]
struct Cli {
    #[command(flatten)]
    args: SyncArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let eff = match Effective::new(&cli.args) {
        Ok(eff) => eff,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let default_filter = if eff.silent { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match run(eff).await {
        Ok(Outcome::Completed { records }) => {
            tracing::info!(records, "all tasks finished");
            println!("sync done");
        }
        Ok(Outcome::Cancelled) => {
            println!("sync cancelled");
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(eff: Effective) -> Result<Outcome, SiphonError> {
    Ok(siphon_engine::run(eff.config).await?)
}
