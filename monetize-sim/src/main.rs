//! Web Monetization Simulator
//!
//! Plays a payment stream against a simulated host and reports what each
//! destination received.

mod config;
mod runner;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use config::{ConfigLoader, Overrides};
use runner::Simulation;
use shutdown::shutdown_signal;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Monetize Sim - Drive a destination scheduler against a simulated payment stream
#[derive(Parser, Debug)]
#[command(name = "monetize-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./monetize-sim.toml")]
    config: PathBuf,

    /// Override the selection seed
    #[arg(long, env = "MONETIZE_SIM_SEED")]
    seed: Option<u64>,

    /// Override the run duration in seconds
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Replay lifecycle events from a JSON-lines file instead of simulating a stream
    #[arg(long)]
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting monetize-sim v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(
        &args.config,
        Overrides {
            seed: args.seed,
            duration_secs: args.duration_secs,
        },
    );
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let mut simulation = Simulation::new(loaded_config);
    if let Some(script_path) = &args.script {
        let script = std::fs::read_to_string(script_path)
            .with_context(|| format!("failed to read script {script_path:?}"))?;
        simulation = simulation.with_script(&script)?;
    }

    let report = simulation.run(shutdown_signal()).await?;

    tracing::info!(
        destinations = report.destinations.len(),
        total = report.total_amount(),
        "Simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,monetize_core=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
