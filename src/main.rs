//! cryosweep binary: runs the configured sweep or probes instrument
//! capabilities.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cryosweep::config::Settings;
use cryosweep::instrument::{capabilities::CapabilityTable, cryo, daq, Cryo, Daq, InstrumentClient};
use cryosweep::sweep::{self, CsvSink, SweepControl};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cryosweep", about = "Cryostat + lock-in sweep runner")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the configured sweep, writing one CSV file per curve.
    Run,
    /// Fetch and print the capability table of each configured instrument.
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref()).context("loading configuration")?;

    // Process-wide logging is initialized exactly once, here.
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&settings.logging.level),
    )
    .init();

    match cli.command {
        Command::Run => run_sweep(&settings).await,
        Command::Probe => probe(&settings).await,
    }
}

async fn connect(name: &str, endpoint: &cryosweep::config::Endpoint) -> Result<InstrumentClient> {
    InstrumentClient::connect_tcp(name, &endpoint.host, endpoint.port)
        .await
        .with_context(|| format!("connecting to '{name}' at {}:{}", endpoint.host, endpoint.port))
}

async fn run_sweep(settings: &Settings) -> Result<()> {
    let mut cryo_client = connect("cryo", &settings.instruments.cryo).await?;
    let mut lockin_client = connect("lockin", &settings.instruments.lockin).await?;

    // Validate the advertised capability tables before touching anything.
    CapabilityTable::fetch(&mut cryo_client)
        .await?
        .ensure_supports(cryo::REQUIRED_METHODS)?;
    CapabilityTable::fetch(&mut lockin_client)
        .await?
        .ensure_supports(daq::REQUIRED_METHODS)?;

    let mut cryo = Cryo::with_poller(cryo_client, settings.poller());
    let mut daq = Daq::new(lockin_client);

    let plan = settings.sweep_plan();
    let mut sink = CsvSink::new(&settings.sweep.output_dir)?;

    let control = Arc::new(SweepControl::new());
    {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Stop requested; finishing the current step");
                control.stop();
            }
        });
    }

    let started = std::time::Instant::now();
    let outcome = sweep::run(&mut cryo, &mut daq, &plan, &control, &mut sink).await?;
    info!(
        "Sweep {} after {:.1?}: {} curves",
        if outcome.stopped_early {
            "stopped"
        } else {
            "finished"
        },
        started.elapsed(),
        outcome.curves_recorded
    );
    Ok(())
}

async fn probe(settings: &Settings) -> Result<()> {
    let endpoints = [
        ("cryo", &settings.instruments.cryo),
        ("lockin", &settings.instruments.lockin),
    ];
    for (name, endpoint) in endpoints {
        let mut client = connect(name, endpoint).await?;
        let table = CapabilityTable::fetch(&mut client).await?;
        println!("{name}:");
        for method in table.methods() {
            match client.help_for(method).await {
                Ok(description) => println!("  {method}: {description}"),
                Err(err) => println!("  {method} (no description: {err})"),
            }
        }
    }
    Ok(())
}
