//! Reserve Protocol Simulator
//!
//! Command-line driver for the reserve protocol: prints parameters, runs
//! day-by-day flywheel simulations and inspects state snapshots.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use reserve_protocol::cli::{self, OutputFormat, OutputFormatter, SimConfig};
use reserve_protocol::core::config::ProtocolParams;
use reserve_protocol::protocol::engine::Protocol;
use reserve_protocol::storage::schema;

/// Reserve protocol simulator
#[derive(Parser)]
#[command(name = "reserve-sim")]
#[command(version = reserve_protocol::VERSION)]
#[command(about = "Simulate the reserve comptroller and stabilizer flywheel", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (text, json, json-pretty)
    #[arg(short, long, env = "RESERVE_OUTPUT", default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default protocol parameters
    Params,

    /// Write a default simulation configuration
    Init {
        /// Destination file
        #[arg(short, long, default_value = "reserve-sim.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run a day-by-day simulation
    Simulate {
        /// Configuration file (defaults apply when absent)
        #[arg(short, long, env = "RESERVE_CONFIG")]
        config: Option<PathBuf>,

        /// Override the number of simulated days
        #[arg(short, long)]
        days: Option<u32>,

        /// Write the final state snapshot here
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Summarize a state snapshot
    Inspect {
        /// Snapshot file
        path: PathBuf,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = OutputFormatter::new(cli.format);

    if let Err(e) = run_command(&cli, &output) {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, output: &OutputFormatter) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Params => {
            output.data(&ProtocolParams::default());
            Ok(())
        }
        Commands::Init { output: path, force } => cmd_init(path, *force, output),
        Commands::Simulate { config, days, snapshot } => cmd_simulate(config.as_ref(), *days, snapshot.as_ref(), output),
        Commands::Inspect { path } => cmd_inspect(path, output),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_init(path: &PathBuf, force: bool, output: &OutputFormatter) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists. Use --force to overwrite.", path.display());
    }
    SimConfig::default().save(path)?;
    output.success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

fn cmd_simulate(
    config_path: Option<&PathBuf>,
    days: Option<u32>,
    snapshot: Option<&PathBuf>,
    output: &OutputFormatter,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    }
    .with_env()?;
    if let Some(days) = days {
        config.days = days;
    }
    config.validate()?;

    output.info(&format!(
        "Simulating {} days from price {}",
        style(config.days).yellow(),
        style(config.initial_price).yellow()
    ));
    let (protocol, reports) = cli::simulate(&config)?;
    output.section("Flywheel");
    output.reports(&reports);

    if let Some(path) = snapshot {
        schema::write_snapshot(path, &protocol.to_state())?;
        output.success(&format!("Snapshot written to {}", path.display()));
    }
    Ok(())
}

fn cmd_inspect(path: &PathBuf, output: &OutputFormatter) -> anyhow::Result<()> {
    let protocol = Protocol::from_state(schema::read_snapshot(path)?);

    let summary = serde_json::json!({
        "now": protocol.now(),
        "stable_supply": protocol.stable_supply().to_string(),
        "reserve_balance": protocol.reserve_balance()?.to_string(),
        "reserve_ratio": protocol.reserve_ratio()?.to_string(),
        "redeem_price": protocol.redeem_price()?.to_string(),
        "total_debt": protocol.total_debt().to_string(),
        "ema": protocol.ema().map(|e| e.to_string()),
        "events": protocol.events().len(),
        "event_digest": protocol.events().digest(),
    });
    output.section("Snapshot");
    output.data(&summary);
    Ok(())
}
