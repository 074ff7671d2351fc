//! uapoll CLI Entry Point
//!
//! Validates input configurations and runs a poller that writes metrics to
//! stdout as JSON lines. Logs go to stderr (`RUST_LOG`, default `info`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use uapoll::core::metadata::{input_metadata, SAMPLE_CONFIG};
use uapoll::gateway::{create_poller, resolve_config, InputConfig};
use uapoll::store::JsonLinesSink;
use uapoll::PollerError;

/// Polled OPC UA input
#[derive(Parser, Debug)]
#[command(name = "uapoll", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a commented sample configuration
    SampleConfig,

    /// Describe every configuration parameter as JSON
    Describe,

    /// Validate a configuration and list the resolved nodes
    Check {
        /// Configuration file (TOML)
        config: PathBuf,
    },

    /// Poll at a fixed interval and write metrics as JSON lines
    Run {
        /// Configuration file (TOML)
        config: PathBuf,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 10_000)]
        interval_ms: u64,

        /// Stop after this many cycles
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::SampleConfig => {
            print!("{}", SAMPLE_CONFIG);
            Ok(())
        }
        Commands::Describe => describe(),
        Commands::Check { config } => check(&config),
        Commands::Run {
            config,
            interval_ms,
            count,
        } => run(&config, Duration::from_millis(interval_ms), count).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "uapoll failed");
            ExitCode::FAILURE
        }
    }
}

fn describe() -> Result<(), PollerError> {
    let json = serde_json::to_string_pretty(input_metadata())
        .map_err(|e| PollerError::Protocol(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn load(path: &Path) -> Result<InputConfig, PollerError> {
    let config = InputConfig::from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn check(path: &Path) -> Result<(), PollerError> {
    let config = load(path)?;
    let nodes = resolve_config(&config)?;

    println!("endpoint: {}", config.endpoint);
    println!("nodes:    {}", nodes.len());
    let mut invalid = 0;
    for node in &nodes {
        match node.address() {
            Ok(_) => println!("  {:<24} {:<16} {}", node.field_name(), node.metric_name, node.node_id),
            Err(e) => {
                invalid += 1;
                println!(
                    "  {:<24} {:<16} {}  <- {}",
                    node.field_name(),
                    node.metric_name,
                    node.node_id,
                    e
                );
            }
        }
    }

    if invalid > 0 {
        return Err(PollerError::Config(format!(
            "{} node(s) have invalid addresses",
            invalid
        )));
    }
    Ok(())
}

async fn run(path: &Path, interval: Duration, count: Option<u64>) -> Result<(), PollerError> {
    let config = load(path)?;
    let mut poller = create_poller(&config, JsonLinesSink::stdout())?;

    tracing::info!(
        device = %config.metric_name,
        endpoint = %config.endpoint,
        nodes = poller.nodes().len(),
        interval_ms = interval.as_millis() as u64,
        "Polling started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut cycles = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }

        if let Err(e) = poller.poll().await {
            if !e.is_recoverable() {
                let _ = poller.close().await;
                return Err(e);
            }
            tracing::warn!(device = %config.metric_name, error = %e, "Poll cycle failed");
        }

        cycles += 1;
        if count.is_some_and(|n| cycles >= n) {
            break;
        }
    }

    if let Err(e) = poller.close().await {
        tracing::debug!(error = %e, "Close failed");
    }

    let diag = poller.diagnostics();
    tracing::info!(
        read_success = diag.read_success,
        read_error = diag.read_error,
        "Polling stopped"
    );
    Ok(())
}
