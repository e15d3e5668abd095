// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - budget-aware, fault-isolating client for metered AI APIs.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod budget;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;
use tollgate_metrics::PrometheusExporter;

/// Tollgate - budget-aware, fault-isolating client for metered AI APIs.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the command finishes.
    #[arg(long, global = true)]
    prometheus: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one query through the admission pipeline.
    Query(query::QueryArgs),
    /// Ask the budget authority for the current spend standing.
    Budget {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => tollgate_config::load_and_validate_path(path),
        None => tollgate_config::load_and_validate(),
    };
    let config = match config {
        Ok(config) => config,
        Err(errors) => {
            tollgate_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let exporter = if cli.prometheus {
        match PrometheusExporter::install() {
            Ok(exporter) => Some(exporter),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let result = match cli.command {
        Some(Commands::Query(args)) => query::run_query(&config, args).await,
        Some(Commands::Budget { json }) => budget::run_budget(&config, json).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("tollgate: use --help for available commands");
            Ok(())
        }
    };

    if let Some(exporter) = exporter {
        eprint!("{}", exporter.render());
    }

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Print the configuration with the API key masked.
fn print_config(config: &TollgateConfig) -> Result<(), TollgateError> {
    println!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &TollgateConfig) -> Result<String, TollgateError> {
    let mut shown = config.clone();
    if shown.api.api_key.is_some() {
        shown.api.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| TollgateError::Internal(format!("failed to render config: {e}")))
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
