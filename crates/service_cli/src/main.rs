//! Tranche CLI - command line access to the tranche loss engine.
//!
//! # Commands
//!
//! - `tranche price --portfolio <file>` - Price the tranches of a portfolio
//! - `tranche distribution --portfolio <file>` - Print a loss distribution
//! - `tranche calibrate --portfolio <file>` - Fit correlations or Hull-White
//!   parameters to quoted tranche losses
//! - `tranche check --portfolio <file>` - Validate a portfolio
//!
//! # Architecture
//!
//! As the **S**ervice layer, this crate only parses inputs, builds baskets
//! from `tranche_pricing` and formats their answers.
//!
//! Logging goes through `tracing`; set `RUST_LOG=debug` for engine detail.

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

/// Tranche loss distribution engine CLI
#[derive(Parser)]
#[command(name = "tranche")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Numerical options file, replacing the portfolio's [options] table
    #[arg(short, long, global = true)]
    options: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price the tranches of a portfolio
    Price {
        /// Path to portfolio file (TOML)
        #[arg(short, long)]
        portfolio: String,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Print the pool loss distribution at one date
    Distribution {
        /// Path to portfolio file (TOML)
        #[arg(short, long)]
        portfolio: String,

        /// Distribution date (YYYY-MM-DD), defaults to maturity
        #[arg(short, long)]
        date: Option<String>,

        /// Level spacing as a fraction of the pool
        #[arg(short, long, default_value = "0.01")]
        step: f64,

        /// Report P(L ≤ level) instead of E[min(L, level)]
        #[arg(long)]
        probability: bool,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Calibrate to the portfolio's quoted tranche losses
    Calibrate {
        /// Path to portfolio file (TOML)
        #[arg(short, long)]
        portfolio: String,

        /// Model to calibrate (bootstrap, hull-white)
        #[arg(short, long, default_value = "bootstrap")]
        model: String,

        /// Output file for calibrated parameters
        #[arg(long)]
        output: Option<String>,
    },

    /// Validate a portfolio and its options
    Check {
        /// Path to portfolio file (TOML)
        #[arg(short, long)]
        portfolio: String,
    },
}

fn main() -> Result<()> {
    // Initialise tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }
    let options = cli.options.as_deref();

    match cli.command {
        Commands::Price { portfolio, format } => commands::price::run(&portfolio, options, &format),
        Commands::Distribution {
            portfolio,
            date,
            step,
            probability,
            format,
        } => commands::distribution::run(
            &portfolio,
            options,
            date.as_deref(),
            step,
            probability,
            &format,
        ),
        Commands::Calibrate {
            portfolio,
            model,
            output,
        } => commands::calibrate::run(&portfolio, options, &model, output.as_deref()),
        Commands::Check { portfolio } => commands::check::run(&portfolio, options),
    }
}
