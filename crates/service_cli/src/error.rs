//! CLI error types.

use thiserror::Error;
use tranche_models::{BasketError, ConfigError};

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Bad command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Portfolio file is inconsistent.
    #[error("Portfolio error: {0}")]
    Portfolio(String),

    /// Numerical options failed to load or validate.
    #[error(transparent)]
    Options(#[from] ConfigError),

    /// Engine failure.
    #[error(transparent)]
    Basket(#[from] BasketError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
