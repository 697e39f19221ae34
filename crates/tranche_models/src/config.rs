//! Numerical options.
//!
//! Handles loading kernel settings from TOML files and environment
//! variables. The options are a plain value handed to every basket; nothing
//! here is global.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tranche_core::types::{Tenor, TimeUnit};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An option value is out of range
    #[error("Invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The file could not be read or parsed
    #[error("Configuration file error: {0}")]
    FileError(String),

    /// An environment override could not be parsed
    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Kernel and grid settings shared by every basket strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumericalOptions {
    /// Gauss-Hermite points for factor integration
    pub quadrature_points: usize,
    /// Monte Carlo paths
    pub sample_size: usize,
    /// Monte Carlo seed; negative requests a system-random seed
    pub seed: i64,
    /// Loss lattice unit of the recursion kernel, as a fraction of the pool
    pub loss_granularity: f64,
    /// Decimal places kept when cooking loss levels
    pub rounding_digits: u32,
    /// Date grid step length
    pub grid_step_size: u32,
    /// Date grid step unit
    pub grid_step_unit: TimeUnit,
    /// Allow kernels to run their inner loops on the rayon pool
    pub parallel: bool,
    /// Skip the complementary amortization levels
    pub suppress_complement_levels: bool,
    /// Paths per Monte Carlo work chunk
    pub chunk_size: usize,
    /// Largest jump count of the Hull-White kernel
    pub max_jumps: usize,
}

impl Default for NumericalOptions {
    fn default() -> Self {
        Self {
            quadrature_points: 40,
            sample_size: 20_000,
            seed: 20_250_101,
            loss_granularity: 0.0025,
            rounding_digits: 10,
            grid_step_size: 3,
            grid_step_unit: TimeUnit::Months,
            parallel: true,
            suppress_complement_levels: false,
            chunk_size: 1_000,
            max_jumps: 60,
        }
    }
}

impl NumericalOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid step as a tenor.
    pub fn grid_step(&self) -> Tenor {
        Tenor::new(self.grid_step_size, self.grid_step_unit)
    }

    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let options: NumericalOptions = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Override from `TRANCHE_*` environment variables
    pub fn merge_env(&mut self) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
            match std::env::var(key) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| ConfigError::EnvError(format!("{}={} is not valid", key, raw))),
                Err(_) => Ok(None),
            }
        }

        if let Some(seed) = parse("TRANCHE_SEED")? {
            self.seed = seed;
        }
        if let Some(samples) = parse("TRANCHE_SAMPLE_SIZE")? {
            self.sample_size = samples;
        }
        if let Some(points) = parse("TRANCHE_QUADRATURE_POINTS")? {
            self.quadrature_points = points;
        }
        if let Some(parallel) = parse("TRANCHE_PARALLEL")? {
            self.parallel = parallel;
        }
        self.validate()
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quadrature_points == 0 || self.quadrature_points > 200 {
            return Err(ConfigError::InvalidOption {
                name: "quadrature_points",
                reason: format!("{} not in [1, 200]", self.quadrature_points),
            });
        }
        if self.sample_size == 0 {
            return Err(ConfigError::InvalidOption {
                name: "sample_size",
                reason: "must be positive".into(),
            });
        }
        if !(self.loss_granularity > 0.0 && self.loss_granularity <= 0.5) {
            return Err(ConfigError::InvalidOption {
                name: "loss_granularity",
                reason: format!("{} not in (0, 0.5]", self.loss_granularity),
            });
        }
        if self.rounding_digits > 28 {
            return Err(ConfigError::InvalidOption {
                name: "rounding_digits",
                reason: format!("{} exceeds 28", self.rounding_digits),
            });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidOption {
                name: "chunk_size",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_validate() {
        let options = NumericalOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.grid_step(), Tenor::new(3, TimeUnit::Months));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = NumericalOptions::from_toml_str(
            r#"
            sample_size = 5000
            seed = -1
            grid_step_unit = "Y"
            "#,
        )
        .unwrap();
        assert_eq!(options.sample_size, 5000);
        assert_eq!(options.seed, -1);
        assert_eq!(options.grid_step_unit, TimeUnit::Years);
        assert_eq!(options.quadrature_points, NumericalOptions::default().quadrature_points);
    }

    #[test]
    fn test_invalid_toml_value() {
        let result = NumericalOptions::from_toml_str("loss_granularity = 0.0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOption { name: "loss_granularity", .. })
        ));
        assert!(matches!(
            NumericalOptions::from_toml_str("sample_size = \"many\""),
            Err(ConfigError::FileError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = NumericalOptions::from_file("/nonexistent/tranche/options.toml");
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let options = NumericalOptions {
            seed: 7,
            parallel: false,
            ..Default::default()
        };
        let text = toml::to_string(&options).unwrap();
        assert_eq!(NumericalOptions::from_toml_str(&text).unwrap(), options);
    }
}
