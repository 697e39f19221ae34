//! Error types for basket construction and evaluation.

use crate::config::ConfigError;
use thiserror::Error;
use tranche_core::market_data::MarketDataError;
use tranche_core::types::{Date, DateError, SolverError};

/// Errors raised by pools, correlation objects, kernels and baskets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BasketError {
    /// Inconsistent construction data (array lengths, missing inputs, seeds).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid call-time argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested date lies outside the basket's date window.
    #[error("Date {date} outside [{start}, {maturity}]")]
    DateOutOfRange {
        /// Requested date
        date: Date,
        /// Portfolio start
        start: Date,
        /// Basket maturity
        maturity: Date,
    },

    /// Correlation variant not usable by the requesting computation.
    #[error("Correlation type {variant} is not supported by {context}")]
    UnsupportedCorrelation {
        /// Offending variant
        variant: &'static str,
        /// Computation that rejected it
        context: &'static str,
    },

    /// Copula not usable by the requesting kernel.
    #[error("Copula {copula} is not supported by {context}")]
    UnsupportedCopula {
        /// Offending copula
        copula: String,
        /// Kernel that rejected it
        context: &'static str,
    },

    /// Deliberately unhandled method/strategy combination.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Mixture weights sum to (nearly) zero.
    #[error("Mixture weights sum to {total}, cannot normalise")]
    ZeroMixtureWeight {
        /// Weight sum
        total: f64,
    },

    /// A base-correlation object is required but absent.
    #[error("Base correlation object is required")]
    MissingBaseCorrelation,

    /// Calibration of a correlation or model parameter failed.
    #[error("Calibration failed for {target}: {reason}")]
    Calibration {
        /// What was being calibrated
        target: String,
        /// Underlying reason
        reason: String,
    },

    /// Root finder or minimiser failure.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Curve evaluation failure.
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    /// Date arithmetic failure.
    #[error("Date error: {0}")]
    Date(#[from] DateError),
}

impl BasketError {
    /// Shorthand for the attachment/detachment ordering error.
    pub fn inverted_tranche() -> Self {
        BasketError::InvalidArgument("attachment cannot exceed detachment".to_string())
    }
}

impl From<ConfigError> for BasketError {
    fn from(err: ConfigError) -> Self {
        BasketError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_tranche_message() {
        let err = BasketError::inverted_tranche();
        assert_eq!(
            err.to_string(),
            "Invalid argument: attachment cannot exceed detachment"
        );
    }

    #[test]
    fn test_unsupported_correlation_names_variant() {
        let err = BasketError::UnsupportedCorrelation {
            variant: "Mixture",
            context: "factor loadings",
        };
        assert!(err.to_string().contains("Mixture"));
    }

    #[test]
    fn test_solver_error_conversion() {
        let err: BasketError = SolverError::MaxIterationsExceeded { iterations: 100 }.into();
        assert!(matches!(err, BasketError::Solver(_)));
    }
}
