//! Calibrate command implementation
//!
//! Fits correlation term structures or Hull-White parameters to the
//! `[[quotes]]` of a portfolio.

use serde::Serialize;
use tracing::{info, warn};
use tranche_core::types::Date;
use tranche_models::correlation::signed_factor;
use tranche_models::{CorrelationTermStruct, HullWhiteParams};
use tranche_pricing::{calibrate_hull_white, BootstrapBasket, DynamicBasket};

use crate::config::Portfolio;
use crate::{CliError, Result};

/// Fitted factor of one term-structure tenor.
#[derive(Debug, Clone, Serialize)]
pub struct TenorFactor {
    pub tenor: Date,
    pub factor: f64,
    pub correlation: f64,
}

/// Calibration output.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum CalibrationReport {
    Bootstrap {
        tenors: Vec<TenorFactor>,
    },
    HullWhite {
        intensity: f64,
        jump_size: f64,
        rmse: f64,
        evaluations: usize,
        converged: bool,
    },
}

/// Bootstraps one factor per quote maturity.
pub fn bootstrap(portfolio: &Portfolio) -> Result<CalibrationReport> {
    let quotes = portfolio.tranche_quotes();
    let mut tenors: Vec<Date> = quotes.iter().map(|q| q.maturity).collect();
    tenors.sort();
    tenors.dedup();
    if tenors.is_empty() {
        return Err(CliError::Portfolio("calibration needs [[quotes]]".into()));
    }
    let initial = vec![signed_factor(portfolio.correlation); tenors.len()];
    let term = CorrelationTermStruct::common(tenors.clone(), initial)?;
    let mut basket = BootstrapBasket::new(portfolio.setup()?, term);
    let factors = basket.calibrate(&quotes)?;
    let tenors = tenors
        .into_iter()
        .zip(factors)
        .map(|(tenor, factor)| TenorFactor {
            tenor,
            factor,
            correlation: factor * factor.abs(),
        })
        .collect();
    Ok(CalibrationReport::Bootstrap { tenors })
}

/// Fits Hull-White intensity and jump size.
pub fn hull_white(portfolio: &Portfolio) -> Result<CalibrationReport> {
    let quotes = portfolio.tranche_quotes();
    let initial = match portfolio.hull_white_params()? {
        Some(params) => params,
        None => HullWhiteParams::new(0.1, 0.5)?,
    };
    let mut basket = DynamicBasket::hull_white(portfolio.setup()?, initial);
    let fit = calibrate_hull_white(&mut basket, &quotes, initial)?;
    if !fit.converged {
        warn!("Hull-White fit did not converge; reporting the best point found");
    }
    Ok(CalibrationReport::HullWhite {
        intensity: fit.params.intensity,
        jump_size: fit.params.jump_size,
        rmse: fit.rmse,
        evaluations: fit.evaluations,
        converged: fit.converged,
    })
}

/// Run the calibrate command
pub fn run(portfolio: &str, options: Option<&str>, model: &str, output: Option<&str>) -> Result<()> {
    info!("Starting calibration...");
    info!("  Portfolio: {}", portfolio);
    info!("  Model: {}", model);

    let portfolio = Portfolio::load(portfolio, options)?;
    let report = match model {
        "bootstrap" => bootstrap(&portfolio)?,
        "hull-white" => hull_white(&portfolio)?,
        other => {
            warn!("Unknown model: {}", other);
            return Err(CliError::InvalidArgument(format!(
                "Unknown model: {}. Supported: bootstrap, hull-white",
                other
            )));
        }
    };

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            info!("Writing calibrated parameters to: {}", path);
            std::fs::write(path, json)?;
        }
        None => println!("{}", json),
    }

    info!("Calibration complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use approx::assert_relative_eq;
    use tranche_models::Correlation;
    use tranche_pricing::{BasketDistribution, SemiAnalyticBasket};

    #[test]
    fn test_bootstrap_reprices_quote() {
        let base = Portfolio::from_toml_str(SAMPLE).unwrap();
        let mut generator = SemiAnalyticBasket::new(
            base.setup().unwrap(),
            Correlation::single_factor(0.45).unwrap(),
        );
        let target = generator.accumulated_loss(base.maturity, 0.0, 0.1).unwrap();
        let quoted = format!(
            "{}\n[[quotes]]\nmaturity = \"2027-01-01\"\nattachment = 0.0\ndetachment = 0.1\nexpected_loss = {:e}\n",
            SAMPLE,
            target
        );
        let portfolio = Portfolio::from_toml_str(&quoted).unwrap();

        match bootstrap(&portfolio).unwrap() {
            CalibrationReport::Bootstrap { tenors } => {
                assert_eq!(tenors.len(), 1);
                assert_relative_eq!(tenors[0].correlation, 0.45, epsilon = 1e-4);
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_bootstrap_needs_quotes() {
        let portfolio = Portfolio::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(bootstrap(&portfolio), Err(CliError::Portfolio(_))));
    }
}
