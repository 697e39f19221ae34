//! Distribution command implementation
//!
//! Prints the pool loss distribution at one date.

use tracing::info;
use tranche_core::types::Date;
use tranche_pricing::{BasketDistribution, LossDistribution};

use super::OutputFormat;
use crate::config::Portfolio;
use crate::{CliError, Result};

/// Evenly spaced levels `0, step, 2 step, …, 1`.
pub fn level_grid(step: f64) -> Result<Vec<f64>> {
    if !(step > 0.0 && step <= 1.0) {
        return Err(CliError::InvalidArgument(format!(
            "level step {} not in (0, 1]",
            step
        )));
    }
    let n = (1.0 / step).round() as usize;
    Ok((0..=n).map(|i| (i as f64 * step).min(1.0)).collect())
}

/// Loss distribution of the portfolio's basket.
pub fn distribution(
    portfolio: &Portfolio,
    date: Option<Date>,
    step: f64,
    probability: bool,
) -> Result<LossDistribution> {
    let basket = portfolio.basket()?;
    let date = date.unwrap_or(portfolio.maturity);
    Ok(basket.calc_loss_distribution(probability, date, &level_grid(step)?)?)
}

/// Run the distribution command
pub fn run(
    portfolio: &str,
    options: Option<&str>,
    date: Option<&str>,
    step: f64,
    probability: bool,
    format: &str,
) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let date = date
        .map(|d| {
            Date::parse(d).map_err(|e| CliError::InvalidArgument(format!("date {}: {}", d, e)))
        })
        .transpose()?;
    info!("Computing loss distribution...");
    info!("  Portfolio: {}", portfolio);

    let portfolio = Portfolio::load(portfolio, options)?;
    let table = distribution(&portfolio, date, step, probability)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        OutputFormat::Table => {
            let header = if table.probability { "P(L ≤ ℓ)" } else { "E[min(L, ℓ)]" };
            println!("\nLoss distribution at {}", table.date);
            println!("┌──────────┬──────────────┐");
            println!("│ Level    │ {:<12} │", header);
            println!("├──────────┼──────────────┤");
            for (level, value) in table.levels.iter().zip(&table.values) {
                println!("│ {:>8.4} │ {:>12.8} │", level, value);
            }
            println!("└──────────┴──────────────┘");
        }
    }

    info!("Distribution complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;

    #[test]
    fn test_level_grid() {
        let grid = level_grid(0.25).unwrap();
        assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(level_grid(0.0).is_err());
        assert!(level_grid(1.5).is_err());
    }

    #[test]
    fn test_probability_reaches_one() {
        let portfolio = Portfolio::from_toml_str(SAMPLE).unwrap();
        let table = distribution(&portfolio, None, 0.05, true).unwrap();
        assert_eq!(table.date, portfolio.maturity);
        let last = *table.values.last().unwrap();
        assert!((last - 1.0).abs() < 1e-9);
        assert!(table.values.windows(2).all(|w| w[1] >= w[0] - 1e-12));
    }
}
