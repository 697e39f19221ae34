//! Price command implementation
//!
//! Prices every tranche of a portfolio on the configured basket strategy.

use serde::Serialize;
use tracing::info;
use tranche_pricing::BasketDistribution;

use super::OutputFormat;
use crate::config::Portfolio;
use crate::Result;

/// One priced tranche.
#[derive(Debug, Clone, Serialize)]
pub struct TrancheReport {
    pub name: String,
    pub attachment: f64,
    pub detachment: f64,
    /// Expected loss at maturity, fraction of the original notional.
    pub expected_loss: f64,
    /// Expected amortization at maturity, fraction of the original notional.
    pub amortized: f64,
    pub protection_leg: f64,
    pub premium_leg: f64,
    pub pv: f64,
}

/// Prices the portfolio's tranches.
pub fn price_portfolio(portfolio: &Portfolio) -> Result<Vec<TrancheReport>> {
    let mut basket = portfolio.basket()?;
    let discount = portfolio.discount_curve();
    let maturity = portfolio.maturity;
    let mut reports = Vec::with_capacity(portfolio.tranches.len());
    for (name, tranche) in portfolio.synthetic_tranches()? {
        let protection_leg = tranche.protection_leg(&mut basket, &discount)?;
        let premium_leg = tranche.premium_leg(&mut basket, &discount)?;
        reports.push(TrancheReport {
            name,
            attachment: tranche.attachment,
            detachment: tranche.detachment,
            expected_loss: basket.accumulated_loss(maturity, tranche.attachment, tranche.detachment)?,
            amortized: basket.amortized_amount(maturity, tranche.attachment, tranche.detachment)?,
            protection_leg,
            premium_leg,
            pv: protection_leg - premium_leg,
        });
    }
    Ok(reports)
}

/// Run the price command
pub fn run(portfolio: &str, options: Option<&str>, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    info!("Starting pricing...");
    info!("  Portfolio: {}", portfolio);

    let portfolio = Portfolio::load(portfolio, options)?;
    info!("  Strategy: {:?}", portfolio.strategy);
    let reports = price_portfolio(&portfolio)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Table => {
            println!("\n┌──────────────┬─────────────┬────────────┬────────────┬──────────────┬──────────────┐");
            println!("│ Tranche      │ Range       │ Exp. loss  │ Amortized  │ Protection   │ PV           │");
            println!("├──────────────┼─────────────┼────────────┼────────────┼──────────────┼──────────────┤");
            for r in &reports {
                println!(
                    "│ {:<12} │ {:>5.2}-{:<5.2} │ {:>10.6} │ {:>10.6} │ {:>12.2} │ {:>12.2} │",
                    r.name, r.attachment, r.detachment, r.expected_loss, r.amortized, r.protection_leg, r.pv
                );
            }
            println!("└──────────────┴─────────────┴────────────┴────────────┴──────────────┴──────────────┘");
        }
    }

    info!("Pricing complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use approx::assert_relative_eq;

    #[test]
    fn test_price_sample_portfolio() {
        let portfolio = Portfolio::from_toml_str(SAMPLE).unwrap();
        let reports = price_portfolio(&portfolio).unwrap();
        assert_eq!(reports.len(), 2);

        let equity = &reports[0];
        assert_eq!(equity.name, "equity");
        assert!(equity.expected_loss > 0.0 && equity.expected_loss <= 0.1);
        assert!(equity.premium_leg > 0.0);
        assert_relative_eq!(equity.pv, equity.protection_leg - equity.premium_leg);
        assert_eq!(reports[1].premium_leg, 0.0);
    }
}
