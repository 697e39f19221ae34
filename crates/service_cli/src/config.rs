//! Portfolio files.
//!
//! A portfolio is a TOML document describing the pool, the pricing window,
//! the strategy and the tranches to report:
//!
//! ```toml
//! start = "2024-01-01"
//! maturity = "2029-01-01"
//! strategy = "semi-analytic"
//! correlation = 0.3
//! discount_rate = 0.03
//!
//! [[names]]
//! principal = 1_000_000.0
//! hazard_rate = 0.02
//! recovery = 0.4
//!
//! [[tranches]]
//! name = "mezzanine"
//! attachment = 0.03
//! detachment = 0.07
//! spread = 0.02
//!
//! [options]
//! quadrature_points = 40
//! ```
//!
//! Dates are quoted ISO strings. `[options]` takes any
//! [`NumericalOptions`] field; the global `--options` file replaces it.

use crate::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tranche_core::market_data::{DiscountCurve, RecoveryCurve, SurvivalCurve};
use tranche_core::types::Date;
use tranche_models::{
    BasketError, Copula, Correlation, CreditPool, HullWhiteParams, NumericalOptions, PriorLoss,
};
use tranche_pricing::{
    AnalyticBasket, Basket, BasketSetup, DynamicBasket, MonteCarloBasket, SemiAnalyticBasket,
    SyntheticTranche, TrancheQuote,
};

/// Surface strategy selected by a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Large homogeneous pool.
    Analytic,
    /// Conditional recursion.
    #[default]
    SemiAnalytic,
    /// Default-time simulation.
    MonteCarlo,
    /// Hull-White jump intensities.
    HullWhite,
}

/// One reference name.
#[derive(Debug, Clone, Deserialize)]
pub struct NameConfig {
    pub principal: f64,
    pub hazard_rate: f64,
    pub recovery: f64,
    #[serde(default)]
    pub recovery_dispersion: f64,
}

/// One reported tranche.
#[derive(Debug, Clone, Deserialize)]
pub struct TrancheConfig {
    pub name: String,
    pub attachment: f64,
    pub detachment: f64,
    #[serde(default)]
    pub spread: f64,
}

/// Observed tranche expected loss.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteConfig {
    pub maturity: Date,
    pub attachment: f64,
    pub detachment: f64,
    pub expected_loss: f64,
}

/// Losses and amortization realised before `start`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriorConfig {
    pub initial_principal: f64,
    #[serde(default)]
    pub loss: f64,
    #[serde(default)]
    pub amortized: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HullWhiteConfig {
    pub intensity: f64,
    pub jump_size: f64,
}

/// Parsed portfolio file.
#[derive(Debug, Clone, Deserialize)]
pub struct Portfolio {
    pub start: Date,
    pub maturity: Date,
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub correlation: f64,
    /// Student-t degrees of freedom; Gaussian when absent.
    pub student_t_dof: Option<f64>,
    pub hull_white: Option<HullWhiteConfig>,
    #[serde(default)]
    pub discount_rate: f64,
    pub names: Vec<NameConfig>,
    #[serde(default)]
    pub tranches: Vec<TrancheConfig>,
    #[serde(default)]
    pub quotes: Vec<QuoteConfig>,
    pub prior: Option<PriorConfig>,
    #[serde(default)]
    pub options: NumericalOptions,
}

impl Portfolio {
    /// Reads and validates a portfolio file.
    pub fn load(path: &str, options_file: Option<&str>) -> Result<Self> {
        if !Path::new(path).exists() {
            return Err(CliError::FileNotFound(path.to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut portfolio = Self::from_toml_str(&content)?;
        if let Some(file) = options_file {
            if !Path::new(file).exists() {
                return Err(CliError::FileNotFound(file.to_string()));
            }
            portfolio.options = NumericalOptions::from_file(file)?;
        }
        portfolio.options.merge_env()?;
        debug!(
            names = portfolio.names.len(),
            tranches = portfolio.tranches.len(),
            strategy = ?portfolio.strategy,
            "loaded portfolio"
        );
        Ok(portfolio)
    }

    /// Parses portfolio text without touching options files or the
    /// environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let portfolio: Portfolio = toml::from_str(content)?;
        portfolio.validate()?;
        Ok(portfolio)
    }

    fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(CliError::Portfolio("portfolio has no names".into()));
        }
        if self.maturity <= self.start {
            return Err(CliError::Portfolio(format!(
                "maturity {} is not after start {}",
                self.maturity, self.start
            )));
        }
        if self.strategy == Strategy::HullWhite && self.hull_white.is_none() {
            return Err(CliError::Portfolio(
                "strategy hull-white needs a [hull_white] table".into(),
            ));
        }
        self.options.validate()?;
        Ok(())
    }

    /// Pool built from the `[[names]]` entries.
    pub fn pool(&self) -> Result<CreditPool> {
        let mut survival = Vec::with_capacity(self.names.len());
        let mut recovery = Vec::with_capacity(self.names.len());
        let mut principals = Vec::with_capacity(self.names.len());
        for name in &self.names {
            survival.push(Arc::new(SurvivalCurve::flat(self.start, name.hazard_rate)));
            let curve = if name.recovery_dispersion > 0.0 {
                RecoveryCurve::with_dispersion(name.recovery, name.recovery_dispersion)
                    .map_err(BasketError::from)?
            } else {
                RecoveryCurve::constant(name.recovery)
            };
            recovery.push(Arc::new(curve));
            principals.push(name.principal);
        }
        Ok(CreditPool::new(survival, recovery, principals)?)
    }

    /// Tranche attachment and detachment points.
    pub fn levels(&self) -> Vec<f64> {
        let mut levels: Vec<f64> = self
            .tranches
            .iter()
            .flat_map(|t| [t.attachment, t.detachment])
            .chain(self.quotes.iter().flat_map(|q| [q.attachment, q.detachment]))
            .collect();
        levels.sort_by(f64::total_cmp);
        levels.dedup();
        levels
    }

    /// Shared basket setup.
    pub fn setup(&self) -> Result<Arc<BasketSetup>> {
        let mut setup = BasketSetup::new(
            self.pool()?,
            self.start,
            self.maturity,
            &self.levels(),
            self.options.clone(),
        )?;
        if let Some(dof) = self.student_t_dof {
            setup = setup.with_copula(Copula::StudentT { dof });
        }
        if let Some(prior) = &self.prior {
            let current = setup.pool().total_principal();
            setup = setup.with_prior(PriorLoss::new(
                prior.initial_principal,
                current,
                prior.loss,
                prior.amortized,
            )?);
        }
        Ok(setup.shared())
    }

    /// Hull-White parameters, when configured.
    pub fn hull_white_params(&self) -> Result<Option<HullWhiteParams>> {
        self.hull_white
            .map(|hw| HullWhiteParams::new(hw.intensity, hw.jump_size))
            .transpose()
            .map_err(CliError::from)
    }

    /// Basket of the configured strategy.
    pub fn basket(&self) -> Result<Basket> {
        let setup = self.setup()?;
        let correlation = Correlation::single_factor(self.correlation)?;
        let basket = match self.strategy {
            Strategy::Analytic => Basket::Analytic(AnalyticBasket::new(setup, correlation)),
            Strategy::SemiAnalytic => {
                Basket::SemiAnalytic(SemiAnalyticBasket::new(setup, correlation))
            }
            Strategy::MonteCarlo => Basket::MonteCarlo(MonteCarloBasket::new(setup, correlation)),
            Strategy::HullWhite => {
                let params = self.hull_white_params()?.ok_or_else(|| {
                    CliError::Portfolio("strategy hull-white needs a [hull_white] table".into())
                })?;
                Basket::Dynamic(DynamicBasket::hull_white(setup, params))
            }
        };
        Ok(basket)
    }

    /// Flat discount curve from `discount_rate`.
    pub fn discount_curve(&self) -> DiscountCurve {
        DiscountCurve::flat(self.start, self.discount_rate)
    }

    /// Reported tranches, validated.
    pub fn synthetic_tranches(&self) -> Result<Vec<(String, SyntheticTranche)>> {
        self.tranches
            .iter()
            .map(|t| {
                let tranche =
                    SyntheticTranche::new(t.attachment, t.detachment, self.maturity, t.spread)?;
                Ok((t.name.clone(), tranche))
            })
            .collect()
    }

    /// Calibration quotes.
    pub fn tranche_quotes(&self) -> Vec<TrancheQuote> {
        self.quotes
            .iter()
            .map(|q| TrancheQuote {
                maturity: q.maturity,
                attachment: q.attachment,
                detachment: q.detachment,
                expected_loss: q.expected_loss,
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
start = "2024-01-01"
maturity = "2027-01-01"
correlation = 0.3
discount_rate = 0.02

[[names]]
principal = 1.0
hazard_rate = 0.02
recovery = 0.4

[[names]]
principal = 1.0
hazard_rate = 0.03
recovery = 0.4

[[names]]
principal = 2.0
hazard_rate = 0.01
recovery = 0.3

[[tranches]]
name = "equity"
attachment = 0.0
detachment = 0.1
spread = 0.05

[[tranches]]
name = "senior"
attachment = 0.1
detachment = 1.0

[options]
quadrature_points = 16
grid_step_size = 6
parallel = false
"#;

    #[test]
    fn test_parse_sample() {
        let portfolio = Portfolio::from_toml_str(SAMPLE).unwrap();
        assert_eq!(portfolio.strategy, Strategy::SemiAnalytic);
        assert_eq!(portfolio.names.len(), 3);
        assert_eq!(portfolio.levels(), vec![0.0, 0.1, 1.0]);
        assert_eq!(portfolio.options.quadrature_points, 16);
        assert_eq!(portfolio.options.sample_size, NumericalOptions::default().sample_size);
        assert_eq!(portfolio.pool().unwrap().total_principal(), 4.0);
    }

    #[test]
    fn test_builds_basket() {
        let portfolio = Portfolio::from_toml_str(SAMPLE).unwrap();
        let basket = portfolio.basket().unwrap();
        assert_eq!(basket.variant_name(), "SemiAnalytic");
        assert_eq!(portfolio.synthetic_tranches().unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_inconsistent_files() {
        let no_names = SAMPLE.replace("[[names]]", "[[unused]]");
        assert!(Portfolio::from_toml_str(&no_names).is_err());

        let hull_white = SAMPLE.replace("correlation = 0.3", "strategy = \"hull-white\"");
        assert!(matches!(
            Portfolio::from_toml_str(&hull_white),
            Err(CliError::Portfolio(_))
        ));

        let inverted = SAMPLE.replace("maturity = \"2027-01-01\"", "maturity = \"2023-01-01\"");
        assert!(Portfolio::from_toml_str(&inverted).is_err());
    }
}
