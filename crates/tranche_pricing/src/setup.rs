//! Static configuration shared by basket strategies.

use std::sync::Arc;
use tranche_core::types::Date;
use tranche_models::{
    build_date_grid, round_loss_level, BasketError, Copula, CreditPool, LossLevels,
    NumericalOptions, PriorLoss,
};

/// Pool, date window, level grid, prior history, copula and numerical
/// options of a basket.
///
/// Baskets hold the setup behind an [`Arc`]. Duplicates share it and the
/// mutating basket methods go through [`Arc::make_mut`], so a change to one
/// duplicate never reaches another.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketSetup {
    pool: CreditPool,
    start: Date,
    maturity: Date,
    dates: Vec<Date>,
    levels: LossLevels,
    prior: PriorLoss,
    copula: Copula,
    options: NumericalOptions,
}

impl BasketSetup {
    /// Builds the setup and its date grid.
    ///
    /// `raw_levels` are the tranche levels callers are expected to query;
    /// the surfaces are built on their cooked set.
    ///
    /// # Errors
    /// `BasketError::Configuration` for invalid options or a pool without
    /// principal, `BasketError::InvalidArgument` if `start > maturity`.
    pub fn new(
        pool: CreditPool,
        start: Date,
        maturity: Date,
        raw_levels: &[f64],
        options: NumericalOptions,
    ) -> Result<Self, BasketError> {
        options.validate()?;
        let total = pool.total_principal();
        if !(total > 0.0) {
            return Err(BasketError::Configuration(
                "pool has no principal outstanding".into(),
            ));
        }
        let dates = build_date_grid(start, maturity, options.grid_step_size, options.grid_step_unit)?;
        let prior = PriorLoss::none(total);
        let levels = cook(raw_levels, &prior, &options);
        Ok(Self {
            pool,
            start,
            maturity,
            dates,
            levels,
            prior,
            copula: Copula::Gaussian,
            options,
        })
    }

    /// Same setup under another copula.
    pub fn with_copula(mut self, copula: Copula) -> Self {
        self.copula = copula;
        self
    }

    /// Same setup with realised history before the start date.
    pub fn with_prior(mut self, prior: PriorLoss) -> Self {
        self.set_prior(prior);
        self
    }

    /// Registers further tranche levels.
    pub fn with_levels(mut self, levels: &[f64]) -> Self {
        self.add_levels(levels);
        self
    }

    /// Wraps the setup for sharing.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Credit pool.
    pub fn pool(&self) -> &CreditPool {
        &self.pool
    }

    /// Portfolio start; the surfaces' as-of date.
    pub fn start(&self) -> Date {
        self.start
    }

    /// Basket maturity; the last grid date.
    pub fn maturity(&self) -> Date {
        self.maturity
    }

    /// Date grid.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Level grid.
    pub fn levels(&self) -> &LossLevels {
        &self.levels
    }

    /// Realised history.
    pub fn prior(&self) -> &PriorLoss {
        &self.prior
    }

    /// Copula.
    pub fn copula(&self) -> Copula {
        self.copula
    }

    /// Numerical options.
    pub fn options(&self) -> &NumericalOptions {
        &self.options
    }

    /// Original notional.
    pub fn notional(&self) -> f64 {
        self.prior.initial_principal()
    }

    /// Rejects dates outside `[start, maturity]`.
    pub fn check_date(&self, date: Date) -> Result<(), BasketError> {
        if date < self.start || date > self.maturity {
            return Err(BasketError::DateOutOfRange {
                date,
                start: self.start,
                maturity: self.maturity,
            });
        }
        Ok(())
    }

    /// Index of the first grid date on or after `date`.
    pub fn date_index(&self, date: Date) -> usize {
        self.dates.partition_point(|&d| d < date)
    }

    /// Replaces every principal.
    ///
    /// Without prior history the remaining pool tracks the new total.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.pool.set_principals(principals)?;
        if self.prior.is_empty() {
            self.set_prior(PriorLoss::none(self.pool.total_principal()));
        }
        Ok(())
    }

    /// Replaces the realised history and recooks the level grid.
    pub fn set_prior(&mut self, prior: PriorLoss) {
        self.prior = prior;
        self.levels = cook(self.levels.raw(), &self.prior, &self.options);
    }

    /// Whether `level` is one of the raw tranche levels at the rounding
    /// precision.
    pub fn has_level(&self, level: f64) -> bool {
        let digits = self.options.rounding_digits;
        let level = round_loss_level(level, digits);
        self.levels
            .raw()
            .iter()
            .any(|&x| round_loss_level(x, digits) == level)
    }

    /// Adds tranche levels to the raw set and recooks the grid. Returns
    /// whether anything was added.
    pub fn add_levels(&mut self, levels: &[f64]) -> bool {
        let mut raw = self.levels.raw().to_vec();
        let before = raw.len();
        for &level in levels.iter().filter(|x| x.is_finite()) {
            if !self.has_level(level) && !raw.contains(&level) {
                raw.push(level);
            }
        }
        if raw.len() == before {
            return false;
        }
        raw.sort_by(f64::total_cmp);
        self.levels = cook(&raw, &self.prior, &self.options);
        true
    }

    /// Recooks the raw levels, plus level 0, through `map` without
    /// complements or prior adjustment.
    pub(crate) fn remap_levels<F>(&mut self, map: F)
    where
        F: Fn(f64) -> f64,
    {
        let mut raw = self.levels.raw().to_vec();
        if !raw.contains(&0.0) {
            raw.insert(0, 0.0);
        }
        self.levels = LossLevels::new(&raw, self.options.rounding_digits, true, |_, x| map(x));
    }

    /// Replaces the copula.
    pub fn set_copula(&mut self, copula: Copula) {
        self.copula = copula;
    }

    /// Replaces the numerical options.
    pub fn set_options(&mut self, options: NumericalOptions) -> Result<(), BasketError> {
        options.validate()?;
        self.dates = build_date_grid(
            self.start,
            self.maturity,
            options.grid_step_size,
            options.grid_step_unit,
        )?;
        self.options = options;
        self.levels = cook(self.levels.raw(), &self.prior, &self.options);
        Ok(())
    }
}

fn cook(raw: &[f64], prior: &PriorLoss, options: &NumericalOptions) -> LossLevels {
    LossLevels::with_prior(
        raw,
        prior,
        options.rounding_digits,
        options.suppress_complement_levels,
    )
}
