//! Counterparty-conditioned basket.

use super::engine::SurfaceBasket;
use super::{BasketDistribution, LossDistribution};
use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tracing::warn;
use tranche_core::market_data::SurvivalCurve;
use tranche_core::types::Date;
use tranche_models::correlation::signed_factor;
use tranche_models::{BasketError, Correlation, CounterpartyRisk, RecursionKernel};

/// Recursion basket whose surfaces are weighted by the survival of a
/// protection seller.
///
/// The counterparty loads on the common factor with `sign(ρ) sqrt(|ρ|)`.
/// Conditioning is skipped when `ρ` is NaN or the pool refinances; the
/// basket then behaves exactly like a plain recursion basket.
#[derive(Debug, Clone)]
pub struct CounterpartyBasket {
    inner: SurfaceBasket<RecursionKernel>,
    curve: Arc<SurvivalCurve>,
    counterparty_correlation: f64,
}

impl CounterpartyBasket {
    /// Creates the basket.
    pub fn new(
        setup: Arc<BasketSetup>,
        correlation: Correlation,
        curve: Arc<SurvivalCurve>,
        counterparty_correlation: f64,
    ) -> Self {
        let risk = conditioning(&setup, &curve, counterparty_correlation);
        Self {
            inner: SurfaceBasket::new(setup, Arc::new(correlation), RecursionKernel::new())
                .with_counterparty(risk),
            curve,
            counterparty_correlation,
        }
    }

    /// Whether surfaces are conditioned on counterparty survival.
    pub fn is_conditioned(&self) -> bool {
        self.inner.counterparty().is_some()
    }

    /// Counterparty survival curve.
    pub fn counterparty_curve(&self) -> &SurvivalCurve {
        &self.curve
    }

    /// Pairwise correlation between the counterparty and the pool names.
    pub fn counterparty_correlation(&self) -> f64 {
        self.counterparty_correlation
    }

    /// Replaces the counterparty correlation.
    pub fn set_counterparty_correlation(&mut self, rho: f64) {
        self.counterparty_correlation = rho;
        let risk = conditioning(self.inner.setup(), &self.curve, rho);
        self.inner.set_counterparty(risk);
    }

    /// Replaces the basket correlation.
    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.inner.set_correlation(correlation);
    }

    /// Replaces every principal.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.inner.update_setup(|s| s.set_principals(principals))
    }
}

fn conditioning(setup: &BasketSetup, curve: &Arc<SurvivalCurve>, rho: f64) -> Option<CounterpartyRisk> {
    if rho.is_nan() {
        warn!("counterparty correlation unset, conditioning skipped");
        return None;
    }
    if setup.pool().has_refinancing() {
        warn!("pool refinances, counterparty conditioning skipped");
        return None;
    }
    Some(CounterpartyRisk {
        curve: Arc::clone(curve),
        factor: signed_factor(rho),
    })
}

impl BasketDistribution for CounterpartyBasket {
    fn setup(&self) -> &Arc<BasketSetup> {
        self.inner.setup()
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.accumulated_loss(date, begin, end)
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.amortized_amount(date, begin, end)
    }

    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        if self.is_conditioned() {
            return Err(BasketError::NotImplemented(
                "single-date loss distribution under counterparty conditioning".into(),
            ));
        }
        self.inner.calc_loss_distribution(want_probability, date, levels)
    }

    fn is_computed(&self) -> bool {
        self.inner.lazy().is_computed()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn reset_with(&mut self, flag: ResetFlag) {
        self.inner.reset_with(flag);
    }

    fn duplicate(&self) -> Self {
        Self {
            inner: self.inner.duplicate(),
            curve: Arc::clone(&self.curve),
            counterparty_correlation: self.counterparty_correlation,
        }
    }
}
