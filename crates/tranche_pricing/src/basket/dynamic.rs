//! Dynamic conditional distributions.
//!
//! The basket keeps one loss, amortization and probability curve per
//! conditioning node: a Gauss-Hermite node of the common factor, or a jump
//! count of the Hull-White model. An outer integration picks a node with
//! [`DynamicBasket::condition_on`] and reads the working curves through the
//! usual accessors, without recomputing the inner model per node.

use super::engine::SurfaceBasket;
use super::{tranche_fraction, BasketDistribution, LossDistribution};
use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tracing::debug;
use tranche_core::types::Date;
use tranche_models::{
    BasketError, BasketSurfaces, Correlation, DistributionKernel, HullWhiteKernel,
    HullWhiteParams, KernelRequest, RecursionKernel,
};

/// Conditioning model of a [`DynamicBasket`].
#[derive(Debug, Clone, Copy)]
pub enum DynamicKernel {
    /// One scenario per quadrature node of the common factor.
    Quadrature(RecursionKernel),
    /// One scenario per Hull-White jump count.
    HullWhite(HullWhiteKernel),
}

impl DistributionKernel for DynamicKernel {
    fn name(&self) -> &'static str {
        match self {
            DynamicKernel::Quadrature(k) => k.name(),
            DynamicKernel::HullWhite(k) => k.name(),
        }
    }

    fn n_scenarios(&self, request: &KernelRequest<'_>) -> usize {
        match self {
            DynamicKernel::Quadrature(k) => k.n_scenarios(request),
            DynamicKernel::HullWhite(k) => k.n_scenarios(request),
        }
    }

    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError> {
        match self {
            DynamicKernel::Quadrature(k) => k.compute(request, surfaces, start),
            DynamicKernel::HullWhite(k) => k.compute(request, surfaces, start),
        }
    }
}

/// Basket exposing per-node conditional curves.
#[derive(Debug, Clone)]
pub struct DynamicBasket {
    inner: SurfaceBasket<DynamicKernel>,
    condition: Option<usize>,
    working: Option<BasketSurfaces>,
}

impl DynamicBasket {
    /// Quadrature-conditioned basket under a one-factor correlation.
    pub fn new(setup: Arc<BasketSetup>, correlation: Correlation) -> Self {
        Self::with_kernel(
            setup,
            correlation,
            DynamicKernel::Quadrature(RecursionKernel::new()),
        )
    }

    /// Hull-White jump basket. Dependence comes from the jumps only.
    pub fn hull_white(setup: Arc<BasketSetup>, params: HullWhiteParams) -> Self {
        Self::with_kernel(
            setup,
            Correlation::SingleFactor(0.0),
            DynamicKernel::HullWhite(HullWhiteKernel::new(params)),
        )
    }

    fn with_kernel(setup: Arc<BasketSetup>, correlation: Correlation, kernel: DynamicKernel) -> Self {
        Self {
            inner: SurfaceBasket::new(setup, Arc::new(correlation), kernel)
                .with_probability()
                .conditional(),
            condition: None,
            working: None,
        }
    }

    /// Conditioning model.
    pub fn kernel(&self) -> &DynamicKernel {
        self.inner.kernel()
    }

    /// Hull-White parameters, if the basket runs the jump model.
    pub fn hull_white_params(&self) -> Option<HullWhiteParams> {
        match self.inner.kernel() {
            DynamicKernel::HullWhite(k) => Some(k.params()),
            DynamicKernel::Quadrature(_) => None,
        }
    }

    /// Switches to the Hull-White model with new parameters.
    pub fn set_hull_white(&mut self, params: HullWhiteParams) {
        self.inner
            .set_kernel(DynamicKernel::HullWhite(HullWhiteKernel::new(params)));
        self.working = None;
    }

    /// Replaces the correlation.
    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.inner.set_correlation(correlation);
        self.working = None;
    }

    /// Replaces every principal.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.working = None;
        self.inner.update_setup(|s| s.set_principals(principals))
    }

    /// Node currently conditioned on; `None` is the unconditional view.
    pub fn condition(&self) -> Option<usize> {
        self.condition
    }

    /// Number of conditioning nodes, computing the surfaces if needed.
    pub fn n_scenarios(&mut self) -> Result<usize, BasketError> {
        Ok(self.inner.surfaces()?.n_scenarios())
    }

    /// Weight of every node at `date`, normalised.
    ///
    /// # Errors
    /// `BasketError::ZeroMixtureWeight` when the node weights sum to zero.
    pub fn scenario_weights(&mut self, date: Date) -> Result<Vec<f64>, BasketError> {
        self.inner.setup().check_date(date)?;
        let index = self.inner.setup().date_index(date);
        self.inner.surfaces()?.loss.normalised_scenario_weights(index)
    }

    /// Copies node `index` into the working curves, or their weighted
    /// average for `None`.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` for a node out of range.
    pub fn condition_on(&mut self, index: Option<usize>) -> Result<(), BasketError> {
        self.working = None;
        self.condition = index;
        self.working_surfaces().map(|_| ())
    }

    fn working_surfaces(&mut self) -> Result<&BasketSurfaces, BasketError> {
        if !self.inner.lazy().is_computed() {
            self.working = None;
        }
        if self.working.is_none() {
            let surfaces = self.inner.surfaces()?;
            let view = match self.condition {
                Some(k) => surfaces.slice(k)?,
                None => surfaces.collapse()?,
            };
            debug!(condition = ?self.condition, "dynamic basket working curves");
            self.working = Some(view);
        }
        self.working
            .as_ref()
            .ok_or_else(|| BasketError::Configuration("dynamic working curves missing".into()))
    }

    /// Probability that losses reach `detachment` by `date` under the
    /// current conditioning.
    pub fn exhaustion_probability(&mut self, date: Date, detachment: f64) -> Result<f64, BasketError> {
        self.inner.setup().check_date(date)?;
        let prior = *self.inner.setup().prior();
        if prior.realised_fraction(false) >= detachment {
            return Ok(1.0);
        }
        self.inner.register_tranche(detachment, detachment)?;
        let level = prior.adjust_tranche_level(false, detachment);
        let working = self.working_surfaces()?;
        let probability = working.probability.as_ref().ok_or_else(|| {
            BasketError::Configuration("dynamic basket keeps no probability surface".into())
        })?;
        Ok((1.0 - probability.interpolate(date, level)?).clamp(0.0, 1.0))
    }

    fn tranche(&mut self, date: Date, begin: f64, end: f64, is_amortization: bool) -> Result<f64, BasketError> {
        self.inner.setup().check_date(date)?;
        self.inner.register_tranche(begin, end)?;
        let setup = Arc::clone(self.inner.setup());
        let working = self.working_surfaces()?;
        tranche_fraction(&setup, working, date, begin, end, is_amortization)
    }
}

impl BasketDistribution for DynamicBasket {
    fn setup(&self) -> &Arc<BasketSetup> {
        self.inner.setup()
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.tranche(date, begin, end, false)
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.tranche(date, begin, end, true)
    }

    fn calc_loss_distribution(
        &self,
        _want_probability: bool,
        _date: Date,
        _levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        Err(BasketError::NotImplemented(
            "single-date loss distribution of a dynamically conditioned basket".into(),
        ))
    }

    fn is_computed(&self) -> bool {
        self.inner.lazy().is_computed()
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.working = None;
    }

    fn reset_with(&mut self, flag: ResetFlag) {
        self.inner.reset_with(flag);
        match (flag, self.working.as_mut()) {
            (ResetFlag::SettleChanged(as_of), Some(working)) => working.set_as_of(as_of),
            _ => self.working = None,
        }
    }

    fn duplicate(&self) -> Self {
        Self {
            inner: self.inner.duplicate(),
            condition: self.condition,
            working: None,
        }
    }
}
