//! Kernel-backed basket shared by the single-layer strategies.

use super::{tranche_fraction, LossDistribution};
use crate::lazy::{LazySurface, ResetFlag};
use crate::setup::BasketSetup;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use tranche_core::types::Date;
use tranche_models::{
    round_loss_level, BasketError, BasketSurfaces, Correlation, CounterpartyRisk, Dependence,
    DistributionKernel, KernelRequest,
};

/// A setup, a correlation object and a kernel, with the surfaces they
/// produce cached in a [`LazySurface`].
#[derive(Debug, Clone)]
pub struct SurfaceBasket<K> {
    setup: Arc<BasketSetup>,
    correlation: Arc<Correlation>,
    kernel: K,
    counterparty: Option<CounterpartyRisk>,
    want_probability: bool,
    conditional: bool,
    lazy: LazySurface,
}

impl<K> SurfaceBasket<K>
where
    K: DistributionKernel + Clone + fmt::Debug,
{
    /// Unconditional basket without a probability surface.
    pub fn new(setup: Arc<BasketSetup>, correlation: Arc<Correlation>, kernel: K) -> Self {
        Self {
            setup,
            correlation,
            kernel,
            counterparty: None,
            want_probability: false,
            conditional: false,
            lazy: LazySurface::new(),
        }
    }

    /// Also keeps the cumulative probability surface.
    pub fn with_probability(mut self) -> Self {
        self.want_probability = true;
        self
    }

    /// Keeps one scenario per kernel conditioning node.
    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }

    /// Conditions every surface on counterparty survival.
    pub fn with_counterparty(mut self, counterparty: Option<CounterpartyRisk>) -> Self {
        self.counterparty = counterparty;
        self
    }

    /// Shared setup.
    pub fn setup(&self) -> &Arc<BasketSetup> {
        &self.setup
    }

    /// Correlation object.
    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Kernel.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Counterparty conditioning in effect, if any.
    pub fn counterparty(&self) -> Option<&CounterpartyRisk> {
        self.counterparty.as_ref()
    }

    /// Cache.
    pub fn lazy(&self) -> &LazySurface {
        &self.lazy
    }

    /// Same configuration, empty cache.
    pub fn duplicate(&self) -> Self {
        Self {
            lazy: LazySurface::new(),
            ..self.clone()
        }
    }

    /// Replaces the correlation and discards the surfaces.
    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.correlation = Arc::new(correlation);
        self.lazy.invalidate();
    }

    /// Replaces the correlation and marks rows from `start` as stale.
    pub fn set_correlation_from(&mut self, correlation: Correlation, start: usize) {
        self.correlation = Arc::new(correlation);
        self.lazy.invalidate_from(start);
    }

    /// Replaces the counterparty conditioning and discards the surfaces.
    pub fn set_counterparty(&mut self, counterparty: Option<CounterpartyRisk>) {
        self.counterparty = counterparty;
        self.lazy.invalidate();
    }

    /// Replaces the kernel and discards the surfaces.
    pub fn set_kernel(&mut self, kernel: K) {
        self.kernel = kernel;
        self.lazy.invalidate();
    }

    /// Mutates the setup copy-on-write and discards the surfaces.
    pub fn update_setup<F>(&mut self, update: F) -> Result<(), BasketError>
    where
        F: FnOnce(&mut BasketSetup) -> Result<(), BasketError>,
    {
        update(Arc::make_mut(&mut self.setup))?;
        self.lazy.invalidate();
        Ok(())
    }

    /// Discards the surfaces.
    pub fn reset(&mut self) {
        self.lazy.invalidate();
    }

    /// Applies a reset flag.
    pub fn reset_with(&mut self, flag: ResetFlag) {
        self.lazy.reset_with(flag);
    }

    /// Valid surfaces, computing them if needed.
    pub fn surfaces(&mut self) -> Result<&BasketSurfaces, BasketError> {
        if !self.lazy.is_computed() {
            let setup = Arc::clone(&self.setup);
            let dependence =
                Dependence::from_correlation(&self.correlation, setup.dates(), setup.pool().len())?;
            let request = kernel_request(
                &setup,
                self.counterparty.as_ref(),
                setup.dates(),
                setup.levels().cooked(),
                &dependence,
                self.want_probability,
                self.conditional,
            );
            let kernel = &self.kernel;
            self.lazy.get_or_compute(
                || request.surfaces_for(kernel),
                |surfaces, start| kernel.compute(&request, surfaces, start),
            )?;
        }
        self.lazy
            .surfaces()
            .ok_or_else(|| BasketError::Configuration("basket surfaces missing".into()))
    }

    /// Tranche loss read directly from the cached surfaces.
    pub fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.setup.check_date(date)?;
        self.register_tranche(begin, end)?;
        let setup = Arc::clone(&self.setup);
        let surfaces = self.surfaces()?;
        tranche_fraction(&setup, surfaces, date, begin, end, false)
    }

    /// Tranche amortization read directly from the cached surfaces.
    pub fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.setup.check_date(date)?;
        self.register_tranche(begin, end)?;
        let setup = Arc::clone(&self.setup);
        let surfaces = self.surfaces()?;
        tranche_fraction(&setup, surfaces, date, begin, end, true)
    }

    /// Adds tranche levels the cooked grid does not carry yet and discards
    /// the surfaces. Surfaces are exact only on cooked levels; 0 and 1 are
    /// always cooked.
    pub fn register_tranche(&mut self, begin: f64, end: f64) -> Result<(), BasketError> {
        if begin > end {
            return Ok(());
        }
        let missing: Vec<f64> = [begin, end]
            .into_iter()
            .filter(|&l| l > 0.0 && l < 1.0 && !self.setup.has_level(l))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(levels = ?missing, "registering tranche levels");
        self.update_setup(|setup| {
            setup.add_levels(&missing);
            Ok(())
        })
    }

    /// One-shot loss distribution at `date` on `levels` of the current
    /// pool, bypassing the cache.
    pub fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        self.setup.check_date(date)?;
        let digits = self.setup.options().rounding_digits;
        let mut grid: Vec<f64> = levels
            .iter()
            .filter(|l| l.is_finite())
            .map(|&l| round_loss_level(l, digits))
            .collect();
        grid.sort_by(f64::total_cmp);
        grid.dedup();
        if grid.is_empty() {
            return Err(BasketError::InvalidArgument(
                "loss distribution needs at least one level".into(),
            ));
        }
        let start = self.setup.start();
        let dates = if date == start { vec![start] } else { vec![start, date] };
        let dependence =
            Dependence::from_correlation(&self.correlation, &dates, self.setup.pool().len())?;
        let request = kernel_request(
            &self.setup,
            self.counterparty.as_ref(),
            &dates,
            &grid,
            &dependence,
            want_probability,
            false,
        );
        let mut surfaces = BasketSurfaces::new(start, &dates, &grid, 1, want_probability);
        self.kernel.compute(&request, &mut surfaces, 0)?;

        let last = dates.len() - 1;
        let values = match (&surfaces.probability, want_probability) {
            (Some(p), true) => p.row(last, 0).to_vec(),
            _ => surfaces.loss.row(last, 0).to_vec(),
        };
        Ok(LossDistribution {
            date,
            probability: want_probability,
            levels: grid,
            values,
        })
    }
}

fn kernel_request<'a>(
    setup: &'a BasketSetup,
    counterparty: Option<&'a CounterpartyRisk>,
    dates: &'a [Date],
    levels: &'a [f64],
    dependence: &'a Dependence,
    want_probability: bool,
    conditional: bool,
) -> KernelRequest<'a> {
    let mut request = KernelRequest::new(
        setup.pool(),
        setup.start(),
        dates,
        levels,
        dependence,
        setup.options(),
    );
    request.copula = setup.copula();
    request.counterparty = counterparty;
    request.want_probability = want_probability;
    request.conditional = conditional;
    request
}
