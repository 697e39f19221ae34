//! Monte Carlo basket.

use super::engine::SurfaceBasket;
use super::surface_basket_distribution;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_models::{BasketError, Correlation, MonteCarloKernel, Seed};

/// Basket built by simulating default times.
///
/// Accepts every correlation object with a factor or matrix form and both
/// copulas. The seed comes from the numerical options: a negative value
/// draws one when the basket is built, so duplicates share it.
#[derive(Debug, Clone)]
pub struct MonteCarloBasket {
    inner: SurfaceBasket<MonteCarloKernel>,
}

impl MonteCarloBasket {
    /// Creates the basket.
    pub fn new(setup: Arc<BasketSetup>, correlation: Correlation) -> Self {
        let kernel = MonteCarloKernel::new(Seed::from(setup.options().seed));
        Self {
            inner: SurfaceBasket::new(setup, Arc::new(correlation), kernel).with_probability(),
        }
    }

    /// Seed in use.
    pub fn seed(&self) -> u64 {
        self.inner.kernel().seed()
    }

    /// Correlation object.
    pub fn correlation(&self) -> &Correlation {
        self.inner.correlation()
    }

    /// Replaces the correlation.
    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.inner.set_correlation(correlation);
    }

    /// Replaces the seed.
    pub fn set_seed(&mut self, seed: u64) {
        self.inner.set_kernel(MonteCarloKernel::new(Seed::Fixed(seed)));
    }

    /// Replaces every principal.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.inner.update_setup(|s| s.set_principals(principals))
    }
}

surface_basket_distribution!(MonteCarloBasket);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::{BasketDistribution, SemiAnalyticBasket};
    use crate::fixtures;
    use approx::assert_relative_eq;
    use tranche_models::{Copula, NumericalOptions};

    fn setup(sample_size: usize) -> Arc<BasketSetup> {
        let mut setup = fixtures::setup(20, 0.02);
        setup
            .set_options(NumericalOptions {
                sample_size,
                ..fixtures::options()
            })
            .unwrap();
        setup.shared()
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let corr = Correlation::single_factor(0.3).unwrap();
        let date = fixtures::maturity();
        let mut a = MonteCarloBasket::new(setup(2_000), corr.clone());
        let mut b = MonteCarloBasket::new(setup(2_000), corr);
        assert_eq!(a.seed(), 42);
        assert_eq!(
            a.accumulated_loss(date, 0.03, 0.07).unwrap(),
            b.accumulated_loss(date, 0.03, 0.07).unwrap()
        );
    }

    #[test]
    fn test_agrees_with_recursion() {
        let corr = Correlation::single_factor(0.3).unwrap();
        let date = fixtures::maturity();
        let mut mc = MonteCarloBasket::new(setup(20_000), corr.clone());
        let mut sa = SemiAnalyticBasket::new(setup(20_000), corr);
        let full_mc = mc.accumulated_loss(date, 0.0, 1.0).unwrap();
        let full_sa = sa.accumulated_loss(date, 0.0, 1.0).unwrap();
        assert_relative_eq!(full_mc, full_sa, max_relative = 0.05);
    }

    #[test]
    fn test_student_t_copula() {
        let setup = Arc::new(
            (*setup(4_000))
                .clone()
                .with_copula(Copula::StudentT { dof: 5.0 }),
        );
        let mut basket = MonteCarloBasket::new(setup, Correlation::single_factor(0.3).unwrap());
        let loss = basket.accumulated_loss(fixtures::maturity(), 0.0, 1.0).unwrap();
        assert!(loss > 0.0 && loss < 0.6);
    }

    #[test]
    fn test_new_seed_invalidates() {
        let mut basket =
            MonteCarloBasket::new(setup(1_000), Correlation::single_factor(0.3).unwrap());
        basket.accumulated_loss(fixtures::maturity(), 0.0, 0.1).unwrap();
        assert!(basket.is_computed());
        basket.set_seed(7);
        assert!(!basket.is_computed());
        assert_eq!(basket.seed(), 7);
    }
}
