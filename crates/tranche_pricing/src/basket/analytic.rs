//! Large homogeneous pool basket.

use super::engine::SurfaceBasket;
use super::surface_basket_distribution;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_models::{BasketError, Correlation, LargePoolKernel};

/// Basket whose conditional loss is its conditional expectation.
///
/// Suited to large, granular pools. Recovery dispersion is replaced by the
/// mean recovery.
#[derive(Debug, Clone)]
pub struct AnalyticBasket {
    inner: SurfaceBasket<LargePoolKernel>,
}

impl AnalyticBasket {
    /// Creates the basket.
    pub fn new(setup: Arc<BasketSetup>, correlation: Correlation) -> Self {
        Self {
            inner: SurfaceBasket::new(setup, Arc::new(correlation), LargePoolKernel::new())
                .with_probability(),
        }
    }

    /// Correlation object.
    pub fn correlation(&self) -> &Correlation {
        self.inner.correlation()
    }

    /// Replaces the correlation.
    pub fn set_correlation(&mut self, correlation: Correlation) {
        self.inner.set_correlation(correlation);
    }

    /// Replaces every principal.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.inner.update_setup(|s| s.set_principals(principals))
    }
}

surface_basket_distribution!(AnalyticBasket);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::BasketDistribution;
    use crate::fixtures;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_tranche_is_pool_expected_loss() {
        let setup = fixtures::setup(25, 0.02).shared();
        let el = setup.pool().expected_loss_fraction(fixtures::maturity()).unwrap();
        let mut basket = AnalyticBasket::new(setup, Correlation::single_factor(0.3).unwrap());
        let full = basket.accumulated_loss(fixtures::maturity(), 0.0, 1.0).unwrap();
        assert_relative_eq!(full, el, max_relative = 1e-6);
    }

    #[test]
    fn test_equity_loss_grows_in_time() {
        let setup = fixtures::setup(25, 0.02);
        let dates = setup.dates().to_vec();
        let mut basket =
            AnalyticBasket::new(setup.shared(), Correlation::single_factor(0.3).unwrap());
        let losses: Vec<f64> = dates
            .iter()
            .map(|&d| basket.accumulated_loss(d, 0.0, 0.03).unwrap())
            .collect();
        assert_eq!(losses[0], 0.0);
        assert!(losses.windows(2).all(|w| w[1] >= w[0] - 1e-14));
    }

    #[test]
    fn test_probability_distribution_is_cumulative() {
        let basket = AnalyticBasket::new(
            fixtures::setup(25, 0.02).shared(),
            Correlation::single_factor(0.3).unwrap(),
        );
        let dist = basket
            .calc_loss_distribution(true, fixtures::maturity(), &[0.2, 0.05, 0.0, 1.0, 0.05])
            .unwrap();
        assert_eq!(dist.levels, vec![0.0, 0.05, 0.2, 1.0]);
        assert!(dist.values.windows(2).all(|w| w[1] >= w[0] - 1e-12));
        assert_relative_eq!(dist.values[3], 1.0, epsilon = 1e-12);
    }
}
