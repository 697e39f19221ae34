//! Semi-analytic recursion basket.

use super::engine::SurfaceBasket;
use super::surface_basket_distribution;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_models::{BasketError, Correlation, RecursionKernel};

/// Basket built by conditional loss recursion over the Gauss-Hermite nodes
/// of the common factor.
///
/// Handles heterogeneous principals, recovery dispersion and refinancing.
#[derive(Debug, Clone)]
pub struct SemiAnalyticBasket {
    inner: SurfaceBasket<RecursionKernel>,
}

impl SemiAnalyticBasket {
    /// Creates the basket.
    pub fn new(setup: Arc<BasketSetup>, correlation: Correlation) -> Self {
        Self {
            inner: SurfaceBasket::new(setup, Arc::new(correlation), RecursionKernel::new())
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

surface_basket_distribution!(SemiAnalyticBasket);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::BasketDistribution;
    use crate::fixtures;
    use approx::assert_relative_eq;

    fn basket(rho: f64) -> SemiAnalyticBasket {
        SemiAnalyticBasket::new(
            fixtures::setup(20, 0.02).shared(),
            Correlation::single_factor(rho).unwrap(),
        )
    }

    #[test]
    fn test_tranches_add_up() {
        let mut b = basket(0.3);
        let date = fixtures::maturity();
        let whole = b.accumulated_loss(date, 0.0, 0.3).unwrap();
        let parts = b.accumulated_loss(date, 0.0, 0.03).unwrap()
            + b.accumulated_loss(date, 0.03, 0.07).unwrap()
            + b.accumulated_loss(date, 0.07, 0.1).unwrap()
            + b.accumulated_loss(date, 0.1, 0.15).unwrap()
            + b.accumulated_loss(date, 0.15, 0.3).unwrap();
        assert_relative_eq!(whole, parts, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_moves_loss_to_senior() {
        let date = fixtures::maturity();
        let low = basket(0.1).accumulated_loss(date, 0.15, 0.3).unwrap();
        let high = basket(0.6).accumulated_loss(date, 0.15, 0.3).unwrap();
        assert!(high > low);
        let low_eq = basket(0.1).accumulated_loss(date, 0.0, 0.03).unwrap();
        let high_eq = basket(0.6).accumulated_loss(date, 0.0, 0.03).unwrap();
        assert!(high_eq < low_eq);
    }

    #[test]
    fn test_amortization_is_recovered_principal() {
        let mut b = basket(0.3);
        let date = fixtures::maturity();
        let loss = b.accumulated_loss(date, 0.0, 1.0).unwrap();
        let amort = b.amortized_amount(date, 0.0, 1.0).unwrap();
        // recovery 0.4: amortized = 0.4 / 0.6 of the loss
        assert_relative_eq!(amort, loss * 0.4 / 0.6, max_relative = 1e-9);
    }

    #[test]
    fn test_suffix_recompute_matches_full() {
        let mut b = basket(0.3);
        let date = fixtures::maturity();
        b.accumulated_loss(date, 0.0, 0.1).unwrap();
        let mut fresh = b.duplicate();
        b.reset();
        assert_eq!(
            b.accumulated_loss(date, 0.0, 0.1).unwrap(),
            fresh.accumulated_loss(date, 0.0, 0.1).unwrap()
        );
    }
}
