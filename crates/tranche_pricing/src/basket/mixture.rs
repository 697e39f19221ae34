//! Weighted mixture of correlation scenarios.

use super::{Basket, BasketDistribution, LossDistribution};
use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_core::types::Date;
use tranche_models::{BasketError, CorrelationMixture};

/// Components with a weight below this are dropped.
const WEIGHT_EPSILON: f64 = 1e-12;

/// Weight-normalised average of baskets that differ only in correlation.
///
/// Each component is a duplicate of one template basket carrying one of the
/// mixture's correlation objects, so every component shares the template's
/// pool and options.
#[derive(Debug, Clone)]
pub struct MixtureBasket {
    setup: Arc<BasketSetup>,
    components: Vec<(f64, Basket)>,
    total_weight: f64,
}

impl MixtureBasket {
    /// Builds one component per non-negligible weight.
    ///
    /// # Errors
    /// `BasketError::ZeroMixtureWeight` when the weights sum to nearly zero,
    /// `BasketError::UnsupportedCorrelation` when the template cannot take a
    /// component's correlation.
    pub fn new(template: &Basket, mixture: &CorrelationMixture) -> Result<Self, BasketError> {
        let total_weight = mixture.total_weight()?;
        let mut components = Vec::with_capacity(mixture.weights().len());
        for (&weight, correlation) in mixture.weights().iter().zip(mixture.components()) {
            if weight.abs() < WEIGHT_EPSILON {
                continue;
            }
            let mut component = template.duplicate();
            component.set_correlation((**correlation).clone())?;
            components.push((weight, component));
        }
        Ok(Self {
            setup: Arc::clone(template.setup()),
            components,
            total_weight,
        })
    }

    /// Component baskets with their raw weights.
    pub fn components(&self) -> &[(f64, Basket)] {
        &self.components
    }

    /// Sum of all mixture weights, dropped components included.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Weighted average of `f` over the components.
    ///
    /// Used for every per-component quantity, bumped PVs included.
    pub fn average<F>(&mut self, mut f: F) -> Result<f64, BasketError>
    where
        F: FnMut(&mut Basket) -> Result<f64, BasketError>,
    {
        let mut acc = 0.0;
        for (weight, component) in &mut self.components {
            acc += *weight * f(component)?;
        }
        Ok(acc / self.total_weight)
    }

    /// Replaces every principal in every component.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        for (_, component) in &mut self.components {
            component.set_principals(principals.clone())?;
        }
        Arc::make_mut(&mut self.setup).set_principals(principals)
    }
}

impl BasketDistribution for MixtureBasket {
    fn setup(&self) -> &Arc<BasketSetup> {
        &self.setup
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.setup.check_date(date)?;
        self.average(|b| b.accumulated_loss(date, begin, end))
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.setup.check_date(date)?;
        self.average(|b| b.amortized_amount(date, begin, end))
    }

    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        let mut out: Option<LossDistribution> = None;
        for (weight, component) in &self.components {
            let dist = component.calc_loss_distribution(want_probability, date, levels)?;
            match out.as_mut() {
                None => {
                    out = Some(LossDistribution {
                        values: dist.values.iter().map(|v| weight * v).collect(),
                        ..dist
                    })
                }
                Some(acc) => {
                    for (a, v) in acc.values.iter_mut().zip(&dist.values) {
                        *a += weight * v;
                    }
                }
            }
        }
        let mut dist = out.ok_or(BasketError::ZeroMixtureWeight {
            total: self.total_weight,
        })?;
        dist.values.iter_mut().for_each(|v| *v /= self.total_weight);
        Ok(dist)
    }

    fn is_computed(&self) -> bool {
        !self.components.is_empty() && self.components.iter().all(|(_, b)| b.is_computed())
    }

    fn reset(&mut self) {
        self.components.iter_mut().for_each(|(_, b)| b.reset());
    }

    fn reset_with(&mut self, flag: ResetFlag) {
        self.components.iter_mut().for_each(|(_, b)| b.reset_with(flag));
    }

    fn duplicate(&self) -> Self {
        Self {
            setup: Arc::clone(&self.setup),
            components: self
                .components
                .iter()
                .map(|(w, b)| (*w, b.duplicate()))
                .collect(),
            total_weight: self.total_weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::SemiAnalyticBasket;
    use crate::fixtures;
    use approx::assert_relative_eq;
    use tranche_models::Correlation;

    fn template() -> Basket {
        Basket::SemiAnalytic(SemiAnalyticBasket::new(
            fixtures::setup(20, 0.02).shared(),
            Correlation::single_factor(0.0).unwrap(),
        ))
    }

    fn mixture(weights: Vec<f64>, rhos: &[f64]) -> CorrelationMixture {
        CorrelationMixture::new(
            weights,
            rhos.iter()
                .map(|&r| Arc::new(Correlation::single_factor(r).unwrap()))
                .collect(),
        )
        .unwrap()
    }

    fn standalone(rho: f64, date: Date) -> f64 {
        SemiAnalyticBasket::new(
            fixtures::setup(20, 0.02).shared(),
            Correlation::single_factor(rho).unwrap(),
        )
        .accumulated_loss(date, 0.03, 0.07)
        .unwrap()
    }

    #[test]
    fn test_equal_weights_average_exactly() {
        let date = fixtures::maturity();
        let mut basket = MixtureBasket::new(&template(), &mixture(vec![2.0, 2.0], &[0.1, 0.5])).unwrap();
        let l1 = standalone(0.1, date);
        let l2 = standalone(0.5, date);
        assert_eq!(basket.accumulated_loss(date, 0.03, 0.07).unwrap(), (l1 + l2) / 2.0);
    }

    #[test]
    fn test_negligible_weight_skipped() {
        let basket =
            MixtureBasket::new(&template(), &mixture(vec![1.0, 1e-15], &[0.1, 0.5])).unwrap();
        assert_eq!(basket.components().len(), 1);
    }

    #[test]
    fn test_zero_total_weight_rejected() {
        let result = CorrelationMixture::new(
            vec![1.0, -1.0],
            vec![
                Arc::new(Correlation::single_factor(0.1).unwrap()),
                Arc::new(Correlation::single_factor(0.2).unwrap()),
            ],
        )
        .and_then(|m| MixtureBasket::new(&template(), &m));
        assert!(matches!(result, Err(BasketError::ZeroMixtureWeight { .. })));
    }

    #[test]
    fn test_duplicate_and_reset() {
        let date = fixtures::maturity();
        let mut basket = MixtureBasket::new(&template(), &mixture(vec![1.0, 3.0], &[0.1, 0.5])).unwrap();
        assert!(!basket.is_computed());
        let loss = basket.accumulated_loss(date, 0.0, 0.1).unwrap();
        assert!(basket.is_computed());
        let mut dup = basket.duplicate();
        assert!(!dup.is_computed());
        assert_eq!(dup.accumulated_loss(date, 0.0, 0.1).unwrap(), loss);
        basket.reset();
        assert!(!basket.is_computed());
    }

    #[test]
    fn test_distribution_is_weighted() {
        let date = fixtures::maturity();
        let levels = [0.05, 0.1];
        let basket = MixtureBasket::new(&template(), &mixture(vec![1.0, 3.0], &[0.1, 0.5])).unwrap();
        let dist = basket.calc_loss_distribution(false, date, &levels).unwrap();

        let component = |rho: f64| {
            SemiAnalyticBasket::new(
                fixtures::setup(20, 0.02).shared(),
                Correlation::single_factor(rho).unwrap(),
            )
            .calc_loss_distribution(false, date, &levels)
            .unwrap()
        };
        let (low, high) = (component(0.1), component(0.5));
        assert_eq!(dist.levels, low.levels);
        assert_eq!(dist.values.len(), 2);
        for j in 0..2 {
            assert_ne!(low.values[j], high.values[j]);
            assert_relative_eq!(
                dist.values[j],
                0.25 * low.values[j] + 0.75 * high.values[j],
                max_relative = 1e-14
            );
        }
    }
}
