//! Monte Carlo kernel for CDO² baskets.
//!
//! Default times are simulated exactly as for a single-layer basket. Each
//! path's per-sub-basket loss amounts are then mapped to the outer surface
//! coordinate by [`NestedStructure::surface_loss`]. Amortization is not
//! tracked through the inner tranches and stays zero.

use super::common::{check_shape, write_rows};
use super::monte_carlo::simulate;
use super::{DistributionKernel, KernelRequest};
use crate::error::BasketError;
use crate::nesting::NestedStructure;
use crate::surface::BasketSurfaces;
use std::sync::Arc;
use tracing::debug;

/// Monte Carlo kernel over a nested structure.
#[derive(Debug, Clone)]
pub struct NestedMonteCarloKernel {
    structure: Arc<NestedStructure>,
    seed: u64,
}

impl NestedMonteCarloKernel {
    /// Creates the kernel.
    ///
    /// # Errors
    /// `BasketError::Configuration` unless `seed` is positive.
    pub fn new(structure: Arc<NestedStructure>, seed: i64) -> Result<Self, BasketError> {
        if seed <= 0 {
            return Err(BasketError::Configuration(format!(
                "nested Monte Carlo needs a positive seed, got {}",
                seed
            )));
        }
        Ok(Self {
            structure,
            seed: seed as u64,
        })
    }

    /// The nested structure.
    pub fn structure(&self) -> &NestedStructure {
        &self.structure
    }

    /// Seed in use.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DistributionKernel for NestedMonteCarloKernel {
    fn name(&self) -> &'static str {
        "nested Monte Carlo"
    }

    fn n_scenarios(&self, _request: &KernelRequest<'_>) -> usize {
        1
    }

    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError> {
        check_shape(request, surfaces, start)?;
        let structure = &*self.structure;
        if structure.n_names() != request.pool.len() {
            return Err(BasketError::Configuration(format!(
                "nested structure spans {} names, pool has {}",
                structure.n_names(),
                request.pool.len()
            )));
        }
        if request.conditional {
            return Err(BasketError::NotImplemented(
                "conditional slices from the nested Monte Carlo kernel".into(),
            ));
        }
        debug!(
            seed = self.seed,
            sub_baskets = structure.sub_baskets().len(),
            cross_subordination = structure.cross_subordination(),
            "nested Monte Carlo kernel"
        );

        let n_baskets = structure.sub_baskets().len();
        let rows = simulate(
            request,
            start,
            self.seed,
            surfaces.probability.is_some(),
            |state, i| {
                let mut losses = vec![0.0; n_baskets];
                for name in 0..structure.n_names() {
                    if !state.defaulted_by(name, i) {
                        continue;
                    }
                    let lgd = 1.0 - state.recovery(name);
                    for (loss, sub) in losses.iter_mut().zip(structure.sub_baskets()) {
                        *loss += sub.principals[name] * lgd;
                    }
                }
                (structure.surface_loss(&losses), 0.0)
            },
        )?;
        write_rows(surfaces, start, rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{fixtures, MonteCarloKernel, Seed};
    use crate::nesting::SubBasket;
    use approx::assert_relative_eq;

    fn structure(cross: bool) -> Arc<NestedStructure> {
        Arc::new(
            NestedStructure::new(
                vec![
                    SubBasket::new(vec![1.0; 6].into_iter().chain(vec![0.0; 4]).collect(), 0.0, 0.2)
                        .unwrap(),
                    SubBasket::new(vec![0.0; 4].into_iter().chain(vec![1.0; 6]).collect(), 0.05, 0.3)
                        .unwrap(),
                ],
                cross,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_seed_must_be_positive() {
        assert!(matches!(
            NestedMonteCarloKernel::new(structure(false), 0),
            Err(BasketError::Configuration(_))
        ));
        assert!(NestedMonteCarloKernel::new(structure(false), -5).is_err());
        assert_eq!(NestedMonteCarloKernel::new(structure(false), 9).unwrap().seed(), 9);
    }

    #[test]
    fn test_amortization_is_zero_and_loss_bounded() {
        let pool = fixtures::pool(10, 0.05, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.5, 10);
        let mut request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        request.want_probability = true;
        let kernel = NestedMonteCarloKernel::new(structure(true), 17).unwrap();
        let s = fixtures::run(&kernel, &request);
        let top = levels.len() - 1;
        for i in 0..dates.len() {
            assert!(s.amortization.row(i, 0).iter().all(|&v| v == 0.0));
            assert!(s.loss.value(i, top, 0) <= 1.0);
        }
        assert!(s.loss.value(3, top, 0) > 0.0);
        assert!(s.probability.as_ref().unwrap().is_monotone(0.0));
        assert_eq!(s.loss.value(0, top, 0), 0.0);
    }

    #[test]
    fn test_single_full_range_basket_matches_plain_monte_carlo() {
        let pool = fixtures::pool(8, 0.04, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.4, 8);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let nested = Arc::new(
            NestedStructure::new(vec![SubBasket::new(vec![1.0; 8], 0.0, 1.0).unwrap()], false).unwrap(),
        );
        let a = fixtures::run(&NestedMonteCarloKernel::new(nested, 21).unwrap(), &request);
        let b = fixtures::run(&MonteCarloKernel::new(Seed::Fixed(21)), &request);
        for i in 0..dates.len() {
            for (x, y) in a.loss.row(i, 0).iter().zip(b.loss.row(i, 0)) {
                assert_relative_eq!(x, y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_name_count_mismatch() {
        let pool = fixtures::pool(4, 0.05, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.4, 4);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let kernel = NestedMonteCarloKernel::new(structure(false), 3).unwrap();
        let mut s = request.surfaces_for(&kernel);
        assert!(matches!(
            kernel.compute(&request, &mut s, 0),
            Err(BasketError::Configuration(_))
        ));
    }
}
