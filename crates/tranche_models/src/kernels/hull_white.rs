//! Hull-White dynamic jump kernel.
//!
//! A common Poisson process with intensity `γ` drives every name: each jump
//! multiplies all survival probabilities by `e^{-h}`. Given `j` jumps by
//! time `t` names default independently with
//!
//! ```text
//! S(t | j) = exp(-max(a(t) + j h, 0)),   a(t) = -ln S(t) + γ t (e^{-h} - 1)
//! ```
//!
//! which reproduces the marginal `S(t)` whenever the floor is inactive.
//! Jump counts above `max_jumps` are dropped and the Poisson weights
//! renormalised. In conditional mode each jump count is one scenario.

use super::common::{check_shape, map_range, marginals_at, write_rows, DateRows};
use super::recursion::lattice_rows;
use super::{DistributionKernel, KernelRequest};
use crate::error::BasketError;
use crate::surface::BasketSurfaces;
use serde::{Deserialize, Serialize};
use tracing::trace;
use tranche_core::types::DayCountConvention;

/// Jump intensity and size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HullWhiteParams {
    /// Poisson intensity `γ`, per year.
    pub intensity: f64,
    /// Integrated hazard added by one jump.
    pub jump_size: f64,
}

impl HullWhiteParams {
    /// Validated parameters.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` for a negative or non-finite value.
    pub fn new(intensity: f64, jump_size: f64) -> Result<Self, BasketError> {
        for (name, v) in [("intensity", intensity), ("jump size", jump_size)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(BasketError::InvalidArgument(format!(
                    "Hull-White {} must be finite and non-negative, got {}",
                    name, v
                )));
            }
        }
        Ok(Self {
            intensity,
            jump_size,
        })
    }
}

/// Poisson probabilities of `0..=max_jumps` jumps, renormalised.
fn jump_weights(mean: f64, max_jumps: usize) -> Vec<f64> {
    let mut weights = Vec::with_capacity(max_jumps + 1);
    let mut p = (-mean).exp();
    weights.push(p);
    for j in 1..=max_jumps {
        p *= mean / j as f64;
        weights.push(p);
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    }
    weights
}

/// Dynamic kernel driven by common Poisson jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullWhiteKernel {
    params: HullWhiteParams,
}

impl HullWhiteKernel {
    /// Creates the kernel.
    pub fn new(params: HullWhiteParams) -> Self {
        Self { params }
    }

    /// Model parameters.
    pub fn params(&self) -> HullWhiteParams {
        self.params
    }
}

impl DistributionKernel for HullWhiteKernel {
    fn name(&self) -> &'static str {
        "Hull-White"
    }

    fn n_scenarios(&self, request: &KernelRequest<'_>) -> usize {
        if request.conditional {
            request.options.max_jumps + 1
        } else {
            1
        }
    }

    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError> {
        check_shape(request, surfaces, start)?;
        request.require_gaussian("the Hull-White kernel")?;
        if request.counterparty.is_some() {
            return Err(BasketError::NotImplemented(
                "counterparty conditioning under the Hull-White kernel".into(),
            ));
        }
        let max_jumps = request.options.max_jumps;
        let n_scenarios = surfaces.n_scenarios();
        if n_scenarios != self.n_scenarios(request) {
            return Err(BasketError::Configuration(format!(
                "Hull-White surfaces have {} scenarios, expected {}",
                n_scenarios,
                self.n_scenarios(request)
            )));
        }
        trace!(
            intensity = self.params.intensity,
            jump_size = self.params.jump_size,
            max_jumps,
            start,
            "Hull-White kernel"
        );

        let HullWhiteParams {
            intensity,
            jump_size,
        } = self.params;
        let granularity = request.options.loss_granularity;
        let with_probability = surfaces.probability.is_some();
        let n_levels = request.levels.len();

        let rows = map_range(request.options.parallel, start..request.dates.len(), |i| {
            let date = request.dates[i];
            let t = DayCountConvention::ActualActual365
                .year_fraction_dates(request.as_of, date)
                .max(0.0);
            let mean = intensity * t;
            let weights = jump_weights(mean, max_jumps);
            let marginals = marginals_at(request, date)?;
            let drift: Vec<f64> = marginals
                .iter()
                .map(|m| -(1.0 - m.default_prob).ln() + mean * ((-jump_size).exp() - 1.0))
                .collect();
            let refinance_probs: Vec<f64> = marginals.iter().map(|m| m.refinance_prob).collect();

            let mut out = DateRows::zeros(n_scenarios, n_levels, with_probability);
            if request.conditional {
                out.weights = Some(weights.clone());
            }
            for (j, &w) in weights.iter().enumerate() {
                let default_probs: Vec<f64> = drift
                    .iter()
                    .map(|&a| {
                        if a.is_infinite() {
                            1.0
                        } else {
                            1.0 - (-(a + j as f64 * jump_size).max(0.0)).exp()
                        }
                    })
                    .collect();
                let rows = lattice_rows(
                    &marginals,
                    &default_probs,
                    &refinance_probs,
                    request.levels,
                    granularity,
                    with_probability,
                );
                let (slot, scale) = if request.conditional { (j, 1.0) } else { (0, w) };
                for (d, s) in out.loss[slot].iter_mut().zip(&rows.loss) {
                    *d += scale * s;
                }
                for (d, s) in out.amortization[slot].iter_mut().zip(&rows.amortization) {
                    *d += scale * s;
                }
                if with_probability {
                    for (d, s) in out.probability[slot].iter_mut().zip(&rows.probability) {
                        *d += scale * s;
                    }
                }
            }
            Ok(out)
        })?;
        write_rows(surfaces, start, rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::{fixtures, Copula, CounterpartyRisk, RecursionKernel};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use tranche_core::market_data::SurvivalCurve;

    #[test]
    fn test_jump_weights_are_poisson() {
        let w = jump_weights(1.5, 60);
        assert_eq!(w.len(), 61);
        assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert_relative_eq!(w[0], (-1.5f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(w[2], 1.5 * 1.5 / 2.0 * (-1.5f64).exp(), epsilon = 1e-12);
        assert_eq!(jump_weights(0.0, 3), vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_params_validation() {
        assert!(HullWhiteParams::new(0.1, 0.2).is_ok());
        assert!(HullWhiteParams::new(-0.1, 0.2).is_err());
        assert!(HullWhiteParams::new(0.1, f64::NAN).is_err());
    }

    #[test]
    fn test_no_jumps_is_independent_recursion() {
        let pool = fixtures::pool(10, 0.03, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.0, 10);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let hw = fixtures::run(&HullWhiteKernel::new(HullWhiteParams::new(0.0, 0.5).unwrap()), &request);
        let independent = fixtures::run(&RecursionKernel, &request);
        for i in 0..dates.len() {
            for (a, b) in hw.loss.row(i, 0).iter().zip(independent.loss.row(i, 0)) {
                assert_relative_eq!(a, b, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_jumps_preserve_expected_loss_and_fatten_tail() {
        let pool = fixtures::pool(20, 0.04, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.0, 20);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let calm = fixtures::run(&HullWhiteKernel::new(HullWhiteParams::new(0.0, 0.0).unwrap()), &request);
        let jumpy = fixtures::run(&HullWhiteKernel::new(HullWhiteParams::new(0.05, 0.3).unwrap()), &request);
        let top = levels.len() - 1;
        let el = pool.expected_loss_fraction(dates[3]).unwrap();
        assert_relative_eq!(jumpy.loss.value(3, top, 0), el, max_relative = 1e-3);
        // Senior exposure E[L] - E[min(L, 0.15)] grows with jump risk
        let senior = |s: &BasketSurfaces| s.loss.value(3, top, 0) - s.loss.value(3, 4, 0);
        assert!(senior(&jumpy) > senior(&calm));
        assert!(jumpy.loss.is_monotone(0.0));
    }

    #[test]
    fn test_conditional_slices_collapse() {
        let pool = fixtures::pool(8, 0.04, 0.4);
        let (dates, levels, mut options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        options.max_jumps = 20;
        let dep = fixtures::flat(0.0, 8);
        let kernel = HullWhiteKernel::new(HullWhiteParams::new(0.3, 0.2).unwrap());
        let mut request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let unconditional = fixtures::run(&kernel, &request);
        request.conditional = true;
        let conditional = fixtures::run(&kernel, &request);
        assert_eq!(conditional.n_scenarios(), 21);
        let collapsed = conditional.collapse().unwrap();
        for i in 0..dates.len() {
            for (a, b) in collapsed.loss.row(i, 0).iter().zip(unconditional.loss.row(i, 0)) {
                assert_relative_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rejects_counterparty_and_student_t() {
        let pool = fixtures::pool(4, 0.04, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.0, 4);
        let kernel = HullWhiteKernel::new(HullWhiteParams::new(0.1, 0.1).unwrap());
        let cp = CounterpartyRisk {
            curve: Arc::new(SurvivalCurve::flat(fixtures::as_of(), 0.02)),
            factor: 0.3,
        };
        let mut request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        request.counterparty = Some(&cp);
        let mut s = request.surfaces_for(&kernel);
        assert!(matches!(
            kernel.compute(&request, &mut s, 0),
            Err(BasketError::NotImplemented(_))
        ));
        request.counterparty = None;
        request.copula = Copula::StudentT { dof: 5.0 };
        assert!(matches!(
            kernel.compute(&request, &mut s, 0),
            Err(BasketError::UnsupportedCopula { .. })
        ));
    }
}
