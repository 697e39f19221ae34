//! Semi-analytic one-factor Gaussian kernel.
//!
//! Conditional on the common factor names default independently. The
//! conditional loss and amortization distributions are built by recursion
//! on a loss lattice, name by name, and integrated over the factor with
//! Gauss-Hermite quadrature. Recovery dispersion enters as two equally
//! likely recovery outcomes per name.

use super::common::{
    check_shape, competing, conditional_probability, integrate_factor, marginals_at,
    ConditionalRows, NameMarginal,
};
use super::lattice::LossLattice;
use super::{DistributionKernel, KernelRequest};
use crate::error::BasketError;
use crate::surface::BasketSurfaces;
use tracing::trace;

/// Conditional recursion kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursionKernel;

impl RecursionKernel {
    /// Creates the kernel.
    pub fn new() -> Self {
        Self
    }
}

/// Conditional level rows from per-name conditional default and
/// refinancing probabilities.
pub(crate) fn lattice_rows(
    marginals: &[NameMarginal],
    default_probs: &[f64],
    refinance_probs: &[f64],
    levels: &[f64],
    granularity: f64,
    with_probability: bool,
) -> ConditionalRows {
    let n = marginals.len();
    let mut loss = LossLattice::new(granularity, n);
    let mut amort = LossLattice::new(granularity, n);
    let mut outcomes = Vec::with_capacity(6);

    for ((m, &pd), &pr) in marginals.iter().zip(default_probs).zip(refinance_probs) {
        if m.weight == 0.0 {
            continue;
        }
        let (d, r) = competing(pd, pr);
        let (lo, hi) = m.recovery;
        let half = if m.has_dispersion() { 0.5 } else { 1.0 };

        outcomes.clear();
        loss.split(m.weight * (1.0 - lo), d * half, &mut outcomes);
        if m.has_dispersion() {
            loss.split(m.weight * (1.0 - hi), d * half, &mut outcomes);
        }
        loss.add_name(&outcomes);

        outcomes.clear();
        amort.split(m.weight * lo, d * half, &mut outcomes);
        if m.has_dispersion() {
            amort.split(m.weight * hi, d * half, &mut outcomes);
        }
        amort.split(m.weight, r, &mut outcomes);
        amort.add_name(&outcomes);
    }

    let mut rows = ConditionalRows {
        loss: vec![0.0; levels.len()],
        amortization: vec![0.0; levels.len()],
        probability: Vec::new(),
    };
    loss.expected_capped(levels, &mut rows.loss);
    amort.expected_capped(levels, &mut rows.amortization);
    if with_probability {
        rows.probability = vec![0.0; levels.len()];
        loss.cumulative(levels, &mut rows.probability);
    }
    rows
}

impl DistributionKernel for RecursionKernel {
    fn name(&self) -> &'static str {
        "recursion"
    }

    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError> {
        check_shape(request, surfaces, start)?;
        request.require_gaussian("the recursion kernel")?;
        trace!(start, dates = request.dates.len(), "recursion kernel");

        let n_dates = request.dates.len();
        let mut marginals = vec![Vec::new(); n_dates];
        let mut factors = vec![Vec::new(); n_dates];
        for i in start..n_dates {
            marginals[i] = marginals_at(request, request.dates[i])?;
            factors[i] = request
                .dependence
                .factors_at(i, "the recursion kernel")?
                .to_vec();
        }

        let granularity = request.options.loss_granularity;
        let with_probability = surfaces.probability.is_some();
        let levels = request.levels;
        integrate_factor(request, surfaces, start, |i, z| {
            let default_probs: Vec<f64> = marginals[i]
                .iter()
                .zip(&factors[i])
                .map(|(m, &f)| conditional_probability(m.default_prob, f, z))
                .collect();
            let refinance_probs: Vec<f64> = marginals[i]
                .iter()
                .map(|m| conditional_probability(m.refinance_prob, m.refinance_factor, z))
                .collect();
            Ok(lattice_rows(
                &marginals[i],
                &default_probs,
                &refinance_probs,
                levels,
                granularity,
                with_probability,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::fixtures;
    use crate::kernels::LargePoolKernel;
    use crate::pool::{CreditPool, Refinancing};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};

    #[test]
    fn test_independent_single_name_is_exact() {
        let pool = fixtures::pool(1, 0.05, 0.4);
        let (dates, options) = (fixtures::dates(), fixtures::options());
        let levels = vec![0.0, 0.3, 0.6, 1.0];
        let dep = fixtures::flat(0.0, 1);
        let mut request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        request.want_probability = true;
        let s = fixtures::run(&RecursionKernel::new(), &request);

        let pd = pool.survival_curves()[0].default_probability(dates[2]).unwrap();
        assert_relative_eq!(s.loss.value(2, 1, 0), 0.3 * pd, epsilon = 1e-10);
        assert_relative_eq!(s.loss.value(2, 3, 0), 0.6 * pd, epsilon = 1e-10);
        assert_relative_eq!(s.amortization.value(2, 3, 0), 0.4 * pd, epsilon = 1e-10);
        let prob = s.probability.as_ref().unwrap();
        assert_relative_eq!(prob.value(2, 1, 0), 1.0 - pd, epsilon = 1e-10);
        assert_relative_eq!(prob.value(2, 2, 0), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_expected_loss_matches_pool_and_is_monotone() {
        let pool = fixtures::pool(25, 0.02, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.45, 25);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let s = fixtures::run(&RecursionKernel, &request);
        assert!(s.loss.is_monotone(1e-14));
        for (i, &date) in dates.iter().enumerate() {
            let el = pool.expected_loss_fraction(date).unwrap();
            assert_relative_eq!(s.loss.value(i, levels.len() - 1, 0), el, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_large_pool_limit() {
        // Equity tranche values approach the large pool kernel for many small names
        let pool = fixtures::pool(100, 0.02, 0.4);
        let (dates, levels, mut options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        options.loss_granularity = 0.002;
        let dep = fixtures::flat(0.5, 100);
        let request = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let exact = fixtures::run(&RecursionKernel, &request);
        let lhp = fixtures::run(&LargePoolKernel, &request);
        assert_relative_eq!(exact.loss.value(3, 1, 0), lhp.loss.value(3, 1, 0), max_relative = 0.05);
    }

    #[test]
    fn test_dispersion_keeps_expected_loss() {
        let as_of = fixtures::as_of();
        let with = CreditPool::homogeneous(
            10,
            Arc::new(SurvivalCurve::flat(as_of, 0.03)),
            Arc::new(RecoveryCurve::with_dispersion(0.4, 0.2).unwrap()),
            1.0,
        );
        let without = fixtures::pool(10, 0.03, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.3, 10);
        let a = fixtures::run(&RecursionKernel, &KernelRequest::new(&with, as_of, &dates, &levels, &dep, &options));
        let b = fixtures::run(&RecursionKernel, &KernelRequest::new(&without, as_of, &dates, &levels, &dep, &options));
        let top = levels.len() - 1;
        assert_relative_eq!(a.loss.value(3, top, 0), b.loss.value(3, top, 0), epsilon = 1e-9);
        // Dispersion widens the distribution, so the thin equity piece loses more
        assert!(a.loss.value(3, 1, 0) != b.loss.value(3, 1, 0));
    }

    #[test]
    fn test_refinancing_amortizes_principal() {
        let as_of = fixtures::as_of();
        let pool = fixtures::pool(4, 0.0, 0.4)
            .with_refinancing(Refinancing {
                curves: vec![Arc::new(SurvivalCurve::flat(as_of, 0.1)); 4],
                correlations: vec![0.0; 4],
            })
            .unwrap();
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.0, 4);
        let s = fixtures::run(&RecursionKernel, &KernelRequest::new(&pool, as_of, &dates, &levels, &dep, &options));
        let q = 1.0 - (-0.1f64 * 1827.0 / 365.0).exp();
        let top = levels.len() - 1;
        assert_relative_eq!(s.amortization.value(3, top, 0), q, epsilon = 1e-10);
        assert_eq!(s.loss.value(3, top, 0), 0.0);
    }

    #[test]
    fn test_conditional_slices_collapse_to_unconditional() {
        let pool = fixtures::pool(8, 0.03, 0.4);
        let (dates, levels, options) = (fixtures::dates(), fixtures::levels(), fixtures::options());
        let dep = fixtures::flat(0.4, 8);
        let plain = KernelRequest::new(&pool, fixtures::as_of(), &dates, &levels, &dep, &options);
        let mut conditional = plain.clone();
        conditional.conditional = true;
        let full = fixtures::run(&RecursionKernel, &plain);
        let slices = fixtures::run(&RecursionKernel, &conditional);
        assert_eq!(slices.n_scenarios(), options.quadrature_points);
        let collapsed = slices.collapse().unwrap();
        for j in 0..levels.len() {
            assert_relative_eq!(collapsed.loss.value(2, j, 0), full.loss.value(2, j, 0), epsilon = 1e-13);
        }
    }
}
