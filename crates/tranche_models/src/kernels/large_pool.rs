//! Large homogeneous pool approximation.
//!
//! Conditional on the common factor the pool loss is taken to be its
//! conditional expectation, `L(z) = Σ w_i (1 - R_i) p_i(z)`. Surfaces follow
//! by integrating `min(L(z), ℓ)` against the factor density.

use super::common::{check_shape, competing, conditional_probability, integrate_factor, marginals_at, ConditionalRows};
use super::{DistributionKernel, KernelRequest};
use crate::error::BasketError;
use crate::surface::BasketSurfaces;
use tracing::trace;

/// Vasicek-style large pool kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargePoolKernel;

impl LargePoolKernel {
    /// Creates the kernel.
    pub fn new() -> Self {
        Self
    }
}

impl DistributionKernel for LargePoolKernel {
    fn name(&self) -> &'static str {
        "large pool"
    }

    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError> {
        check_shape(request, surfaces, start)?;
        request.require_gaussian("the large pool kernel")?;
        trace!(start, dates = request.dates.len(), "large pool kernel");

        let marginals = (0..request.dates.len())
            .map(|i| {
                if i < start {
                    Ok(Vec::new())
                } else {
                    marginals_at(request, request.dates[i])
                }
            })
            .collect::<Result<Vec<_>, BasketError>>()?;
        let factors = (0..request.dates.len())
            .map(|i| {
                if i < start {
                    Ok(Vec::new())
                } else {
                    request
                        .dependence
                        .factors_at(i, "the large pool kernel")
                        .map(<[f64]>::to_vec)
                }
            })
            .collect::<Result<Vec<_>, BasketError>>()?;

        let levels = request.levels;
        integrate_factor(request, surfaces, start, |i, z| {
            let (mut loss, mut amort) = (0.0, 0.0);
            for (m, &f) in marginals[i].iter().zip(&factors[i]) {
                if m.weight == 0.0 {
                    continue;
                }
                let pd = conditional_probability(m.default_prob, f, z);
                let pr = conditional_probability(m.refinance_prob, m.refinance_factor, z);
                let (d, r) = competing(pd, pr);
                let recovery = m.mean_recovery();
                loss += m.weight * (1.0 - recovery) * d;
                amort += m.weight * (recovery * d + r);
            }
            Ok(ConditionalRows {
                loss: levels.iter().map(|&l| loss.min(l)).collect(),
                amortization: levels.iter().map(|&l| amort.min(l)).collect(),
                probability: levels
                    .iter()
                    .map(|&l| if loss <= l { 1.0 } else { 0.0 })
                    .collect(),
            })
        })
    }
}
