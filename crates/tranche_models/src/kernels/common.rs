//! Building blocks shared by the kernels.

use super::KernelRequest;
use crate::error::BasketError;
use crate::surface::BasketSurfaces;
use std::ops::Range;
use tranche_core::math::distributions::{norm_cdf, norm_inv_cdf};
use tranche_core::math::quadrature::GaussHermite;
use tranche_core::types::Date;

/// `P(X < Φ⁻¹(p) | Z = z)` for `X = f Z + sqrt(1 - f²) ε`.
pub(crate) fn conditional_probability(p: f64, factor: f64, z: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let threshold = norm_inv_cdf(p);
    let residual = 1.0 - factor * factor;
    if residual <= 1e-14 {
        return if threshold > factor * z { 1.0 } else { 0.0 };
    }
    norm_cdf((threshold - factor * z) / residual.sqrt())
}

/// Splits default-first and refinance-first probabilities when both events
/// are possible by the same date, treating either order as equally likely.
pub(crate) fn competing(default_prob: f64, refinance_prob: f64) -> (f64, f64) {
    let both = default_prob * refinance_prob;
    (default_prob - 0.5 * both, refinance_prob - 0.5 * both)
}

/// Marginal data of one name at one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NameMarginal {
    /// Principal as a fraction of the pool.
    pub weight: f64,
    /// Unconditional default probability.
    pub default_prob: f64,
    /// Low and high recovery outcomes.
    pub recovery: (f64, f64),
    /// Unconditional refinancing probability.
    pub refinance_prob: f64,
    /// Factor loading of the refinancing time.
    pub refinance_factor: f64,
}

impl NameMarginal {
    /// Expected recovery.
    pub fn mean_recovery(&self) -> f64 {
        0.5 * (self.recovery.0 + self.recovery.1)
    }

    /// Whether the two recovery outcomes differ.
    pub fn has_dispersion(&self) -> bool {
        self.recovery.0 != self.recovery.1
    }
}

/// Marginals of every name at `date`. Names with zero principal get zero
/// weight and are skipped by the kernels.
pub(crate) fn marginals_at(
    request: &KernelRequest<'_>,
    date: Date,
) -> Result<Vec<NameMarginal>, BasketError> {
    let pool = request.pool;
    let total = pool.total_principal();
    if total <= 0.0 {
        return Err(BasketError::Configuration(
            "pool has no principal outstanding".into(),
        ));
    }
    let refinancing = pool.refinancing();
    let mut out = Vec::with_capacity(pool.len());
    for i in 0..pool.len() {
        let principal = pool.principals()[i];
        if principal == 0.0 {
            out.push(NameMarginal {
                weight: 0.0,
                default_prob: 0.0,
                recovery: (0.0, 0.0),
                refinance_prob: 0.0,
                refinance_factor: 0.0,
            });
            continue;
        }
        let (refinance_prob, refinance_factor) = match refinancing {
            Some(r) => (
                r.curves[i].default_probability(date)?,
                crate::correlation::signed_factor(r.correlations[i]),
            ),
            None => (0.0, 0.0),
        };
        out.push(NameMarginal {
            weight: principal / total,
            default_prob: pool.survival_curves()[i].default_probability(date)?,
            recovery: pool.recovery_curves()[i].outcomes(date),
            refinance_prob,
            refinance_factor,
        });
    }
    Ok(out)
}

/// Counterparty survival conditional on the factor, or 1 without one.
pub(crate) fn counterparty_survival(
    request: &KernelRequest<'_>,
    date: Date,
) -> Result<impl Fn(f64) -> f64, BasketError> {
    let (pd, factor) = match request.counterparty {
        Some(cp) => (cp.curve.default_probability(date)?, cp.factor),
        None => (0.0, 0.0),
    };
    Ok(move |z: f64| 1.0 - conditional_probability(pd, factor, z))
}

/// Level rows of one date: `scenarios × levels` values per surface plus the
/// scenario weights.
#[derive(Debug, Clone, Default)]
pub(crate) struct DateRows {
    pub loss: Vec<Vec<f64>>,
    pub amortization: Vec<Vec<f64>>,
    pub probability: Vec<Vec<f64>>,
    pub weights: Option<Vec<f64>>,
}

impl DateRows {
    pub fn zeros(n_scenarios: usize, n_levels: usize, with_probability: bool) -> Self {
        Self {
            loss: vec![vec![0.0; n_levels]; n_scenarios],
            amortization: vec![vec![0.0; n_levels]; n_scenarios],
            probability: if with_probability {
                vec![vec![0.0; n_levels]; n_scenarios]
            } else {
                Vec::new()
            },
            weights: None,
        }
    }
}

/// Conditional level values of one scenario.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConditionalRows {
    pub loss: Vec<f64>,
    pub amortization: Vec<f64>,
    pub probability: Vec<f64>,
}

/// Copies computed rows into the surfaces, date `start + offset` per entry.
pub(crate) fn write_rows(surfaces: &mut BasketSurfaces, start: usize, rows: Vec<DateRows>) {
    for (offset, date_rows) in rows.into_iter().enumerate() {
        let i = start + offset;
        for (k, row) in date_rows.loss.iter().enumerate() {
            surfaces.loss.row_mut(i, k).copy_from_slice(row);
        }
        for (k, row) in date_rows.amortization.iter().enumerate() {
            surfaces.amortization.row_mut(i, k).copy_from_slice(row);
        }
        if let Some(prob) = surfaces.probability.as_mut() {
            for (k, row) in date_rows.probability.iter().enumerate() {
                prob.row_mut(i, k).copy_from_slice(row);
            }
        }
        if let Some(weights) = date_rows.weights {
            for (k, w) in weights.into_iter().enumerate() {
                surfaces.set_scenario_weight(i, k, w);
            }
        }
    }
}

/// Runs `f` for every index of `range`, on the rayon pool when allowed.
#[cfg(feature = "parallel")]
pub(crate) fn map_range<T, F>(parallel: bool, range: Range<usize>, f: F) -> Result<Vec<T>, BasketError>
where
    T: Send,
    F: Fn(usize) -> Result<T, BasketError> + Sync + Send,
{
    use rayon::prelude::*;
    if parallel {
        range.into_par_iter().map(f).collect()
    } else {
        range.map(f).collect()
    }
}

/// Runs `f` for every index of `range`.
#[cfg(not(feature = "parallel"))]
pub(crate) fn map_range<T, F>(_parallel: bool, range: Range<usize>, f: F) -> Result<Vec<T>, BasketError>
where
    T: Send,
    F: Fn(usize) -> Result<T, BasketError> + Sync + Send,
{
    range.map(f).collect()
}

/// Integrates conditional rows over the Gaussian factor for every date from
/// `start`, or keeps one scenario per node for conditional requests.
///
/// `conditional(i, z)` returns the level rows at date index `i` given the
/// factor value `z`.
pub(crate) fn integrate_factor<F>(
    request: &KernelRequest<'_>,
    surfaces: &mut BasketSurfaces,
    start: usize,
    conditional: F,
) -> Result<(), BasketError>
where
    F: Fn(usize, f64) -> Result<ConditionalRows, BasketError> + Sync + Send,
{
    let rule = GaussHermite::new(request.options.quadrature_points)?;
    let n_levels = request.levels.len();
    let with_probability = surfaces.probability.is_some();
    let n_scenarios = surfaces.n_scenarios();
    if request.conditional && n_scenarios != rule.len() {
        return Err(BasketError::Configuration(format!(
            "conditional surfaces have {} scenarios for {} quadrature points",
            n_scenarios,
            rule.len()
        )));
    }

    let rows = map_range(request.options.parallel, start..request.dates.len(), |i| {
        let date = request.dates[i];
        let survive = counterparty_survival(request, date)?;
        let mut out = DateRows::zeros(n_scenarios, n_levels, with_probability);
        if request.conditional {
            out.weights = Some(rule.weights().to_vec());
        }
        for (k, (z, w)) in rule.iter().enumerate() {
            let rows = conditional(i, z)?;
            let (slot, scale) = if request.conditional {
                (k, survive(z))
            } else {
                (0, w * survive(z))
            };
            accumulate(&mut out.loss[slot], &rows.loss, scale);
            accumulate(&mut out.amortization[slot], &rows.amortization, scale);
            if with_probability {
                accumulate(&mut out.probability[slot], &rows.probability, scale);
            }
        }
        Ok(out)
    })?;
    write_rows(surfaces, start, rows);
    Ok(())
}

fn accumulate(dst: &mut [f64], src: &[f64], scale: f64) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += scale * s;
    }
}

/// Validates the request against the surfaces it will fill.
pub(crate) fn check_shape(
    request: &KernelRequest<'_>,
    surfaces: &BasketSurfaces,
    start: usize,
) -> Result<(), BasketError> {
    if surfaces.levels() != request.levels || surfaces.loss.n_dates() != request.dates.len() {
        return Err(BasketError::Configuration(format!(
            "surfaces shaped {}×{} for a request of {}×{}",
            surfaces.loss.n_dates(),
            surfaces.levels().len(),
            request.dates.len(),
            request.levels.len()
        )));
    }
    if start > request.dates.len() {
        return Err(BasketError::InvalidArgument(format!(
            "start index {} beyond {} dates",
            start,
            request.dates.len()
        )));
    }
    Ok(())
}
