//! Monte Carlo default-time simulation.
//!
//! Each path draws a common factor, idiosyncratic shocks, recovery coins and
//! (when present) refinancing and counterparty shocks, then records the first
//! grid date at which each name's latent variable falls below its default
//! threshold. Paths are split into fixed-size chunks with their own seeds,
//! and chunk totals are summed in chunk order, so a surface does not depend
//! on how many threads ran it.

use super::common::{check_shape, map_range, marginals_at, write_rows, DateRows};
use super::{Copula, Dependence, DistributionKernel, KernelRequest, Seed};
use crate::error::BasketError;
use crate::surface::BasketSurfaces;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{ChiSquared, Distribution, StandardNormal};
use tracing::{debug, trace};
use tranche_core::math::distributions::{norm_inv_cdf, student_t_cdf};

const NEVER: usize = usize::MAX;

/// Simulated event dates of one path, as grid date indices.
#[derive(Debug, Clone)]
pub(crate) struct PathState {
    default_at: Vec<usize>,
    refinance_at: Vec<usize>,
    recovery: Vec<f64>,
    counterparty_default_at: usize,
}

impl PathState {
    fn new(n: usize) -> Self {
        Self {
            default_at: vec![NEVER; n],
            refinance_at: vec![NEVER; n],
            recovery: vec![0.0; n],
            counterparty_default_at: NEVER,
        }
    }

    /// Name `n` defaulted by date index `i`, before any refinancing.
    pub fn defaulted_by(&self, n: usize, i: usize) -> bool {
        self.default_at[n] <= i && self.default_at[n] <= self.refinance_at[n]
    }

    /// Name `n` refinanced by date index `i`, before defaulting.
    pub fn refinanced_by(&self, n: usize, i: usize) -> bool {
        self.refinance_at[n] <= i && self.refinance_at[n] < self.default_at[n]
    }

    /// Recovery realised by name `n` at its default.
    pub fn recovery(&self, n: usize) -> f64 {
        self.recovery[n]
    }
}

/// Thresholds and loadings for every simulated date.
struct PathPlan {
    start: usize,
    n_dates: usize,
    weights: Vec<f64>,
    copula: Copula,
    chi_squared: Option<ChiSquared<f64>>,
    /// Gaussian: `Φ⁻¹(pd)`; Student-t: `pd`. Indexed `[i - start][n]`.
    default_thresholds: Vec<Vec<f64>>,
    /// One-factor loadings `[i - start][n]`, absent for a pairwise matrix.
    loadings: Option<Vec<Vec<f64>>>,
    cholesky: Option<Vec<f64>>,
    recovery: Vec<Vec<(f64, f64)>>,
    refinancing: Option<(Vec<Vec<f64>>, Vec<f64>)>,
    counterparty: Option<(Vec<f64>, f64)>,
}

impl PathPlan {
    fn build(request: &KernelRequest<'_>, start: usize) -> Result<Self, BasketError> {
        let n_dates = request.dates.len();
        let n = request.pool.len();
        let chi_squared = match request.copula {
            Copula::Gaussian => None,
            Copula::StudentT { dof } => Some(ChiSquared::new(dof).map_err(|e| {
                BasketError::Configuration(format!("Student-t degrees of freedom {}: {}", dof, e))
            })?),
        };

        let mut weights = vec![0.0; n];
        let mut default_thresholds = Vec::with_capacity(n_dates - start);
        let mut recovery = Vec::with_capacity(n_dates - start);
        let mut refi_thresholds = Vec::with_capacity(n_dates - start);
        let mut refi_factors = vec![0.0; n];
        for i in start..n_dates {
            let marginals = marginals_at(request, request.dates[i])?;
            default_thresholds.push(
                marginals
                    .iter()
                    .map(|m| match request.copula {
                        Copula::Gaussian => norm_inv_cdf(m.default_prob),
                        Copula::StudentT { .. } => m.default_prob,
                    })
                    .collect(),
            );
            recovery.push(marginals.iter().map(|m| m.recovery).collect());
            refi_thresholds.push(
                marginals
                    .iter()
                    .map(|m| norm_inv_cdf(m.refinance_prob))
                    .collect::<Vec<_>>(),
            );
            for (k, m) in marginals.iter().enumerate() {
                weights[k] = m.weight;
                refi_factors[k] = m.refinance_factor;
            }
        }

        let (loadings, cholesky) = match request.dependence {
            Dependence::Matrix(m) => (None, Some(m.cholesky()?)),
            Dependence::Factors(_) => {
                let rows = (start..n_dates)
                    .map(|i| {
                        request
                            .dependence
                            .factors_at(i, "Monte Carlo")
                            .map(<[f64]>::to_vec)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(rows), None)
            }
        };

        let counterparty = match request.counterparty {
            Some(cp) => {
                let thresholds = (start..n_dates)
                    .map(|i| Ok(norm_inv_cdf(cp.curve.default_probability(request.dates[i])?)))
                    .collect::<Result<Vec<_>, BasketError>>()?;
                Some((thresholds, cp.factor))
            }
            None => None,
        };

        Ok(Self {
            start,
            n_dates,
            weights,
            copula: request.copula,
            chi_squared,
            default_thresholds,
            loadings,
            cholesky,
            recovery,
            refinancing: request
                .pool
                .has_refinancing()
                .then_some((refi_thresholds, refi_factors)),
            counterparty,
        })
    }

    fn first_hit<F: Fn(usize) -> bool>(&self, hit: F) -> usize {
        (self.start..self.n_dates).find(|&i| hit(i)).unwrap_or(NEVER)
    }

    fn draw(&self, rng: &mut StdRng, eps: &mut [f64], state: &mut PathState) {
        let n = self.weights.len();
        let z: f64 = rng.sample(StandardNormal);
        let scale = match (&self.chi_squared, self.copula) {
            (Some(chi), Copula::StudentT { dof }) => (dof / chi.sample(rng)).sqrt(),
            _ => 1.0,
        };
        for e in eps.iter_mut() {
            *e = rng.sample(StandardNormal);
        }
        let correlated: Option<Vec<f64>> = self.cholesky.as_ref().map(|l| {
            (0..n)
                .map(|r| (0..=r).map(|c| l[r * n + c] * eps[c]).sum())
                .collect()
        });

        for k in 0..n {
            let coin: f64 = rng.gen();
            state.default_at[k] = NEVER;
            if self.weights[k] == 0.0 {
                continue;
            }
            let latent = |i: usize| -> f64 {
                match (&correlated, &self.loadings) {
                    (Some(x), _) => x[k],
                    (None, Some(rows)) => {
                        let f = rows[i - self.start][k];
                        f * z + (1.0 - f * f).max(0.0).sqrt() * eps[k]
                    }
                    (None, None) => eps[k],
                }
            };
            state.default_at[k] = self.first_hit(|i| {
                let threshold = self.default_thresholds[i - self.start][k];
                match self.copula {
                    Copula::Gaussian => latent(i) < threshold,
                    Copula::StudentT { dof } => student_t_cdf(scale * latent(i), dof) < threshold,
                }
            });
            if state.default_at[k] != NEVER {
                let (lo, hi) = self.recovery[state.default_at[k] - self.start][k];
                state.recovery[k] = if coin < 0.5 { lo } else { hi };
            }
        }

        if let Some((thresholds, factors)) = &self.refinancing {
            for k in 0..n {
                let eta: f64 = rng.sample(StandardNormal);
                let g = factors[k];
                let y = g * z + (1.0 - g * g).max(0.0).sqrt() * eta;
                state.refinance_at[k] = if self.weights[k] == 0.0 {
                    NEVER
                } else {
                    self.first_hit(|i| y < thresholds[i - self.start][k])
                };
            }
        }

        if let Some((thresholds, f)) = &self.counterparty {
            let e: f64 = rng.sample(StandardNormal);
            let x = f * z + (1.0 - f * f).max(0.0).sqrt() * e;
            state.counterparty_default_at = self.first_hit(|i| x < thresholds[i - self.start]);
        }
    }
}

/// Chunk seed derived from the kernel seed.
fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    seed ^ (chunk as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Simulates every path and bins `outcome(state, i)`, a `(loss, amortization)`
/// pair on the surface scale, into level rows for dates from `start`.
pub(crate) fn simulate<F>(
    request: &KernelRequest<'_>,
    start: usize,
    seed: u64,
    with_probability: bool,
    outcome: F,
) -> Result<Vec<DateRows>, BasketError>
where
    F: Fn(&PathState, usize) -> (f64, f64) + Sync + Send,
{
    let plan = PathPlan::build(request, start)?;
    let options = request.options;
    let levels = request.levels;
    let n_levels = levels.len();
    let n_rows = request.dates.len() - start;
    let n_names = request.pool.len();
    let n_chunks = options.sample_size.div_ceil(options.chunk_size);

    let chunks = map_range(options.parallel, 0..n_chunks, |c| {
        let paths = options.chunk_size.min(options.sample_size - c * options.chunk_size);
        let mut rng = StdRng::seed_from_u64(chunk_seed(seed, c));
        let mut rows: Vec<DateRows> = (0..n_rows)
            .map(|_| DateRows::zeros(1, n_levels, with_probability))
            .collect();
        let mut state = PathState::new(n_names);
        let mut eps = vec![0.0; n_names];
        for _ in 0..paths {
            plan.draw(&mut rng, &mut eps, &mut state);
            for (offset, row) in rows.iter_mut().enumerate() {
                let i = start + offset;
                if state.counterparty_default_at <= i {
                    continue;
                }
                let (loss, amort) = outcome(&state, i);
                for (j, &level) in levels.iter().enumerate() {
                    row.loss[0][j] += loss.min(level);
                    row.amortization[0][j] += amort.min(level);
                    if with_probability && loss <= level + 1e-12 {
                        row.probability[0][j] += 1.0;
                    }
                }
            }
        }
        Ok(rows)
    })?;

    let mut totals: Vec<DateRows> = (0..n_rows)
        .map(|_| DateRows::zeros(1, n_levels, with_probability))
        .collect();
    for chunk in chunks {
        for (total, rows) in totals.iter_mut().zip(chunk) {
            add_into(&mut total.loss[0], &rows.loss[0]);
            add_into(&mut total.amortization[0], &rows.amortization[0]);
            if with_probability {
                add_into(&mut total.probability[0], &rows.probability[0]);
            }
        }
    }
    let scale = 1.0 / options.sample_size as f64;
    for total in totals.iter_mut() {
        for v in total
            .loss
            .iter_mut()
            .chain(total.amortization.iter_mut())
            .chain(total.probability.iter_mut())
            .flatten()
        {
            *v *= scale;
        }
    }
    Ok(totals)
}

fn add_into(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

/// Monte Carlo kernel for a single-layer basket.
///
/// The seed is fixed when the kernel is built: [`Seed::Auto`] draws one
/// from system randomness once, so repeated computations with the same
/// kernel agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonteCarloKernel {
    seed: u64,
}

impl MonteCarloKernel {
    /// Creates the kernel, resolving an automatic seed.
    pub fn new(seed: impl Into<Seed>) -> Self {
        Self {
            seed: seed.into().resolve(),
        }
    }

    /// Seed in use.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl DistributionKernel for MonteCarloKernel {
    fn name(&self) -> &'static str {
        "Monte Carlo"
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
        if request.conditional {
            return Err(BasketError::NotImplemented(
                "conditional slices from the Monte Carlo kernel".into(),
            ));
        }
        debug!(
            seed = self.seed,
            paths = request.options.sample_size,
            start,
            "Monte Carlo kernel"
        );
        let total = request.pool.total_principal();
        let weights: Vec<f64> = request.pool.principals().iter().map(|p| p / total).collect();
        let rows = simulate(
            request,
            start,
            self.seed,
            surfaces.probability.is_some(),
            |state, i| {
                let (mut loss, mut amort) = (0.0, 0.0);
                for (k, &w) in weights.iter().enumerate() {
                    if state.defaulted_by(k, i) {
                        let r = state.recovery(k);
                        loss += w * (1.0 - r);
                        amort += w * r;
                    } else if state.refinanced_by(k, i) {
                        amort += w;
                    }
                }
                (loss, amort)
            },
        )?;
        trace!(rows = rows.len(), "Monte Carlo rows binned");
        write_rows(surfaces, start, rows);
        Ok(())
    }
}
