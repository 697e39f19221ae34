//! Loss distribution kernels.
//!
//! A kernel turns a credit pool, a dependence description and a copula into
//! the loss and amortization surfaces of a basket. Kernels are pure: the
//! same request always fills the same values, which is what lets baskets
//! cache surfaces and recompute only a suffix of the date grid.
//!
//! | Kernel | Dependence | Scenarios |
//! |---|---|---|
//! | [`LargePoolKernel`] | one-factor Gaussian | quadrature nodes (conditional) |
//! | [`RecursionKernel`] | one-factor Gaussian | quadrature nodes (conditional) |
//! | [`MonteCarloKernel`] | factors or matrix, Gaussian or Student-t | 1 |
//! | [`NestedMonteCarloKernel`] | as Monte Carlo, CDO² losses | 1 |
//! | [`HullWhiteKernel`] | common Poisson jumps | jump counts |

mod common;
#[cfg(test)]
pub(crate) mod fixtures;
mod hull_white;
mod large_pool;
mod lattice;
mod monte_carlo;
mod nested;
mod recursion;

pub use hull_white::{HullWhiteKernel, HullWhiteParams};
pub use large_pool::LargePoolKernel;
pub use monte_carlo::MonteCarloKernel;
pub use nested::NestedMonteCarloKernel;
pub use recursion::RecursionKernel;


use crate::config::NumericalOptions;
use crate::correlation::{Correlation, CorrelationMatrix};
use crate::error::BasketError;
use crate::pool::CreditPool;
use crate::surface::BasketSurfaces;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use tranche_core::market_data::SurvivalCurve;
use tranche_core::types::Date;

/// Dependence structure linking individual default times.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Copula {
    /// Gaussian copula.
    #[default]
    Gaussian,
    /// Student-t copula with the given degrees of freedom.
    StudentT {
        /// Degrees of freedom, positive.
        dof: f64,
    },
}

impl fmt::Display for Copula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Copula::Gaussian => write!(f, "Gaussian"),
            Copula::StudentT { dof } => write!(f, "StudentT({})", dof),
        }
    }
}

/// Monte Carlo seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Fixed seed; identical inputs give bit-identical surfaces.
    Fixed(u64),
    /// Seed drawn from system randomness when the kernel is built.
    Auto,
}

impl From<i64> for Seed {
    /// Negative values request an automatic seed.
    fn from(seed: i64) -> Self {
        u64::try_from(seed).map(Seed::Fixed).unwrap_or(Seed::Auto)
    }
}

impl Seed {
    /// Concrete seed value, drawing one for [`Seed::Auto`].
    pub fn resolve(self) -> u64 {
        match self {
            Seed::Fixed(seed) => seed,
            Seed::Auto => {
                let seed = rand::random::<u64>();
                debug!(seed, "drew automatic Monte Carlo seed");
                seed
            }
        }
    }
}

/// Dependence data handed to a kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum Dependence {
    /// One-factor loadings per grid date (rows) and name (columns).
    Factors(Vec<Vec<f64>>),
    /// Full pairwise correlation matrix, constant in time.
    Matrix(CorrelationMatrix),
}

impl Dependence {
    /// Resolves a correlation object on a date grid.
    pub fn from_correlation(
        correlation: &Correlation,
        dates: &[Date],
        n_names: usize,
    ) -> Result<Self, BasketError> {
        match correlation {
            Correlation::General(m) => {
                if m.len() != n_names {
                    return Err(BasketError::Configuration(format!(
                        "correlation matrix of size {} for {} names",
                        m.len(),
                        n_names
                    )));
                }
                Ok(Dependence::Matrix(m.clone()))
            }
            other => dates
                .iter()
                .map(|&d| other.correlations_at(d, n_names))
                .collect::<Result<Vec<_>, _>>()
                .map(Dependence::Factors),
        }
    }

    /// Flat loadings on every date.
    pub fn flat(factors: Vec<f64>, n_dates: usize) -> Self {
        Dependence::Factors(vec![factors; n_dates])
    }

    /// Factor loadings at date index `i`.
    ///
    /// # Errors
    /// `BasketError::UnsupportedCorrelation` for a pairwise matrix.
    pub fn factors_at(&self, i: usize, context: &'static str) -> Result<&[f64], BasketError> {
        match self {
            Dependence::Factors(rows) => rows.get(i).map(Vec::as_slice).ok_or_else(|| {
                BasketError::InvalidArgument(format!("no factor loadings for date index {}", i))
            }),
            Dependence::Matrix(_) => Err(BasketError::UnsupportedCorrelation {
                variant: "General",
                context,
            }),
        }
    }
}

/// Counterparty whose survival conditions the basket surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterpartyRisk {
    /// Counterparty survival curve.
    pub curve: Arc<SurvivalCurve>,
    /// Signed factor loading on the common factor.
    pub factor: f64,
}

/// Everything a kernel needs to fill a basket's surfaces.
#[derive(Debug, Clone)]
pub struct KernelRequest<'a> {
    /// Pool names and principals.
    pub pool: &'a CreditPool,
    /// Surface as-of date.
    pub as_of: Date,
    /// Date grid.
    pub dates: &'a [Date],
    /// Surface levels, ascending.
    pub levels: &'a [f64],
    /// Dependence per date.
    pub dependence: &'a Dependence,
    /// Copula choice.
    pub copula: Copula,
    /// Numerical settings.
    pub options: &'a NumericalOptions,
    /// Optional counterparty conditioning.
    pub counterparty: Option<&'a CounterpartyRisk>,
    /// Also fill the cumulative probability surface.
    pub want_probability: bool,
    /// Keep one scenario per factor node instead of integrating it out.
    pub conditional: bool,
}

impl<'a> KernelRequest<'a> {
    /// Unconditional request with no counterparty and no probability surface.
    pub fn new(
        pool: &'a CreditPool,
        as_of: Date,
        dates: &'a [Date],
        levels: &'a [f64],
        dependence: &'a Dependence,
        options: &'a NumericalOptions,
    ) -> Self {
        Self {
            pool,
            as_of,
            dates,
            levels,
            dependence,
            copula: Copula::Gaussian,
            options,
            counterparty: None,
            want_probability: false,
            conditional: false,
        }
    }

    /// Fresh surfaces shaped for this request and `kernel`.
    pub fn surfaces_for(&self, kernel: &impl DistributionKernel) -> BasketSurfaces {
        BasketSurfaces::new(
            self.as_of,
            self.dates,
            self.levels,
            kernel.n_scenarios(self),
            self.want_probability,
        )
    }

    fn require_gaussian(&self, context: &'static str) -> Result<(), BasketError> {
        match self.copula {
            Copula::Gaussian => Ok(()),
            other => Err(BasketError::UnsupportedCopula {
                copula: other.to_string(),
                context,
            }),
        }
    }
}

/// Fills basket surfaces from a request.
pub trait DistributionKernel: Send + Sync {
    /// Kernel name for diagnostics.
    fn name(&self) -> &'static str;

    /// Scenario count of the surfaces this kernel writes.
    fn n_scenarios(&self, request: &KernelRequest<'_>) -> usize {
        if request.conditional {
            request.options.quadrature_points
        } else {
            1
        }
    }

    /// Writes every date row from `start` onwards; rows before `start` are
    /// left untouched.
    fn compute(
        &self,
        request: &KernelRequest<'_>,
        surfaces: &mut BasketSurfaces,
        start: usize,
    ) -> Result<(), BasketError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_from_signed() {
        assert_eq!(Seed::from(42), Seed::Fixed(42));
        assert_eq!(Seed::from(0), Seed::Fixed(0));
        assert_eq!(Seed::from(-1), Seed::Auto);
        assert_eq!(Seed::Fixed(9).resolve(), 9);
    }

    #[test]
    fn test_copula_display() {
        assert_eq!(Copula::Gaussian.to_string(), "Gaussian");
        assert_eq!(Copula::StudentT { dof: 4.0 }.to_string(), "StudentT(4)");
    }

    #[test]
    fn test_dependence_rejects_matrix_for_factor_kernels() {
        let dep = Dependence::Matrix(CorrelationMatrix::constant(2, 0.3).unwrap());
        assert!(matches!(
            dep.factors_at(0, "test"),
            Err(BasketError::UnsupportedCorrelation { variant: "General", .. })
        ));
        let flat = Dependence::flat(vec![0.5, 0.5], 3);
        assert_eq!(flat.factors_at(2, "test").unwrap(), &[0.5, 0.5]);
        assert!(flat.factors_at(3, "test").is_err());
    }
}
