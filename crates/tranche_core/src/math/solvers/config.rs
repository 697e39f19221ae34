//! Solver configuration types.

use num_traits::Float;

/// Configuration for bracketed root finding.
///
/// Convergence is declared when either the residual drops below
/// `tolerance_f` or the bracket half-width drops below `tolerance_x`.
///
/// # Example
///
/// ```
/// use tranche_core::math::solvers::SolverConfig;
///
/// let config: SolverConfig<f64> = SolverConfig::default();
/// assert_eq!(config.max_evaluations, 100);
///
/// let calibration = SolverConfig::new(1e-7, 1e-5, 50);
/// assert_eq!(calibration.tolerance_x, 1e-5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig<T: Float> {
    /// Residual tolerance: stop when `|f(x) - target| <= tolerance_f`.
    pub tolerance_f: T,

    /// Abscissa tolerance: stop when the bracket is narrower than this.
    pub tolerance_x: T,

    /// Maximum number of function evaluations before giving up with
    /// `SolverError::MaxIterationsExceeded`.
    pub max_evaluations: usize,
}

impl<T: Float> Default for SolverConfig<T> {
    /// `tolerance_f = tolerance_x = sqrt(epsilon) / 128` (about 1.2e-10 for
    /// `f64`), 100 evaluations.
    fn default() -> Self {
        let tol = T::epsilon().sqrt() / (T::one() + T::one()).powi(7);
        Self {
            tolerance_f: tol,
            tolerance_x: tol,
            max_evaluations: 100,
        }
    }
}

impl<T: Float> SolverConfig<T> {
    /// Create a new configuration with specified values.
    ///
    /// # Panics
    ///
    /// Panics if either tolerance is not positive or `max_evaluations < 2`.
    pub fn new(tolerance_f: T, tolerance_x: T, max_evaluations: usize) -> Self {
        assert!(tolerance_f > T::zero(), "tolerance_f must be positive");
        assert!(tolerance_x > T::zero(), "tolerance_x must be positive");
        assert!(max_evaluations >= 2, "max_evaluations must be >= 2");
        Self {
            tolerance_f,
            tolerance_x,
            max_evaluations,
        }
    }

    /// Replaces the evaluation budget.
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations.max(2);
        self
    }
}
