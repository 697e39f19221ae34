//! Brent's method root-finding solver.

use super::SolverConfig;
use crate::types::SolverError;
use num_traits::Float;

/// Brent's method root finder.
///
/// Combines bisection, secant steps and inverse quadratic interpolation.
/// Guaranteed to converge for continuous functions with a valid bracket.
///
/// Two entry points are provided:
/// - [`find_root`](BrentSolver::find_root) for infallible closures
/// - [`solve`](BrentSolver::solve) for evaluators that can fail (for example
///   a pricer that recomputes a distribution on every call) and for matching
///   a target value rather than zero
///
/// # Example
///
/// ```
/// use tranche_core::math::solvers::{BrentSolver, SolverConfig};
///
/// let solver = BrentSolver::new(SolverConfig::default());
///
/// // Solve x³ - x - 2 = 0 in bracket [1, 2]
/// let f = |x: f64| x * x * x - x - 2.0;
/// let root = solver.find_root(f, 1.0, 2.0).unwrap();
/// assert!(f(root).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct BrentSolver<T: Float> {
    config: SolverConfig<T>,
}

impl<T: Float> BrentSolver<T> {
    /// Create a new Brent solver with the given configuration.
    pub fn new(config: SolverConfig<T>) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SolverConfig::default())
    }

    /// Returns a reference to the solver configuration.
    pub fn config(&self) -> &SolverConfig<T> {
        &self.config
    }

    /// Find a root of `f` in the bracket `[a, b]`.
    ///
    /// # Returns
    ///
    /// * `Ok(x)` - Root where `|f(x)| <= tolerance_f` or the bracket has
    ///   shrunk below `tolerance_x`
    /// * `Err(SolverError::NoBracket)` - `f(a)` and `f(b)` have same sign
    /// * `Err(SolverError::MaxIterationsExceeded)` - Evaluation budget exhausted
    pub fn find_root<F>(&self, f: F, a: T, b: T) -> Result<T, SolverError>
    where
        F: Fn(T) -> T,
    {
        self.solve(T::zero(), |x| Ok::<T, SolverError>(f(x)), a, b)
    }

    /// Find `x` in `[lower, upper]` such that `evaluator(x) == target`.
    ///
    /// Errors raised by the evaluator are propagated unchanged; solver
    /// failures are converted into the caller's error type.
    ///
    /// # Example
    ///
    /// ```
    /// use tranche_core::math::solvers::{BrentSolver, SolverConfig};
    /// use tranche_core::types::SolverError;
    ///
    /// let solver = BrentSolver::new(SolverConfig::new(1e-12, 1e-12, 100));
    /// let x = solver
    ///     .solve(0.25, |x: f64| Ok::<_, SolverError>(x * x), 0.0, 1.0)
    ///     .unwrap();
    /// assert!((x - 0.5).abs() < 1e-10);
    /// ```
    pub fn solve<F, E>(&self, target: T, mut evaluator: F, lower: T, upper: T) -> Result<T, E>
    where
        F: FnMut(T) -> Result<T, E>,
        E: From<SolverError>,
    {
        let one = T::one();
        let two = one + one;
        let three = two + one;
        let half = one / two;
        let tol_f = self.config.tolerance_f;
        let tol_x = self.config.tolerance_x;

        let mut a = lower;
        let mut b = upper;
        let mut fa = evaluator(a)? - target;
        let mut fb = evaluator(b)? - target;
        let mut evaluations = 2usize;

        if fa.abs() <= tol_f {
            return Ok(a);
        }
        if fb.abs() <= tol_f {
            return Ok(b);
        }
        if fa * fb > T::zero() {
            return Err(SolverError::NoBracket {
                a: a.to_f64().unwrap_or(f64::NAN),
                b: b.to_f64().unwrap_or(f64::NAN),
            }
            .into());
        }

        let mut c = b;
        let mut fc = fb;
        let mut d = b - a;
        let mut e = d;

        while evaluations < self.config.max_evaluations {
            // Keep the root between b and c
            if (fb > T::zero() && fc > T::zero()) || (fb < T::zero() && fc < T::zero()) {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = two * T::epsilon() * b.abs() + half * tol_x;
            let xm = half * (c - b);
            if xm.abs() <= tol1 || fb.abs() <= tol_f {
                return Ok(b);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    (two * xm * s, one - s)
                } else {
                    let q0 = fa / fc;
                    let r = fb / fc;
                    (
                        s * (two * xm * q0 * (q0 - r) - (b - a) * (r - one)),
                        (q0 - one) * (r - one) * (s - one),
                    )
                };
                if p > T::zero() {
                    q = -q;
                }
                p = p.abs();
                let min1 = three * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if two * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b = if d.abs() > tol1 {
                b + d
            } else if xm > T::zero() {
                b + tol1
            } else {
                b - tol1
            };
            fb = evaluator(b)? - target;
            evaluations += 1;
        }

        Err(SolverError::MaxIterationsExceeded {
            iterations: evaluations,
        }
        .into())
    }
}
