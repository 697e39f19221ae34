//! Nelder-Mead simplex minimiser.
//!
//! Derivative-free minimisation of a closure over a fixed-size parameter
//! vector inside a box. Used for model parameter fits where each objective
//! evaluation is an expensive, possibly failing, repricing.

use crate::types::SolverError;

/// Nelder-Mead configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    /// Maximum number of simplex iterations.
    pub max_iterations: usize,
    /// Initial vertex offset as a fraction of each bound's width.
    pub initial_step: f64,
    /// Reflection coefficient.
    pub reflection: f64,
    /// Expansion coefficient.
    pub expansion: f64,
    /// Contraction coefficient.
    pub contraction: f64,
    /// Shrink coefficient.
    pub shrink: f64,
    /// Stop when both the objective spread and the simplex radius are below this.
    pub tolerance: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 240,
            initial_step: 0.08,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            tolerance: 1e-8,
        }
    }
}

/// Result of a Nelder-Mead run.
#[derive(Debug, Clone, PartialEq)]
pub struct NelderMeadResult {
    /// Best parameter vector found.
    pub params: Vec<f64>,
    /// Objective value at `params`.
    pub objective: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Objective evaluations performed.
    pub evaluations: usize,
    /// Whether the tolerance test was met before the iteration cap.
    pub converged: bool,
}

/// Box-constrained Nelder-Mead minimiser.
///
/// # Example
///
/// ```
/// use tranche_core::math::solvers::NelderMeadSolver;
/// use tranche_core::types::SolverError;
///
/// let solver = NelderMeadSolver::with_defaults();
/// let result = solver
///     .minimise(
///         |p: &[f64]| Ok::<_, SolverError>((p[0] - 0.3).powi(2) + (p[1] - 2.0).powi(2)),
///         &[0.5, 1.0],
///         &[0.0, 0.0],
///         &[1.0, 5.0],
///     )
///     .unwrap();
/// assert!((result.params[0] - 0.3).abs() < 1e-3);
/// assert!((result.params[1] - 2.0).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NelderMeadSolver {
    config: NelderMeadConfig,
}

impl NelderMeadSolver {
    /// Create a solver with the given configuration.
    pub fn new(config: NelderMeadConfig) -> Self {
        Self { config }
    }

    /// Create a solver with default configuration.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Returns a reference to the solver configuration.
    pub fn config(&self) -> &NelderMeadConfig {
        &self.config
    }

    /// Minimise `objective` starting from `initial`, keeping every vertex
    /// inside `[lower, upper]`.
    ///
    /// Reaching the iteration cap is not an error; inspect
    /// [`NelderMeadResult::converged`].
    pub fn minimise<F, E>(
        &self,
        mut objective: F,
        initial: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<NelderMeadResult, E>
    where
        F: FnMut(&[f64]) -> Result<f64, E>,
        E: From<SolverError>,
    {
        let dim = initial.len();
        if dim == 0 || lower.len() != dim || upper.len() != dim {
            return Err(SolverError::NumericalInstability(format!(
                "Nelder-Mead dimension mismatch: initial {}, lower {}, upper {}",
                dim,
                lower.len(),
                upper.len()
            ))
            .into());
        }
        let clamp = |x: &mut [f64]| {
            for (d, v) in x.iter_mut().enumerate() {
                *v = v.clamp(lower[d], upper[d]);
            }
        };
        let cfg = &self.config;

        let mut x0 = initial.to_vec();
        clamp(&mut x0);
        let mut simplex = vec![x0.clone()];
        let mut values = vec![objective(&x0)?];
        let mut evaluations = 1usize;

        for d in 0..dim {
            let mut x = x0.clone();
            let step = (upper[d] - lower[d]).abs() * cfg.initial_step.max(1e-4);
            x[d] = (x[d] + step).min(upper[d]);
            if (x[d] - x0[d]).abs() < 1e-14 {
                x[d] = (x0[d] - step).max(lower[d]);
            }
            values.push(objective(&x)?);
            simplex.push(x);
            evaluations += 1;
        }

        let mut iterations = 0usize;
        let mut converged = false;

        while iterations < cfg.max_iterations {
            iterations += 1;

            let mut order: Vec<usize> = (0..=dim).collect();
            order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let centroid: Vec<f64> = (0..dim)
                .map(|d| simplex[..dim].iter().map(|x| x[d]).sum::<f64>() / dim as f64)
                .collect();
            let radius = simplex
                .iter()
                .map(|x| {
                    x.iter()
                        .zip(&centroid)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(0.0_f64, f64::max);
            if (values[dim] - values[0]).abs() <= cfg.tolerance && radius <= cfg.tolerance {
                converged = true;
                break;
            }

            let along = |coef: f64, from: &[f64]| -> Vec<f64> {
                let mut x: Vec<f64> = (0..dim)
                    .map(|d| centroid[d] + coef * (from[d] - centroid[d]))
                    .collect();
                clamp(&mut x);
                x
            };

            let xr = along(-cfg.reflection, &simplex[dim]);
            let fr = objective(&xr)?;
            evaluations += 1;

            if fr < values[0] {
                let xe = along(cfg.expansion, &xr);
                let fe = objective(&xe)?;
                evaluations += 1;
                if fe < fr {
                    simplex[dim] = xe;
                    values[dim] = fe;
                } else {
                    simplex[dim] = xr;
                    values[dim] = fr;
                }
                continue;
            }
            if fr < values[dim - 1] {
                simplex[dim] = xr;
                values[dim] = fr;
                continue;
            }

            let xc = along(cfg.contraction, &simplex[dim]);
            let fc = objective(&xc)?;
            evaluations += 1;
            if fc < values[dim] {
                simplex[dim] = xc;
                values[dim] = fc;
                continue;
            }

            for i in 1..=dim {
                for d in 0..dim {
                    simplex[i][d] = simplex[0][d] + cfg.shrink * (simplex[i][d] - simplex[0][d]);
                }
                clamp(&mut simplex[i]);
                values[i] = objective(&simplex[i])?;
                evaluations += 1;
            }
        }

        let best = (0..=dim)
            .min_by(|&i, &j| values[i].total_cmp(&values[j]))
            .unwrap_or(0);

        Ok(NelderMeadResult {
            params: simplex[best].clone(),
            objective: values[best],
            iterations,
            evaluations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rosenbrock_within_box() {
        let solver = NelderMeadSolver::new(NelderMeadConfig {
            max_iterations: 5000,
            tolerance: 1e-10,
            ..Default::default()
        });
        let rosenbrock = |p: &[f64]| {
            Ok::<_, SolverError>((1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0] * p[0]).powi(2))
        };
        let result = solver
            .minimise(rosenbrock, &[-1.0, 1.5], &[-2.0, -2.0], &[2.0, 2.0])
            .unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_minimum_on_boundary() {
        let solver = NelderMeadSolver::with_defaults();
        let result = solver
            .minimise(|p: &[f64]| Ok::<_, SolverError>(p[0]), &[0.5], &[0.1], &[1.0])
            .unwrap();
        assert_relative_eq!(result.params[0], 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_dimension_mismatch() {
        let solver = NelderMeadSolver::with_defaults();
        let result = solver.minimise(
            |_: &[f64]| Ok::<_, SolverError>(0.0),
            &[0.5, 0.5],
            &[0.0],
            &[1.0, 1.0],
        );
        assert!(matches!(result, Err(SolverError::NumericalInstability(_))));
    }

    #[test]
    fn test_objective_error_propagates() {
        let solver = NelderMeadSolver::with_defaults();
        let result = solver.minimise(
            |_: &[f64]| Err::<f64, _>(SolverError::NumericalInstability("boom".into())),
            &[0.5],
            &[0.0],
            &[1.0],
        );
        assert!(result.is_err());
    }
}
