//! Gauss-Hermite quadrature against the standard normal density.
//!
//! `GaussHermite::new(n)` returns nodes `z_k` and weights `w_k` such that
//! `E[f(Z)] ≈ Σ w_k f(z_k)` for `Z ~ N(0, 1)`. The weights sum to one.

use crate::types::SolverError;
use std::f64::consts::PI;

/// Quadrature rule for expectations over a standard normal factor.
///
/// # Example
///
/// ```
/// use tranche_core::math::quadrature::GaussHermite;
///
/// let rule = GaussHermite::new(20).unwrap();
/// let second_moment: f64 = rule.expectation(|z| z * z);
/// assert!((second_moment - 1.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GaussHermite {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussHermite {
    /// Largest supported order.
    pub const MAX_ORDER: usize = 200;

    /// Builds an `n`-point rule with nodes sorted ascending.
    ///
    /// # Errors
    /// `SolverError::NumericalInstability` when `n` is zero or above
    /// [`MAX_ORDER`](Self::MAX_ORDER), `SolverError::MaxIterationsExceeded`
    /// if a root fails to converge.
    pub fn new(n: usize) -> Result<Self, SolverError> {
        if n == 0 || n > Self::MAX_ORDER {
            return Err(SolverError::NumericalInstability(format!(
                "Gauss-Hermite order must be in [1, {}], got {}",
                Self::MAX_ORDER,
                n
            )));
        }

        const MAX_ITER: usize = 100;
        const EPS: f64 = 3e-14;
        let pim4 = PI.powf(-0.25);
        let mut x = vec![0.0; n];
        let mut w = vec![0.0; n];
        let m = (n + 1) / 2;
        let nf = n as f64;
        let mut z = 0.0f64;

        // Newton iteration on the physicists' Hermite polynomials, roots from
        // the largest downwards.
        for i in 0..m {
            z = match i {
                0 => (2.0 * nf + 1.0).sqrt() - 1.855_75 * (2.0 * nf + 1.0).powf(-0.166_67),
                1 => z - 1.14 * nf.powf(0.426) / z,
                2 => 1.86 * z - 0.86 * x[0],
                3 => 1.91 * z - 0.91 * x[1],
                _ => 2.0 * z - x[i - 2],
            };
            let mut pp = 0.0;
            let mut converged = false;
            for _ in 0..MAX_ITER {
                let mut p1 = pim4;
                let mut p2 = 0.0;
                for j in 0..n {
                    let p3 = p2;
                    p2 = p1;
                    let jf = j as f64;
                    p1 = z * (2.0 / (jf + 1.0)).sqrt() * p2 - (jf / (jf + 1.0)).sqrt() * p3;
                }
                pp = (2.0 * nf).sqrt() * p2;
                let z1 = z;
                z = z1 - p1 / pp;
                if (z - z1).abs() <= EPS {
                    converged = true;
                    break;
                }
            }
            if !converged {
                return Err(SolverError::MaxIterationsExceeded {
                    iterations: MAX_ITER,
                });
            }
            x[i] = z;
            x[n - 1 - i] = -z;
            w[i] = 2.0 / (pp * pp);
            w[n - 1 - i] = w[i];
        }

        // Rescale from weight exp(-x^2) to the standard normal density.
        let scale = 1.0 / PI.sqrt();
        let mut pairs: Vec<(f64, f64)> = x
            .into_iter()
            .zip(w)
            .map(|(xi, wi)| (xi * std::f64::consts::SQRT_2, wi * scale))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (nodes, weights) = pairs.into_iter().unzip();
        Ok(Self { nodes, weights })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a constructed rule.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Standard normal nodes, ascending.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Probability weights, summing to one.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterates `(node, weight)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.nodes.iter().copied().zip(self.weights.iter().copied())
    }

    /// `Σ w_k f(z_k)`.
    pub fn expectation<F: FnMut(f64) -> f64>(&self, mut f: F) -> f64 {
        self.iter().map(|(z, w)| w * f(z)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::distributions::norm_cdf;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum_to_one() {
        for n in [1, 2, 5, 16, 40, 64, 128] {
            let rule = GaussHermite::new(n).unwrap();
            assert_eq!(rule.len(), n);
            assert_relative_eq!(rule.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_low_order_nodes() {
        let rule = GaussHermite::new(2).unwrap();
        assert_relative_eq!(rule.nodes()[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(rule.nodes()[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rule.weights()[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_moments_are_exact() {
        let rule = GaussHermite::new(10).unwrap();
        assert_relative_eq!(rule.expectation(|z| z), 0.0, epsilon = 1e-12);
        assert_relative_eq!(rule.expectation(|z| z.powi(4)), 3.0, epsilon = 1e-10);
        assert_relative_eq!(rule.expectation(|z| z.powi(6)), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_smooth_expectation() {
        // E[Φ(Z)] = 1/2
        let rule = GaussHermite::new(32).unwrap();
        assert_relative_eq!(rule.expectation(norm_cdf), 0.5, epsilon = 1e-7);
    }

    #[test]
    fn test_nodes_ascending() {
        let rule = GaussHermite::new(31).unwrap();
        assert!(rule.nodes().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_invalid_order() {
        assert!(GaussHermite::new(0).is_err());
        assert!(GaussHermite::new(GaussHermite::MAX_ORDER + 1).is_err());
    }
}
