//! Interpolation methods.
//!
//! ## Core Trait
//!
//! 1D interpolators implement [`Interpolator`]:
//! - `interpolate(x) -> Result<T, InterpolationError>`: value inside the domain
//! - `domain() -> (T, T)`: valid interpolation range
//!
//! ## Example
//!
//! ```
//! use tranche_core::math::interpolators::{Interpolator, LinearInterpolator};
//!
//! let interp = LinearInterpolator::new(&[0.03_f64, 0.07, 0.10], &[0.30_f64, 0.40, 0.45]).unwrap();
//! assert_eq!(interp.domain(), (0.03, 0.10));
//! assert!((interp.interpolate(0.05).unwrap() - 0.35).abs() < 1e-12);
//! assert_eq!(interp.interpolate_flat(0.50), 0.45);
//! ```

mod linear;

pub use linear::LinearInterpolator;

use crate::types::InterpolationError;
use num_traits::Float;

/// One-dimensional interpolation over a fixed data set.
pub trait Interpolator<T: Float> {
    /// Interpolated value at `x`.
    ///
    /// # Errors
    /// `InterpolationError::OutOfBounds` when `x` lies outside [`domain`](Self::domain).
    fn interpolate(&self, x: T) -> Result<T, InterpolationError>;

    /// Inclusive `(min, max)` range of valid abscissae.
    fn domain(&self) -> (T, T);
}
