//! Numerical building blocks.
//!
//! This module provides:
//! - `distributions`: Normal and Student-t distribution functions
//! - `quadrature`: Gauss-Hermite rule against the standard normal density
//! - `interpolators`: 1D interpolation
//! - `solvers`: Brent root finder and Nelder-Mead minimiser

pub mod distributions;
pub mod interpolators;
pub mod quadrature;
pub mod solvers;
