//! Time and error types.
//!
//! This module provides:
//! - `time`: `Date`, `TimeUnit`, `Tenor` and `DayCountConvention`
//! - `error`: Structured error types for date, interpolation and solver operations
//!
//! # Re-exports
//!
//! - [`Date`], [`DayCountConvention`], [`Tenor`], [`TimeUnit`] from `time`
//! - [`DateError`], [`InterpolationError`], [`SolverError`] from `error`

pub mod error;
pub mod time;

pub use error::{DateError, InterpolationError, SolverError};
pub use time::{Date, DayCountConvention, Tenor, TimeUnit};
