//! # tranche_core: Foundation for the tranche loss engine
//!
//! ## Layer 1 (Foundation) Role
//!
//! tranche_core is the bottom layer of the workspace, providing:
//! - Time types: `Date`, `TimeUnit`, `Tenor`, `DayCountConvention` (`types::time`)
//! - Error types: `DateError`, `InterpolationError`, `SolverError` (`types::error`)
//! - Numerics: normal and Student-t distributions, Gauss-Hermite quadrature,
//!   linear interpolation, Brent root finding, Nelder-Mead minimisation (`math`)
//! - Dated survival, recovery and discount curves (`market_data`)
//!
//! Layer 1 has no dependencies on other workspace crates.
//!
//! ## Usage Examples
//!
//! ```rust
//! use tranche_core::math::solvers::{BrentSolver, SolverConfig};
//! use tranche_core::market_data::SurvivalCurve;
//! use tranche_core::types::{Date, TimeUnit};
//!
//! let as_of = Date::from_ymd(2024, 3, 20).unwrap();
//! let maturity = as_of.advance(5, TimeUnit::Years).unwrap();
//! let curve = SurvivalCurve::flat(as_of, 0.02);
//!
//! // Imply the flat hazard rate that gives 90% five-year survival
//! let solver = BrentSolver::new(SolverConfig::default());
//! let target = 0.9_f64;
//! let t = curve.time(maturity);
//! let h = solver.find_root(|h: f64| (-h * t).exp() - target, 0.0, 1.0).unwrap();
//! assert!(((-h * t).exp() - target).abs() < 1e-9);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): Serialisation for `Date`, `TimeUnit`, `Tenor`,
//!   `DayCountConvention` and the error enums

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;
