//! Root-finding and minimisation solvers.
//!
//! ## Available Solvers
//!
//! - [`BrentSolver`]: Bracketed root finding without derivatives, with
//!   separate residual and abscissa tolerances
//! - [`NelderMeadSolver`]: Box-constrained derivative-free minimisation of a
//!   closure over a parameter vector
//!
//! ## Configuration
//!
//! Root finding uses [`SolverConfig`]:
//! - `tolerance_f`: residual tolerance
//! - `tolerance_x`: bracket width tolerance
//! - `max_evaluations`: evaluation budget; exhausting it is reported as
//!   `SolverError::MaxIterationsExceeded`

mod brent;
mod config;
mod nelder_mead;

pub use brent::BrentSolver;
pub use config::SolverConfig;
pub use nelder_mead::{NelderMeadConfig, NelderMeadResult, NelderMeadSolver};
