//! # Tranche Models (L2: Business Logic)
//!
//! Credit pools, dependence structures and the numerical kernels that turn
//! them into tranche loss surfaces.
//!
//! This crate provides:
//! - [`CreditPool`]: survival, recovery and principal per name
//! - [`Correlation`]: single factor, pairwise matrix, term structure,
//!   mixture and base-correlation objects
//! - Grid and level utilities: date grids, loss level rounding, prior loss
//!   adjustment
//! - [`DistributionSurface`]: the date × level × scenario grid of expected
//!   losses or cumulative probabilities
//! - [`NestedStructure`]: sub-basket definitions and the cross-subordination
//!   level transform for CDO² structures
//! - [`kernels`]: large-pool, recursion, Monte Carlo, nested Monte Carlo and
//!   Hull-White jump kernels behind the [`DistributionKernel`] trait
//!
//! ## Design Principles
//!
//! - **Enum-based correlation objects** for static dispatch
//! - **Kernels are pure functions** of their request; all caching lives in
//!   the pricing layer
//! - **Options are values**: [`NumericalOptions`] is threaded into every
//!   computation, there is no process-wide state

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod correlation;
pub mod error;
pub mod grid;
pub mod kernels;
pub mod levels;
pub mod nesting;
pub mod pool;
pub mod surface;

pub use config::{ConfigError, NumericalOptions};
pub use correlation::{
    BaseCorrelation, Correlation, CorrelationMatrix, CorrelationMixture, CorrelationTermStruct,
    StrikeMethod,
};
pub use error::BasketError;
pub use grid::build_date_grid;
pub use kernels::{
    CounterpartyRisk, Copula, Dependence, DistributionKernel, HullWhiteKernel, HullWhiteParams,
    KernelRequest, LargePoolKernel, MonteCarloKernel, NestedMonteCarloKernel, RecursionKernel, Seed,
};
pub use levels::{round_loss_level, AdjustedTranche, LossLevels, PriorLoss};
pub use nesting::{LevelTransform, NestedStructure, SubBasket};
pub use pool::{CreditPool, Refinancing};
pub use surface::{BasketSurfaces, DistributionSurface, SurfaceKind};
