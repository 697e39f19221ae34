//! # Tranche Pricing (L3: Engine)
//!
//! Lazily computed tranche loss and amortization distributions for credit
//! baskets and CDO² structures.
//!
//! ## Layer 3 Role
//!
//! - [`lazy`]: the compute-on-demand surface cache every strategy owns
//! - [`setup`]: pool, date window, level grid and options shared between
//!   duplicated calculators
//! - [`basket`]: the [`BasketDistribution`] calling convention and its eight
//!   strategies, unified in the [`Basket`] enum
//! - [`tranche`]: a synthetic tranche proxy used to price protection
//! - [`calibration`]: base-correlation implied correlations and Hull-White
//!   parameter fits
//!
//! ## Usage Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
//! use tranche_core::types::Date;
//! use tranche_models::{Correlation, CreditPool, NumericalOptions};
//! use tranche_pricing::{BasketDistribution, BasketSetup, SemiAnalyticBasket};
//!
//! let start = Date::from_ymd(2024, 1, 1).unwrap();
//! let maturity = Date::from_ymd(2029, 1, 1).unwrap();
//! let pool = CreditPool::homogeneous(
//!     50,
//!     Arc::new(SurvivalCurve::flat(start, 0.02)),
//!     Arc::new(RecoveryCurve::constant(0.4)),
//!     1.0,
//! );
//! let setup = BasketSetup::new(pool, start, maturity, &[0.03, 0.07], NumericalOptions::default())
//!     .unwrap()
//!     .shared();
//! let mut basket = SemiAnalyticBasket::new(setup, Correlation::single_factor(0.3).unwrap());
//!
//! let mezzanine = basket.accumulated_loss(maturity, 0.03, 0.07).unwrap();
//! assert!(mezzanine > 0.0 && mezzanine < 0.04);
//! ```
//!
//! ## Concurrency
//!
//! Strategies are single-threaded: every accessor takes `&mut self` and may
//! compute. [`BasketDistribution::duplicate`] hands out independent
//! calculators over the same shared setup. The only parallelism is inside
//! the kernels, gated by [`NumericalOptions::parallel`](tranche_models::NumericalOptions).

#![warn(missing_docs)]

pub mod basket;
pub mod calibration;
pub mod lazy;
pub mod setup;
pub mod tranche;

#[cfg(test)]
mod fixtures;

pub use basket::{
    AnalyticBasket, BaseCorrelationNestedBasket, Basket, BasketDistribution, BootstrapBasket,
    CounterpartyBasket, DynamicBasket, DynamicKernel, LossDistribution, MixtureBasket,
    MonteCarloBasket, SemiAnalyticBasket, SurfaceBasket,
};
pub use calibration::{
    base_correlation_term_structure, calibrate_hull_white, implied_correlation, HullWhiteFit,
    TrancheQuote,
};
pub use lazy::{LazySurface, ResetFlag, SurfaceState};
pub use setup::BasketSetup;
pub use tranche::SyntheticTranche;
