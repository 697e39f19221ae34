//! Credit, recovery and discount curves.
//!
//! # Components
//!
//! - [`curves`]: Time-based curve traits and implementations
//!   (`CreditCurve`, `HazardRateCurve`, `FlatHazardRateCurve`, `YieldCurve`, `FlatCurve`)
//! - [`dated`]: Date-anchored curves consumed by basket models
//!   (`SurvivalCurve`, `RecoveryCurve`, `DiscountCurve`)
//! - [`error`]: Market data error types (`MarketDataError`)
//!
//! # Example
//!
//! ```
//! use tranche_core::market_data::{SurvivalCurve, RecoveryCurve};
//! use tranche_core::types::Date;
//!
//! let as_of = Date::from_ymd(2024, 3, 20).unwrap();
//! let curve = SurvivalCurve::flat(as_of, 0.02);
//! let one_year = Date::from_ymd(2025, 3, 20).unwrap();
//! assert!((curve.interpolate(one_year).unwrap() - (-0.02f64 * 1.0).exp()).abs() < 1e-12);
//!
//! let recovery = RecoveryCurve::constant(0.4);
//! assert_eq!(recovery.interpolate(one_year), 0.4);
//! ```

pub mod curves;
pub mod dated;
pub mod error;

pub use curves::{
    CreditCurve, CreditCurveEnum, FlatCurve, FlatHazardRateCurve, HazardRateCurve, YieldCurve,
};
pub use dated::{DiscountCurve, RecoveryCurve, SurvivalCurve};
pub use error::MarketDataError;
