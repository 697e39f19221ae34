//! Time-based curve abstractions.
//!
//! This module provides:
//! - [`CreditCurve`]: Hazard rate and survival probability trait
//! - [`HazardRateCurve`]: Piecewise-constant hazard rate curve
//! - [`FlatHazardRateCurve`]: Constant hazard rate curve
//! - [`CreditCurveEnum`]: Static dispatch over the credit curves
//! - [`YieldCurve`]: Discount factor trait
//! - [`FlatCurve`]: Constant rate yield curve

mod credit;
mod yield_curve;

pub use credit::{CreditCurve, CreditCurveEnum, FlatHazardRateCurve, HazardRateCurve};
pub use yield_curve::{FlatCurve, YieldCurve};
