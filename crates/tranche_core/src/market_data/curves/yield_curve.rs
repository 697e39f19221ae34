//! Yield curve trait and the flat curve.

use crate::market_data::error::MarketDataError;

/// Discount factors as a function of time in years.
pub trait YieldCurve {
    /// Discount factor `P(0, t)`.
    ///
    /// # Errors
    /// `MarketDataError::InvalidMaturity` if `t < 0`.
    fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError>;

    /// Continuously compounded zero rate; the instantaneous rate at `t = 0`.
    fn zero_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        if t == 0.0 {
            let eps = 1e-6;
            return Ok(-self.discount_factor(eps)?.ln() / eps);
        }
        Ok(-self.discount_factor(t)?.ln() / t)
    }
}

/// Constant continuously compounded rate.
///
/// # Example
///
/// ```
/// use tranche_core::market_data::curves::{FlatCurve, YieldCurve};
///
/// let curve = FlatCurve::new(0.05);
/// assert!((curve.discount_factor(1.0).unwrap() - 0.951229424500714).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatCurve {
    rate: f64,
}

impl FlatCurve {
    /// Construct a flat curve.
    #[inline]
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// The constant rate.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl YieldCurve for FlatCurve {
    fn discount_factor(&self, t: f64) -> Result<f64, MarketDataError> {
        if t < 0.0 || t.is_nan() {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        Ok((-self.rate * t).exp())
    }

    fn zero_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        if t < 0.0 || t.is_nan() {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        Ok(self.rate)
    }
}
