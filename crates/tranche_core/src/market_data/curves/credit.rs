//! Credit curve abstractions.
//!
//! This module provides:
//! - [`CreditCurve`]: Trait for hazard rate and survival probability calculations
//! - [`HazardRateCurve`]: Piecewise-constant hazard rate curve
//! - [`FlatHazardRateCurve`]: Constant hazard rate curve
//! - [`CreditCurveEnum`]: Static dispatch enum over the two

use crate::market_data::error::MarketDataError;

/// Hazard rate and survival probability as functions of time in years.
///
/// # Invariants
///
/// - λ(t) ≥ 0 for all t ≥ 0
/// - P(τ > 0) = 1
/// - P(τ > t) is non-increasing in t
///
/// # Example
///
/// ```
/// use tranche_core::market_data::curves::{CreditCurve, HazardRateCurve};
///
/// let curve = HazardRateCurve::new(&[1.0, 3.0, 5.0], &[0.01, 0.015, 0.02]).unwrap();
/// let surv = curve.survival_probability(2.0).unwrap();
/// assert!((surv - (-(0.01 + 0.015_f64)).exp()).abs() < 1e-12);
/// ```
pub trait CreditCurve {
    /// Instantaneous hazard rate at time `t`.
    ///
    /// # Errors
    /// `MarketDataError::InvalidMaturity` if `t < 0`.
    fn hazard_rate(&self, t: f64) -> Result<f64, MarketDataError>;

    /// Integrated hazard `∫₀ᵗ λ(s) ds`.
    ///
    /// # Errors
    /// `MarketDataError::InvalidMaturity` if `t < 0`.
    fn integrated_hazard(&self, t: f64) -> Result<f64, MarketDataError>;

    /// Survival probability `P(τ > t) = exp(-∫₀ᵗ λ(s) ds)`.
    fn survival_probability(&self, t: f64) -> Result<f64, MarketDataError> {
        Ok((-self.integrated_hazard(t)?).exp())
    }

    /// Default probability `P(τ ≤ t)`.
    fn default_probability(&self, t: f64) -> Result<f64, MarketDataError> {
        Ok(-(-self.integrated_hazard(t)?).exp_m1())
    }

    /// Forward survival probability `P(τ > t2 | τ > t1)`.
    ///
    /// # Errors
    /// `MarketDataError::InvalidMaturity` if `t2 <= t1`.
    fn forward_survival_probability(&self, t1: f64, t2: f64) -> Result<f64, MarketDataError> {
        if t2 <= t1 {
            return Err(MarketDataError::InvalidMaturity { t: t2 - t1 });
        }
        Ok((self.integrated_hazard(t1)? - self.integrated_hazard(t2)?).exp())
    }
}

fn check_time(t: f64) -> Result<(), MarketDataError> {
    if t < 0.0 || t.is_nan() {
        Err(MarketDataError::InvalidMaturity { t })
    } else {
        Ok(())
    }
}

/// Piecewise-constant hazard rate curve.
///
/// `hazard_rates[i]` applies on `(tenors[i-1], tenors[i]]` with `tenors[-1] = 0`;
/// the last rate is held flat beyond the final tenor. Survival is therefore
/// log-linear between pillars.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardRateCurve {
    tenors: Vec<f64>,
    hazard_rates: Vec<f64>,
    /// Integrated hazard at each tenor.
    cumulative: Vec<f64>,
}

impl HazardRateCurve {
    /// Construct a hazard rate curve from pillar points.
    ///
    /// # Returns
    ///
    /// * `Err(MarketDataError::InsufficientData)` - No pillars, or length mismatch
    /// * `Err(MarketDataError::InvalidMaturity)` - Non-positive or unsorted tenors
    /// * `Err(MarketDataError::InvalidValue)` - Negative hazard rate
    pub fn new(tenors: &[f64], hazard_rates: &[f64]) -> Result<Self, MarketDataError> {
        if tenors.is_empty() {
            return Err(MarketDataError::InsufficientData { got: 0, need: 1 });
        }
        if tenors.len() != hazard_rates.len() {
            return Err(MarketDataError::InsufficientData {
                got: hazard_rates.len(),
                need: tenors.len(),
            });
        }
        for (i, &t) in tenors.iter().enumerate() {
            if t <= 0.0 || (i > 0 && t <= tenors[i - 1]) {
                return Err(MarketDataError::InvalidMaturity { t });
            }
        }
        if let Some(&h) = hazard_rates.iter().find(|h| !(**h >= 0.0)) {
            return Err(MarketDataError::InvalidValue {
                reason: format!("Hazard rate must be non-negative, got {}", h),
            });
        }

        let mut cumulative = Vec::with_capacity(tenors.len());
        let mut acc = 0.0;
        let mut prev = 0.0;
        for (&t, &h) in tenors.iter().zip(hazard_rates) {
            acc += h * (t - prev);
            cumulative.push(acc);
            prev = t;
        }

        Ok(Self {
            tenors: tenors.to_vec(),
            hazard_rates: hazard_rates.to_vec(),
            cumulative,
        })
    }

    /// Pillar tenors in years.
    pub fn tenors(&self) -> &[f64] {
        &self.tenors
    }

    /// Hazard rate per pillar interval.
    pub fn hazard_rates(&self) -> &[f64] {
        &self.hazard_rates
    }

    /// Number of pillar points.
    pub fn len(&self) -> usize {
        self.tenors.len()
    }

    /// Never true for a constructed curve.
    pub fn is_empty(&self) -> bool {
        self.tenors.is_empty()
    }

    fn segment(&self, t: f64) -> usize {
        self.tenors
            .partition_point(|&ti| ti < t)
            .min(self.tenors.len() - 1)
    }
}

impl CreditCurve for HazardRateCurve {
    fn hazard_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        check_time(t)?;
        Ok(self.hazard_rates[self.segment(t)])
    }

    fn integrated_hazard(&self, t: f64) -> Result<f64, MarketDataError> {
        check_time(t)?;
        let i = self.segment(t);
        let (start, base) = if i == 0 {
            (0.0, 0.0)
        } else {
            (self.tenors[i - 1], self.cumulative[i - 1])
        };
        Ok(base + self.hazard_rates[i] * (t - start))
    }
}

/// A flat (constant) hazard rate curve.
///
/// # Example
///
/// ```
/// use tranche_core::market_data::curves::{CreditCurve, FlatHazardRateCurve};
///
/// let curve = FlatHazardRateCurve::new(0.01);
/// let surv = curve.survival_probability(5.0).unwrap();
/// assert!((surv - (-0.05f64).exp()).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatHazardRateCurve {
    hazard_rate: f64,
}

impl FlatHazardRateCurve {
    /// Construct a flat hazard rate curve.
    #[inline]
    pub fn new(hazard_rate: f64) -> Self {
        Self { hazard_rate }
    }

    /// The constant hazard rate that reproduces `survival` at time `t`.
    ///
    /// # Errors
    /// `MarketDataError::InvalidValue` unless `0 < survival <= 1` and `t > 0`.
    pub fn from_survival(survival: f64, t: f64) -> Result<Self, MarketDataError> {
        if !(survival > 0.0 && survival <= 1.0 && t > 0.0) {
            return Err(MarketDataError::InvalidValue {
                reason: format!("cannot imply hazard from survival {} at t = {}", survival, t),
            });
        }
        Ok(Self::new(-survival.ln() / t))
    }

    /// The constant hazard rate.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.hazard_rate
    }
}

impl CreditCurve for FlatHazardRateCurve {
    fn hazard_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        check_time(t)?;
        Ok(self.hazard_rate)
    }

    fn integrated_hazard(&self, t: f64) -> Result<f64, MarketDataError> {
        check_time(t)?;
        Ok(self.hazard_rate * t)
    }
}

/// Static dispatch enum wrapping the concrete credit curves.
#[derive(Debug, Clone, PartialEq)]
pub enum CreditCurveEnum {
    /// Constant hazard rate.
    Flat(FlatHazardRateCurve),
    /// Piecewise-constant hazard rate.
    Piecewise(HazardRateCurve),
}

impl CreditCurveEnum {
    /// Flat curve with the given hazard rate.
    pub fn flat(hazard_rate: f64) -> Self {
        CreditCurveEnum::Flat(FlatHazardRateCurve::new(hazard_rate))
    }
}

impl CreditCurve for CreditCurveEnum {
    fn hazard_rate(&self, t: f64) -> Result<f64, MarketDataError> {
        match self {
            CreditCurveEnum::Flat(c) => c.hazard_rate(t),
            CreditCurveEnum::Piecewise(c) => c.hazard_rate(t),
        }
    }

    fn integrated_hazard(&self, t: f64) -> Result<f64, MarketDataError> {
        match self {
            CreditCurveEnum::Flat(c) => c.integrated_hazard(t),
            CreditCurveEnum::Piecewise(c) => c.integrated_hazard(t),
        }
    }
}

impl From<FlatHazardRateCurve> for CreditCurveEnum {
    fn from(curve: FlatHazardRateCurve) -> Self {
        CreditCurveEnum::Flat(curve)
    }
}

impl From<HazardRateCurve> for CreditCurveEnum {
    fn from(curve: HazardRateCurve) -> Self {
        CreditCurveEnum::Piecewise(curve)
    }
}
