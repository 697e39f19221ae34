//! Date-anchored curves consumed by basket models.
//!
//! Basket models query curves by calendar date. Each dated curve carries its
//! own as-of date and day count and converts dates to year fractions before
//! delegating to a time-based curve.

use super::curves::{CreditCurve, CreditCurveEnum, FlatCurve, YieldCurve};
use super::error::MarketDataError;
use crate::math::interpolators::LinearInterpolator;
use crate::types::{Date, DayCountConvention};

/// Survival probability curve anchored at an as-of date.
///
/// `interpolate(date)` returns `P(τ > date)`; dates on or before the as-of
/// date return 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalCurve {
    as_of: Date,
    day_count: DayCountConvention,
    curve: CreditCurveEnum,
}

impl SurvivalCurve {
    /// Wraps a time-based credit curve.
    pub fn new(as_of: Date, day_count: DayCountConvention, curve: impl Into<CreditCurveEnum>) -> Self {
        Self {
            as_of,
            day_count,
            curve: curve.into(),
        }
    }

    /// Flat hazard rate curve under ACT/365.
    pub fn flat(as_of: Date, hazard_rate: f64) -> Self {
        Self::new(
            as_of,
            DayCountConvention::ActualActual365,
            CreditCurveEnum::flat(hazard_rate),
        )
    }

    /// Piecewise-constant hazard curve that reproduces the given survival
    /// probabilities at the given dates.
    ///
    /// # Errors
    /// `MarketDataError::InvalidValue` if a survival probability is outside
    /// `(0, 1]` or increases with date, plus the pillar errors of
    /// [`HazardRateCurve::new`](super::curves::HazardRateCurve::new).
    pub fn from_survival_points(
        as_of: Date,
        day_count: DayCountConvention,
        dates: &[Date],
        survival: &[f64],
    ) -> Result<Self, MarketDataError> {
        if dates.len() != survival.len() {
            return Err(MarketDataError::InsufficientData {
                got: survival.len(),
                need: dates.len(),
            });
        }
        let mut tenors = Vec::with_capacity(dates.len());
        let mut rates = Vec::with_capacity(dates.len());
        let (mut prev_t, mut prev_h) = (0.0, 0.0);
        for (&date, &s) in dates.iter().zip(survival) {
            if !(s > 0.0 && s <= 1.0) {
                return Err(MarketDataError::InvalidValue {
                    reason: format!("survival probability {} at {} outside (0, 1]", s, date),
                });
            }
            let t = day_count.year_fraction_dates(as_of, date);
            if t <= prev_t {
                return Err(MarketDataError::InvalidMaturity { t });
            }
            let h = -s.ln();
            if h < prev_h {
                return Err(MarketDataError::InvalidValue {
                    reason: format!("survival increases at {}", date),
                });
            }
            rates.push((h - prev_h) / (t - prev_t));
            tenors.push(t);
            prev_t = t;
            prev_h = h;
        }
        let curve = super::curves::HazardRateCurve::new(&tenors, &rates)?;
        Ok(Self::new(as_of, day_count, curve))
    }

    /// The curve's as-of date.
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Year fraction from the as-of date, floored at zero.
    pub fn time(&self, date: Date) -> f64 {
        self.day_count.year_fraction_dates(self.as_of, date).max(0.0)
    }

    /// Survival probability to `date`.
    pub fn interpolate(&self, date: Date) -> Result<f64, MarketDataError> {
        self.curve.survival_probability(self.time(date))
    }

    /// Default probability to `date`.
    pub fn default_probability(&self, date: Date) -> Result<f64, MarketDataError> {
        self.curve.default_probability(self.time(date))
    }

    /// Integrated hazard to `date`.
    pub fn integrated_hazard(&self, date: Date) -> Result<f64, MarketDataError> {
        self.curve.integrated_hazard(self.time(date))
    }

    /// Underlying time-based curve.
    pub fn curve(&self) -> &CreditCurveEnum {
        &self.curve
    }
}

/// Recovery rate curve with a recovery dispersion.
///
/// Values are linearly interpolated in date and held flat outside the pillar
/// range. `dispersion` is the standard deviation of the realised recovery
/// around its expectation; zero means deterministic recovery. Models realise
/// it as the two equally likely outcomes `r ± dispersion`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCurve {
    pillars: Option<(Vec<Date>, LinearInterpolator<f64>)>,
    constant: f64,
    dispersion: f64,
}

impl RecoveryCurve {
    /// Deterministic constant recovery.
    pub fn constant(recovery: f64) -> Self {
        Self {
            pillars: None,
            constant: recovery,
            dispersion: 0.0,
        }
    }

    /// Constant recovery with dispersion.
    ///
    /// # Errors
    /// `MarketDataError::InvalidValue` if recovery is outside [0, 1] or the
    /// dispersion is negative or would push `r ± dispersion` outside [0, 1].
    pub fn with_dispersion(recovery: f64, dispersion: f64) -> Result<Self, MarketDataError> {
        validate_recovery(recovery)?;
        if !(dispersion >= 0.0) || dispersion > recovery.min(1.0 - recovery) + 1e-12 {
            return Err(MarketDataError::InvalidValue {
                reason: format!(
                    "recovery dispersion {} inadmissible for recovery {}",
                    dispersion, recovery
                ),
            });
        }
        Ok(Self {
            pillars: None,
            constant: recovery,
            dispersion,
        })
    }

    /// Date-dependent deterministic recovery.
    pub fn from_points(dates: &[Date], values: &[f64]) -> Result<Self, MarketDataError> {
        for &v in values {
            validate_recovery(v)?;
        }
        if dates.len() == 1 && values.len() == 1 {
            return Ok(Self::constant(values[0]));
        }
        let epoch = dates.first().copied().ok_or(MarketDataError::InsufficientData {
            got: 0,
            need: 1,
        })?;
        let xs: Vec<f64> = dates.iter().map(|&d| (d - epoch) as f64).collect();
        let interp = LinearInterpolator::new(&xs, values)?;
        let constant = values[0];
        Ok(Self {
            pillars: Some((dates.to_vec(), interp)),
            constant,
            dispersion: 0.0,
        })
    }

    /// Expected recovery at `date`.
    pub fn interpolate(&self, date: Date) -> f64 {
        match &self.pillars {
            None => self.constant,
            Some((dates, interp)) => {
                let epoch = dates[0];
                interp.interpolate_flat((date - epoch) as f64)
            }
        }
    }

    /// Recovery dispersion.
    pub fn dispersion(&self) -> f64 {
        self.dispersion
    }

    /// Low and high recovery outcomes at `date`, each with probability 1/2.
    pub fn outcomes(&self, date: Date) -> (f64, f64) {
        let r = self.interpolate(date);
        (r - self.dispersion, r + self.dispersion)
    }
}

fn validate_recovery(recovery: f64) -> Result<(), MarketDataError> {
    if (0.0..=1.0).contains(&recovery) {
        Ok(())
    } else {
        Err(MarketDataError::InvalidValue {
            reason: format!("recovery {} outside [0, 1]", recovery),
        })
    }
}

/// Discount curve anchored at an as-of date.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountCurve {
    as_of: Date,
    day_count: DayCountConvention,
    curve: FlatCurve,
}

impl DiscountCurve {
    /// Flat continuously compounded curve under ACT/365.
    pub fn flat(as_of: Date, rate: f64) -> Self {
        Self {
            as_of,
            day_count: DayCountConvention::ActualActual365,
            curve: FlatCurve::new(rate),
        }
    }

    /// The curve's as-of date.
    pub fn as_of(&self) -> Date {
        self.as_of
    }

    /// Discount factor to `date`; 1 on or before the as-of date.
    pub fn discount(&self, date: Date) -> Result<f64, MarketDataError> {
        let t = self.day_count.year_fraction_dates(self.as_of, date).max(0.0);
        self.curve.discount_factor(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    #[test]
    fn test_survival_before_as_of_is_one() {
        let curve = SurvivalCurve::flat(d(2024, 1, 1), 0.05);
        assert_eq!(curve.interpolate(d(2023, 6, 1)).unwrap(), 1.0);
        assert_eq!(curve.interpolate(d(2024, 1, 1)).unwrap(), 1.0);
    }

    #[test]
    fn test_survival_points_reproduced() {
        let as_of = d(2024, 1, 1);
        let dates = [d(2025, 1, 1), d(2027, 1, 1), d(2029, 1, 1)];
        let survival = [0.98, 0.93, 0.85];
        let curve = SurvivalCurve::from_survival_points(
            as_of,
            DayCountConvention::ActualActual365,
            &dates,
            &survival,
        )
        .unwrap();
        for (&date, &s) in dates.iter().zip(&survival) {
            assert_relative_eq!(curve.interpolate(date).unwrap(), s, epsilon = 1e-12);
        }
        let mid = curve.interpolate(d(2026, 1, 1)).unwrap();
        assert!(mid < 0.98 && mid > 0.93);
    }

    #[test]
    fn test_survival_points_rejects_increasing_survival() {
        let as_of = d(2024, 1, 1);
        let result = SurvivalCurve::from_survival_points(
            as_of,
            DayCountConvention::ActualActual365,
            &[d(2025, 1, 1), d(2026, 1, 1)],
            &[0.9, 0.95],
        );
        assert!(matches!(result, Err(MarketDataError::InvalidValue { .. })));
    }

    #[test]
    fn test_recovery_interpolation() {
        let curve = RecoveryCurve::from_points(&[d(2024, 1, 1), d(2024, 1, 11)], &[0.4, 0.5]).unwrap();
        assert_relative_eq!(curve.interpolate(d(2024, 1, 6)), 0.45, epsilon = 1e-12);
        assert_eq!(curve.interpolate(d(2023, 1, 1)), 0.4);
        assert_eq!(curve.interpolate(d(2030, 1, 1)), 0.5);
        assert_eq!(curve.dispersion(), 0.0);
    }

    #[test]
    fn test_recovery_dispersion_bounds() {
        assert!(RecoveryCurve::with_dispersion(0.4, 0.1).is_ok());
        assert!(RecoveryCurve::with_dispersion(0.4, 0.45).is_err());
        let curve = RecoveryCurve::with_dispersion(0.4, 0.1).unwrap();
        let (lo, hi) = curve.outcomes(d(2025, 1, 1));
        assert_relative_eq!(lo, 0.3, epsilon = 1e-15);
        assert_relative_eq!(hi, 0.5, epsilon = 1e-15);
        assert!(RecoveryCurve::with_dispersion(1.2, 0.0).is_err());
    }

    #[test]
    fn test_discount_curve() {
        let curve = DiscountCurve::flat(d(2024, 1, 1), 0.05);
        assert_relative_eq!(
            curve.discount(d(2025, 1, 1)).unwrap(),
            (-0.05 * 366.0 / 365.0f64).exp(),
            epsilon = 1e-14
        );
    }
}
