//! Single-tranche proxy instrument.
//!
//! A synthetic tranche pays protection on the loss of `[attachment,
//! detachment]` and receives a running spread on its outstanding notional.
//! Legs are discounted on the basket's date grid; this is the proxy used to
//! turn base correlations into prices during calibration.

use crate::basket::BasketDistribution;
use tranche_core::market_data::DiscountCurve;
use tranche_core::types::{Date, DayCountConvention};
use tranche_models::BasketError;

/// Tranche of a basket's original notional.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyntheticTranche {
    /// Attachment fraction.
    pub attachment: f64,
    /// Detachment fraction.
    pub detachment: f64,
    /// Last protection date.
    pub maturity: Date,
    /// Running spread per year on the outstanding tranche notional.
    pub spread: f64,
}

impl SyntheticTranche {
    /// Validated tranche.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` unless `0 ≤ attachment ≤ detachment ≤ 1`
    /// and the spread is finite.
    pub fn new(attachment: f64, detachment: f64, maturity: Date, spread: f64) -> Result<Self, BasketError> {
        if attachment > detachment {
            return Err(BasketError::inverted_tranche());
        }
        if !(attachment >= 0.0 && detachment <= 1.0) {
            return Err(BasketError::InvalidArgument(format!(
                "tranche [{}, {}] outside [0, 1]",
                attachment, detachment
            )));
        }
        if !spread.is_finite() {
            return Err(BasketError::InvalidArgument(format!("spread {} is not finite", spread)));
        }
        Ok(Self {
            attachment,
            detachment,
            maturity,
            spread,
        })
    }

    /// Whether the tranche covers the whole pool.
    pub fn is_full_range(&self) -> bool {
        self.attachment <= 0.0 && self.detachment >= 1.0
    }

    /// Tranche width as a fraction of the pool.
    pub fn width(&self) -> f64 {
        self.detachment - self.attachment
    }

    fn schedule<B: BasketDistribution + ?Sized>(&self, basket: &B) -> Result<Vec<Date>, BasketError> {
        let setup = basket.setup();
        setup.check_date(self.maturity)?;
        let mut dates: Vec<Date> = setup
            .dates()
            .iter()
            .copied()
            .filter(|&d| d <= self.maturity)
            .collect();
        if dates.last() != Some(&self.maturity) {
            dates.push(self.maturity);
        }
        Ok(dates)
    }

    /// Discounted expected tranche loss in currency units.
    pub fn protection_leg<B: BasketDistribution + ?Sized>(
        &self,
        basket: &mut B,
        discount: &DiscountCurve,
    ) -> Result<f64, BasketError> {
        let dates = self.schedule(basket)?;
        let notional = basket.notional();
        let mut previous = 0.0;
        let mut leg = 0.0;
        for date in dates {
            let loss = basket.accumulated_loss(date, self.attachment, self.detachment)?;
            leg += discount.discount(date)? * (loss - previous);
            previous = loss;
        }
        Ok(leg * notional)
    }

    /// Discounted spread payments on the outstanding tranche notional, in
    /// currency units.
    pub fn premium_leg<B: BasketDistribution + ?Sized>(
        &self,
        basket: &mut B,
        discount: &DiscountCurve,
    ) -> Result<f64, BasketError> {
        if self.spread == 0.0 {
            return Ok(0.0);
        }
        let dates = self.schedule(basket)?;
        let notional = basket.notional();
        let day_count = DayCountConvention::ActualActual365;
        let width = self.width();
        let outstanding = |b: &mut B, d: Date| -> Result<f64, BasketError> {
            let loss = b.accumulated_loss(d, self.attachment, self.detachment)?;
            let amortized = b.amortized_amount(d, self.attachment, self.detachment)?;
            Ok((width - loss - amortized).max(0.0))
        };
        let mut previous = (dates[0], outstanding(basket, dates[0])?);
        let mut leg = 0.0;
        for &date in &dates[1..] {
            let current = outstanding(basket, date)?;
            let accrual = day_count.year_fraction_dates(previous.0, date);
            leg += discount.discount(date)? * accrual * 0.5 * (previous.1 + current);
            previous = (date, current);
        }
        Ok(leg * self.spread * notional)
    }

    /// Protection minus premium, in currency units.
    pub fn pv<B: BasketDistribution + ?Sized>(
        &self,
        basket: &mut B,
        discount: &DiscountCurve,
    ) -> Result<f64, BasketError> {
        Ok(self.protection_leg(basket, discount)? - self.premium_leg(basket, discount)?)
    }
}
