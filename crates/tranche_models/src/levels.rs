//! Loss level utilities.
//!
//! Tranche attachment and detachment points are fractions of the original
//! pool notional. Surfaces are built on fractions of the *current* pool, so
//! losses and amortizations realised before the settle date must be taken
//! out of the tranche coordinates first (`PriorLoss`), and the resulting
//! levels rounded so that ratios land exactly on grid breakpoints
//! (`round_loss_level`).

use crate::error::BasketError;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Rounds a loss level to `digits` decimal places in fixed-point decimal
/// arithmetic and clamps the result to [0, 1].
///
/// Non-finite input clamps directly (`NaN` stays `NaN`).
///
/// # Example
///
/// ```
/// use tranche_models::round_loss_level;
///
/// assert_eq!(round_loss_level(0.30000000000000004, 10), 0.3);
/// assert_eq!(round_loss_level(1.0000000000002, 10), 1.0);
/// assert_eq!(round_loss_level(-1e-13, 10), 0.0);
/// ```
pub fn round_loss_level(x: f64, digits: u32) -> f64 {
    let rounded = Decimal::from_f64(x)
        .map(|d| d.round_dp(digits.min(Decimal::MAX_SCALE)))
        .and_then(|d| d.to_f64())
        .unwrap_or(x);
    rounded.clamp(0.0, 1.0)
}

/// Tranche interval after removing prior realised principal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedTranche {
    /// Attachment on the remaining-pool scale.
    pub begin: f64,
    /// Detachment on the remaining-pool scale.
    pub end: f64,
    /// Part of the tranche already consumed before settle, as a fraction of
    /// the original notional.
    pub baseline: f64,
}

impl AdjustedTranche {
    /// True when the whole interval was absorbed by the baseline.
    pub fn is_collapsed(&self) -> bool {
        self.begin >= self.end
    }
}

/// Losses and amortizations realised before the settle date.
///
/// All amounts are in currency units. The remaining pool is
/// `current_principal / initial_principal` of the original notional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorLoss {
    initial_principal: f64,
    current_principal: f64,
    prior_loss: f64,
    prior_amortized: f64,
}

impl PriorLoss {
    /// No realised history: the current pool is the original pool.
    pub fn none(current_principal: f64) -> Self {
        Self {
            initial_principal: current_principal,
            current_principal,
            prior_loss: 0.0,
            prior_amortized: 0.0,
        }
    }

    /// Prior loss and amortization against an original notional.
    ///
    /// # Errors
    /// `BasketError::Configuration` for a non-positive principal, negative
    /// amounts, or a current principal above the original.
    pub fn new(
        initial_principal: f64,
        current_principal: f64,
        prior_loss: f64,
        prior_amortized: f64,
    ) -> Result<Self, BasketError> {
        if !(initial_principal > 0.0 && current_principal > 0.0) {
            return Err(BasketError::Configuration(format!(
                "principals must be positive (initial {}, current {})",
                initial_principal, current_principal
            )));
        }
        if !(prior_loss >= 0.0 && prior_amortized >= 0.0) {
            return Err(BasketError::Configuration(
                "prior loss and amortization must be non-negative".into(),
            ));
        }
        if current_principal > initial_principal * (1.0 + 1e-12) {
            return Err(BasketError::Configuration(format!(
                "current principal {} exceeds initial principal {}",
                current_principal, initial_principal
            )));
        }
        Ok(Self {
            initial_principal,
            current_principal,
            prior_loss,
            prior_amortized,
        })
    }

    /// Original notional.
    pub fn initial_principal(&self) -> f64 {
        self.initial_principal
    }

    /// Remaining notional.
    pub fn current_principal(&self) -> f64 {
        self.current_principal
    }

    /// Remaining notional as a fraction of the original.
    pub fn remaining_ratio(&self) -> f64 {
        self.current_principal / self.initial_principal
    }

    /// Realised loss (or amortization) as a fraction of the original.
    pub fn realised_fraction(&self, is_amortization: bool) -> f64 {
        let amount = if is_amortization {
            self.prior_amortized
        } else {
            self.prior_loss
        };
        amount / self.initial_principal
    }

    /// True if nothing was realised before settle.
    pub fn is_empty(&self) -> bool {
        self.prior_loss == 0.0
            && self.prior_amortized == 0.0
            && self.current_principal == self.initial_principal
    }

    /// Maps a level on the original scale to the remaining-pool scale.
    ///
    /// Amortization levels are given in complementary coordinates (`1 - x`).
    pub fn adjust_tranche_level(&self, is_amortization: bool, level: f64) -> f64 {
        let realised = self.realised_fraction(is_amortization);
        ((level - realised) / self.remaining_ratio()).clamp(0.0, 1.0)
    }

    /// Maps `[begin, end]` to the remaining-pool scale and reports the part
    /// of the tranche already consumed.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` if `begin > end`.
    pub fn adjust_tranche_levels(
        &self,
        is_amortization: bool,
        begin: f64,
        end: f64,
    ) -> Result<AdjustedTranche, BasketError> {
        if begin > end {
            return Err(BasketError::inverted_tranche());
        }
        let realised = self.realised_fraction(is_amortization);
        let baseline = (realised - begin).clamp(0.0, end - begin);
        let adj_begin = self.adjust_tranche_level(is_amortization, begin);
        let adj_end = self.adjust_tranche_level(is_amortization, end).max(adj_begin);
        Ok(AdjustedTranche {
            begin: adj_begin,
            end: adj_end,
            baseline,
        })
    }
}

/// Requested loss levels and the cooked set used for surface construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LossLevels {
    raw: Vec<f64>,
    cooked: Vec<f64>,
}

impl LossLevels {
    /// Cooks `raw` through `map(is_amortization, level)`.
    ///
    /// The cooked set contains 0, 1, the mapped raw levels and, unless
    /// `suppress_complement` is set, the mapped complements `1 - x` used by
    /// amortization. Every cooked value is rounded to `digits` places, then
    /// sorted and deduplicated.
    pub fn new<F>(raw: &[f64], digits: u32, suppress_complement: bool, map: F) -> Self
    where
        F: Fn(bool, f64) -> f64,
    {
        let mut cooked = vec![0.0, 1.0];
        for &x in raw.iter().filter(|x| x.is_finite()) {
            cooked.push(round_loss_level(map(false, x), digits));
            if !suppress_complement {
                cooked.push(round_loss_level(map(true, 1.0 - x), digits));
            }
        }
        cooked.sort_by(f64::total_cmp);
        cooked.dedup();
        Self {
            raw: raw.to_vec(),
            cooked,
        }
    }

    /// Cooks `raw` through a prior-loss adjustment.
    pub fn with_prior(raw: &[f64], prior: &PriorLoss, digits: u32, suppress_complement: bool) -> Self {
        Self::new(raw, digits, suppress_complement, |amort, x| {
            prior.adjust_tranche_level(amort, x)
        })
    }

    /// Levels as requested.
    pub fn raw(&self) -> &[f64] {
        &self.raw
    }

    /// Levels the surface is built on.
    pub fn cooked(&self) -> &[f64] {
        &self.cooked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_removes_ratio_noise() {
        assert_eq!(round_loss_level(0.1 + 0.2, 10), 0.3);
        assert_eq!(round_loss_level(0.07 / 0.7, 12), 0.1);
        assert_eq!(round_loss_level(2.0, 10), 1.0);
        assert!(round_loss_level(f64::NAN, 10).is_nan());
        assert_eq!(round_loss_level(f64::INFINITY, 10), 1.0);
    }

    #[test]
    fn test_adjust_without_history_is_identity() {
        let prior = PriorLoss::none(100.0);
        let adj = prior.adjust_tranche_levels(false, 0.03, 0.07).unwrap();
        assert_eq!(adj.begin, 0.03);
        assert_eq!(adj.end, 0.07);
        assert_eq!(adj.baseline, 0.0);
    }

    #[test]
    fn test_adjust_with_prior_defaults() {
        // 10 of 100 already lost, 90 remaining
        let prior = PriorLoss::new(100.0, 90.0, 10.0, 0.0).unwrap();
        let adj = prior.adjust_tranche_levels(false, 0.0, 0.2).unwrap();
        assert_eq!(adj.begin, 0.0);
        assert_relative_eq!(adj.end, 0.1 / 0.9, epsilon = 1e-15);
        assert_relative_eq!(adj.baseline, 0.1, epsilon = 1e-15);
    }

    #[test]
    fn test_adjust_collapsed_interval() {
        let prior = PriorLoss::new(100.0, 70.0, 30.0, 0.0).unwrap();
        let adj = prior.adjust_tranche_levels(false, 0.0, 0.2).unwrap();
        assert!(adj.is_collapsed());
        assert_relative_eq!(adj.baseline, 0.2, epsilon = 1e-15);
    }

    #[test]
    fn test_amortization_uses_its_own_history() {
        let prior = PriorLoss::new(100.0, 80.0, 5.0, 15.0).unwrap();
        // Senior tranche [0.7, 1.0] in complement coordinates is [0.0, 0.3]
        let adj = prior.adjust_tranche_levels(true, 0.0, 0.3).unwrap();
        assert_relative_eq!(adj.baseline, 0.15, epsilon = 1e-15);
        assert_relative_eq!(adj.end, 0.15 / 0.8, epsilon = 1e-15);
    }

    #[test]
    fn test_inverted_tranche_rejected() {
        let prior = PriorLoss::none(1.0);
        assert!(matches!(
            prior.adjust_tranche_levels(false, 0.3, 0.1),
            Err(BasketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prior_loss_validation() {
        assert!(PriorLoss::new(0.0, 1.0, 0.0, 0.0).is_err());
        assert!(PriorLoss::new(100.0, 120.0, 0.0, 0.0).is_err());
        assert!(PriorLoss::new(100.0, 90.0, -1.0, 0.0).is_err());
    }

    #[test]
    fn test_cooked_levels() {
        let levels = LossLevels::with_prior(&[0.03, 0.07], &PriorLoss::none(1.0), 10, false);
        assert_eq!(levels.cooked(), &[0.0, 0.03, 0.07, 0.93, 0.97, 1.0]);
        let suppressed = LossLevels::with_prior(&[0.03, 0.07], &PriorLoss::none(1.0), 10, true);
        assert_eq!(suppressed.cooked(), &[0.0, 0.03, 0.07, 1.0]);
        assert_eq!(suppressed.raw(), &[0.03, 0.07]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_round_is_idempotent(x in -0.5f64..1.5, digits in 0u32..16) {
                let once = round_loss_level(x, digits);
                prop_assert_eq!(round_loss_level(once, digits), once);
                prop_assert!((0.0..=1.0).contains(&once));
            }

            #[test]
            fn test_cooked_levels_sorted_and_unique(
                raw in proptest::collection::vec(0.0f64..1.0, 0..12)
            ) {
                let levels = LossLevels::with_prior(&raw, &PriorLoss::none(1.0), 8, false);
                let cooked = levels.cooked();
                prop_assert_eq!(cooked[0], 0.0);
                prop_assert_eq!(*cooked.last().unwrap(), 1.0);
                prop_assert!(cooked.windows(2).all(|w| w[0] < w[1]));
            }

            #[test]
            fn test_adjusted_levels_ordered(
                a in 0.0f64..1.0, w in 0.0f64..1.0, loss in 0.0f64..0.5
            ) {
                let b = (a + w).min(1.0);
                let prior = PriorLoss::new(1.0, 1.0 - loss, loss, 0.0).unwrap();
                let adj = prior.adjust_tranche_levels(false, a, b).unwrap();
                prop_assert!(adj.begin <= adj.end);
                prop_assert!(adj.baseline >= 0.0 && adj.baseline <= b - a + 1e-15);
            }
        }
    }
}
