//! Basket distribution strategies.
//!
//! Every strategy answers the same three questions about a tranche
//! `[begin, end]` of the original notional: how much of it has been lost by
//! a date, how much has amortized, and what the one-date loss distribution
//! looks like. They differ in how the underlying surfaces are produced.
//!
//! | Variant | Surfaces from |
//! |---|---|
//! | [`Basket::Analytic`] | large homogeneous pool limit |
//! | [`Basket::SemiAnalytic`] | conditional recursion with recovery dispersion |
//! | [`Basket::MonteCarlo`] | default-time simulation |
//! | [`Basket::Dynamic`] | per-node conditional surfaces (quadrature or Hull-White jumps) |
//! | [`Basket::CounterpartyConditioned`] | recursion conditioned on counterparty survival |
//! | [`Basket::Mixture`] | weighted average of duplicated component baskets |
//! | [`Basket::BootstrapCalibrated`] | recursion on a tenor-wise factor term structure |
//! | [`Basket::BaseCorrelationNested`] | CDO² simulation with implied sub-basket correlations |

mod analytic;
mod bootstrap;
mod counterparty;
mod dynamic;
mod engine;
mod mixture;
mod monte_carlo;
mod nested;
mod semi_analytic;

pub use analytic::AnalyticBasket;
pub use bootstrap::BootstrapBasket;
pub use counterparty::CounterpartyBasket;
pub use dynamic::{DynamicBasket, DynamicKernel};
pub use engine::SurfaceBasket;
pub use mixture::MixtureBasket;
pub use monte_carlo::MonteCarloBasket;
pub use nested::BaseCorrelationNestedBasket;
pub use semi_analytic::SemiAnalyticBasket;

use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_core::types::Date;
use tranche_models::{BasketError, BasketSurfaces, Correlation};

/// Loss distribution of the current pool at one date.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LossDistribution {
    /// Distribution date.
    pub date: Date,
    /// `true`: values are `P(L ≤ ℓ)`; `false`: values are `E[min(L, ℓ)]`.
    pub probability: bool,
    /// Levels, ascending.
    pub levels: Vec<f64>,
    /// Value per level.
    pub values: Vec<f64>,
}

/// The calling convention every basket strategy exposes.
///
/// Accessors take `&mut self`: the first read after a mutation computes and
/// caches the surfaces. Use [`duplicate`](Self::duplicate) to obtain an
/// independent calculator over the same static data.
pub trait BasketDistribution {
    /// Shared static configuration.
    fn setup(&self) -> &Arc<BasketSetup>;

    /// Notional that tranche fractions refer to.
    fn notional(&self) -> f64 {
        self.setup().notional()
    }

    /// Expected loss of `[begin, end]` by `date`, as a fraction of the
    /// original notional.
    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError>;

    /// Expected amortization of `[begin, end]` by `date`, as a fraction of
    /// the original notional. Amortization erodes tranches from the top.
    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError>;

    /// Uncached loss distribution at `date` on the given levels.
    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError>;

    /// Whether cached surfaces are valid.
    fn is_computed(&self) -> bool;

    /// Discards cached surfaces.
    fn reset(&mut self);

    /// Applies a reset flag.
    fn reset_with(&mut self, flag: ResetFlag);

    /// Same configuration by reference, empty cache.
    fn duplicate(&self) -> Self
    where
        Self: Sized;

    /// Configuration and cached surfaces copied.
    fn deep_clone(&self) -> Self
    where
        Self: Sized + Clone,
    {
        self.clone()
    }
}

/// Tranche value read from surfaces built on the remaining pool.
///
/// Amortization uses the complementary coordinates `[1 - end, 1 - begin]`.
/// History realised before the start is folded back in through the prior
/// loss adjustment.
pub(crate) fn tranche_fraction(
    setup: &BasketSetup,
    surfaces: &BasketSurfaces,
    date: Date,
    begin: f64,
    end: f64,
    is_amortization: bool,
) -> Result<f64, BasketError> {
    if begin > end {
        return Err(BasketError::inverted_tranche());
    }
    let (lo, hi) = if is_amortization {
        (1.0 - end, 1.0 - begin)
    } else {
        (begin, end)
    };
    let prior = setup.prior();
    let adjusted = prior.adjust_tranche_levels(is_amortization, lo, hi)?;
    if adjusted.is_collapsed() {
        return Ok(adjusted.baseline);
    }
    let surface = if is_amortization {
        &surfaces.amortization
    } else {
        &surfaces.loss
    };
    let area = surface.interpolate_range(date, adjusted.begin, adjusted.end)?;
    Ok(adjusted.baseline + prior.remaining_ratio() * area)
}

/// Any basket strategy.
#[derive(Debug, Clone)]
pub enum Basket {
    /// Large homogeneous pool.
    Analytic(AnalyticBasket),
    /// Conditional recursion.
    SemiAnalytic(SemiAnalyticBasket),
    /// Monte Carlo simulation.
    MonteCarlo(MonteCarloBasket),
    /// Per-node conditional surfaces.
    Dynamic(DynamicBasket),
    /// Counterparty-conditioned recursion.
    CounterpartyConditioned(CounterpartyBasket),
    /// Weighted mixture of components.
    Mixture(MixtureBasket),
    /// Tenor-wise bootstrapped factors.
    BootstrapCalibrated(BootstrapBasket),
    /// CDO² with base-correlation-implied sub-basket correlations.
    BaseCorrelationNested(BaseCorrelationNestedBasket),
}

macro_rules! dispatch {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            Basket::Analytic($b) => $body,
            Basket::SemiAnalytic($b) => $body,
            Basket::MonteCarlo($b) => $body,
            Basket::Dynamic($b) => $body,
            Basket::CounterpartyConditioned($b) => $body,
            Basket::Mixture($b) => $body,
            Basket::BootstrapCalibrated($b) => $body,
            Basket::BaseCorrelationNested($b) => $body,
        }
    };
}

impl Basket {
    /// Variant name for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Basket::Analytic(_) => "Analytic",
            Basket::SemiAnalytic(_) => "SemiAnalytic",
            Basket::MonteCarlo(_) => "MonteCarlo",
            Basket::Dynamic(_) => "Dynamic",
            Basket::CounterpartyConditioned(_) => "CounterpartyConditioned",
            Basket::Mixture(_) => "Mixture",
            Basket::BootstrapCalibrated(_) => "BootstrapCalibrated",
            Basket::BaseCorrelationNested(_) => "BaseCorrelationNested",
        }
    }

    /// Replaces the correlation object.
    ///
    /// # Errors
    /// `BasketError::UnsupportedCorrelation` for strategies whose
    /// correlation is derived rather than supplied.
    pub fn set_correlation(&mut self, correlation: Correlation) -> Result<(), BasketError> {
        let variant = correlation.variant_name();
        match self {
            Basket::Analytic(b) => b.set_correlation(correlation),
            Basket::SemiAnalytic(b) => b.set_correlation(correlation),
            Basket::MonteCarlo(b) => b.set_correlation(correlation),
            Basket::Dynamic(b) => b.set_correlation(correlation),
            Basket::CounterpartyConditioned(b) => b.set_correlation(correlation),
            Basket::Mixture(_) | Basket::BootstrapCalibrated(_) | Basket::BaseCorrelationNested(_) => {
                return Err(BasketError::UnsupportedCorrelation {
                    variant,
                    context: "a basket with derived correlation",
                })
            }
        }
        Ok(())
    }

    /// Replaces every principal, copy-on-write.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        dispatch!(self, b => b.set_principals(principals))
    }
}

impl BasketDistribution for Basket {
    fn setup(&self) -> &Arc<BasketSetup> {
        dispatch!(self, b => b.setup())
    }

    fn notional(&self) -> f64 {
        dispatch!(self, b => b.notional())
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        dispatch!(self, b => b.accumulated_loss(date, begin, end))
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        dispatch!(self, b => b.amortized_amount(date, begin, end))
    }

    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        dispatch!(self, b => b.calc_loss_distribution(want_probability, date, levels))
    }

    fn is_computed(&self) -> bool {
        dispatch!(self, b => b.is_computed())
    }

    fn reset(&mut self) {
        dispatch!(self, b => b.reset())
    }

    fn reset_with(&mut self, flag: ResetFlag) {
        dispatch!(self, b => b.reset_with(flag))
    }

    fn duplicate(&self) -> Self {
        match self {
            Basket::Analytic(b) => Basket::Analytic(b.duplicate()),
            Basket::SemiAnalytic(b) => Basket::SemiAnalytic(b.duplicate()),
            Basket::MonteCarlo(b) => Basket::MonteCarlo(b.duplicate()),
            Basket::Dynamic(b) => Basket::Dynamic(b.duplicate()),
            Basket::CounterpartyConditioned(b) => Basket::CounterpartyConditioned(b.duplicate()),
            Basket::Mixture(b) => Basket::Mixture(b.duplicate()),
            Basket::BootstrapCalibrated(b) => Basket::BootstrapCalibrated(b.duplicate()),
            Basket::BaseCorrelationNested(b) => Basket::BaseCorrelationNested(b.duplicate()),
        }
    }
}

/// Implements [`BasketDistribution`] for a strategy wrapping a
/// [`SurfaceBasket`] in its `inner` field.
macro_rules! surface_basket_distribution {
    ($ty:ty) => {
        impl $crate::basket::BasketDistribution for $ty {
            fn setup(&self) -> &std::sync::Arc<$crate::setup::BasketSetup> {
                self.inner.setup()
            }

            fn accumulated_loss(
                &mut self,
                date: tranche_core::types::Date,
                begin: f64,
                end: f64,
            ) -> Result<f64, tranche_models::BasketError> {
                self.inner.accumulated_loss(date, begin, end)
            }

            fn amortized_amount(
                &mut self,
                date: tranche_core::types::Date,
                begin: f64,
                end: f64,
            ) -> Result<f64, tranche_models::BasketError> {
                self.inner.amortized_amount(date, begin, end)
            }

            fn calc_loss_distribution(
                &self,
                want_probability: bool,
                date: tranche_core::types::Date,
                levels: &[f64],
            ) -> Result<$crate::basket::LossDistribution, tranche_models::BasketError> {
                self.inner
                    .calc_loss_distribution(want_probability, date, levels)
            }

            fn is_computed(&self) -> bool {
                self.inner.lazy().is_computed()
            }

            fn reset(&mut self) {
                self.inner.reset();
            }

            fn reset_with(&mut self, flag: $crate::lazy::ResetFlag) {
                self.inner.reset_with(flag);
            }

            fn duplicate(&self) -> Self {
                Self {
                    inner: self.inner.duplicate(),
                }
            }
        }
    };
}
pub(crate) use surface_basket_distribution;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use approx::assert_relative_eq;
    use tranche_models::PriorLoss;

    fn analytic(hazard: f64, rho: f64) -> Basket {
        Basket::Analytic(AnalyticBasket::new(
            fixtures::setup(10, hazard).shared(),
            Correlation::single_factor(rho).unwrap(),
        ))
    }

    #[test]
    fn test_inverted_tranche_rejected() {
        let mut basket = analytic(0.02, 0.3);
        let err = basket.accumulated_loss(fixtures::maturity(), 0.2, 0.1).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: attachment cannot exceed detachment");
        assert!(basket.amortized_amount(fixtures::maturity(), 0.2, 0.1).is_err());
    }

    #[test]
    fn test_dates_outside_window_rejected() {
        let mut basket = analytic(0.02, 0.3);
        let late = Date::from_ymd(2030, 1, 1).unwrap();
        assert!(matches!(
            basket.accumulated_loss(late, 0.0, 0.1),
            Err(BasketError::DateOutOfRange { .. })
        ));
    }

    #[test]
    fn test_prior_defaults_fold_into_equity() {
        // 10% defaulted before the start, zero correlation: the remaining
        // pool loses (1 - R) pd deterministically in the large pool limit.
        let prior = PriorLoss::new(10.0, 9.0, 1.0, 0.0).unwrap();
        let setup = fixtures::setup(10, 0.03).with_prior(prior);
        assert!(!setup.has_level(0.2));
        let mut basket = Basket::Analytic(AnalyticBasket::new(
            setup.shared(),
            Correlation::single_factor(0.0).unwrap(),
        ));
        let date = fixtures::maturity();
        let pd = 1.0 - (-0.03f64 * 1827.0 / 365.0).exp();
        let remaining_loss = 0.6 * pd;
        let expected = 0.1 + 0.9 * remaining_loss.min(0.1 / 0.9);
        assert_relative_eq!(
            basket.accumulated_loss(date, 0.0, 0.2).unwrap(),
            expected,
            epsilon = 1e-7
        );
        assert!(basket.setup().has_level(0.2));
        // A tranche entirely below the prior loss is fully consumed
        assert_relative_eq!(basket.accumulated_loss(date, 0.0, 0.05).unwrap(), 0.05, epsilon = 1e-15);
    }

    #[test]
    fn test_off_grid_tranche_matches_registered_grid() {
        let date = Date::from_ymd(2026, 8, 17).unwrap();
        let mut off_grid = Basket::SemiAnalytic(SemiAnalyticBasket::new(
            fixtures::setup(10, 0.03).shared(),
            Correlation::single_factor(0.3).unwrap(),
        ));
        let mut registered = Basket::SemiAnalytic(SemiAnalyticBasket::new(
            fixtures::setup(10, 0.03).with_levels(&[0.045, 0.12]).shared(),
            Correlation::single_factor(0.3).unwrap(),
        ));
        off_grid.accumulated_loss(date, 0.0, 0.03).unwrap();
        assert!(!off_grid.setup().has_level(0.045));

        let loss = off_grid.accumulated_loss(date, 0.045, 0.12).unwrap();
        assert!(off_grid.setup().has_level(0.045) && off_grid.setup().has_level(0.12));
        assert!(off_grid.is_computed());
        assert_relative_eq!(
            loss,
            registered.accumulated_loss(date, 0.045, 0.12).unwrap(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            off_grid.amortized_amount(date, 0.045, 0.12).unwrap(),
            registered.amortized_amount(date, 0.045, 0.12).unwrap(),
            max_relative = 1e-12
        );
        // Registering leaves existing levels unchanged
        assert_relative_eq!(
            off_grid.accumulated_loss(date, 0.03, 0.07).unwrap(),
            registered.accumulated_loss(date, 0.03, 0.07).unwrap(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_clone_is_deterministic_after_reset() {
        let mut original = analytic(0.02, 0.3);
        let date = fixtures::maturity();
        let before = original.accumulated_loss(date, 0.03, 0.07).unwrap();
        let mut clone = original.deep_clone();
        assert!(clone.is_computed());
        original.reset();
        assert!(!original.is_computed());
        assert_eq!(clone.accumulated_loss(date, 0.03, 0.07).unwrap(), before);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut original = analytic(0.02, 0.3);
        let date = fixtures::maturity();
        let before = original.accumulated_loss(date, 0.0, 0.1).unwrap();

        let mut dup = original.duplicate();
        assert!(!dup.is_computed());
        let mut principals = vec![1.0; 10];
        principals[0] = 5.0;
        dup.set_principals(principals).unwrap();
        dup.set_correlation(Correlation::single_factor(0.8).unwrap()).unwrap();
        let dup_loss = dup.accumulated_loss(date, 0.0, 0.1).unwrap();

        assert_eq!(original.accumulated_loss(date, 0.0, 0.1).unwrap(), before);
        assert_ne!(dup_loss, before);
        assert_eq!(original.setup().notional(), 10.0);
        assert_eq!(dup.setup().notional(), 14.0);
    }

    #[test]
    fn test_settle_change_keeps_surfaces() {
        let mut basket = analytic(0.02, 0.3);
        let date = fixtures::maturity();
        let before = basket.accumulated_loss(date, 0.0, 0.1).unwrap();
        basket.reset_with(ResetFlag::SettleChanged(Date::from_ymd(2024, 2, 1).unwrap()));
        assert!(basket.is_computed());
        assert_eq!(basket.accumulated_loss(date, 0.0, 0.1).unwrap(), before);
    }

    #[test]
    fn test_derived_correlation_cannot_be_replaced() {
        let setup = fixtures::setup(10, 0.02).shared();
        let term = tranche_models::CorrelationTermStruct::common(
            vec![fixtures::maturity()],
            vec![0.5],
        )
        .unwrap();
        let mut basket = Basket::BootstrapCalibrated(BootstrapBasket::new(setup, term));
        assert!(matches!(
            basket.set_correlation(Correlation::single_factor(0.2).unwrap()),
            Err(BasketError::UnsupportedCorrelation { .. })
        ));
    }
}
