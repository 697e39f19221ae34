//! Correlation and model parameter calibration.
//!
//! - [`implied_correlation`]: single-factor correlation reproducing the
//!   base-correlation price of a tranche (Brent)
//! - [`base_correlation_term_structure`]: the same result as a one-tenor
//!   term structure
//! - [`calibrate_hull_white`]: jump intensity and size fitted to tranche
//!   expected losses (Nelder-Mead)

use crate::basket::{BasketDistribution, DynamicBasket, SemiAnalyticBasket};
use crate::setup::BasketSetup;
use crate::tranche::SyntheticTranche;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tranche_core::market_data::DiscountCurve;
use tranche_core::math::solvers::{BrentSolver, NelderMeadConfig, NelderMeadSolver, SolverConfig};
use tranche_core::types::Date;
use tranche_models::correlation::signed_factor;
use tranche_models::{BaseCorrelation, BasketError, Correlation, CorrelationTermStruct, HullWhiteParams};

/// Upper end of the correlation bracket.
const MAX_CORRELATION: f64 = 0.999;

/// Evaluation cap of the correlation root find.
const MAX_EVALUATIONS: usize = 100;

/// Observed expected loss of a tranche at a maturity, as a fraction of the
/// original notional.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrancheQuote {
    /// Quote date.
    pub maturity: Date,
    /// Attachment fraction.
    pub attachment: f64,
    /// Detachment fraction.
    pub detachment: f64,
    /// Expected tranche loss.
    pub expected_loss: f64,
}

fn calibration_error(target: impl Into<String>, err: BasketError) -> BasketError {
    match err {
        BasketError::Solver(e) => BasketError::Calibration {
            target: target.into(),
            reason: e.to_string(),
        },
        other => other,
    }
}

fn single_factor_pv(
    setup: &Arc<BasketSetup>,
    rho: f64,
    tranche: &SyntheticTranche,
    discount: &DiscountCurve,
) -> Result<f64, BasketError> {
    let mut basket = SemiAnalyticBasket::new(Arc::clone(setup), Correlation::single_factor(rho)?);
    tranche.pv(&mut basket, discount)
}

/// Single-factor correlation at which `tranche` prices like it does under
/// the base-correlation curve.
///
/// The target is `PV[0, d](ρ(d)) - PV[0, a](ρ(a))`, strikes mapped with the
/// pool's expected loss to the tranche maturity. The root is searched in
/// `[0, 0.999]` with `tolerance_f = 1 / |total principal|` and
/// `tolerance_x = min(100 tolerance_f, 1e-4)`. A full-range tranche has
/// correlation 0.
///
/// # Errors
/// `BasketError::Calibration` when no root is bracketed or the evaluation
/// budget runs out.
pub fn implied_correlation(
    setup: &Arc<BasketSetup>,
    base: &BaseCorrelation,
    tranche: &SyntheticTranche,
    discount: &DiscountCurve,
) -> Result<f64, BasketError> {
    if tranche.is_full_range() {
        return Ok(0.0);
    }
    let expected_loss = setup.pool().expected_loss_fraction(tranche.maturity)?;
    let base_pv = |detachment: f64| -> Result<f64, BasketError> {
        if detachment <= 0.0 {
            return Ok(0.0);
        }
        let rho = base.base_correlation_at(base.strike(detachment, expected_loss));
        let base_tranche =
            SyntheticTranche::new(0.0, detachment, tranche.maturity, tranche.spread)?;
        single_factor_pv(setup, rho, &base_tranche, discount)
    };
    let target = base_pv(tranche.detachment)? - base_pv(tranche.attachment)?;

    let tolerance_f = 1.0 / setup.pool().total_principal().abs();
    let tolerance_x = (100.0 * tolerance_f).min(1e-4);
    let solver = BrentSolver::new(SolverConfig::new(tolerance_f, tolerance_x, MAX_EVALUATIONS));
    let label = format!(
        "[{}, {}] tranche correlation",
        tranche.attachment, tranche.detachment
    );
    let rho = solver
        .solve(
            target,
            |rho| single_factor_pv(setup, rho, tranche, discount),
            0.0,
            MAX_CORRELATION,
        )
        .map_err(|e| calibration_error(label, e))?;
    debug!(
        attachment = tranche.attachment,
        detachment = tranche.detachment,
        target,
        rho,
        "implied tranche correlation"
    );
    Ok(rho)
}

/// [`implied_correlation`] as a single-tenor factor term structure ending
/// at the tranche maturity.
pub fn base_correlation_term_structure(
    setup: &Arc<BasketSetup>,
    base: &BaseCorrelation,
    tranche: &SyntheticTranche,
    discount: &DiscountCurve,
) -> Result<CorrelationTermStruct, BasketError> {
    let rho = implied_correlation(setup, base, tranche, discount)?;
    CorrelationTermStruct::common(vec![tranche.maturity], vec![signed_factor(rho)])
}

/// Outcome of a Hull-White fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullWhiteFit {
    /// Fitted parameters, already applied to the basket.
    pub params: HullWhiteParams,
    /// Root mean square quote error.
    pub rmse: f64,
    /// Objective evaluations.
    pub evaluations: usize,
    /// Whether the minimiser met its tolerance.
    pub converged: bool,
}

/// Fits the Hull-White jump intensity and size to tranche quotes.
///
/// Minimises the squared expected-loss errors over `[0, 2]²` with
/// Nelder-Mead, starting from `initial`. The basket is left on the fitted
/// parameters and its unconditional view.
pub fn calibrate_hull_white(
    basket: &mut DynamicBasket,
    quotes: &[TrancheQuote],
    initial: HullWhiteParams,
) -> Result<HullWhiteFit, BasketError> {
    if quotes.is_empty() {
        return Err(BasketError::InvalidArgument(
            "Hull-White calibration needs at least one quote".into(),
        ));
    }
    basket.condition_on(None)?;
    let solver = NelderMeadSolver::new(NelderMeadConfig {
        max_iterations: 400,
        tolerance: 1e-12,
        ..Default::default()
    });
    let result = solver.minimise(
        |p: &[f64]| -> Result<f64, BasketError> {
            basket.set_hull_white(HullWhiteParams::new(p[0], p[1])?);
            let mut sse = 0.0;
            for q in quotes {
                let model = basket.accumulated_loss(q.maturity, q.attachment, q.detachment)?;
                sse += (model - q.expected_loss).powi(2);
            }
            Ok(sse)
        },
        &[initial.intensity, initial.jump_size],
        &[0.0, 0.0],
        &[2.0, 2.0],
    )?;

    let params = HullWhiteParams::new(result.params[0], result.params[1])?;
    basket.set_hull_white(params);
    let rmse = (result.objective / quotes.len() as f64).sqrt();
    if result.converged {
        info!(
            intensity = params.intensity,
            jump_size = params.jump_size,
            rmse,
            evaluations = result.evaluations,
            "Hull-White calibration converged"
        );
    } else {
        warn!(
            intensity = params.intensity,
            jump_size = params.jump_size,
            rmse,
            iterations = result.iterations,
            "Hull-White calibration stopped at the iteration cap"
        );
    }
    Ok(HullWhiteFit {
        params,
        rmse,
        evaluations: result.evaluations,
        converged: result.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use approx::assert_relative_eq;
    use tranche_models::NumericalOptions;

    fn big_setup() -> Arc<BasketSetup> {
        let pool = fixtures::pool(20, 0.02)
            .with_principals(vec![1e6; 20])
            .unwrap();
        BasketSetup::new(
            pool,
            fixtures::start(),
            fixtures::maturity(),
            &[0.2],
            NumericalOptions {
                quadrature_points: 24,
                ..fixtures::options()
            },
        )
        .unwrap()
        .shared()
    }

    fn discount() -> DiscountCurve {
        DiscountCurve::flat(fixtures::start(), 0.03)
    }

    #[test]
    fn test_full_range_is_zero() {
        let tranche = SyntheticTranche::new(0.0, 1.0, fixtures::maturity(), 0.0).unwrap();
        let base = BaseCorrelation::flat(0.4).unwrap();
        assert_eq!(implied_correlation(&big_setup(), &base, &tranche, &discount()).unwrap(), 0.0);
    }

    #[test]
    fn test_flat_base_correlation_equity() {
        let tranche = SyntheticTranche::new(0.0, 0.2, fixtures::maturity(), 0.0).unwrap();
        let base = BaseCorrelation::flat(0.4).unwrap();
        let rho = implied_correlation(&big_setup(), &base, &tranche, &discount()).unwrap();
        assert_relative_eq!(rho, 0.4, epsilon = 1e-3);

        let ts = base_correlation_term_structure(&big_setup(), &base, &tranche, &discount()).unwrap();
        assert_relative_eq!(ts.factors()[0][0], 0.4f64.sqrt(), epsilon = 1e-3);
        assert_eq!(ts.dates(), &[fixtures::maturity()]);
    }

    #[test]
    fn test_hull_white_recovers_generated_quotes() {
        let setup = fixtures::setup(20, 0.02).shared();
        let truth = HullWhiteParams::new(0.05, 0.3).unwrap();
        let mut generator = DynamicBasket::hull_white(Arc::clone(&setup), truth);
        let dates = [fixtures::start().add_months(36).unwrap(), fixtures::maturity()];
        let mut quotes = Vec::new();
        for &date in &dates {
            for (a, d) in [(0.0, 0.03), (0.03, 0.07), (0.07, 0.1)] {
                quotes.push(TrancheQuote {
                    maturity: date,
                    attachment: a,
                    detachment: d,
                    expected_loss: generator.accumulated_loss(date, a, d).unwrap(),
                });
            }
        }

        let mut basket =
            DynamicBasket::hull_white(setup, HullWhiteParams::new(0.1, 0.5).unwrap());
        let fit = calibrate_hull_white(&mut basket, &quotes, HullWhiteParams::new(0.1, 0.5).unwrap())
            .unwrap();
        assert!(fit.rmse < 1e-4, "rmse {}", fit.rmse);
        assert_eq!(basket.hull_white_params(), Some(fit.params));
    }

    #[test]
    fn test_hull_white_needs_quotes() {
        let mut basket = DynamicBasket::hull_white(
            fixtures::setup(5, 0.02).shared(),
            HullWhiteParams::new(0.1, 0.5).unwrap(),
        );
        assert!(calibrate_hull_white(&mut basket, &[], HullWhiteParams::new(0.1, 0.5).unwrap()).is_err());
    }
}
