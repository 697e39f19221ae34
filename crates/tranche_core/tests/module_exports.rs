//! Integration tests for module exports.
//!
//! Verify that public modules and types are reachable via absolute paths.

/// Time and error types are re-exported from `types`.
#[test]
fn test_types_module_exports() {
    use tranche_core::types::{Date, DateError, DayCountConvention, Tenor, TimeUnit};

    let start = Date::from_ymd(2024, 1, 31).unwrap();
    let tenor: Tenor = "1M".parse().unwrap();
    assert_eq!(tenor.unit, TimeUnit::Months);
    assert_eq!(
        tenor.times_from(start, 1).unwrap(),
        Date::from_ymd(2024, 2, 29).unwrap()
    );
    let yf = DayCountConvention::ActualActual365.year_fraction_dates(start, start);
    assert_eq!(yf, 0.0);
    assert!(matches!(
        Date::from_ymd(2024, 13, 1),
        Err(DateError::InvalidDate { .. })
    ));
}

/// Solvers and quadrature are reachable from `math`.
#[test]
fn test_math_module_exports() {
    use tranche_core::math::distributions::{norm_cdf, norm_inv_cdf};
    use tranche_core::math::quadrature::GaussHermite;
    use tranche_core::math::solvers::{BrentSolver, NelderMeadSolver, SolverConfig};

    let rule = GaussHermite::new(24).unwrap();
    let p = rule.expectation(|z| norm_cdf((norm_inv_cdf(0.05) - 0.5 * z) / 0.75f64.sqrt()));
    // The one-factor mixture integrates back to the unconditional probability
    assert!((p - 0.05).abs() < 1e-6);

    let solver: BrentSolver<f64> = BrentSolver::new(SolverConfig::default());
    assert!(solver.find_root(|x| x - 0.5, 0.0, 1.0).is_ok());
    let _ = NelderMeadSolver::with_defaults();
}

/// Dated curves are re-exported from `market_data`.
#[test]
fn test_market_data_module_exports() {
    use tranche_core::market_data::{
        DiscountCurve, MarketDataError, RecoveryCurve, SurvivalCurve,
    };
    use tranche_core::types::Date;

    let as_of = Date::from_ymd(2024, 1, 1).unwrap();
    let survival = SurvivalCurve::flat(as_of, 0.01);
    let recovery = RecoveryCurve::constant(0.4);
    let discount = DiscountCurve::flat(as_of, 0.03);
    let later = Date::from_ymd(2026, 1, 1).unwrap();
    assert!(survival.interpolate(later).unwrap() < 1.0);
    assert_eq!(recovery.interpolate(later), 0.4);
    assert!(discount.discount(later).unwrap() < 1.0);
    let _: Option<MarketDataError> = None;
}
