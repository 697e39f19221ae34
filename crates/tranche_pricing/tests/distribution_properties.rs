//! Property-based tests for tranche loss surfaces.

use proptest::prelude::*;
use std::sync::Arc;
use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
use tranche_core::types::{Date, TimeUnit};
use tranche_models::{Correlation, CreditPool, NumericalOptions};
use tranche_pricing::{BasketDistribution, BasketSetup, SemiAnalyticBasket};

fn basket(n: usize, hazard: f64, rho: f64) -> SemiAnalyticBasket {
    let start = Date::from_ymd(2024, 1, 1).unwrap();
    let maturity = Date::from_ymd(2027, 1, 1).unwrap();
    let pool = CreditPool::homogeneous(
        n,
        Arc::new(SurvivalCurve::flat(start, hazard)),
        Arc::new(RecoveryCurve::constant(0.4)),
        1.0,
    );
    let options = NumericalOptions {
        quadrature_points: 16,
        loss_granularity: 0.01,
        grid_step_size: 1,
        grid_step_unit: TimeUnit::Years,
        parallel: false,
        ..Default::default()
    };
    let setup = BasketSetup::new(pool, start, maturity, &[0.03, 0.07, 0.15], options)
        .unwrap()
        .shared();
    SemiAnalyticBasket::new(setup, Correlation::single_factor(rho).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_tranche_loss_within_width(
        n in 5usize..30,
        hazard in 0.002f64..0.08,
        rho in 0.0f64..0.9,
        attachment in 0.0f64..0.5,
        width in 0.0f64..0.5,
    ) {
        let mut b = basket(n, hazard, rho);
        let maturity = b.setup().maturity();
        let detachment = attachment + width;
        let loss = b.accumulated_loss(maturity, attachment, detachment).unwrap();
        let amortized = b.amortized_amount(maturity, attachment, detachment).unwrap();
        prop_assert!(loss >= -1e-12);
        prop_assert!(loss <= width + 1e-12);
        prop_assert!(amortized >= -1e-12);
        prop_assert!(amortized <= width + 1e-12);
    }

    #[test]
    fn prop_equity_loss_grows_over_time(
        n in 5usize..30,
        hazard in 0.002f64..0.08,
        rho in 0.0f64..0.9,
    ) {
        let mut b = basket(n, hazard, rho);
        let dates = b.setup().dates().to_vec();
        let mut previous = 0.0;
        for date in dates {
            let loss = b.accumulated_loss(date, 0.0, 0.07).unwrap();
            prop_assert!(loss >= previous - 1e-12);
            previous = loss;
        }
    }

    #[test]
    fn prop_correlation_shifts_loss_to_senior(
        hazard in 0.01f64..0.05,
        low in 0.05f64..0.3,
        spread in 0.2f64..0.5,
    ) {
        let mut calm = basket(20, hazard, low);
        let mut stressed = basket(20, hazard, low + spread);
        let maturity = calm.setup().maturity();
        let calm_senior = calm.accumulated_loss(maturity, 0.15, 1.0).unwrap();
        let stressed_senior = stressed.accumulated_loss(maturity, 0.15, 1.0).unwrap();
        prop_assert!(stressed_senior >= calm_senior - 1e-12);
    }
}
