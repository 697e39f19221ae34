//! Shared test inputs.

use crate::setup::BasketSetup;
use std::sync::Arc;
use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
use tranche_core::types::{Date, TimeUnit};
use tranche_models::{CreditPool, NumericalOptions};

pub fn start() -> Date {
    Date::from_ymd(2024, 1, 1).unwrap()
}

pub fn maturity() -> Date {
    Date::from_ymd(2029, 1, 1).unwrap()
}

pub fn options() -> NumericalOptions {
    NumericalOptions {
        quadrature_points: 32,
        sample_size: 2_000,
        seed: 42,
        loss_granularity: 0.01,
        grid_step_size: 6,
        grid_step_unit: TimeUnit::Months,
        parallel: false,
        chunk_size: 500,
        max_jumps: 20,
        ..Default::default()
    }
}

pub fn pool(n: usize, hazard: f64) -> CreditPool {
    CreditPool::homogeneous(
        n,
        Arc::new(SurvivalCurve::flat(start(), hazard)),
        Arc::new(RecoveryCurve::constant(0.4)),
        1.0,
    )
}

pub fn setup(n: usize, hazard: f64) -> BasketSetup {
    BasketSetup::new(
        pool(n, hazard),
        start(),
        maturity(),
        &[0.03, 0.07, 0.1, 0.15, 0.3],
        options(),
    )
    .unwrap()
}
