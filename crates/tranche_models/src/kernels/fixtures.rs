//! Shared test inputs for the kernels.

use super::{Dependence, DistributionKernel, KernelRequest};
use crate::config::NumericalOptions;
use crate::pool::CreditPool;
use crate::surface::BasketSurfaces;
use std::sync::Arc;
use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
use tranche_core::types::Date;

pub fn as_of() -> Date {
    Date::from_ymd(2024, 1, 1).unwrap()
}

pub fn dates() -> Vec<Date> {
    vec![
        as_of(),
        Date::from_ymd(2025, 1, 1).unwrap(),
        Date::from_ymd(2027, 1, 1).unwrap(),
        Date::from_ymd(2029, 1, 1).unwrap(),
    ]
}

pub fn levels() -> Vec<f64> {
    vec![0.0, 0.03, 0.07, 0.1, 0.15, 0.3, 0.6, 1.0]
}

pub fn pool(n: usize, hazard: f64, recovery: f64) -> CreditPool {
    CreditPool::homogeneous(
        n,
        Arc::new(SurvivalCurve::flat(as_of(), hazard)),
        Arc::new(RecoveryCurve::constant(recovery)),
        1.0,
    )
}

pub fn options() -> NumericalOptions {
    NumericalOptions {
        quadrature_points: 48,
        sample_size: 4_000,
        loss_granularity: 0.005,
        parallel: false,
        chunk_size: 500,
        ..Default::default()
    }
}

pub fn run<K: DistributionKernel>(kernel: &K, request: &KernelRequest<'_>) -> BasketSurfaces {
    let mut surfaces = request.surfaces_for(kernel);
    kernel.compute(request, &mut surfaces, 0).unwrap();
    surfaces
}

pub fn flat(factor: f64, n: usize) -> Dependence {
    Dependence::flat(vec![factor; n], dates().len())
}
