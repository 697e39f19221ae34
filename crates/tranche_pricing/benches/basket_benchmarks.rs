//! Criterion benchmarks for tranche_pricing basket strategies.
//!
//! Measures a full surface build (setup to first tranche query) for the
//! recursion, large-pool and simulation strategies across pool sizes, and
//! the cost of a cached tranche lookup.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
use tranche_core::types::{Date, TimeUnit};
use tranche_models::{Correlation, CreditPool, NumericalOptions};
use tranche_pricing::{
    AnalyticBasket, BasketDistribution, BasketSetup, MonteCarloBasket, SemiAnalyticBasket,
};

fn start() -> Date {
    Date::from_ymd(2024, 1, 1).unwrap()
}

fn maturity() -> Date {
    Date::from_ymd(2029, 1, 1).unwrap()
}

fn setup(n: usize) -> Arc<BasketSetup> {
    let pool = CreditPool::homogeneous(
        n,
        Arc::new(SurvivalCurve::flat(start(), 0.02)),
        Arc::new(RecoveryCurve::constant(0.4)),
        1.0,
    );
    let options = NumericalOptions {
        sample_size: 5_000,
        grid_step_size: 3,
        grid_step_unit: TimeUnit::Months,
        ..Default::default()
    };
    BasketSetup::new(pool, start(), maturity(), &[0.03, 0.07, 0.1, 0.15, 0.3], options)
        .unwrap()
        .shared()
}

/// Benchmark surface construction per strategy.
fn bench_surface_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("surface_build");
    group.sample_size(10);
    let rho = Correlation::single_factor(0.3).unwrap();

    for n in [25, 125] {
        let shared = setup(n);
        group.bench_with_input(BenchmarkId::new("semi_analytic", n), &shared, |b, s| {
            b.iter(|| {
                let mut basket = SemiAnalyticBasket::new(Arc::clone(s), rho.clone());
                basket.accumulated_loss(black_box(maturity()), 0.03, 0.07).unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("analytic", n), &shared, |b, s| {
            b.iter(|| {
                let mut basket = AnalyticBasket::new(Arc::clone(s), rho.clone());
                basket.accumulated_loss(black_box(maturity()), 0.03, 0.07).unwrap()
            });
        });
        group.bench_with_input(BenchmarkId::new("monte_carlo", n), &shared, |b, s| {
            b.iter(|| {
                let mut basket = MonteCarloBasket::new(Arc::clone(s), rho.clone());
                basket.accumulated_loss(black_box(maturity()), 0.03, 0.07).unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark tranche queries against computed surfaces.
fn bench_cached_lookup(c: &mut Criterion) {
    let mut basket =
        SemiAnalyticBasket::new(setup(125), Correlation::single_factor(0.3).unwrap());
    basket.accumulated_loss(maturity(), 0.0, 0.03).unwrap();
    let mid = Date::from_ymd(2026, 8, 17).unwrap();

    c.bench_function("cached_tranche_lookup", |b| {
        b.iter(|| {
            basket
                .accumulated_loss(black_box(mid), black_box(0.045), black_box(0.12))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_surface_build, bench_cached_lookup);
criterion_main!(benches);
