//! CDO² basket with base-correlation-implied sub-basket correlations.
//!
//! Each sub-basket's tranche is priced as a proxy under the base
//! correlation curve and the flat correlation reproducing that price is
//! solved for. A name's factor is the square root of the mean correlation
//! of the sub-baskets holding it, which for two overlapping sub-baskets is
//! `sqrt((ρ_i + ρ_j) / 2)`. That rule is an approximation: nothing in the
//! joint default dynamics produces it.
//!
//! Surfaces live on the cross-subordination scale. Outer levels are mapped
//! in with [`LevelTransform::forward`] and tranche losses divided by the
//! scale factor on the way out.

use super::engine::SurfaceBasket;
use super::{BasketDistribution, LossDistribution};
use crate::calibration::implied_correlation;
use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use crate::tranche::SyntheticTranche;
use std::sync::Arc;
use tracing::debug;
use tranche_core::market_data::DiscountCurve;
use tranche_core::types::Date;
use tranche_models::correlation::signed_factor;
use tranche_models::{
    round_loss_level, BasketError, Correlation, CorrelationTermStruct, LevelTransform,
    NestedMonteCarloKernel, NestedStructure,
};

/// CDO² basket simulated under implied sub-basket correlations.
#[derive(Debug, Clone)]
pub struct BaseCorrelationNestedBasket {
    inner: SurfaceBasket<NestedMonteCarloKernel>,
    structure: Arc<NestedStructure>,
    transform: LevelTransform,
    basket_correlations: Vec<f64>,
}

impl BaseCorrelationNestedBasket {
    /// Calibrates the sub-basket correlations and builds the basket.
    ///
    /// Prior losses on the setup are not applied to nested tranches.
    ///
    /// # Errors
    /// `BasketError::MissingBaseCorrelation` unless `correlation` is a base
    /// correlation, `BasketError::Configuration` for a non-positive seed or
    /// a structure not spanning the pool, `BasketError::Calibration` when a
    /// sub-basket correlation cannot be solved for.
    pub fn new(
        setup: Arc<BasketSetup>,
        structure: NestedStructure,
        correlation: &Correlation,
        discount: &DiscountCurve,
        seed: i64,
    ) -> Result<Self, BasketError> {
        let base = match correlation {
            Correlation::BaseCorrelation(base) => base,
            _ => return Err(BasketError::MissingBaseCorrelation),
        };
        let structure = Arc::new(structure);
        let kernel = NestedMonteCarloKernel::new(Arc::clone(&structure), seed)?;
        if structure.n_names() != setup.pool().len() {
            return Err(BasketError::Configuration(format!(
                "nested structure spans {} names, pool has {}",
                structure.n_names(),
                setup.pool().len()
            )));
        }

        let mut basket_correlations = Vec::with_capacity(structure.sub_baskets().len());
        for (i, sub) in structure.sub_baskets().iter().enumerate() {
            let rho = if sub.is_full_range() {
                0.0
            } else {
                let sub_setup = BasketSetup::new(
                    setup.pool().with_principals(sub.principals.clone())?,
                    setup.start(),
                    setup.maturity(),
                    &[sub.attachment, sub.detachment],
                    setup.options().clone(),
                )?
                .with_copula(setup.copula())
                .shared();
                let tranche =
                    SyntheticTranche::new(sub.attachment, sub.detachment, setup.maturity(), 0.0)?;
                implied_correlation(&sub_setup, base, &tranche, discount)?
            };
            debug!(sub_basket = i, rho, "sub-basket correlation");
            basket_correlations.push(rho);
        }

        let factors: Vec<f64> = structure
            .name_correlations(&basket_correlations)
            .into_iter()
            .map(signed_factor)
            .collect();
        let name_correlation = Correlation::TermStructure(CorrelationTermStruct::new(
            vec![setup.maturity()],
            vec![factors],
        )?);

        let transform = structure.level_transform(structure.total_principal());
        let mut nested_setup = (*setup).clone();
        nested_setup.remap_levels(|x| transform.forward(x));

        Ok(Self {
            inner: SurfaceBasket::new(nested_setup.shared(), Arc::new(name_correlation), kernel)
                .with_probability(),
            structure,
            transform,
            basket_correlations,
        })
    }

    /// Implied correlation per sub-basket.
    pub fn sub_basket_correlations(&self) -> &[f64] {
        &self.basket_correlations
    }

    /// Nested structure.
    pub fn structure(&self) -> &NestedStructure {
        &self.structure
    }

    /// Outer-to-surface level transform.
    pub fn transform(&self) -> LevelTransform {
        self.transform
    }

    /// Adds outer tranche levels missing from the grid, mapping the whole
    /// grid through the transform again.
    fn register_tranche(&mut self, begin: f64, end: f64) -> Result<(), BasketError> {
        let missing: Vec<f64> = [begin, end]
            .into_iter()
            .filter(|&l| l > 0.0 && !self.inner.setup().has_level(l))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        debug!(levels = ?missing, "registering nested tranche levels");
        let transform = self.transform;
        self.inner.update_setup(|setup| {
            setup.add_levels(&missing);
            setup.remap_levels(|x| transform.forward(x));
            Ok(())
        })
    }

    /// Principals are fixed by the nested structure.
    pub fn set_principals(&mut self, _principals: Vec<f64>) -> Result<(), BasketError> {
        Err(BasketError::NotImplemented(
            "principal updates on a nested basket; rebuild it from a new structure".into(),
        ))
    }
}

/// Linear interpolation of `values` on ascending `levels`, flat outside.
fn interpolate_row(levels: &[f64], values: &[f64], x: f64) -> f64 {
    let j = levels.partition_point(|&l| l < x);
    if j == 0 {
        return values[0];
    }
    if j >= levels.len() {
        return values[levels.len() - 1];
    }
    let (l0, l1) = (levels[j - 1], levels[j]);
    let w = (x - l0) / (l1 - l0);
    values[j - 1] + w * (values[j] - values[j - 1])
}

impl BasketDistribution for BaseCorrelationNestedBasket {
    fn setup(&self) -> &Arc<BasketSetup> {
        self.inner.setup()
    }

    fn notional(&self) -> f64 {
        self.structure.total_principal()
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.setup().check_date(date)?;
        if begin > end {
            return Err(BasketError::inverted_tranche());
        }
        self.register_tranche(begin, end)?;
        let (lo, hi) = (self.transform.forward(begin), self.transform.forward(end));
        let scale = self.transform.scale_factor;
        let surfaces = self.inner.surfaces()?;
        Ok(surfaces.loss.interpolate_range(date, lo, hi)? / scale)
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.setup().check_date(date)?;
        if begin > end {
            return Err(BasketError::inverted_tranche());
        }
        Ok(0.0)
    }

    /// Distribution of the outer loss fraction.
    ///
    /// The level transform is applied to a local copy of the levels; the
    /// cached surfaces and the basket's transform are left untouched.
    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        let digits = self.inner.setup().options().rounding_digits;
        let mut outer: Vec<f64> = levels
            .iter()
            .filter(|l| l.is_finite())
            .map(|&l| round_loss_level(l, digits))
            .collect();
        outer.sort_by(f64::total_cmp);
        outer.dedup();
        let transform = self.transform;
        let mut mapped: Vec<f64> = outer.iter().map(|&l| transform.forward(l)).collect();
        mapped.push(transform.forward(0.0));

        let surface = self.inner.calc_loss_distribution(want_probability, date, &mapped)?;
        let at = |l: f64| interpolate_row(&surface.levels, &surface.values, transform.forward(l));
        let values = if want_probability {
            outer.iter().map(|&l| at(l)).collect()
        } else {
            let floor = at(0.0);
            outer
                .iter()
                .map(|&l| (at(l) - floor) / transform.scale_factor)
                .collect()
        };
        Ok(LossDistribution {
            date,
            probability: want_probability,
            levels: outer,
            values,
        })
    }

    fn is_computed(&self) -> bool {
        self.inner.lazy().is_computed()
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn reset_with(&mut self, flag: ResetFlag) {
        self.inner.reset_with(flag);
    }

    fn duplicate(&self) -> Self {
        Self {
            inner: self.inner.duplicate(),
            structure: Arc::clone(&self.structure),
            transform: self.transform,
            basket_correlations: self.basket_correlations.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use approx::assert_relative_eq;
    use tranche_models::{BaseCorrelation, SubBasket};

    const PRINCIPAL: f64 = 1e6;

    fn setup() -> Arc<BasketSetup> {
        let pool = fixtures::pool(10, 0.03)
            .with_principals(vec![PRINCIPAL; 10])
            .unwrap();
        BasketSetup::new(
            pool,
            fixtures::start(),
            fixtures::maturity(),
            &[0.05, 0.1, 0.2, 0.5],
            fixtures::options(),
        )
        .unwrap()
        .shared()
    }

    fn structure(cross: bool) -> NestedStructure {
        let first: Vec<f64> = (0..10).map(|i| if i < 6 { PRINCIPAL } else { 0.0 }).collect();
        let second: Vec<f64> = (0..10).map(|i| if i >= 4 { PRINCIPAL } else { 0.0 }).collect();
        NestedStructure::new(
            vec![
                SubBasket::new(first, 0.0, 1.0).unwrap(),
                SubBasket::new(second, 0.0, 0.2).unwrap(),
            ],
            cross,
        )
        .unwrap()
    }

    fn flat_base(rho: f64) -> Correlation {
        Correlation::BaseCorrelation(BaseCorrelation::flat(rho).unwrap())
    }

    fn discount() -> DiscountCurve {
        DiscountCurve::flat(fixtures::start(), 0.03)
    }

    #[test]
    fn test_sub_basket_correlations() {
        let basket =
            BaseCorrelationNestedBasket::new(setup(), structure(false), &flat_base(0.4), &discount(), 11)
                .unwrap();
        let rhos = basket.sub_basket_correlations();
        assert_eq!(rhos[0], 0.0);
        assert_relative_eq!(rhos[1], 0.4, epsilon = 1e-3);
    }

    #[test]
    fn test_requires_base_correlation_and_seed() {
        let single = Correlation::single_factor(0.3).unwrap();
        assert!(matches!(
            BaseCorrelationNestedBasket::new(setup(), structure(false), &single, &discount(), 11),
            Err(BasketError::MissingBaseCorrelation)
        ));
        assert!(matches!(
            BaseCorrelationNestedBasket::new(setup(), structure(false), &flat_base(0.4), &discount(), 0),
            Err(BasketError::Configuration(_))
        ));
    }

    #[test]
    fn test_losses_and_amortization() {
        let mut basket =
            BaseCorrelationNestedBasket::new(setup(), structure(true), &flat_base(0.4), &discount(), 11)
                .unwrap();
        let date = fixtures::maturity();
        let junior = basket.accumulated_loss(date, 0.0, 0.1).unwrap();
        let wider = basket.accumulated_loss(date, 0.0, 0.2).unwrap();
        assert!(junior > 0.0 && junior <= 0.1);
        assert!(wider >= junior);
        assert_eq!(basket.amortized_amount(date, 0.0, 0.2).unwrap(), 0.0);
        assert!(basket.accumulated_loss(date, 0.2, 0.1).is_err());
        assert!(matches!(
            basket.accumulated_loss(Date::from_ymd(2030, 1, 1).unwrap(), 0.0, 0.1),
            Err(BasketError::DateOutOfRange { .. })
        ));
        assert_eq!(basket.notional(), structure(true).total_principal());
    }

    #[test]
    fn test_off_grid_tranche_is_registered() {
        let date = fixtures::maturity();
        let mut basket =
            BaseCorrelationNestedBasket::new(setup(), structure(true), &flat_base(0.4), &discount(), 11)
                .unwrap();
        basket.accumulated_loss(date, 0.0, 0.1).unwrap();
        let off_grid = basket.accumulated_loss(date, 0.07, 0.3).unwrap();
        assert!(basket.setup().has_level(0.07) && basket.setup().has_level(0.3));
        let digits = basket.setup().options().rounding_digits;
        let transform = basket.transform();
        let mapped = round_loss_level(transform.forward(0.07), digits);
        assert!(basket.setup().levels().cooked().contains(&mapped));

        let registered = BasketSetup::clone(&setup()).with_levels(&[0.07, 0.3]).shared();
        let mut reference =
            BaseCorrelationNestedBasket::new(registered, structure(true), &flat_base(0.4), &discount(), 11)
                .unwrap();
        assert_relative_eq!(
            off_grid,
            reference.accumulated_loss(date, 0.07, 0.3).unwrap(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_distribution_leaves_state_untouched() {
        let mut basket =
            BaseCorrelationNestedBasket::new(setup(), structure(true), &flat_base(0.4), &discount(), 11)
                .unwrap();
        let date = fixtures::maturity();
        let before = basket.accumulated_loss(date, 0.0, 0.1).unwrap();
        let transform = basket.transform();

        let dist = basket.calc_loss_distribution(false, date, &[0.1, 0.05]).unwrap();
        assert_eq!(dist.levels, vec![0.05, 0.1]);
        assert_relative_eq!(dist.values[1], before, epsilon = 1e-9);
        let prob = basket.calc_loss_distribution(true, date, &[1.0]).unwrap();
        assert_relative_eq!(prob.values[0], 1.0, epsilon = 1e-12);

        assert_eq!(basket.transform(), transform);
        assert!(basket.is_computed());
        assert_eq!(basket.accumulated_loss(date, 0.0, 0.1).unwrap(), before);
    }
}
