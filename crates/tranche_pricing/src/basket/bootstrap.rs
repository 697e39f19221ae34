//! Tenor-wise factor bootstrap.
//!
//! The basket owns a recursion basket configured with a factor term
//! structure. Fitting tenor `k` only moves rows from the previous tenor
//! boundary onwards, so earlier tenors are never recomputed. Standard
//! baskets recompute everything on any correlation change; callers relying
//! on bit-identical prefixes must use this basket.

use super::engine::SurfaceBasket;
use super::{BasketDistribution, LossDistribution};
use crate::calibration::TrancheQuote;
use crate::lazy::ResetFlag;
use crate::setup::BasketSetup;
use std::sync::Arc;
use tracing::{debug, info};
use tranche_core::math::solvers::{BrentSolver, SolverConfig};
use tranche_core::types::Date;
use tranche_models::{BasketError, BasketSurfaces, Correlation, CorrelationTermStruct, RecursionKernel};

/// Largest factor the calibration will try.
const MAX_FACTOR: f64 = 0.999;

/// Recursion basket calibrated one tenor at a time.
#[derive(Debug, Clone)]
pub struct BootstrapBasket {
    inner: SurfaceBasket<RecursionKernel>,
    term: CorrelationTermStruct,
    tenor: usize,
}

impl BootstrapBasket {
    /// Creates the basket with the tenor containing the setup's maturity
    /// selected.
    pub fn new(setup: Arc<BasketSetup>, term: CorrelationTermStruct) -> Self {
        let tenor = term.tenor_index(setup.maturity());
        let correlation = Arc::new(Correlation::TermStructure(term.clone()));
        Self {
            inner: SurfaceBasket::new(setup, correlation, RecursionKernel::new()).with_probability(),
            term,
            tenor,
        }
    }

    /// Current term structure.
    pub fn term_structure(&self) -> &CorrelationTermStruct {
        &self.term
    }

    /// Tenor being fitted.
    pub fn tenor(&self) -> usize {
        self.tenor
    }

    /// Selects the tenor containing `date`.
    pub fn set_maturity(&mut self, date: Date) -> Result<(), BasketError> {
        self.inner.setup().check_date(date)?;
        self.tenor = self.term.tenor_index(date);
        Ok(())
    }

    /// Sets the factor of the selected tenor and marks the rows from the
    /// previous tenor boundary as stale.
    pub fn set_factor(&mut self, factor: f64) -> Result<(), BasketError> {
        self.term.set_factor_at_date(self.tenor, factor)?;
        self.apply_config();
        Ok(())
    }

    /// Pushes the term structure into the inner basket.
    fn apply_config(&mut self) {
        let setup = self.inner.setup();
        let boundary = match self.tenor {
            0 => setup.start(),
            k => self.term.dates()[k - 1],
        };
        let start = setup.date_index(boundary);
        debug!(tenor = self.tenor, start, "bootstrap suffix invalidated");
        self.inner
            .set_correlation_from(Correlation::TermStructure(self.term.clone()), start);
    }

    /// Cached surfaces, computing what is stale.
    pub fn surfaces(&mut self) -> Result<&BasketSurfaces, BasketError> {
        self.inner.surfaces()
    }

    /// Replaces every principal; recomputes everything.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        self.inner.update_setup(|s| s.set_principals(principals))
    }

    /// Fits each quote's tenor in turn, in maturity order.
    ///
    /// Each fit solves `accumulated_loss(maturity, a, d) = expected_loss`
    /// for the tenor's factor in `[0, 0.999]`. Returns the fitted factors.
    ///
    /// # Errors
    /// `BasketError::Calibration` when a quote cannot be matched.
    pub fn calibrate(&mut self, quotes: &[TrancheQuote]) -> Result<Vec<f64>, BasketError> {
        let mut ordered = quotes.to_vec();
        ordered.sort_by_key(|q| q.maturity);
        for quote in &ordered {
            self.inner.register_tranche(quote.attachment, quote.detachment)?;
        }
        let solver = BrentSolver::new(SolverConfig::new(1e-12, 1e-10, 100));
        let mut fitted = Vec::with_capacity(ordered.len());
        for quote in &ordered {
            self.set_maturity(quote.maturity)?;
            let tenor = self.tenor;
            let factor = solver
                .solve(
                    quote.expected_loss,
                    |f: f64| -> Result<f64, BasketError> {
                        self.set_factor(f)?;
                        self.accumulated_loss(quote.maturity, quote.attachment, quote.detachment)
                    },
                    0.0,
                    MAX_FACTOR,
                )
                .map_err(|e| match e {
                    BasketError::Solver(err) => BasketError::Calibration {
                        target: format!("tenor {} factor", tenor),
                        reason: err.to_string(),
                    },
                    other => other,
                })?;
            self.set_factor(factor)?;
            info!(tenor = self.tenor, factor, "bootstrapped tenor factor");
            fitted.push(factor);
        }
        Ok(fitted)
    }
}

impl BasketDistribution for BootstrapBasket {
    fn setup(&self) -> &Arc<BasketSetup> {
        self.inner.setup()
    }

    fn accumulated_loss(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.accumulated_loss(date, begin, end)
    }

    fn amortized_amount(&mut self, date: Date, begin: f64, end: f64) -> Result<f64, BasketError> {
        self.inner.amortized_amount(date, begin, end)
    }

    fn calc_loss_distribution(
        &self,
        want_probability: bool,
        date: Date,
        levels: &[f64],
    ) -> Result<LossDistribution, BasketError> {
        self.inner.calc_loss_distribution(want_probability, date, levels)
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
            term: self.term.clone(),
            tenor: self.tenor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use approx::assert_relative_eq;

    fn tenors() -> Vec<Date> {
        vec![
            Date::from_ymd(2025, 1, 1).unwrap(),
            Date::from_ymd(2027, 1, 1).unwrap(),
            fixtures::maturity(),
        ]
    }

    fn basket() -> BootstrapBasket {
        let term = CorrelationTermStruct::common(tenors(), vec![0.5, 0.5, 0.5]).unwrap();
        BootstrapBasket::new(fixtures::setup(20, 0.02).shared(), term)
    }

    #[test]
    fn test_maturity_selects_last_tenor() {
        let mut b = basket();
        assert_eq!(b.tenor(), 2);
        b.set_maturity(Date::from_ymd(2026, 6, 1).unwrap()).unwrap();
        assert_eq!(b.tenor(), 1);
        assert!(b.set_maturity(Date::from_ymd(2031, 1, 1).unwrap()).is_err());
    }

    #[test]
    fn test_set_factor_recomputes_suffix_only() {
        let mut b = basket();
        let before = b.surfaces().unwrap().clone();
        b.set_factor(0.3).unwrap();
        assert!(!b.is_computed());
        assert_eq!(b.inner.lazy().pending_start(), Some(6));
        let after = b.surfaces().unwrap().clone();

        let dates = b.setup().dates().to_vec();
        let boundary = tenors()[1];
        for (i, &d) in dates.iter().enumerate() {
            if d <= boundary {
                assert_eq!(before.loss.row(i, 0), after.loss.row(i, 0), "row {}", i);
            } else {
                assert_ne!(before.loss.row(i, 0), after.loss.row(i, 0), "row {}", i);
            }
        }
    }

    #[test]
    fn test_calibration_matches_quotes() {
        let mut generator = basket();
        generator.set_maturity(tenors()[0]).unwrap();
        generator.set_factor(0.35).unwrap();
        generator.set_maturity(tenors()[1]).unwrap();
        generator.set_factor(0.45).unwrap();
        generator.set_maturity(tenors()[2]).unwrap();
        generator.set_factor(0.55).unwrap();
        let quotes: Vec<TrancheQuote> = tenors()
            .into_iter()
            .rev()
            .map(|m| TrancheQuote {
                maturity: m,
                attachment: 0.0,
                detachment: 0.03,
                expected_loss: generator.accumulated_loss(m, 0.0, 0.03).unwrap(),
            })
            .collect();

        let mut b = basket();
        let fitted = b.calibrate(&quotes).unwrap();
        assert_eq!(fitted.len(), 3);
        for (f, expected) in fitted.iter().zip([0.35, 0.45, 0.55]) {
            assert_relative_eq!(*f, expected, epsilon = 1e-6);
        }
    }
}
