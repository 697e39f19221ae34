//! Credit pool: the names underlying a basket.

use crate::error::BasketError;
use std::sync::Arc;
use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
use tranche_core::types::Date;

/// Refinancing (early amortization) data for a pool.
///
/// A name that refinances before defaulting leaves the pool at par: its whole
/// principal amortizes and it can no longer default.
#[derive(Debug, Clone, PartialEq)]
pub struct Refinancing {
    /// Per-name probability curves for the refinancing time.
    pub curves: Vec<Arc<SurvivalCurve>>,
    /// Per-name correlation between the refinancing time and the common factor.
    pub correlations: Vec<f64>,
}

/// Ordered set of credit names with their curves and principals.
///
/// Curves are held by `Arc` so that duplicated baskets share market data
/// without copying it. A principal of zero keeps a name in the arrays while
/// excluding it from every loss computation.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tranche_core::market_data::{RecoveryCurve, SurvivalCurve};
/// use tranche_core::types::Date;
/// use tranche_models::CreditPool;
///
/// let as_of = Date::from_ymd(2024, 1, 1).unwrap();
/// let pool = CreditPool::homogeneous(
///     4,
///     Arc::new(SurvivalCurve::flat(as_of, 0.02)),
///     Arc::new(RecoveryCurve::constant(0.4)),
///     25.0,
/// );
/// assert_eq!(pool.len(), 4);
/// assert_eq!(pool.total_principal(), 100.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CreditPool {
    survival: Vec<Arc<SurvivalCurve>>,
    recovery: Vec<Arc<RecoveryCurve>>,
    principals: Vec<f64>,
    refinancing: Option<Refinancing>,
}

impl CreditPool {
    /// Builds a pool.
    ///
    /// # Errors
    /// `BasketError::Configuration` if the arrays differ in length, the pool
    /// is empty or a principal is negative or not finite.
    pub fn new(
        survival: Vec<Arc<SurvivalCurve>>,
        recovery: Vec<Arc<RecoveryCurve>>,
        principals: Vec<f64>,
    ) -> Result<Self, BasketError> {
        let n = survival.len();
        if n == 0 {
            return Err(BasketError::Configuration("credit pool is empty".into()));
        }
        if recovery.len() != n || principals.len() != n {
            return Err(BasketError::Configuration(format!(
                "pool arrays differ in length: {} survival curves, {} recovery curves, {} principals",
                n,
                recovery.len(),
                principals.len()
            )));
        }
        if let Some(p) = principals.iter().find(|p| !(p.is_finite() && **p >= 0.0)) {
            return Err(BasketError::Configuration(format!(
                "principal {} must be finite and non-negative",
                p
            )));
        }
        Ok(Self {
            survival,
            recovery,
            principals,
            refinancing: None,
        })
    }

    /// `n` identical names sharing one survival and one recovery curve.
    pub fn homogeneous(
        n: usize,
        survival: Arc<SurvivalCurve>,
        recovery: Arc<RecoveryCurve>,
        principal: f64,
    ) -> Self {
        Self {
            survival: vec![survival; n],
            recovery: vec![recovery; n],
            principals: vec![principal; n],
            refinancing: None,
        }
    }

    /// Attaches refinancing curves and correlations.
    ///
    /// # Errors
    /// `BasketError::Configuration` on a length mismatch or a correlation
    /// outside [-1, 1].
    pub fn with_refinancing(mut self, refinancing: Refinancing) -> Result<Self, BasketError> {
        let n = self.len();
        if refinancing.curves.len() != n || refinancing.correlations.len() != n {
            return Err(BasketError::Configuration(format!(
                "refinancing arrays ({} curves, {} correlations) do not match {} names",
                refinancing.curves.len(),
                refinancing.correlations.len(),
                n
            )));
        }
        if refinancing
            .correlations
            .iter()
            .any(|c| !(-1.0..=1.0).contains(c))
        {
            return Err(BasketError::Configuration(
                "refinancing correlation outside [-1, 1]".into(),
            ));
        }
        self.refinancing = Some(refinancing);
        Ok(self)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// True for a pool without names.
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }

    /// Survival curves.
    pub fn survival_curves(&self) -> &[Arc<SurvivalCurve>] {
        &self.survival
    }

    /// Recovery curves.
    pub fn recovery_curves(&self) -> &[Arc<RecoveryCurve>] {
        &self.recovery
    }

    /// Principals.
    pub fn principals(&self) -> &[f64] {
        &self.principals
    }

    /// Refinancing data, if any.
    pub fn refinancing(&self) -> Option<&Refinancing> {
        self.refinancing.as_ref()
    }

    /// True when refinancing curves are attached.
    pub fn has_refinancing(&self) -> bool {
        self.refinancing.is_some()
    }

    /// Sum of principals.
    pub fn total_principal(&self) -> f64 {
        self.principals.iter().sum()
    }

    /// Replaces one principal.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` for an out-of-range index or an invalid
    /// amount.
    pub fn set_principal(&mut self, index: usize, principal: f64) -> Result<(), BasketError> {
        if !(principal.is_finite() && principal >= 0.0) {
            return Err(BasketError::InvalidArgument(format!(
                "principal {} must be finite and non-negative",
                principal
            )));
        }
        let len = self.len();
        let slot = self.principals.get_mut(index).ok_or_else(|| {
            BasketError::InvalidArgument(format!("name index {} out of range 0..{}", index, len))
        })?;
        *slot = principal;
        Ok(())
    }

    /// Replaces every principal; the length must not change.
    pub fn set_principals(&mut self, principals: Vec<f64>) -> Result<(), BasketError> {
        if principals.len() != self.len() {
            return Err(BasketError::Configuration(format!(
                "{} principals supplied for {} names",
                principals.len(),
                self.len()
            )));
        }
        self.principals = principals;
        Ok(())
    }

    /// Pool restricted to the given principals, sharing all curves.
    pub fn with_principals(&self, principals: Vec<f64>) -> Result<Self, BasketError> {
        let mut pool = self.clone();
        pool.set_principals(principals)?;
        Ok(pool)
    }

    /// Earliest curve as-of date; the natural portfolio start.
    pub fn as_of(&self) -> Option<Date> {
        self.survival.iter().map(|c| c.as_of()).min()
    }

    /// Principal-weighted expected loss fraction at `date`.
    pub fn expected_loss_fraction(&self, date: Date) -> Result<f64, BasketError> {
        let total = self.total_principal();
        if total <= 0.0 {
            return Ok(0.0);
        }
        let mut loss = 0.0;
        for i in 0..self.len() {
            if self.principals[i] == 0.0 {
                continue;
            }
            let pd = self.survival[i].default_probability(date)?;
            loss += self.principals[i] * (1.0 - self.recovery[i].interpolate(date)) * pd;
        }
        Ok(loss / total)
    }
}
