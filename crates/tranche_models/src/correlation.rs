//! Correlation objects.
//!
//! Every object answers two questions for a date: the per-name factor
//! loadings of a one-factor model (`correlations_at`) and a single implied
//! factor (`implied_factor_at`). A factor is the square root of a pairwise
//! correlation; negative correlations map to `-sqrt(|ρ|)`.

use crate::error::BasketError;
use std::sync::Arc;
use tranche_core::market_data::MarketDataError;
use tranche_core::math::interpolators::LinearInterpolator;
use tranche_core::types::Date;

/// Factor loading for a pairwise correlation, keeping the sign.
pub fn signed_factor(rho: f64) -> f64 {
    rho.signum() * rho.abs().sqrt()
}

fn check_unit(value: f64, what: &str) -> Result<(), BasketError> {
    if (-1.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(BasketError::Configuration(format!(
            "{} {} outside [-1, 1]",
            what, value
        )))
    }
}

// ========================================
// General pairwise matrix
// ========================================

/// Symmetric pairwise correlation matrix with unit diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    n: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Builds an `n × n` matrix from row-major values.
    ///
    /// # Errors
    /// `BasketError::Configuration` if the shape is wrong, the matrix is not
    /// symmetric, the diagonal is not one, or an entry leaves [-1, 1].
    pub fn new(n: usize, values: Vec<f64>) -> Result<Self, BasketError> {
        if values.len() != n * n {
            return Err(BasketError::Configuration(format!(
                "correlation matrix needs {} entries, got {}",
                n * n,
                values.len()
            )));
        }
        for i in 0..n {
            if (values[i * n + i] - 1.0).abs() > 1e-12 {
                return Err(BasketError::Configuration(format!(
                    "correlation matrix diagonal entry {} is not 1",
                    i
                )));
            }
            for j in 0..i {
                let (a, b) = (values[i * n + j], values[j * n + i]);
                if (a - b).abs() > 1e-12 {
                    return Err(BasketError::Configuration(format!(
                        "correlation matrix not symmetric at ({}, {})",
                        i, j
                    )));
                }
                check_unit(a, "correlation")?;
            }
        }
        Ok(Self { n, values })
    }

    /// Constant off-diagonal correlation.
    pub fn constant(n: usize, rho: f64) -> Result<Self, BasketError> {
        let values = (0..n * n)
            .map(|k| if k / n == k % n { 1.0 } else { rho })
            .collect();
        Self::new(n, values)
    }

    /// One-factor matrix `ρ_ij = f_i f_j`.
    pub fn from_factors(factors: &[f64]) -> Result<Self, BasketError> {
        let n = factors.len();
        let values = (0..n * n)
            .map(|k| {
                let (i, j) = (k / n, k % n);
                if i == j {
                    1.0
                } else {
                    factors[i] * factors[j]
                }
            })
            .collect();
        Self::new(n, values)
    }

    /// Dimension.
    pub fn len(&self) -> usize {
        self.n
    }

    /// True for a 0 × 0 matrix.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Entry `(i, j)`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    fn off_diagonal(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.n).flat_map(move |i| (0..i).map(move |j| self.get(i, j)))
    }

    /// Largest off-diagonal entry; 0 for a single name.
    pub fn max_off_diagonal(&self) -> f64 {
        self.off_diagonal().fold(0.0, f64::max)
    }

    /// Mean off-diagonal entry; 0 for a single name.
    pub fn average_off_diagonal(&self) -> f64 {
        let count = self.n * self.n.saturating_sub(1) / 2;
        if count == 0 {
            return 0.0;
        }
        self.off_diagonal().sum::<f64>() / count as f64
    }

    /// Lower-triangular Cholesky factor, row-major.
    ///
    /// # Errors
    /// `BasketError::Configuration` if the matrix is not positive definite.
    pub fn cholesky(&self) -> Result<Vec<f64>, BasketError> {
        let n = self.n;
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                if i == j {
                    if sum <= 0.0 {
                        return Err(BasketError::Configuration(format!(
                            "correlation matrix not positive definite at row {}",
                            i
                        )));
                    }
                    l[i * n + i] = sum.sqrt();
                } else {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }
        Ok(l)
    }
}

// ========================================
// Term structure
// ========================================

/// Factor loadings indexed by tenor date.
///
/// Each tenor row holds either one common factor or one factor per name.
/// A date belongs to the first tenor whose date is on or after it; dates
/// beyond the last tenor use the last row.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationTermStruct {
    dates: Vec<Date>,
    factors: Vec<Vec<f64>>,
}

impl CorrelationTermStruct {
    /// Builds a term structure.
    ///
    /// # Errors
    /// `BasketError::Configuration` if empty, the dates are not strictly
    /// increasing, the rows disagree in width or a factor leaves [-1, 1].
    pub fn new(dates: Vec<Date>, factors: Vec<Vec<f64>>) -> Result<Self, BasketError> {
        if dates.is_empty() || dates.len() != factors.len() {
            return Err(BasketError::Configuration(format!(
                "term structure needs one factor row per date ({} dates, {} rows)",
                dates.len(),
                factors.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(BasketError::Configuration(
                "term structure dates must be strictly increasing".into(),
            ));
        }
        let width = factors[0].len();
        if width == 0 || factors.iter().any(|row| row.len() != width) {
            return Err(BasketError::Configuration(
                "term structure factor rows must share a non-zero width".into(),
            ));
        }
        for &f in factors.iter().flatten() {
            check_unit(f, "factor")?;
        }
        Ok(Self { dates, factors })
    }

    /// One common factor per tenor.
    pub fn common(dates: Vec<Date>, factors: Vec<f64>) -> Result<Self, BasketError> {
        Self::new(dates, factors.into_iter().map(|f| vec![f]).collect())
    }

    /// Tenor dates.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Factor rows.
    pub fn factors(&self) -> &[Vec<f64>] {
        &self.factors
    }

    /// Tenor dates as day offsets from `as_of`.
    pub fn dates_as_int(&self, as_of: Date) -> Vec<i64> {
        self.dates.iter().map(|&d| d - as_of).collect()
    }

    /// Index of the tenor period containing `date`.
    pub fn tenor_index(&self, date: Date) -> usize {
        self.dates
            .partition_point(|&d| d < date)
            .min(self.dates.len() - 1)
    }

    /// Per-name factors at `date`.
    pub fn factors_at(&self, date: Date, n_names: usize) -> Result<Vec<f64>, BasketError> {
        let row = &self.factors[self.tenor_index(date)];
        match row.len() {
            1 => Ok(vec![row[0]; n_names]),
            w if w == n_names => Ok(row.clone()),
            w => Err(BasketError::Configuration(format!(
                "term structure has {} factors per tenor for {} names",
                w, n_names
            ))),
        }
    }

    /// Sets every factor of tenor `index` to `value`.
    pub fn set_factor_at_date(&mut self, index: usize, value: f64) -> Result<(), BasketError> {
        check_unit(value, "factor")?;
        let len = self.dates.len();
        let row = self.factors.get_mut(index).ok_or_else(|| {
            BasketError::InvalidArgument(format!("tenor index {} out of range 0..{}", index, len))
        })?;
        row.iter_mut().for_each(|f| *f = value);
        Ok(())
    }

    /// Largest squared factor.
    pub fn max_correlation(&self) -> f64 {
        self.factors.iter().flatten().map(|f| f * f).fold(0.0, f64::max)
    }

    /// Mean factor at `date`.
    pub fn mean_factor_at(&self, date: Date) -> f64 {
        let row = &self.factors[self.tenor_index(date)];
        row.iter().sum::<f64>() / row.len() as f64
    }
}

// ========================================
// Mixture
// ========================================

/// Weighted list of correlation objects.
///
/// Weights need not sum to one; they are normalised on use.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMixture {
    weights: Vec<f64>,
    components: Vec<Arc<Correlation>>,
}

impl CorrelationMixture {
    /// Builds a mixture.
    ///
    /// # Errors
    /// `BasketError::Configuration` if empty or lengths differ.
    pub fn new(weights: Vec<f64>, components: Vec<Arc<Correlation>>) -> Result<Self, BasketError> {
        if components.is_empty() || weights.len() != components.len() {
            return Err(BasketError::Configuration(format!(
                "mixture has {} weights for {} components",
                weights.len(),
                components.len()
            )));
        }
        Ok(Self {
            weights,
            components,
        })
    }

    /// Raw weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Components.
    pub fn components(&self) -> &[Arc<Correlation>] {
        &self.components
    }

    /// Weight sum, rejected when nearly zero.
    pub fn total_weight(&self) -> Result<f64, BasketError> {
        let total: f64 = self.weights.iter().sum();
        if total.abs() < 1e-12 {
            return Err(BasketError::ZeroMixtureWeight { total });
        }
        Ok(total)
    }
}

// ========================================
// Base correlation
// ========================================

/// How a tranche detachment is turned into a base-correlation strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrikeMethod {
    /// The detachment itself.
    #[default]
    Unscaled,
    /// Detachment divided by the pool's expected loss to maturity.
    ExpectedLoss,
}

/// Base correlation curve indexed by strike.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseCorrelation {
    strikes: Vec<f64>,
    correlations: Vec<f64>,
    method: StrikeMethod,
    curve: Option<LinearInterpolator<f64>>,
}

impl BaseCorrelation {
    /// Builds a curve from strike/correlation pillars.
    ///
    /// # Errors
    /// `BasketError::Configuration` if empty, of mismatched length, with a
    /// non-positive strike or a correlation outside [0, 1).
    pub fn new(
        strikes: Vec<f64>,
        correlations: Vec<f64>,
        method: StrikeMethod,
    ) -> Result<Self, BasketError> {
        if strikes.is_empty() || strikes.len() != correlations.len() {
            return Err(BasketError::Configuration(format!(
                "base correlation has {} strikes for {} correlations",
                strikes.len(),
                correlations.len()
            )));
        }
        if strikes.iter().any(|&k| !(k > 0.0)) {
            return Err(BasketError::Configuration(
                "base correlation strikes must be positive".into(),
            ));
        }
        if correlations.iter().any(|&c| !(0.0..1.0).contains(&c)) {
            return Err(BasketError::Configuration(
                "base correlations must lie in [0, 1)".into(),
            ));
        }
        let curve = if strikes.len() > 1 {
            Some(
                LinearInterpolator::new(&strikes, &correlations)
                    .map_err(|e| BasketError::MarketData(MarketDataError::from(e)))?,
            )
        } else {
            None
        };
        Ok(Self {
            strikes,
            correlations,
            method,
            curve,
        })
    }

    /// The same correlation at every strike.
    pub fn flat(rho: f64) -> Result<Self, BasketError> {
        Self::new(vec![1.0], vec![rho], StrikeMethod::Unscaled)
    }

    /// Strike pillars.
    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    /// Correlation pillars.
    pub fn correlations(&self) -> &[f64] {
        &self.correlations
    }

    /// Strike method.
    pub fn method(&self) -> StrikeMethod {
        self.method
    }

    /// Strike for a detachment given the pool's expected loss fraction.
    pub fn strike(&self, detachment: f64, expected_loss: f64) -> f64 {
        match self.method {
            StrikeMethod::Unscaled => detachment,
            StrikeMethod::ExpectedLoss => detachment / expected_loss.max(f64::MIN_POSITIVE),
        }
    }

    /// Base correlation at `strike`, flat outside the pillars.
    pub fn base_correlation_at(&self, strike: f64) -> f64 {
        match &self.curve {
            Some(curve) => curve.interpolate_flat(strike),
            None => self.correlations[0],
        }
    }

    /// Largest pillar correlation.
    pub fn max_correlation(&self) -> f64 {
        self.correlations.iter().copied().fold(0.0, f64::max)
    }
}

// ========================================
// Correlation object
// ========================================

/// Dependence structure of a basket.
///
/// # Example
///
/// ```
/// use tranche_core::types::Date;
/// use tranche_models::Correlation;
///
/// let corr = Correlation::single_factor(0.09).unwrap();
/// let date = Date::from_ymd(2025, 1, 1).unwrap();
/// let factors = corr.correlations_at(date, 3).unwrap();
/// assert!(factors.iter().all(|&f| (f - 0.3).abs() < 1e-15));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    /// One pairwise correlation shared by every pair.
    SingleFactor(f64),
    /// Full pairwise matrix.
    General(CorrelationMatrix),
    /// Factors by tenor.
    TermStructure(CorrelationTermStruct),
    /// Weighted list of correlation objects.
    Mixture(CorrelationMixture),
    /// Detachment-indexed base correlation.
    BaseCorrelation(BaseCorrelation),
}

impl Correlation {
    /// Validated single-factor correlation.
    pub fn single_factor(rho: f64) -> Result<Self, BasketError> {
        check_unit(rho, "correlation")?;
        Ok(Correlation::SingleFactor(rho))
    }

    /// Variant name used in error messages.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Correlation::SingleFactor(_) => "SingleFactor",
            Correlation::General(_) => "General",
            Correlation::TermStructure(_) => "TermStructure",
            Correlation::Mixture(_) => "Mixture",
            Correlation::BaseCorrelation(_) => "BaseCorrelation",
        }
    }

    fn unsupported(&self, context: &'static str) -> BasketError {
        BasketError::UnsupportedCorrelation {
            variant: self.variant_name(),
            context,
        }
    }

    /// Per-name factor loadings at `date`.
    ///
    /// # Errors
    /// `BasketError::UnsupportedCorrelation` for variants without a one-factor
    /// representation (general matrix, mixture, base correlation).
    pub fn correlations_at(&self, date: Date, n_names: usize) -> Result<Vec<f64>, BasketError> {
        match self {
            Correlation::SingleFactor(rho) => Ok(vec![signed_factor(*rho); n_names]),
            Correlation::TermStructure(ts) => ts.factors_at(date, n_names),
            _ => Err(self.unsupported("factor loadings")),
        }
    }

    /// Largest pairwise correlation the object can produce.
    pub fn max_correlation(&self) -> f64 {
        match self {
            Correlation::SingleFactor(rho) => *rho,
            Correlation::General(m) => m.max_off_diagonal(),
            Correlation::TermStructure(ts) => ts.max_correlation(),
            Correlation::Mixture(mix) => mix
                .components()
                .iter()
                .map(|c| c.max_correlation())
                .fold(f64::NEG_INFINITY, f64::max),
            Correlation::BaseCorrelation(bc) => bc.max_correlation(),
        }
    }

    /// Single factor summarising the object at `date`.
    ///
    /// Term structures report their mean factor, matrices the square root of
    /// the mean pairwise correlation and mixtures the weighted mean of their
    /// components.
    pub fn implied_factor_at(&self, date: Date) -> Result<f64, BasketError> {
        match self {
            Correlation::SingleFactor(rho) => Ok(signed_factor(*rho)),
            Correlation::General(m) => Ok(signed_factor(m.average_off_diagonal())),
            Correlation::TermStructure(ts) => Ok(ts.mean_factor_at(date)),
            Correlation::Mixture(mix) => {
                let total = mix.total_weight()?;
                let mut acc = 0.0;
                for (w, c) in mix.weights().iter().zip(mix.components()) {
                    acc += w * c.implied_factor_at(date)?;
                }
                Ok(acc / total)
            }
            Correlation::BaseCorrelation(_) => Err(self.unsupported("implied factor")),
        }
    }

    /// Sets every factor of tenor `index`; term structures only.
    pub fn set_factor_at_date(&mut self, index: usize, value: f64) -> Result<(), BasketError> {
        match self {
            Correlation::TermStructure(ts) => ts.set_factor_at_date(index, value),
            _ => Err(self.unsupported("tenor factor updates")),
        }
    }

    /// Term structure, if this is one.
    pub fn as_term_structure(&self) -> Option<&CorrelationTermStruct> {
        match self {
            Correlation::TermStructure(ts) => Some(ts),
            _ => None,
        }
    }

    /// Pairwise matrix at `date`, for Monte Carlo simulation.
    pub fn matrix_at(&self, date: Date, n_names: usize) -> Result<CorrelationMatrix, BasketError> {
        match self {
            Correlation::General(m) if m.len() == n_names => Ok(m.clone()),
            Correlation::General(m) => Err(BasketError::Configuration(format!(
                "correlation matrix of size {} for {} names",
                m.len(),
                n_names
            ))),
            _ => CorrelationMatrix::from_factors(&self.correlations_at(date, n_names)?),
        }
    }
}

impl From<CorrelationTermStruct> for Correlation {
    fn from(ts: CorrelationTermStruct) -> Self {
        Correlation::TermStructure(ts)
    }
}

impl From<CorrelationMatrix> for Correlation {
    fn from(m: CorrelationMatrix) -> Self {
        Correlation::General(m)
    }
}

impl From<BaseCorrelation> for Correlation {
    fn from(bc: BaseCorrelation) -> Self {
        Correlation::BaseCorrelation(bc)
    }
}
