//! Distribution surfaces.
//!
//! A surface is a grid over dates × loss levels × scenarios. Expected-loss
//! surfaces hold `E[min(L_t, ℓ)]`; probability surfaces hold `P(L_t ≤ ℓ)`.
//! Both are non-decreasing in the level for every date and scenario.
//!
//! Values are laid out date-major, then scenario, then level, so a kernel
//! writes one contiguous row per (date, scenario).

use crate::error::BasketError;
use tranche_core::types::Date;

/// What a surface stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceKind {
    /// `E[min(L, ℓ)]` as a fraction of the pool.
    #[default]
    ExpectedLoss,
    /// `P(L ≤ ℓ)`.
    Probability,
}

/// Date × level × scenario grid of loss distribution values.
///
/// Created empty, shaped by [`initialize`](Self::initialize), given its
/// coordinates by [`set_date`](Self::set_date) and
/// [`set_level`](Self::set_level), then filled by a kernel.
///
/// # Example
///
/// ```
/// use tranche_core::types::Date;
/// use tranche_models::{DistributionSurface, SurfaceKind};
///
/// let d0 = Date::from_ymd(2024, 1, 1).unwrap();
/// let d1 = Date::from_ymd(2025, 1, 1).unwrap();
/// let mut surface = DistributionSurface::new(SurfaceKind::ExpectedLoss);
/// surface.initialize(2, 2, 1);
/// surface.set_date(0, d0);
/// surface.set_date(1, d1);
/// surface.set_level(0, 0.0);
/// surface.set_level(1, 1.0);
/// surface.set_value(1, 1, 0, 0.04);
///
/// let mid = Date::from_ymd(2024, 7, 2).unwrap();
/// let value = surface.interpolate(mid, 0.5).unwrap();
/// assert!((value - 0.01).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistributionSurface {
    kind: SurfaceKind,
    as_of: Option<Date>,
    dates: Vec<Option<Date>>,
    levels: Vec<f64>,
    n_scenarios: usize,
    values: Vec<f64>,
    weights: Option<Vec<f64>>,
}

impl DistributionSurface {
    /// Empty surface of the given kind.
    pub fn new(kind: SurfaceKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Surface shaped and positioned on the given grid.
    pub fn with_grid(
        kind: SurfaceKind,
        as_of: Date,
        dates: &[Date],
        levels: &[f64],
        n_scenarios: usize,
    ) -> Self {
        let mut surface = Self::new(kind);
        surface.initialize(dates.len(), levels.len(), n_scenarios);
        surface.set_as_of(as_of);
        for (i, &d) in dates.iter().enumerate() {
            surface.set_date(i, d);
        }
        surface.levels.copy_from_slice(levels);
        surface
    }

    /// Allocates a zero-filled grid. Scenario count is at least one.
    pub fn initialize(&mut self, n_dates: usize, n_levels: usize, n_scenarios: usize) {
        self.n_scenarios = n_scenarios.max(1);
        self.dates = vec![None; n_dates];
        self.levels = vec![0.0; n_levels];
        self.values = vec![0.0; n_dates * self.n_scenarios * n_levels];
        self.weights = None;
    }

    /// Surface kind.
    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    /// Sets the as-of date.
    pub fn set_as_of(&mut self, as_of: Date) {
        self.as_of = Some(as_of);
    }

    /// As-of date, once set.
    pub fn as_of(&self) -> Option<Date> {
        self.as_of
    }

    /// Sets date coordinate `i`.
    ///
    /// # Panics
    /// If `i` is outside the initialised shape.
    pub fn set_date(&mut self, i: usize, date: Date) {
        self.dates[i] = Some(date);
    }

    /// Sets level coordinate `j`.
    ///
    /// # Panics
    /// If `j` is outside the initialised shape.
    pub fn set_level(&mut self, j: usize, level: f64) {
        self.levels[j] = level;
    }

    /// Number of dates.
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Number of levels.
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of scenarios.
    pub fn n_scenarios(&self) -> usize {
        self.n_scenarios
    }

    /// Date coordinate `i`, if set.
    pub fn date(&self, i: usize) -> Option<Date> {
        self.dates.get(i).copied().flatten()
    }

    /// All date coordinates that have been set.
    pub fn dates(&self) -> Vec<Date> {
        self.dates.iter().flatten().copied().collect()
    }

    /// Level coordinates.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// True once every date coordinate is set and the grid is non-empty.
    pub fn is_ready(&self) -> bool {
        !self.dates.is_empty() && !self.levels.is_empty() && self.dates.iter().all(Option::is_some)
    }

    fn offset(&self, i: usize, k: usize) -> usize {
        (i * self.n_scenarios + k) * self.levels.len()
    }

    /// Value at (date `i`, level `j`, scenario `k`).
    pub fn value(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.offset(i, k) + j]
    }

    /// Writes the value at (date `i`, level `j`, scenario `k`).
    pub fn set_value(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let at = self.offset(i, k) + j;
        self.values[at] = value;
    }

    /// Level row for (date `i`, scenario `k`).
    pub fn row(&self, i: usize, k: usize) -> &[f64] {
        let start = self.offset(i, k);
        &self.values[start..start + self.levels.len()]
    }

    /// Mutable level row for (date `i`, scenario `k`).
    pub fn row_mut(&mut self, i: usize, k: usize) -> &mut [f64] {
        let start = self.offset(i, k);
        let len = self.levels.len();
        &mut self.values[start..start + len]
    }

    /// Sets the weight of scenario `k` at date `i`.
    pub fn set_scenario_weight(&mut self, i: usize, k: usize, weight: f64) {
        let (n_dates, n_scen) = (self.dates.len(), self.n_scenarios);
        let weights = self.weights.get_or_insert_with(|| vec![0.0; n_dates * n_scen]);
        weights[i * n_scen + k] = weight;
    }

    /// Scenario weights at date `i`, if set.
    pub fn scenario_weights(&self, i: usize) -> Option<&[f64]> {
        let n = self.n_scenarios;
        self.weights.as_ref().map(|w| &w[i * n..(i + 1) * n])
    }

    /// Scenario weights at date `i` scaled to sum to one. A single
    /// unweighted scenario has weight one.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` if several scenarios exist without
    /// weights, `BasketError::ZeroMixtureWeight` if the weights sum to zero
    /// or are not finite.
    pub fn normalised_scenario_weights(&self, i: usize) -> Result<Vec<f64>, BasketError> {
        let weights = match self.scenario_weights(i) {
            Some(w) => w,
            None if self.n_scenarios == 1 => return Ok(vec![1.0]),
            None => {
                return Err(BasketError::InvalidArgument(
                    "cannot weight scenarios without weights".into(),
                ))
            }
        };
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total.abs() < f64::EPSILON {
            return Err(BasketError::ZeroMixtureWeight { total });
        }
        Ok(weights.iter().map(|w| w / total).collect())
    }

    /// Interpolated value of scenario 0.
    pub fn interpolate(&self, date: Date, level: f64) -> Result<f64, BasketError> {
        self.interpolate_scenario(date, level, 0)
    }

    /// Linear interpolation in date, then in level, of scenario `k`.
    ///
    /// Flat outside the date and level grids.
    pub fn interpolate_scenario(&self, date: Date, level: f64, k: usize) -> Result<f64, BasketError> {
        self.blend_dates(date, k, |row| self.level_value(row, level))
    }

    /// Area between two levels at `date` for scenario 0.
    ///
    /// For an expected-loss surface this is `E[min(L, hi)] - E[min(L, lo)]`;
    /// for a probability surface it is `∫_lo^hi P(L > x) dx`, the same
    /// quantity obtained from the distribution directly.
    pub fn interpolate_range(&self, date: Date, lo: f64, hi: f64) -> Result<f64, BasketError> {
        self.interpolate_range_scenario(date, lo, hi, 0)
    }

    /// [`interpolate_range`](Self::interpolate_range) for scenario `k`.
    pub fn interpolate_range_scenario(
        &self,
        date: Date,
        lo: f64,
        hi: f64,
        k: usize,
    ) -> Result<f64, BasketError> {
        if lo > hi {
            return Err(BasketError::inverted_tranche());
        }
        if lo == hi {
            return Ok(0.0);
        }
        self.blend_dates(date, k, |row| match self.kind {
            SurfaceKind::ExpectedLoss => self.level_value(row, hi) - self.level_value(row, lo),
            SurfaceKind::Probability => self.exceedance_area(row, lo, hi),
        })
    }

    fn blend_dates<F>(&self, date: Date, k: usize, eval: F) -> Result<f64, BasketError>
    where
        F: Fn(&[f64]) -> f64,
    {
        if !self.is_ready() {
            return Err(BasketError::InvalidArgument(
                "distribution surface is not initialised".into(),
            ));
        }
        if k >= self.n_scenarios {
            return Err(BasketError::InvalidArgument(format!(
                "scenario {} out of range 0..{}",
                k, self.n_scenarios
            )));
        }
        let dates = self.dates();
        let n = dates.len();
        let upper = dates.partition_point(|&d| d < date);
        if upper == 0 {
            return Ok(eval(self.row(0, k)));
        }
        if upper == n {
            return Ok(eval(self.row(n - 1, k)));
        }
        let (d0, d1) = (dates[upper - 1], dates[upper]);
        let w = (date - d0) as f64 / (d1 - d0) as f64;
        let v0 = eval(self.row(upper - 1, k));
        let v1 = eval(self.row(upper, k));
        Ok(v0 + w * (v1 - v0))
    }

    fn level_value(&self, row: &[f64], level: f64) -> f64 {
        let levels = &self.levels;
        let n = levels.len();
        let upper = levels.partition_point(|&l| l < level);
        if upper == 0 {
            return row[0];
        }
        if upper == n {
            return row[n - 1];
        }
        let (l0, l1) = (levels[upper - 1], levels[upper]);
        let w = (level - l0) / (l1 - l0);
        row[upper - 1] + w * (row[upper] - row[upper - 1])
    }

    fn exceedance_area(&self, row: &[f64], lo: f64, hi: f64) -> f64 {
        let mut points = vec![lo];
        points.extend(self.levels.iter().copied().filter(|&l| l > lo && l < hi));
        points.push(hi);
        points
            .windows(2)
            .map(|w| {
                let s0 = 1.0 - self.level_value(row, w[0]);
                let s1 = 1.0 - self.level_value(row, w[1]);
                0.5 * (s0 + s1) * (w[1] - w[0])
            })
            .sum()
    }

    /// Reshapes to `new_count` dates keeping the first `preserve_count`
    /// date rows (values, coordinates and weights) untouched.
    pub fn resize_by_dates(&mut self, new_count: usize, preserve_count: usize) {
        let keep = preserve_count.min(new_count).min(self.dates.len());
        let row_len = self.n_scenarios * self.levels.len();
        let mut values = vec![0.0; new_count * row_len];
        values[..keep * row_len].copy_from_slice(&self.values[..keep * row_len]);
        self.values = values;

        self.dates.truncate(keep);
        self.dates.resize(new_count, None);

        if let Some(w) = self.weights.as_mut() {
            w.truncate(keep * self.n_scenarios);
            w.resize(new_count * self.n_scenarios, 0.0);
        }
    }

    /// Single-scenario surface holding scenario `k`.
    pub fn slice(&self, k: usize) -> Result<Self, BasketError> {
        if k >= self.n_scenarios {
            return Err(BasketError::InvalidArgument(format!(
                "scenario {} out of range 0..{}",
                k, self.n_scenarios
            )));
        }
        let mut out = self.shape_single();
        for i in 0..self.dates.len() {
            out.row_mut(i, 0).copy_from_slice(self.row(i, k));
        }
        Ok(out)
    }

    /// Single-scenario surface holding the weighted average over scenarios.
    ///
    /// Weights are normalised per date. A surface with one scenario and no
    /// weights collapses to itself.
    ///
    /// # Errors
    /// `BasketError::InvalidArgument` if several scenarios exist without
    /// weights, `BasketError::ZeroMixtureWeight` if a date's weights sum to
    /// zero.
    pub fn collapse(&self) -> Result<Self, BasketError> {
        if self.n_scenarios == 1 && self.weights.is_none() {
            return Ok(self.clone());
        }
        if self.weights.is_none() {
            return Err(BasketError::InvalidArgument(
                "cannot collapse scenarios without weights".into(),
            ));
        }
        let mut out = self.shape_single();
        for i in 0..self.dates.len() {
            let weights = self.normalised_scenario_weights(i)?;
            let mut acc = vec![0.0; self.levels.len()];
            for (k, w) in weights.iter().enumerate() {
                for (a, v) in acc.iter_mut().zip(self.row(i, k)) {
                    *a += w * v;
                }
            }
            out.row_mut(i, 0).copy_from_slice(&acc);
        }
        Ok(out)
    }

    fn shape_single(&self) -> Self {
        Self {
            kind: self.kind,
            as_of: self.as_of,
            dates: self.dates.clone(),
            levels: self.levels.clone(),
            n_scenarios: 1,
            values: vec![0.0; self.dates.len() * self.levels.len()],
            weights: None,
        }
    }

    /// True if every row is non-decreasing in level within `tolerance`.
    pub fn is_monotone(&self, tolerance: f64) -> bool {
        (0..self.dates.len()).all(|i| {
            (0..self.n_scenarios).all(|k| {
                self.row(i, k)
                    .windows(2)
                    .all(|w| w[1] >= w[0] - tolerance)
            })
        })
    }
}

/// The surfaces a basket keeps: loss, amortization and, on request,
/// the cumulative loss probability.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasketSurfaces {
    /// `E[min(L, ℓ)]` for the loss fraction.
    pub loss: DistributionSurface,
    /// `E[min(A, ℓ)]` for the amortized fraction.
    pub amortization: DistributionSurface,
    /// `P(L ≤ ℓ)`, when requested.
    pub probability: Option<DistributionSurface>,
}

impl BasketSurfaces {
    /// Shapes all surfaces on one grid.
    pub fn new(
        as_of: Date,
        dates: &[Date],
        levels: &[f64],
        n_scenarios: usize,
        with_probability: bool,
    ) -> Self {
        let expected = |kind| DistributionSurface::with_grid(kind, as_of, dates, levels, n_scenarios);
        Self {
            loss: expected(SurfaceKind::ExpectedLoss),
            amortization: expected(SurfaceKind::ExpectedLoss),
            probability: with_probability.then(|| expected(SurfaceKind::Probability)),
        }
    }

    fn each_mut(&mut self) -> impl Iterator<Item = &mut DistributionSurface> + '_ {
        [Some(&mut self.loss), Some(&mut self.amortization), self.probability.as_mut()]
            .into_iter()
            .flatten()
    }

    /// Date grid shared by the surfaces.
    pub fn dates(&self) -> Vec<Date> {
        self.loss.dates()
    }

    /// Level grid shared by the surfaces.
    pub fn levels(&self) -> &[f64] {
        self.loss.levels()
    }

    /// Number of scenarios.
    pub fn n_scenarios(&self) -> usize {
        self.loss.n_scenarios()
    }

    /// Re-bases the as-of date of every surface.
    pub fn set_as_of(&mut self, as_of: Date) {
        for s in self.each_mut() {
            s.set_as_of(as_of);
        }
    }

    /// Moves every surface onto `dates`, keeping the first `preserve_count`
    /// rows.
    pub fn resize_by_dates(&mut self, dates: &[Date], preserve_count: usize) {
        for s in self.each_mut() {
            s.resize_by_dates(dates.len(), preserve_count);
            for (i, &d) in dates.iter().enumerate() {
                s.set_date(i, d);
            }
        }
    }

    /// Sets the weight of scenario `k` at date `i` on every surface.
    pub fn set_scenario_weight(&mut self, i: usize, k: usize, weight: f64) {
        for s in self.each_mut() {
            s.set_scenario_weight(i, k, weight);
        }
    }

    /// Scenario `k` of every surface.
    pub fn slice(&self, k: usize) -> Result<Self, BasketError> {
        Ok(Self {
            loss: self.loss.slice(k)?,
            amortization: self.amortization.slice(k)?,
            probability: self.probability.as_ref().map(|p| p.slice(k)).transpose()?,
        })
    }

    /// Scenario-weighted average of every surface.
    pub fn collapse(&self) -> Result<Self, BasketError> {
        Ok(Self {
            loss: self.loss.collapse()?,
            amortization: self.amortization.collapse()?,
            probability: self.probability.as_ref().map(|p| p.collapse()).transpose()?,
        })
    }
}
