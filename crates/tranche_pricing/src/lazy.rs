//! Compute-on-demand cache for basket surfaces.
//!
//! Every basket strategy owns one [`LazySurface`]. Mutations invalidate it,
//! either completely or from a date index onwards; the next read fills what
//! is missing through a kernel callback. A failed computation leaves no
//! surface behind.

use tracing::debug;
use tranche_core::types::Date;
use tranche_models::{BasketError, BasketSurfaces};

/// How a reset treats the cached surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetFlag {
    /// Discard everything.
    Full,
    /// The settle date moved: re-base the surfaces' as-of date and keep the
    /// values.
    SettleChanged(Date),
}

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// No valid surface; the next read computes.
    Uncomputed,
    /// Surfaces are valid for the current configuration.
    Computed,
}

/// Cached basket surfaces plus the invalidation bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LazySurface {
    surfaces: Option<BasketSurfaces>,
    computed: bool,
    recalc_start: Option<usize>,
}

impl LazySurface {
    /// Empty, uncomputed cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> SurfaceState {
        if self.computed {
            SurfaceState::Computed
        } else {
            SurfaceState::Uncomputed
        }
    }

    /// Whether the cached surfaces are valid.
    pub fn is_computed(&self) -> bool {
        self.computed
    }

    /// Cached surfaces, valid or not.
    pub fn surfaces(&self) -> Option<&BasketSurfaces> {
        self.surfaces.as_ref()
    }

    /// First date index the next computation will write, `None` for a
    /// computation from scratch.
    pub fn pending_start(&self) -> Option<usize> {
        self.recalc_start
    }

    /// Discards the surfaces.
    pub fn invalidate(&mut self) {
        self.surfaces = None;
        self.computed = false;
        self.recalc_start = None;
    }

    /// Marks the rows from `index` onwards as stale, keeping earlier rows.
    ///
    /// Repeated calls keep the smallest index. Without cached surfaces this
    /// is a full invalidation.
    pub fn invalidate_from(&mut self, index: usize) {
        if self.surfaces.is_none() {
            self.invalidate();
            return;
        }
        self.computed = false;
        self.recalc_start = Some(match self.recalc_start {
            Some(current) => current.min(index),
            None => index,
        });
    }

    /// Applies a reset flag.
    pub fn reset_with(&mut self, flag: ResetFlag) {
        match (flag, self.surfaces.as_mut()) {
            (ResetFlag::SettleChanged(as_of), Some(surfaces)) => surfaces.set_as_of(as_of),
            _ => self.invalidate(),
        }
    }

    /// Returns valid surfaces, computing whatever is stale.
    ///
    /// `shape` builds empty surfaces for a computation from scratch;
    /// `compute(surfaces, start)` must fill every row from `start`.
    pub fn get_or_compute<S, C>(&mut self, shape: S, compute: C) -> Result<&BasketSurfaces, BasketError>
    where
        S: FnOnce() -> BasketSurfaces,
        C: FnOnce(&mut BasketSurfaces, usize) -> Result<(), BasketError>,
    {
        if !self.computed {
            let (mut surfaces, start) = match (self.surfaces.take(), self.recalc_start) {
                (Some(existing), Some(start)) => (existing, start),
                _ => (shape(), 0),
            };
            debug!(
                dates = surfaces.loss.n_dates(),
                levels = surfaces.levels().len(),
                scenarios = surfaces.n_scenarios(),
                start,
                "computing basket surfaces"
            );
            self.recalc_start = None;
            compute(&mut surfaces, start)?;
            self.surfaces = Some(surfaces);
            self.computed = true;
        }
        self.surfaces
            .as_ref()
            .ok_or_else(|| BasketError::Configuration("basket surfaces missing after computation".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd(y, m, day).unwrap()
    }

    fn shape() -> BasketSurfaces {
        BasketSurfaces::new(
            d(2024, 1, 1),
            &[d(2024, 1, 1), d(2025, 1, 1), d(2026, 1, 1)],
            &[0.0, 0.5, 1.0],
            1,
            false,
        )
    }

    fn fill(value: f64) -> impl FnOnce(&mut BasketSurfaces, usize) -> Result<(), BasketError> {
        move |s, start| {
            for i in start..s.loss.n_dates() {
                s.loss.row_mut(i, 0).iter_mut().for_each(|v| *v = value);
            }
            Ok(())
        }
    }

    #[test]
    fn test_computes_once() {
        let mut lazy = LazySurface::new();
        assert_eq!(lazy.state(), SurfaceState::Uncomputed);
        lazy.get_or_compute(shape, fill(1.0)).unwrap();
        assert_eq!(lazy.state(), SurfaceState::Computed);
        let s = lazy
            .get_or_compute(shape, |_, _| panic!("must not recompute"))
            .unwrap();
        assert_eq!(s.loss.value(2, 1, 0), 1.0);
    }

    #[test]
    fn test_suffix_invalidation_keeps_prefix() {
        let mut lazy = LazySurface::new();
        lazy.get_or_compute(shape, fill(1.0)).unwrap();
        lazy.invalidate_from(2);
        lazy.invalidate_from(1);
        assert_eq!(lazy.pending_start(), Some(1));
        let s = lazy.get_or_compute(shape, fill(2.0)).unwrap();
        assert_eq!(s.loss.value(0, 1, 0), 1.0);
        assert_eq!(s.loss.value(1, 1, 0), 2.0);
        assert_eq!(s.loss.value(2, 1, 0), 2.0);
        assert_eq!(lazy.pending_start(), None);
    }

    #[test]
    fn test_failed_computation_leaves_nothing() {
        let mut lazy = LazySurface::new();
        let err = lazy.get_or_compute(shape, |_, _| Err(BasketError::NotImplemented("x".into())));
        assert!(err.is_err());
        assert!(lazy.surfaces().is_none());
        assert!(!lazy.is_computed());
    }

    #[test]
    fn test_settle_change_keeps_values() {
        let mut lazy = LazySurface::new();
        lazy.reset_with(ResetFlag::SettleChanged(d(2024, 2, 1)));
        assert!(!lazy.is_computed());

        lazy.get_or_compute(shape, fill(1.0)).unwrap();
        lazy.reset_with(ResetFlag::SettleChanged(d(2024, 2, 1)));
        assert!(lazy.is_computed());
        assert_eq!(lazy.surfaces().unwrap().loss.as_of(), Some(d(2024, 2, 1)));

        lazy.reset_with(ResetFlag::Full);
        assert!(lazy.surfaces().is_none());
    }
}
