//! Date grid construction.

use crate::error::BasketError;
use tranche_core::types::{Date, Tenor, TimeUnit};
use tracing::trace;

/// Builds the strictly increasing date grid `start, start + step, ...,
/// stop`.
///
/// Steps are taken as multiples of the step from `start` so month-end
/// anchoring does not drift. The final interval may be shorter than a step.
/// A zero step size or [`TimeUnit::None`] falls back to three months.
///
/// # Errors
/// `BasketError::InvalidArgument` if `start > stop`.
///
/// # Example
///
/// ```
/// use tranche_core::types::{Date, TimeUnit};
/// use tranche_models::build_date_grid;
///
/// let start = Date::from_ymd(2024, 1, 15).unwrap();
/// let stop = Date::from_ymd(2025, 3, 15).unwrap();
/// let grid = build_date_grid(start, stop, 3, TimeUnit::Months).unwrap();
/// assert_eq!(grid.len(), 6);
/// assert_eq!(grid[0], start);
/// assert_eq!(grid[5], stop);
/// ```
pub fn build_date_grid(
    start: Date,
    stop: Date,
    step_size: u32,
    step_unit: TimeUnit,
) -> Result<Vec<Date>, BasketError> {
    if start > stop {
        return Err(BasketError::InvalidArgument(format!(
            "grid start {} after stop {}",
            start, stop
        )));
    }
    let mut step = Tenor::new(step_size, step_unit);
    if step.is_empty() {
        step = Tenor::default();
    }

    let mut dates = Vec::new();
    let mut k = 0u32;
    loop {
        let date = step.times_from(start, k)?;
        if date >= stop {
            break;
        }
        dates.push(date);
        k += 1;
    }
    dates.push(stop);
    trace!(step = %step, count = dates.len(), "built date grid");
    Ok(dates)
}
