//! Calendar dates, stepping units and day count conventions.
//!
//! This module provides:
//! - `Date`: Type-safe date wrapper around chrono::NaiveDate with day/month stepping
//! - `TimeUnit`: Unit of a grid step (days, weeks, months, years)
//! - `Tenor`: A step length paired with its unit, parsed from strings such as `"3M"`
//! - `DayCountConvention`: Year fraction conventions
//!
//! # Examples
//!
//! ```
//! use tranche_core::types::time::{Date, DayCountConvention, TimeUnit};
//!
//! let start = Date::from_ymd(2024, 1, 31).unwrap();
//! let next = start.advance(1, TimeUnit::Months).unwrap();
//! assert_eq!(next, Date::from_ymd(2024, 2, 29).unwrap());
//!
//! let yf = DayCountConvention::ActualActual365.year_fraction_dates(start, next);
//! assert!((yf - 29.0 / 365.0).abs() < 1e-12);
//! ```

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use super::error::DateError;

/// Type-safe date wrapper around chrono::NaiveDate.
///
/// Ordered, hashable and `Copy`. Subtracting two dates yields the signed
/// number of days between them.
///
/// # Examples
///
/// ```
/// use tranche_core::types::time::Date;
///
/// let date = Date::from_ymd(2024, 6, 15).unwrap();
/// let parsed: Date = "2024-06-15".parse().unwrap();
/// assert_eq!(date, parsed);
///
/// let start = Date::from_ymd(2024, 1, 1).unwrap();
/// let end = Date::from_ymd(2024, 1, 11).unwrap();
/// assert_eq!(end - start, 10);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a Date from year, month, and day components.
    ///
    /// # Returns
    /// `Ok(Date)` if the date is valid, `Err(DateError::InvalidDate)` otherwise.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Parses a date from ISO 8601 format string (YYYY-MM-DD).
    pub fn parse(s: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Date)
            .map_err(|e| DateError::ParseError(format!("{}: {}", s, e)))
    }

    /// Returns the underlying NaiveDate.
    pub fn into_inner(self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Moves the date by a signed number of calendar days.
    pub fn add_days(self, days: i64) -> Result<Self, DateError> {
        let moved = if days >= 0 {
            self.0.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        moved
            .map(Date)
            .ok_or_else(|| DateError::Overflow(format!("{} {:+}D", self, days)))
    }

    /// Moves the date by a signed number of months.
    ///
    /// The day of month is clamped to the length of the target month, so
    /// 31 January plus one month is the last day of February.
    pub fn add_months(self, months: i64) -> Result<Self, DateError> {
        let step = u32::try_from(months.unsigned_abs())
            .map_err(|_| DateError::Overflow(format!("{} {:+}M", self, months)))?;
        let moved = if months >= 0 {
            self.0.checked_add_months(Months::new(step))
        } else {
            self.0.checked_sub_months(Months::new(step))
        };
        moved
            .map(Date)
            .ok_or_else(|| DateError::Overflow(format!("{} {:+}M", self, months)))
    }

    /// Moves the date by `n` units.
    ///
    /// `TimeUnit::None` leaves the date unchanged.
    pub fn advance(self, n: i64, unit: TimeUnit) -> Result<Self, DateError> {
        match unit {
            TimeUnit::None => Ok(self),
            TimeUnit::Days => self.add_days(n),
            TimeUnit::Weeks => self.add_days(n.saturating_mul(7)),
            TimeUnit::Months => self.add_months(n),
            TimeUnit::Years => self.add_months(n.saturating_mul(12)),
        }
    }
}

impl Sub for Date {
    type Output = i64;

    /// Returns the number of days between two dates.
    ///
    /// The result is positive if `self` is after `other`, negative otherwise.
    fn sub(self, other: Self) -> i64 {
        (self.0 - other.0).num_days()
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, DateError> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    /// Formats the date as ISO 8601 (YYYY-MM-DD).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Unit of a date grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
    /// No unit; grid builders substitute their default step.
    #[default]
    None,
    /// Calendar days.
    Days,
    /// Weeks of seven calendar days.
    Weeks,
    /// Calendar months, end-of-month clamped.
    Months,
    /// Calendar years.
    Years,
}

impl TimeUnit {
    /// Single-letter code used in tenor strings.
    pub fn code(&self) -> &'static str {
        match self {
            TimeUnit::None => "",
            TimeUnit::Days => "D",
            TimeUnit::Weeks => "W",
            TimeUnit::Months => "M",
            TimeUnit::Years => "Y",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::None => write!(f, "None"),
            other => write!(f, "{}", other.code()),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = DateError;

    /// Accepts single-letter codes and full names, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "" | "NONE" => Ok(TimeUnit::None),
            "D" | "DAY" | "DAYS" => Ok(TimeUnit::Days),
            "W" | "WEEK" | "WEEKS" => Ok(TimeUnit::Weeks),
            "M" | "MONTH" | "MONTHS" => Ok(TimeUnit::Months),
            "Y" | "YEAR" | "YEARS" => Ok(TimeUnit::Years),
            _ => Err(DateError::ParseError(format!("Unknown time unit: {}", s))),
        }
    }
}

/// A step length with its unit, e.g. `3M` or `1Y`.
///
/// # Examples
///
/// ```
/// use tranche_core::types::time::{Tenor, TimeUnit};
///
/// let tenor: Tenor = "3M".parse().unwrap();
/// assert_eq!(tenor, Tenor::new(3, TimeUnit::Months));
/// assert_eq!(tenor.to_string(), "3M");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tenor {
    /// Number of units.
    pub length: u32,
    /// Unit of each step.
    pub unit: TimeUnit,
}

impl Tenor {
    /// Creates a tenor.
    pub fn new(length: u32, unit: TimeUnit) -> Self {
        Self { length, unit }
    }

    /// True when the tenor describes no step at all.
    pub fn is_empty(&self) -> bool {
        self.length == 0 || self.unit == TimeUnit::None
    }

    /// Moves `date` forward by `k` multiples of this tenor.
    pub fn times_from(&self, date: Date, k: u32) -> Result<Date, DateError> {
        date.advance(i64::from(self.length) * i64::from(k), self.unit)
    }
}

impl Default for Tenor {
    /// Quarterly steps.
    fn default() -> Self {
        Self::new(3, TimeUnit::Months)
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.length, self.unit.code())
    }
}

impl FromStr for Tenor {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| DateError::ParseError(format!("Tenor without unit: {}", s)))?;
        let (digits, unit) = s.split_at(split);
        let length = digits
            .parse::<u32>()
            .map_err(|e| DateError::ParseError(format!("{}: {}", s, e)))?;
        Ok(Tenor::new(length, unit.parse()?))
    }
}

/// Day Count Convention (year fraction convention).
///
/// # Variants
/// - `ActualActual365`: Actual days / 365
/// - `ActualActual360`: Actual days / 360
/// - `Thirty360`: Each month treated as 30 days, year as 360 days
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DayCountConvention {
    /// Actual/365 Fixed.
    #[default]
    ActualActual365,
    /// Actual/360.
    ActualActual360,
    /// 30/360 US Bond Basis.
    Thirty360,
}

impl DayCountConvention {
    /// Returns the standard convention name.
    pub fn name(&self) -> &'static str {
        match self {
            DayCountConvention::ActualActual365 => "ACT/365",
            DayCountConvention::ActualActual360 => "ACT/360",
            DayCountConvention::Thirty360 => "30/360",
        }
    }

    /// Year fraction between two dates, negative when `start > end`.
    pub fn year_fraction_dates(&self, start: Date, end: Date) -> f64 {
        let days = end - start;
        match self {
            DayCountConvention::ActualActual365 => days as f64 / 365.0,
            DayCountConvention::ActualActual360 => days as f64 / 360.0,
            DayCountConvention::Thirty360 => {
                let (lo, hi, sign) = if start <= end {
                    (start, end, 1.0)
                } else {
                    (end, start, -1.0)
                };
                let d1 = if lo.day() == 31 { 30 } else { lo.day() };
                let d2 = if hi.day() == 31 && d1 == 30 { 30 } else { hi.day() };
                let days_30_360 = 360 * (hi.year() - lo.year())
                    + 30 * (hi.month() as i32 - lo.month() as i32)
                    + (d2 as i32 - d1 as i32);
                sign * days_30_360 as f64 / 360.0
            }
        }
    }
}

impl FromStr for DayCountConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace(['/', ' '], "").as_str() {
            "ACT365" | "ACTUAL365" | "A365" => Ok(DayCountConvention::ActualActual365),
            "ACT360" | "ACTUAL360" | "A360" => Ok(DayCountConvention::ActualActual360),
            "30360" | "THIRTY360" => Ok(DayCountConvention::Thirty360),
            _ => Err(format!("Unknown day count convention: {}", s)),
        }
    }
}

impl fmt::Display for DayCountConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::{DayCountConvention, Tenor, TimeUnit};
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    impl Serialize for DayCountConvention {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(self.name())
        }
    }

    impl<'de> Deserialize<'de> for DayCountConvention {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            DayCountConvention::from_str(&s).map_err(de::Error::custom)
        }
    }

    impl Serialize for TimeUnit {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for TimeUnit {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            TimeUnit::from_str(&s).map_err(de::Error::custom)
        }
    }

    impl Serialize for Tenor {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Tenor {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Tenor::from_str(&s).map_err(de::Error::custom)
        }
    }
}
