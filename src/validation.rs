//! Input guards for date-scoped operations.
//!
//! Every date-scoped operation runs these checks before it issues its request,
//! so bad input never reaches the portal.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use netschool_core::validation::{StudyYear, check_dates, check_interval};
//!
//! let year = StudyYear::new(
//!     NaiveDate::from_ymd_opt(2023, 9, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 5, 25).unwrap(),
//! );
//! let start = NaiveDate::from_ymd_opt(2023, 9, 5).unwrap();
//! let end = NaiveDate::from_ymd_opt(2023, 9, 6).unwrap();
//! assert!(check_dates(&year, &[start, end]).is_ok());
//! assert!(check_interval(start, end).is_ok());
//! assert!(check_interval(start, start).is_err());
//! ```

use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;

/// Shortest accepted span, in hours, between the two dates of an interval operation.
pub const MIN_INTERVAL_HOURS: i64 = 24;

/// The school-year window all date-scoped queries are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StudyYear {
    /// First day of the school year.
    pub start: NaiveDate,
    /// Last day of the school year.
    pub end: NaiveDate,
}

impl StudyYear {
    /// Creates a window.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Returns true when `date` lies within the window, bounds included.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Rejected caller input. Raised before any network request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Date lies outside the school year.
    #[error("date {date} is outside the school year {start}..={end}")]
    OutOfRange {
        /// Offending date.
        date: NaiveDate,
        /// First day of the school year.
        start: NaiveDate,
        /// Last day of the school year.
        end: NaiveDate,
    },

    /// Input is not a calendar date.
    #[error("invalid date {input:?} (expected YYYY-MM-DD)")]
    InvalidDate {
        /// Raw input.
        input: String,
    },

    /// The interval is shorter than [`MIN_INTERVAL_HOURS`].
    #[error("interval too short: {start}..{end} must span at least 24 hours")]
    IntervalTooShort {
        /// Interval start.
        start: NaiveDate,
        /// Interval end.
        end: NaiveDate,
    },

    /// The subject id is not in the account's subject catalog.
    #[error("unknown subject id {id}")]
    UnknownSubject {
        /// Requested subject id.
        id: i64,
    },
}

/// Checks that every date lies within the school year.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] for the first date outside the window.
pub fn check_dates(year: &StudyYear, dates: &[NaiveDate]) -> Result<(), ValidationError> {
    match dates.iter().find(|date| !year.contains(**date)) {
        Some(date) => Err(ValidationError::OutOfRange {
            date: *date,
            start: year.start,
            end: year.end,
        }),
        None => Ok(()),
    }
}

/// Checks that `end - start` spans at least 24 hours.
///
/// # Errors
///
/// Returns [`ValidationError::IntervalTooShort`] otherwise, including for
/// reversed intervals.
pub fn check_interval(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end.signed_duration_since(start) < Duration::hours(MIN_INTERVAL_HOURS) {
        return Err(ValidationError::IntervalTooShort { start, end });
    }
    Ok(())
}

/// Parses external `YYYY-MM-DD` input into a date.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidDate`] for anything that is not a real
/// calendar date (e.g. `2023-02-30`).
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        input: input.to_string(),
    })
}

/// Canonical serialization used in report filters: `YYYY-MM-DDT00:00:00.000Z`.
#[must_use]
pub fn canonical_date(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// Monday and Sunday of the week containing `date`.
#[must_use]
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}
