//! Common types used across the ledger

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Inclusive calendar date range used by every ledger query.
///
/// Both bounds are included: a record dated exactly on `start` or `end`
/// belongs to the range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering a single day.
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// Every record up to and including `end`.
    ///
    /// The start is left open; a ledger snapshot narrows it to the earliest
    /// record it holds, so an open start never reaches a response.
    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: NaiveDate::MIN,
            end,
        }
    }

    pub fn has_open_start(&self) -> bool {
        self.start == NaiveDate::MIN
    }

    /// The start date, or `None` when the start is open
    pub fn bounded_start(&self) -> Option<NaiveDate> {
        (!self.has_open_start()).then_some(self.start)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// First day of `today`'s month through `today`.
    pub fn month_to_date(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        Self { start, end: today }
    }

    /// The `days` days before `end`, plus `end` itself.
    pub fn trailing_days(end: NaiveDate, days: u64) -> Self {
        let start = end
            .checked_sub_days(chrono::Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    /// One calendar month back from `end`, through `end`.
    pub fn trailing_month(end: NaiveDate) -> Self {
        let start = end.checked_sub_months(Months::new(1)).unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Period echoed back in summary responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl From<DateRange> for Period {
    fn from(range: DateRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}
