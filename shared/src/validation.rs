//! Validation utilities for ledger queries and records

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::DateRange;

/// Input rejected before any ledger work begins
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid date for {field}: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { field: String, value: String },

    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

// ============================================================================
// Dates
// ============================================================================

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a calendar date as it arrives from query strings or spreadsheet cells.
///
/// Accepts `YYYY-MM-DD` (canonical), `DD/MM/YYYY` and `YYYY/MM/DD`. A
/// timestamp is truncated to its date.
pub fn parse_calendar_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(datetime.date());
        }
    }
    Err(ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Validate optional query bounds into a range, filling missing bounds from `default`.
pub fn validate_date_range(
    start: Option<&str>,
    end: Option<&str>,
    default: impl FnOnce(Option<NaiveDate>) -> DateRange,
) -> Result<DateRange, ValidationError> {
    let start = start
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_calendar_date("start_date", s))
        .transpose()?;
    let end = end
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_calendar_date("end_date", s))
        .transpose()?;

    match (start, end) {
        (Some(start), Some(end)) => DateRange::new(start, end),
        (Some(start), None) => {
            let fallback = default(None);
            DateRange::new(start, fallback.end.max(start))
        }
        (None, end) => {
            let fallback = default(end);
            DateRange::new(fallback.start, end.unwrap_or(fallback.end))
        }
    }
}

// ============================================================================
// Quantities and money
// ============================================================================

/// Validate that a quantity or monetary figure is not negative
pub fn validate_non_negative(field: &str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("must not be negative (got {})", value),
        });
    }
    Ok(())
}

/// Canonical form of a coffee type name used for matching lots, processes and sales
pub fn normalize_coffee_type(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
