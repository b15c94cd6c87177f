//! Query services for the Coffee Ledger
//!
//! Each service takes one snapshot per query and runs the engine over it
//! under the configured deadline.

pub mod process_profit;
pub mod reporting;

use std::future::Future;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use shared::{validate_date_range, DateRange};

use crate::error::{AppError, AppResult};

pub use process_profit::ProcessProfitService;
pub use reporting::ReportingService;

/// Optional `start_date` / `end_date` query bounds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Window applied when a query leaves out one or both bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultWindow {
    /// First day of the end date's month through the end date
    MonthToDate,
    /// Seven days before the end date through the end date
    TrailingWeek,
    /// One calendar month before the end date through the end date
    TrailingMonth,
    /// Every record up to the end date
    Everything,
}

impl DefaultWindow {
    pub fn resolve(self, today: NaiveDate, end: Option<NaiveDate>) -> DateRange {
        let end = end.unwrap_or(today);
        match self {
            DefaultWindow::MonthToDate => DateRange::month_to_date(end),
            DefaultWindow::TrailingWeek => DateRange::trailing_days(end, 7),
            DefaultWindow::TrailingMonth => DateRange::trailing_month(end),
            DefaultWindow::Everything => DateRange::until(end),
        }
    }
}

impl DateRangeQuery {
    /// Validate the bounds, filling what is missing from `window`
    pub fn resolve(&self, window: DefaultWindow, today: NaiveDate) -> AppResult<DateRange> {
        Ok(validate_date_range(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            |end| window.resolve(today, end),
        )?)
    }
}

/// Current calendar date in the business timezone
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Run CPU-bound engine work off the async workers, so a deadline around it
/// can still fire.
pub(crate) async fn run_blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("engine task failed: {}", e)))?
}

/// Run a whole query under a deadline; on expiry nothing partial is returned
pub(crate) async fn with_deadline<T>(
    timeout: Duration,
    query: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Ledger query timed out");
            Err(AppError::QueryTimeout(timeout.as_millis() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    fn query(start: Option<&str>, end: Option<&str>) -> DateRangeQuery {
        DateRangeQuery {
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
        }
    }

    #[test]
    fn test_default_windows() {
        let today = day("2024-03-20");
        let summary = query(None, None)
            .resolve(DefaultWindow::MonthToDate, today)
            .unwrap();
        assert_eq!(summary, DateRange::new(day("2024-03-01"), today).unwrap());

        let daily = query(None, Some("2024-03-10"))
            .resolve(DefaultWindow::TrailingWeek, today)
            .unwrap();
        assert_eq!(daily.start, day("2024-03-03"));

        let profit = query(None, None)
            .resolve(DefaultWindow::TrailingMonth, today)
            .unwrap();
        assert_eq!(profit.start, day("2024-02-20"));
    }

    #[test]
    fn test_everything_window_ends_today_with_open_start() {
        let range = query(None, None)
            .resolve(DefaultWindow::Everything, day("2024-03-20"))
            .unwrap();
        assert!(range.has_open_start());
        assert_eq!(range.end, day("2024-03-20"));

        let from = query(Some("2024-01-01"), None)
            .resolve(DefaultWindow::Everything, day("2024-03-20"))
            .unwrap();
        assert_eq!(from, DateRange::new(day("2024-01-01"), day("2024-03-20")).unwrap());
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        let err = query(Some("2024-03-31"), Some("2024-03-01"))
            .resolve(DefaultWindow::MonthToDate, day("2024-03-20"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvertedRange { .. }));

        let err = query(Some("yesterday"), None)
            .resolve(DefaultWindow::MonthToDate, day("2024-03-20"))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidDate { .. }));
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_query_timeout() {
        let result: AppResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(AppError::QueryTimeout(10))));
    }

    #[tokio::test]
    async fn test_deadline_fires_around_blocking_work() {
        let result: AppResult<()> = with_deadline(
            Duration::from_millis(10),
            run_blocking(|| {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::QueryTimeout(10))));
    }
}
