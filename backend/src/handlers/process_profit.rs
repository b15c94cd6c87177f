//! Process profit handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::{today_in, DateRangeQuery, DefaultWindow, ProcessProfitService};
use crate::AppState;

#[derive(Deserialize)]
pub struct ProcessProfitQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

/// Real profit per process; defaults to the month before the end date
pub async fn get_process_profit(
    State(state): State<AppState>,
    Query(query): Query<ProcessProfitQuery>,
) -> AppResult<impl IntoResponse> {
    let csv = match query.format.as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(AppError::InvalidParameter {
                field: "format".to_string(),
                message: format!("unsupported format {:?}, expected json or csv", other),
            })
        }
    };

    let range = DateRangeQuery {
        start_date: query.start_date,
        end_date: query.end_date,
    }
    .resolve(DefaultWindow::TrailingMonth, today_in(state.config.engine.tz()))?;

    let service = ProcessProfitService::new(state.store.clone(), state.config.engine.clone());
    let report = service.report(range).await?;

    if csv {
        let csv = ProcessProfitService::export_to_csv(&report)?;
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"process_profit.csv\"",
                ),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(report).into_response())
    }
}
