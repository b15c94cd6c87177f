//! Reporting handlers for the dashboard

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{Collection, CoffeeTypeBreakdown, DailySummary, LedgerSummary};

use crate::error::AppResult;
use crate::services::{today_in, DateRangeQuery, DefaultWindow, ReportingService};
use crate::AppState;

fn service(state: &AppState) -> ReportingService {
    ReportingService::new(state.store.clone(), state.config.engine.clone())
}

/// Period summary; defaults to the current month
pub async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<LedgerSummary>> {
    let today = today_in(state.config.engine.tz());
    let range = query.resolve(DefaultWindow::MonthToDate, today)?;
    let summary = service(&state).summary(range).await?;
    Ok(Json(summary))
}

/// Daily series; defaults to the last week
pub async fn get_daily(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<DailySummary>>> {
    let today = today_in(state.config.engine.tz());
    let range = query.resolve(DefaultWindow::TrailingWeek, today)?;
    let days = service(&state).daily(range).await?;
    Ok(Json(days))
}

/// Purchased kilograms per coffee type; defaults to the whole ledger
pub async fn get_coffee_types(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<CoffeeTypeBreakdown>> {
    let today = today_in(state.config.engine.tz());
    let range = query.resolve(DefaultWindow::Everything, today)?;
    let breakdown = service(&state).coffee_types(range).await?;
    Ok(Json(breakdown))
}

/// Raw records of one whitelisted collection
pub async fn get_raw_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<serde_json::Value>>> {
    // Unknown names never reach the store.
    let collection: Collection = name.parse()?;
    let today = today_in(state.config.engine.tz());
    let range = query.resolve(DefaultWindow::Everything, today)?;
    let records = service(&state).raw(collection, range).await?;
    Ok(Json(records))
}
