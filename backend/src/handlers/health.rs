//! Health and status handlers

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint handler
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.name().to_string(),
    })
}

/// API status, polled by the dashboard
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "online".to_string(),
        timestamp: Utc::now(),
    })
}
