//! Route definitions for the Coffee Ledger API

use axum::{routing::get, Router};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::status))
        // Accounting
        .route("/summary", get(handlers::get_summary))
        .route("/daily", get(handlers::get_daily))
        .route("/coffee-types", get(handlers::get_coffee_types))
        // Real profit
        .route("/process-profit", get(handlers::get_process_profit))
        // Passthrough, restricted to the ledger collections
        .route("/raw/:collection", get(handlers::get_raw_collection))
}
