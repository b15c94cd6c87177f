//! HTTP handlers

pub mod health;
pub mod process_profit;
pub mod reporting;

pub use health::{health_check, status};
pub use process_profit::get_process_profit;
pub use reporting::{get_coffee_types, get_daily, get_raw_collection, get_summary};
