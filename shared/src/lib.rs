//! Shared types and models for the Coffee Ledger
//!
//! This crate contains the ledger records, query types and report shapes
//! shared between the backend and the dashboard client.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
