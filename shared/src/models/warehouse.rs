//! Warehouse models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A lot of coffee held in storage, traceable to the purchase it came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehouseEntry {
    pub id: String,
    pub purchase_id: String,
    pub date: NaiveDate,
    pub coffee_type: String,
    pub quantity_kg: Decimal,
}
