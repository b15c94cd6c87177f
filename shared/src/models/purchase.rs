//! Purchase models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Acquisition of raw coffee at a price per kilogram
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Purchase {
    pub id: String,
    pub date: NaiveDate,
    pub coffee_type: String,
    pub quantity_kg: Decimal,
    /// Missing when the source row had no price; the cost basis is then undefined
    pub unit_price: Option<Decimal>,
    pub total_cost: Decimal,
    /// Paid (at least partly) in advance of delivery
    #[serde(default)]
    pub advance_payment: bool,
    #[serde(default)]
    pub supplier: Option<String>,
}

impl Purchase {
    /// Unit price usable as cost basis, if the record carries a valid one
    pub fn cost_basis(&self) -> Option<Decimal> {
        self.unit_price.filter(|price| !price.is_sign_negative())
    }
}
