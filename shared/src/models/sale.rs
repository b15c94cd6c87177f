//! Sale models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Processed coffee transferred to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: String,
    pub date: NaiveDate,
    pub client: String,
    pub coffee_type: String,
    pub quantity_kg: Decimal,
    pub unit_price: Option<Decimal>,
    pub total_revenue: Decimal,
    /// Process whose output this sale draws from, when recorded
    #[serde(default)]
    pub process_id: Option<String>,
}

impl Sale {
    /// Price per kilogram: the recorded one, else derived from the total
    pub fn effective_unit_price(&self) -> Option<Decimal> {
        match self.unit_price {
            Some(price) if !price.is_sign_negative() => Some(price),
            Some(_) => None,
            None if self.quantity_kg > Decimal::ZERO && !self.total_revenue.is_zero() => {
                self.total_revenue.checked_div(self.quantity_kg)
            }
            None => None,
        }
    }
}
