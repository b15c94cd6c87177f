//! Expense models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Operating expense; only ever used for accounting profit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub id: String,
    pub date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: Decimal,
}

impl Expense {
    /// Payment method as written in the free-text description
    pub fn payment_method(&self) -> PaymentMethod {
        let description = self
            .description
            .as_deref()
            .unwrap_or_default()
            .to_uppercase();
        if description.contains("EFECTIVO") || description.contains("CASH") {
            PaymentMethod::Cash
        } else if description.contains("TRANSFERENCIA") || description.contains("TRANSFER") {
            PaymentMethod::Transfer
        } else {
            PaymentMethod::Other
        }
    }
}

/// How an expense was paid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Other,
}
