//! Processing models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A transformation event consuming stored coffee (milling, roasting, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Process {
    pub id: String,
    pub date: NaiveDate,
    pub coffee_type: String,
    pub input_quantity_kg: Decimal,
    /// Output after processing loss; assumed equal to the input when not recorded
    #[serde(default)]
    pub output_quantity_kg: Option<Decimal>,
    /// Explicit provenance; empty means inputs are inferred oldest-first
    #[serde(default)]
    pub inputs: Vec<ProcessInput>,
}

impl Process {
    pub fn output_quantity(&self) -> Decimal {
        self.output_quantity_kg.unwrap_or(self.input_quantity_kg)
    }

    pub fn has_explicit_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }
}

/// Reference from a process to the stock it consumed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessInput {
    pub source: InputSource,
    /// Quantity drawn from this source, when recorded
    #[serde(default)]
    pub quantity_kg: Option<Decimal>,
}

impl ProcessInput {
    pub fn warehouse(id: impl Into<String>) -> Self {
        Self {
            source: InputSource::WarehouseEntry(id.into()),
            quantity_kg: None,
        }
    }

    pub fn purchase(id: impl Into<String>) -> Self {
        Self {
            source: InputSource::Purchase(id.into()),
            quantity_kg: None,
        }
    }

    pub fn with_quantity(mut self, quantity_kg: Decimal) -> Self {
        self.quantity_kg = Some(quantity_kg);
        self
    }
}

/// Kind of record a process input points at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum InputSource {
    WarehouseEntry(String),
    Purchase(String),
}

impl InputSource {
    pub fn id(&self) -> &str {
        match self {
            InputSource::WarehouseEntry(id) | InputSource::Purchase(id) => id,
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::WarehouseEntry(id) => write!(f, "warehouse entry {}", id),
            InputSource::Purchase(id) => write!(f, "purchase {}", id),
        }
    }
}
