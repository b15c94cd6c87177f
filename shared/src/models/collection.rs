//! Ledger collection names

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// The five collections the ledger exposes; nothing else may be queried
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Purchases,
    WarehouseEntries,
    Processes,
    Sales,
    Expenses,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Purchases,
        Collection::WarehouseEntries,
        Collection::Processes,
        Collection::Sales,
        Collection::Expenses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Purchases => "purchases",
            Collection::WarehouseEntries => "warehouse_entries",
            Collection::Processes => "processes",
            Collection::Sales => "sales",
            Collection::Expenses => "expenses",
        }
    }

    /// Sheet name used by the spreadsheet-backed ledger
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Collection::Purchases => "Compras",
            Collection::WarehouseEntries => "Almacen",
            Collection::Processes => "Proceso",
            Collection::Sales => "Ventas",
            Collection::Expenses => "Gastos",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "purchases" | "compras" => Ok(Collection::Purchases),
            "warehouse_entries" | "warehouse" | "almacen" | "almacén" => {
                Ok(Collection::WarehouseEntries)
            }
            "processes" | "proceso" | "procesos" => Ok(Collection::Processes),
            "sales" | "ventas" => Ok(Collection::Sales),
            "expenses" | "gastos" => Ok(Collection::Expenses),
            _ => Err(ValidationError::CollectionNotFound(s.to_string())),
        }
    }
}
