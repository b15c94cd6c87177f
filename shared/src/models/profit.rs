//! Process profit report shapes

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::InputSource;
use crate::types::Period;

/// Real profit per processing batch over a date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessProfitReport {
    pub period: Period,
    pub summary: ProcessProfitSummary,
    pub processes: Vec<ProcessProfit>,
    /// Ledger-wide lineage problems found while linking
    pub warnings: Vec<LineageWarning>,
}

/// Period totals over the processes dated in range
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessProfitSummary {
    pub total_processes: usize,
    /// Sum of defined process costs
    pub total_cost: Decimal,
    /// Sum of defined process revenues
    pub total_revenue: Decimal,
    /// Sum of defined process profits
    pub total_profit: Decimal,
    /// Processes left out of at least one total because a figure is undefined
    pub unpriced_processes: usize,
}

/// One processing batch with its traced cost, revenue and profit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessProfit {
    pub process_id: String,
    pub process_date: NaiveDate,
    pub coffee_type: String,
    pub input_quantity: Decimal,
    pub output_quantity: Decimal,
    pub cost: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub profit: Option<Decimal>,
    /// `profit / revenue` as a percentage; undefined without revenue
    pub margin_percent: Option<Decimal>,
    pub source: ProcessSource,
    pub sales: Vec<SaleAttribution>,
    pub issues: Vec<ProcessIssue>,
}

/// Where a process's input came from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessSource {
    /// Largest contributing purchase
    pub purchase: Option<PurchaseContribution>,
    pub purchases: Vec<PurchaseContribution>,
    pub warehouse_entries: Vec<WarehouseDraw>,
}

/// Share of a purchase consumed by a process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseContribution {
    pub purchase_id: String,
    pub date: NaiveDate,
    pub coffee_type: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total: Decimal,
    pub contributed_quantity: Decimal,
    pub cost: Option<Decimal>,
}

/// Quantity a process drew from one warehouse lot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarehouseDraw {
    pub warehouse_entry_id: String,
    pub purchase_id: String,
    pub date: NaiveDate,
    pub coffee_type: String,
    pub quantity: Decimal,
    pub drawn_quantity: Decimal,
}

/// Quantity of a sale attributed to a process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleAttribution {
    pub sale_id: String,
    pub date: NaiveDate,
    pub client: String,
    pub coffee_type: String,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
    pub total: Decimal,
    pub attributed_quantity: Decimal,
    pub revenue: Option<Decimal>,
    /// The sale named this process explicitly
    pub direct: bool,
}

/// Data-integrity problem confined to one process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ProcessIssue {
    /// A consumed lot has no usable unit price
    MissingCostBasis {
        purchase_id: Option<String>,
        source: String,
    },
    /// Traced inputs do not cover the recorded input quantity
    InsufficientInputs { required: Decimal, traced: Decimal },
    /// An input reference points at nothing in the ledger
    UnresolvedInput { source: InputSource },
    /// A sale tagged with this process asked for more than was left
    SaleExceedsOutput {
        sale_id: String,
        requested: Decimal,
        available: Decimal,
    },
    /// An attributed sale has neither a unit price nor a usable total
    MissingSalePrice { sale_id: String },
    /// A figure of this process is too large to represent and is left undefined
    AmountOverflow { figure: String },
}

impl ProcessIssue {
    pub fn code(&self) -> &'static str {
        match self {
            ProcessIssue::MissingCostBasis { .. } => "missing_cost_basis",
            ProcessIssue::InsufficientInputs { .. } => "insufficient_inputs",
            ProcessIssue::UnresolvedInput { .. } => "unresolved_input",
            ProcessIssue::SaleExceedsOutput { .. } => "sale_exceeds_output",
            ProcessIssue::MissingSalePrice { .. } => "missing_sale_price",
            ProcessIssue::AmountOverflow { .. } => "amount_overflow",
        }
    }
}

/// Lineage problem that is not owned by a single process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum LineageWarning {
    /// Warehouse lots of a purchase add up to more than was purchased
    PurchaseOverCommitted {
        purchase_id: String,
        purchased: Decimal,
        lotted: Decimal,
    },
    /// A warehouse entry names a purchase that does not exist
    UnknownPurchase {
        warehouse_entry_id: String,
        purchase_id: String,
    },
    /// A sale names a process that does not exist
    UnknownProcess { sale_id: String, process_id: String },
    /// Part of a sale could not be matched to any process output
    UnattributedSale { sale_id: String, quantity: Decimal },
}
