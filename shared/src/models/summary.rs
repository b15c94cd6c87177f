//! Period and daily summary shapes consumed by the dashboard

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Period;

/// Summary of one date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSummary {
    pub period: Period,
    pub inventory: InventoryTotals,
    pub financial: FinancialTotals,
    pub purchases: AdvanceBreakdown,
    pub payment_methods: PaymentBreakdown,
    pub operations: OperationCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InventoryTotals {
    pub kg_purchased: Decimal,
    pub kg_sold: Decimal,
    /// Purchased minus sold within the period
    pub kg_available: Decimal,
}

/// Accounting and real profit side by side; they are never reconciled
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FinancialTotals {
    pub income: Decimal,
    pub expense: Decimal,
    pub purchases: Decimal,
    /// income - expense - purchases, strictly within the window
    pub accounting_profit: Decimal,
    /// Sum of traced process profits for processes dated in the window
    pub real_profit: Decimal,
}

/// Purchase totals split by advance payment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdvanceBreakdown {
    pub with_advance: Decimal,
    pub without_advance: Decimal,
}

/// Expense totals by payment method
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentBreakdown {
    pub cash: Decimal,
    pub transfer: Decimal,
    pub other: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationCounts {
    pub purchases: usize,
    pub sales: usize,
    pub expenses: usize,
    pub processes: usize,
}

/// One day of activity for charting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub inventory: DailyInventory,
    pub financial: DailyFinancial,
    pub payment_methods: PaymentBreakdown,
    pub operations: OperationCounts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyInventory {
    pub kg_purchased: Decimal,
    pub kg_sold: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DailyFinancial {
    pub income: Decimal,
    pub expense: Decimal,
    pub purchases: Decimal,
    pub profit: Decimal,
}

impl DailySummary {
    /// Look up a chart series value by dotted path, e.g. `financial.income`
    pub fn metric(&self, path: &str) -> Option<Decimal> {
        let (group, field) = path.split_once('.')?;
        match (group, field) {
            ("inventory", "kg_purchased") => Some(self.inventory.kg_purchased),
            ("inventory", "kg_sold") => Some(self.inventory.kg_sold),
            ("financial", "income") => Some(self.financial.income),
            ("financial", "expense") => Some(self.financial.expense),
            ("financial", "purchases") => Some(self.financial.purchases),
            ("financial", "profit") => Some(self.financial.profit),
            ("payment_methods", "cash") => Some(self.payment_methods.cash),
            ("payment_methods", "transfer") => Some(self.payment_methods.transfer),
            ("payment_methods", "other") => Some(self.payment_methods.other),
            ("operations", "purchases") => Some(Decimal::from(self.operations.purchases)),
            ("operations", "sales") => Some(Decimal::from(self.operations.sales)),
            ("operations", "expenses") => Some(Decimal::from(self.operations.expenses)),
            ("operations", "processes") => Some(Decimal::from(self.operations.processes)),
            _ => None,
        }
    }
}

/// Kilograms purchased per coffee type
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoffeeTypeTotals {
    pub kg_total: Decimal,
    pub operations: usize,
}

pub type CoffeeTypeBreakdown = BTreeMap<String, CoffeeTypeTotals>;
