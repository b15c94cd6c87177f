//! Accounting figures over the window
//!
//! Plain sums of records dated inside the window. No lineage is consulted, so
//! these figures never agree with traced profit by construction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    normalize_coffee_type, AdvanceBreakdown, CoffeeTypeBreakdown, DailyFinancial,
    DailyInventory, DailySummary, Expense, FinancialTotals, InventoryTotals, LedgerSummary,
    OperationCounts, PaymentBreakdown, PaymentMethod,
};

use super::{minus, plus, total, AmountOverflow};
use crate::store::LedgerSnapshot;

/// Sales totals minus expenses minus purchase totals, window only
pub fn accounting_profit(snapshot: &LedgerSnapshot) -> Result<Decimal, AmountOverflow> {
    let income = total("income", snapshot.sales_in_window().map(|s| s.total_revenue))?;
    let expense = total("expense", snapshot.expenses_in_window().map(|e| e.amount))?;
    let purchases = total("purchases", snapshot.purchases_in_window().map(|p| p.total_cost))?;
    minus("accounting profit", income, plus("outgoings", expense, purchases)?)
}

fn add_payment(acc: &mut PaymentBreakdown, expense: &Expense) -> Result<(), AmountOverflow> {
    let (figure, slot) = match expense.payment_method() {
        PaymentMethod::Cash => ("cash payments", &mut acc.cash),
        PaymentMethod::Transfer => ("transfer payments", &mut acc.transfer),
        PaymentMethod::Other => ("other payments", &mut acc.other),
    };
    *slot = plus(figure, *slot, expense.amount)?;
    Ok(())
}

fn payment_breakdown<'a>(
    expenses: impl Iterator<Item = &'a Expense>,
) -> Result<PaymentBreakdown, AmountOverflow> {
    let mut acc = PaymentBreakdown::default();
    for expense in expenses {
        add_payment(&mut acc, expense)?;
    }
    Ok(acc)
}

/// Period summary; `real_profit` comes from the traced process report
pub fn ledger_summary(
    snapshot: &LedgerSnapshot,
    real_profit: Decimal,
) -> Result<LedgerSummary, AmountOverflow> {
    let window = snapshot.window();

    let kg_purchased = total("kg purchased", snapshot.purchases_in_window().map(|p| p.quantity_kg))?;
    let kg_sold = total("kg sold", snapshot.sales_in_window().map(|s| s.quantity_kg))?;
    let income = total("income", snapshot.sales_in_window().map(|s| s.total_revenue))?;
    let expense = total("expense", snapshot.expenses_in_window().map(|e| e.amount))?;
    let purchases = total("purchases", snapshot.purchases_in_window().map(|p| p.total_cost))?;

    let mut advance = AdvanceBreakdown::default();
    for p in snapshot.purchases_in_window() {
        if p.advance_payment {
            advance.with_advance = plus("advance purchases", advance.with_advance, p.total_cost)?;
        } else {
            advance.without_advance =
                plus("purchases without advance", advance.without_advance, p.total_cost)?;
        }
    }

    Ok(LedgerSummary {
        period: window.into(),
        inventory: InventoryTotals {
            kg_purchased,
            kg_sold,
            kg_available: minus("kg available", kg_purchased, kg_sold)?,
        },
        financial: FinancialTotals {
            income,
            expense,
            purchases,
            accounting_profit: accounting_profit(snapshot)?,
            real_profit,
        },
        purchases: advance,
        payment_methods: payment_breakdown(snapshot.expenses_in_window())?,
        operations: OperationCounts {
            purchases: snapshot.purchases_in_window().count(),
            sales: snapshot.sales_in_window().count(),
            expenses: snapshot.expenses_in_window().count(),
            processes: snapshot.processes_in_window().len(),
        },
    })
}

/// One entry per day with any activity, oldest first
pub fn daily_summaries(snapshot: &LedgerSnapshot) -> Result<Vec<DailySummary>, AmountOverflow> {
    let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();
    let blank = |date| DailySummary {
        date,
        inventory: DailyInventory::default(),
        financial: DailyFinancial::default(),
        payment_methods: PaymentBreakdown::default(),
        operations: OperationCounts::default(),
    };

    for p in snapshot.purchases_in_window() {
        let day = days.entry(p.date).or_insert_with(|| blank(p.date));
        day.inventory.kg_purchased = plus("kg purchased", day.inventory.kg_purchased, p.quantity_kg)?;
        day.financial.purchases = plus("purchases", day.financial.purchases, p.total_cost)?;
        day.operations.purchases += 1;
    }
    for s in snapshot.sales_in_window() {
        let day = days.entry(s.date).or_insert_with(|| blank(s.date));
        day.inventory.kg_sold = plus("kg sold", day.inventory.kg_sold, s.quantity_kg)?;
        day.financial.income = plus("income", day.financial.income, s.total_revenue)?;
        day.operations.sales += 1;
    }
    for e in snapshot.expenses_in_window() {
        let day = days.entry(e.date).or_insert_with(|| blank(e.date));
        day.financial.expense = plus("expense", day.financial.expense, e.amount)?;
        add_payment(&mut day.payment_methods, e)?;
        day.operations.expenses += 1;
    }
    for p in snapshot.processes_in_window() {
        let day = days.entry(p.date).or_insert_with(|| blank(p.date));
        day.operations.processes += 1;
    }

    days.into_values()
        .map(|mut day| {
            let outgoings = plus("outgoings", day.financial.expense, day.financial.purchases)?;
            day.financial.profit = minus("daily profit", day.financial.income, outgoings)?;
            Ok(day)
        })
        .collect()
}

/// Kilograms purchased per coffee type, labelled as first written
pub fn coffee_type_breakdown(snapshot: &LedgerSnapshot) -> Result<CoffeeTypeBreakdown, AmountOverflow> {
    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    let mut breakdown = CoffeeTypeBreakdown::new();

    let mut purchases: Vec<_> = snapshot.purchases_in_window().collect();
    purchases.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

    for purchase in purchases {
        let key = normalize_coffee_type(&purchase.coffee_type);
        let label = labels
            .entry(key)
            .or_insert_with(|| purchase.coffee_type.trim().to_string())
            .clone();
        let totals = breakdown.entry(label).or_default();
        totals.kg_total = plus("kg per coffee type", totals.kg_total, purchase.quantity_kg)?;
        totals.operations += 1;
    }
    Ok(breakdown)
}
