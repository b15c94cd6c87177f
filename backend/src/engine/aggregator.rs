//! Profit aggregation per process and over a period

use rust_decimal::{Decimal, RoundingStrategy};
use shared::{Process, ProcessIssue, ProcessProfit, ProcessProfitSummary};

use super::allocator::allocate;
use super::attributor::attribute;
use super::linker::{Lineage, ProcessLineage};
use super::{plus, AmountOverflow};
use crate::store::LedgerSnapshot;

/// `profit / revenue` as a percentage, two decimals; undefined unless revenue is positive
pub fn margin_percent(profit: Option<Decimal>, revenue: Option<Decimal>) -> Option<Decimal> {
    match (profit, revenue) {
        (Some(profit), Some(revenue)) if revenue > Decimal::ZERO => profit
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.checked_div(revenue))
            .map(|margin| margin.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)),
        _ => None,
    }
}

/// Cost, revenue and profit of one linked process
pub fn evaluate_process(
    snapshot: &LedgerSnapshot,
    lineage: &Lineage,
    process: &Process,
) -> ProcessProfit {
    let empty = ProcessLineage {
        process_id: process.id.clone(),
        draws: Vec::new(),
        sales: Vec::new(),
        issues: Vec::new(),
    };
    let linked = lineage.process(&process.id).unwrap_or(&empty);

    let allocation = allocate(snapshot, linked);
    let attribution = attribute(snapshot, linked);

    let cost = allocation.cost;
    let revenue = attribution.revenue;
    let profit = revenue
        .zip(cost)
        .and_then(|(revenue, cost)| revenue.checked_sub(cost));

    let mut issues = linked.issues.clone();
    issues.extend(allocation.issues);
    issues.extend(attribution.issues);
    if profit.is_none() && revenue.is_some() && cost.is_some() {
        issues.push(ProcessIssue::AmountOverflow {
            figure: "profit".to_string(),
        });
    }
    let margin = margin_percent(profit, revenue);
    if margin.is_none() && profit.is_some() && revenue.is_some_and(|r| r > Decimal::ZERO) {
        issues.push(ProcessIssue::AmountOverflow {
            figure: "margin".to_string(),
        });
    }
    for issue in &issues {
        tracing::warn!(process_id = %process.id, code = issue.code(), ?issue, "Process issue");
    }

    ProcessProfit {
        process_id: process.id.clone(),
        process_date: process.date,
        coffee_type: process.coffee_type.clone(),
        input_quantity: process.input_quantity_kg,
        output_quantity: process.output_quantity(),
        cost,
        revenue,
        profit,
        margin_percent: margin,
        source: allocation.source,
        sales: attribution.sales,
        issues,
    }
}

/// Period totals; each total sums exactly the defined figures of `processes`
pub fn summarize(processes: &[ProcessProfit]) -> Result<ProcessProfitSummary, AmountOverflow> {
    let mut summary = ProcessProfitSummary::default();
    for p in processes {
        summary.total_processes += 1;
        summary.total_cost = plus("total cost", summary.total_cost, p.cost.unwrap_or_default())?;
        summary.total_revenue =
            plus("total revenue", summary.total_revenue, p.revenue.unwrap_or_default())?;
        summary.total_profit =
            plus("total profit", summary.total_profit, p.profit.unwrap_or_default())?;
        if p.cost.is_none() || p.revenue.is_none() || p.profit.is_none() {
            summary.unpriced_processes += 1;
        }
    }
    Ok(summary)
}
