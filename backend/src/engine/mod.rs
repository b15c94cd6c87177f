//! Process profit attribution engine
//!
//! Pure, synchronous computations over a [`LedgerSnapshot`]:
//!
//! 1. [`linker::link`] resolves lots consumed and sales served per process
//! 2. [`allocator::allocate`] prices the consumed lots
//! 3. [`attributor::attribute`] prices the attributed sales
//! 4. [`aggregator`] derives profit and period totals
//!
//! [`accounting`] works from the same snapshot but never looks at lineage.
//!
//! All money arithmetic is checked. A figure of one process that leaves the
//! `Decimal` range becomes undefined with an `amount_overflow` issue; a period
//! total that does fails the query with [`AmountOverflow`].

pub mod accounting;
pub mod aggregator;
pub mod allocator;
pub mod attributor;
pub mod linker;

use rust_decimal::Decimal;
use shared::{LineageWarning, Process, ProcessProfit, ProcessProfitReport};
use thiserror::Error;

pub use aggregator::{evaluate_process, margin_percent, summarize};
pub use linker::{link, Lineage};

use crate::store::LedgerSnapshot;

/// A period total grew past what `Decimal` can hold
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{0} is too large to represent")]
pub struct AmountOverflow(pub &'static str);

/// Exact sum, or `None` once it leaves the representable range
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, Decimal::checked_add)
}

pub(crate) fn total(
    figure: &'static str,
    amounts: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, AmountOverflow> {
    checked_sum(amounts).ok_or(AmountOverflow(figure))
}

pub(crate) fn plus(figure: &'static str, a: Decimal, b: Decimal) -> Result<Decimal, AmountOverflow> {
    a.checked_add(b).ok_or(AmountOverflow(figure))
}

pub(crate) fn minus(figure: &'static str, a: Decimal, b: Decimal) -> Result<Decimal, AmountOverflow> {
    a.checked_sub(b).ok_or(AmountOverflow(figure))
}

/// Evaluate the given processes sequentially, keeping their order
pub fn evaluate(snapshot: &LedgerSnapshot, lineage: &Lineage, processes: &[&Process]) -> Vec<ProcessProfit> {
    processes
        .iter()
        .map(|process| evaluate_process(snapshot, lineage, process))
        .collect()
}

/// Assemble the report for the snapshot's window
pub fn build_report(
    snapshot: &LedgerSnapshot,
    processes: Vec<ProcessProfit>,
    warnings: Vec<LineageWarning>,
) -> Result<ProcessProfitReport, AmountOverflow> {
    Ok(ProcessProfitReport {
        period: snapshot.window().into(),
        summary: summarize(&processes)?,
        processes,
        warnings,
    })
}

/// Link and evaluate every process dated in the window
pub fn process_profit_report(snapshot: &LedgerSnapshot) -> Result<ProcessProfitReport, AmountOverflow> {
    let lineage = link(snapshot);
    let processes = evaluate(snapshot, &lineage, &snapshot.processes_in_window());
    build_report(snapshot, processes, lineage.warnings)
}
