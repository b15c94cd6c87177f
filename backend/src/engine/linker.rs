//! Lineage linking
//!
//! Resolves which lots each process consumed and which sales drew on each
//! process's output. Consumption is oldest-first by record date, ties broken
//! by id, so the outcome is a pure function of the snapshot.
//!
//! Remaining quantities live only for the duration of one [`link`] call.
//! Lots and processes are queued per normalized coffee type, so inferred
//! consumption and untagged sales each walk their queue once.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    normalize_coffee_type, InputSource, LineageWarning, Process, ProcessIssue, Sale,
};

use crate::store::LedgerSnapshot;

/// A consumable quantity with a traceable cost basis
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LotKey {
    /// A warehouse entry
    Warehouse(String),
    /// The part of a purchase never recorded as a warehouse lot
    PurchaseRemainder(String),
}

impl std::fmt::Display for LotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotKey::Warehouse(id) => write!(f, "warehouse entry {}", id),
            LotKey::PurchaseRemainder(id) => write!(f, "purchase {} remainder", id),
        }
    }
}

/// Quantity a process took from one lot
#[derive(Debug, Clone, PartialEq)]
pub struct LotDraw {
    pub lot: LotKey,
    /// Purchase the lot traces back to; `None` when that purchase is missing
    pub purchase_id: Option<String>,
    pub quantity_kg: Decimal,
}

/// Quantity of a sale served from a process's output
#[derive(Debug, Clone, PartialEq)]
pub struct SaleDraw {
    pub sale_id: String,
    pub quantity_kg: Decimal,
    /// The sale named the process itself
    pub direct: bool,
}

/// Everything the linker resolved for one process
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessLineage {
    pub process_id: String,
    pub draws: Vec<LotDraw>,
    pub sales: Vec<SaleDraw>,
    pub issues: Vec<ProcessIssue>,
}

impl ProcessLineage {
    fn new(process_id: &str) -> Self {
        Self {
            process_id: process_id.to_string(),
            draws: Vec::new(),
            sales: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn traced_input(&self) -> Decimal {
        self.draws.iter().map(|d| d.quantity_kg).sum()
    }

    pub fn sold(&self) -> Decimal {
        self.sales.iter().map(|s| s.quantity_kg).sum()
    }

    /// Inputs did not cover the recorded input quantity
    pub fn is_short(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ProcessIssue::InsufficientInputs { .. }))
    }
}

/// Result of linking one snapshot
#[derive(Debug, Clone, Default)]
pub struct Lineage {
    processes: HashMap<String, ProcessLineage>,
    pub warnings: Vec<LineageWarning>,
}

impl Lineage {
    pub fn process(&self, id: &str) -> Option<&ProcessLineage> {
        self.processes.get(id)
    }
}

struct Lot {
    key: LotKey,
    date: NaiveDate,
    coffee_type: String,
    purchase_id: Option<String>,
    remaining: Decimal,
}

/// Positions in consumption order, with everything before `next` used up
#[derive(Default)]
struct Queue {
    items: Vec<usize>,
    next: usize,
}

/// Lots in consumption order with lookups by reference
struct LotBook {
    lots: Vec<Lot>,
    by_warehouse: HashMap<String, usize>,
    by_purchase: HashMap<String, Vec<usize>>,
    /// Warehouse lots per normalized coffee type
    by_type: HashMap<String, Queue>,
}

impl LotBook {
    fn build(snapshot: &LedgerSnapshot, warnings: &mut Vec<LineageWarning>) -> Self {
        let mut lotted: HashMap<&str, Decimal> = HashMap::new();
        let mut lots = Vec::new();

        for entry in snapshot.warehouse_entries() {
            let purchase_id = match snapshot.purchase(&entry.purchase_id) {
                Some(purchase) => {
                    let total = lotted.entry(purchase.id.as_str()).or_default();
                    *total = total.saturating_add(entry.quantity_kg);
                    Some(purchase.id.clone())
                }
                None => {
                    warnings.push(LineageWarning::UnknownPurchase {
                        warehouse_entry_id: entry.id.clone(),
                        purchase_id: entry.purchase_id.clone(),
                    });
                    None
                }
            };
            lots.push(Lot {
                key: LotKey::Warehouse(entry.id.clone()),
                date: entry.date,
                coffee_type: normalize_coffee_type(&entry.coffee_type),
                purchase_id,
                remaining: entry.quantity_kg.max(Decimal::ZERO),
            });
        }

        for purchase in snapshot.purchases() {
            let in_lots = lotted.get(purchase.id.as_str()).copied().unwrap_or_default();
            if in_lots > purchase.quantity_kg {
                warnings.push(LineageWarning::PurchaseOverCommitted {
                    purchase_id: purchase.id.clone(),
                    purchased: purchase.quantity_kg,
                    lotted: in_lots,
                });
            }
            lots.push(Lot {
                key: LotKey::PurchaseRemainder(purchase.id.clone()),
                date: purchase.date,
                coffee_type: normalize_coffee_type(&purchase.coffee_type),
                purchase_id: Some(purchase.id.clone()),
                remaining: purchase.quantity_kg.saturating_sub(in_lots).max(Decimal::ZERO),
            });
        }

        // A purchase's remainder sorts ahead of lots split from it on the same day.
        lots.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| rank(&a.key).cmp(&rank(&b.key)))
                .then_with(|| a.key.cmp(&b.key))
        });

        let mut by_warehouse = HashMap::new();
        let mut by_purchase: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_type: HashMap<String, Queue> = HashMap::new();
        for (i, lot) in lots.iter().enumerate() {
            if let LotKey::Warehouse(id) = &lot.key {
                by_warehouse.insert(id.clone(), i);
                by_type.entry(lot.coffee_type.clone()).or_default().items.push(i);
            }
            if let Some(purchase_id) = &lot.purchase_id {
                by_purchase.entry(purchase_id.clone()).or_default().push(i);
            }
        }

        Self {
            lots,
            by_warehouse,
            by_purchase,
            by_type,
        }
    }

    /// Lots a reference may draw from, oldest first
    fn candidates(&self, source: &InputSource) -> Option<Vec<usize>> {
        match source {
            InputSource::WarehouseEntry(id) => self.by_warehouse.get(id).map(|&i| vec![i]),
            InputSource::Purchase(id) => self.by_purchase.get(id).cloned(),
        }
    }

    /// Take up to `wanted` from the given lots in order
    fn draw(&mut self, lots: &[usize], wanted: Decimal, into: &mut ProcessLineage) -> Decimal {
        let mut left = wanted;
        for &i in lots {
            if left <= Decimal::ZERO {
                break;
            }
            let lot = &mut self.lots[i];
            let take = left.min(lot.remaining);
            if take <= Decimal::ZERO {
                continue;
            }
            lot.remaining -= take;
            left -= take;
            record_draw(into, &lot.key, lot.purchase_id.as_ref(), take);
        }
        wanted - left
    }
}

fn rank(key: &LotKey) -> u8 {
    match key {
        LotKey::PurchaseRemainder(_) => 0,
        LotKey::Warehouse(_) => 1,
    }
}

fn record_draw(into: &mut ProcessLineage, lot: &LotKey, purchase_id: Option<&String>, qty: Decimal) {
    match into.draws.iter_mut().find(|d| &d.lot == lot) {
        Some(existing) => existing.quantity_kg += qty,
        None => into.draws.push(LotDraw {
            lot: lot.clone(),
            purchase_id: purchase_id.cloned(),
            quantity_kg: qty,
        }),
    }
}

/// Link every process and sale of the snapshot.
pub fn link(snapshot: &LedgerSnapshot) -> Lineage {
    let mut warnings = Vec::new();
    let mut book = LotBook::build(snapshot, &mut warnings);

    let mut processes: Vec<&Process> = snapshot.processes().iter().collect();
    processes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

    let mut lineages: HashMap<String, ProcessLineage> = processes
        .iter()
        .map(|p| (p.id.clone(), ProcessLineage::new(&p.id)))
        .collect();

    // Processes naming their inputs draw before any inferred consumption.
    for process in processes.iter().filter(|p| p.has_explicit_inputs()) {
        if let Some(lineage) = lineages.get_mut(&process.id) {
            draw_referenced(&mut book, process, lineage);
        }
    }
    for process in processes.iter().filter(|p| !p.has_explicit_inputs()) {
        if let Some(lineage) = lineages.get_mut(&process.id) {
            draw_by_type(&mut book, process, lineage);
        }
    }

    for process in &processes {
        if let Some(lineage) = lineages.get_mut(&process.id) {
            let traced = lineage.traced_input();
            if traced < process.input_quantity_kg {
                lineage.issues.push(ProcessIssue::InsufficientInputs {
                    required: process.input_quantity_kg,
                    traced,
                });
            }
        }
    }

    attribute_sales(snapshot, &processes, &mut lineages, &mut warnings);

    for warning in &warnings {
        tracing::warn!(?warning, "Lineage warning");
    }

    Lineage {
        processes: lineages,
        warnings,
    }
}

fn draw_referenced(book: &mut LotBook, process: &Process, lineage: &mut ProcessLineage) {
    let mut needed = process.input_quantity_kg;
    let mut open: BTreeSet<usize> = BTreeSet::new();

    for input in &process.inputs {
        let Some(lots) = book.candidates(&input.source) else {
            lineage.issues.push(ProcessIssue::UnresolvedInput {
                source: input.source.clone(),
            });
            continue;
        };
        match input.quantity_kg {
            Some(quantity) => {
                let wanted = quantity.min(needed).max(Decimal::ZERO);
                needed -= book.draw(&lots, wanted, lineage);
            }
            None => open.extend(lots),
        }
    }

    if needed > Decimal::ZERO && !open.is_empty() {
        let lots: Vec<usize> = open.into_iter().collect();
        book.draw(&lots, needed, lineage);
    }
}

/// Oldest-first draw from same-type warehouse lots dated up to the process.
///
/// Processes arrive in date order, so a lot skipped as used up never has to be
/// looked at again.
fn draw_by_type(book: &mut LotBook, process: &Process, lineage: &mut ProcessLineage) {
    let LotBook { lots, by_type, .. } = book;
    let Some(queue) = by_type.get_mut(&normalize_coffee_type(&process.coffee_type)) else {
        return;
    };

    let mut left = process.input_quantity_kg;
    while left > Decimal::ZERO {
        let Some(&i) = queue.items.get(queue.next) else {
            break;
        };
        let lot = &mut lots[i];
        if lot.date > process.date {
            break;
        }
        let take = left.min(lot.remaining);
        if take > Decimal::ZERO {
            lot.remaining -= take;
            left -= take;
            record_draw(lineage, &lot.key, lot.purchase_id.as_ref(), take);
        }
        if lot.remaining <= Decimal::ZERO {
            queue.next += 1;
        }
    }
}

fn attribute_sales(
    snapshot: &LedgerSnapshot,
    processes: &[&Process],
    lineages: &mut HashMap<String, ProcessLineage>,
    warnings: &mut Vec<LineageWarning>,
) {
    let mut remaining: HashMap<&str, Decimal> = processes
        .iter()
        .map(|p| (p.id.as_str(), p.output_quantity().max(Decimal::ZERO)))
        .collect();

    let mut sales: Vec<&Sale> = snapshot
        .sales()
        .iter()
        .filter(|s| s.quantity_kg > Decimal::ZERO)
        .collect();
    sales.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

    for sale in sales.iter().copied() {
        let Some(process_id) = sale.process_id.as_deref() else {
            continue;
        };
        let (Some(available), Some(lineage)) =
            (remaining.get_mut(process_id), lineages.get_mut(process_id))
        else {
            warnings.push(LineageWarning::UnknownProcess {
                sale_id: sale.id.clone(),
                process_id: process_id.to_string(),
            });
            continue;
        };
        let take = sale.quantity_kg.min(*available);
        if sale.quantity_kg > *available {
            lineage.issues.push(ProcessIssue::SaleExceedsOutput {
                sale_id: sale.id.clone(),
                requested: sale.quantity_kg,
                available: *available,
            });
        }
        if take > Decimal::ZERO {
            *available -= take;
            lineage.sales.push(SaleDraw {
                sale_id: sale.id.clone(),
                quantity_kg: take,
                direct: true,
            });
        }
    }

    // Untagged sales only ever move a type's queue forward: output left over
    // after the tagged pass can only shrink.
    let mut by_type: HashMap<String, Queue> = HashMap::new();
    for (i, process) in processes.iter().enumerate() {
        by_type
            .entry(normalize_coffee_type(&process.coffee_type))
            .or_default()
            .items
            .push(i);
    }

    for sale in sales.iter().copied().filter(|s| s.process_id.is_none()) {
        let mut source = None;
        if let Some(queue) = by_type.get_mut(&normalize_coffee_type(&sale.coffee_type)) {
            while let Some(&i) = queue.items.get(queue.next) {
                let process = processes[i];
                let left = remaining.get(process.id.as_str()).copied().unwrap_or_default();
                if left > Decimal::ZERO {
                    source = (process.date <= sale.date).then_some(process);
                    break;
                }
                queue.next += 1;
            }
        }

        let mut unmatched = sale.quantity_kg;
        if let Some(process) = source {
            if let (Some(available), Some(lineage)) = (
                remaining.get_mut(process.id.as_str()),
                lineages.get_mut(&process.id),
            ) {
                let take = unmatched.min(*available);
                *available -= take;
                unmatched -= take;
                lineage.sales.push(SaleDraw {
                    sale_id: sale.id.clone(),
                    quantity_kg: take,
                    direct: false,
                });
            }
        }
        if unmatched > Decimal::ZERO {
            warnings.push(LineageWarning::UnattributedSale {
                sale_id: sale.id.clone(),
                quantity: unmatched,
            });
        }
    }
}
