//! Cost allocation
//!
//! Prices each lot a process drew at the unit price of the purchase it traces
//! back to. Arithmetic is exact; nothing is rounded here.

use rust_decimal::Decimal;
use shared::{ProcessIssue, ProcessSource, PurchaseContribution, WarehouseDraw};

use super::checked_sum;
use super::linker::{LotKey, ProcessLineage};
use crate::store::LedgerSnapshot;

/// Cost side of one process
#[derive(Debug, Clone, PartialEq)]
pub struct CostAllocation {
    /// Undefined when any draw lacks a cost basis or inputs were not fully traced
    pub cost: Option<Decimal>,
    pub source: ProcessSource,
    pub issues: Vec<ProcessIssue>,
}

pub fn allocate(snapshot: &LedgerSnapshot, lineage: &ProcessLineage) -> CostAllocation {
    let mut contributions: Vec<PurchaseContribution> = Vec::new();
    let mut warehouse_entries = Vec::new();
    let mut issues = Vec::new();
    let mut priced = !lineage.is_short();
    let mut overflowed = false;

    for draw in &lineage.draws {
        if let LotKey::Warehouse(entry_id) = &draw.lot {
            if let Some(entry) = snapshot.warehouse_entry(entry_id) {
                warehouse_entries.push(WarehouseDraw {
                    warehouse_entry_id: entry.id.clone(),
                    purchase_id: entry.purchase_id.clone(),
                    date: entry.date,
                    coffee_type: entry.coffee_type.clone(),
                    quantity: entry.quantity_kg,
                    drawn_quantity: draw.quantity_kg,
                });
            }
        }

        let Some(purchase) = draw.purchase_id.as_deref().and_then(|id| snapshot.purchase(id))
        else {
            priced = false;
            issues.push(ProcessIssue::MissingCostBasis {
                purchase_id: draw.purchase_id.clone(),
                source: draw.lot.to_string(),
            });
            continue;
        };

        let cost_basis = purchase.cost_basis();
        if cost_basis.is_none() {
            priced = false;
            issues.push(ProcessIssue::MissingCostBasis {
                purchase_id: Some(purchase.id.clone()),
                source: draw.lot.to_string(),
            });
        }
        let cost = cost_basis.and_then(|price| price.checked_mul(draw.quantity_kg));
        overflowed |= cost_basis.is_some() && cost.is_none();

        match contributions
            .iter_mut()
            .find(|c| c.purchase_id == purchase.id)
        {
            Some(existing) => {
                existing.contributed_quantity += draw.quantity_kg;
                existing.cost = match (existing.cost, cost) {
                    (Some(a), Some(b)) => {
                        let sum = a.checked_add(b);
                        overflowed |= sum.is_none();
                        sum
                    }
                    _ => None,
                };
            }
            None => contributions.push(PurchaseContribution {
                purchase_id: purchase.id.clone(),
                date: purchase.date,
                coffee_type: purchase.coffee_type.clone(),
                quantity: purchase.quantity_kg,
                unit_price: purchase.unit_price,
                total: purchase.total_cost,
                contributed_quantity: draw.quantity_kg,
                cost,
            }),
        }
    }

    contributions.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.purchase_id.cmp(&b.purchase_id))
    });

    let mut cost = None;
    if priced && !overflowed {
        cost = checked_sum(contributions.iter().filter_map(|c| c.cost));
        overflowed = cost.is_none();
    }
    if overflowed {
        issues.push(ProcessIssue::AmountOverflow {
            figure: "cost".to_string(),
        });
    }

    // Largest contributor; the oldest wins a tie.
    let primary = contributions
        .iter()
        .fold(None::<&PurchaseContribution>, |best, c| match best {
            Some(b) if b.contributed_quantity >= c.contributed_quantity => Some(b),
            _ => Some(c),
        })
        .cloned();

    CostAllocation {
        cost,
        source: ProcessSource {
            purchase: primary,
            purchases: contributions,
            warehouse_entries,
        },
        issues,
    }
}
