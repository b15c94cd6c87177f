//! Revenue attribution

use rust_decimal::Decimal;
use shared::{ProcessIssue, SaleAttribution};

use super::linker::ProcessLineage;
use crate::store::LedgerSnapshot;

/// Revenue side of one process
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueAttribution {
    /// Zero for a process with no sales; undefined when a sale has no usable price
    pub revenue: Option<Decimal>,
    pub sales: Vec<SaleAttribution>,
    pub issues: Vec<ProcessIssue>,
}

pub fn attribute(snapshot: &LedgerSnapshot, lineage: &ProcessLineage) -> RevenueAttribution {
    let mut sales = Vec::with_capacity(lineage.sales.len());
    let mut issues = Vec::new();
    let mut revenue = Some(Decimal::ZERO);
    let mut overflowed = false;

    for draw in &lineage.sales {
        let Some(sale) = snapshot.sale(&draw.sale_id) else {
            continue;
        };
        let unit_price = sale.effective_unit_price();
        let line_revenue = unit_price.and_then(|price| price.checked_mul(draw.quantity_kg));
        match (unit_price, line_revenue) {
            (None, _) => issues.push(ProcessIssue::MissingSalePrice {
                sale_id: sale.id.clone(),
            }),
            (Some(_), None) => overflowed = true,
            _ => {}
        }
        revenue = match (revenue, line_revenue) {
            (Some(a), Some(b)) => {
                let sum = a.checked_add(b);
                overflowed |= sum.is_none();
                sum
            }
            _ => None,
        };

        sales.push(SaleAttribution {
            sale_id: sale.id.clone(),
            date: sale.date,
            client: sale.client.clone(),
            coffee_type: sale.coffee_type.clone(),
            quantity: sale.quantity_kg,
            unit_price,
            total: sale.total_revenue,
            attributed_quantity: draw.quantity_kg,
            revenue: line_revenue,
            direct: draw.direct,
        });
    }

    if overflowed {
        issues.push(ProcessIssue::AmountOverflow {
            figure: "revenue".to_string(),
        });
    }

    RevenueAttribution {
        revenue,
        sales,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::linker::link;
    use crate::store::fixtures::*;
    use crate::store::Ledger;

    fn attribute_for(ledger: Ledger) -> RevenueAttribution {
        let snapshot = LedgerSnapshot::new(range("2024-01-01", "2024-12-31"), ledger);
        let lineage = link(&snapshot);
        attribute(&snapshot, lineage.process("P-1").unwrap())
    }

    #[test]
    fn test_unsold_process_has_zero_revenue() {
        let result = attribute_for(Ledger {
            processes: vec![process("P-1", "2024-01-05", "verde", "10", vec![])],
            ..Ledger::default()
        });
        assert_eq!(result.revenue, Some(Decimal::ZERO));
        assert!(result.sales.is_empty());
    }

    #[test]
    fn test_price_derived_from_total() {
        let mut derived = sale("V-2", "2024-01-07", "verde", "4", "0", Some("P-1"));
        derived.unit_price = None;
        derived.total_revenue = dec("100");

        let result = attribute_for(Ledger {
            processes: vec![process("P-1", "2024-01-05", "verde", "10", vec![])],
            sales: vec![
                sale("V-1", "2024-01-06", "verde", "6", "20", Some("P-1")),
                derived,
            ],
            ..Ledger::default()
        });

        // 6 x 20 + 4 x 25
        assert_eq!(result.revenue, Some(dec("220")));
        assert_eq!(result.sales[1].unit_price, Some(dec("25")));
        assert!(result.sales.iter().all(|s| s.direct));
    }

    #[test]
    fn test_missing_sale_price() {
        let mut unpriced = sale("V-1", "2024-01-06", "verde", "6", "0", Some("P-1"));
        unpriced.unit_price = None;
        unpriced.total_revenue = Decimal::ZERO;

        let result = attribute_for(Ledger {
            processes: vec![process("P-1", "2024-01-05", "verde", "10", vec![])],
            sales: vec![unpriced],
            ..Ledger::default()
        });
        assert_eq!(result.revenue, None);
        assert_eq!(
            result.issues,
            vec![ProcessIssue::MissingSalePrice {
                sale_id: "V-1".to_string()
            }]
        );
    }
}
