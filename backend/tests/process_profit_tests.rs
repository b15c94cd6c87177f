//! Process profit integration tests
//!
//! Runs the full report path (store snapshot, lineage, cost, revenue,
//! aggregation) against an in-memory ledger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use coffee_ledger::config::EngineConfig;
use coffee_ledger::services::ProcessProfitService;
use coffee_ledger::store::{Ledger, MemoryLedgerStore};
use coffee_ledger::AppError;
use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{DateRange, ProcessInput, ProcessIssue, ProcessProfitReport};

fn service(ledger: Ledger) -> ProcessProfitService {
    ProcessProfitService::new(memory_store(ledger), engine_config())
}

async fn report(ledger: Ledger, start: &str, end: &str) -> ProcessProfitReport {
    service(ledger).report(range(start, end)).await.unwrap()
}

// ============================================================================
// Cost and revenue tracing
// ============================================================================

#[tokio::test]
async fn test_single_chain_is_exact() {
    let ledger = Ledger {
        purchases: vec![purchase("C-1", "2024-03-01", "Pergamino", "150", Some("5.50"))],
        warehouse_entries: vec![warehouse("A-1", "C-1", "2024-03-02", "Pergamino", "150")],
        processes: vec![process("P-1", "2024-03-03", "Pergamino", "150", vec![])],
        sales: vec![sale("V-1", "2024-03-05", "Pergamino", "150", "7.40", Some("P-1"))],
        ..Ledger::default()
    };

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let p = &report.processes[0];
    assert_eq!(p.cost, Some(dec("825.00")));
    assert_eq!(p.revenue, Some(dec("1110.00")));
    assert_eq!(p.profit, Some(dec("285.00")));
    assert_eq!(p.margin_percent, Some(dec("25.68")));
    assert!(p.issues.is_empty());

    let source = p.source.purchase.as_ref().unwrap();
    assert_eq!(source.purchase_id, "C-1");
    assert_eq!(source.contributed_quantity, dec("150"));
}

#[tokio::test]
async fn test_cost_splits_in_proportion_to_quantity() {
    let ledger = Ledger {
        purchases: vec![purchase("C-1", "2024-03-01", "Pergamino", "300", Some("10"))],
        warehouse_entries: vec![warehouse("A-1", "C-1", "2024-03-01", "Pergamino", "300")],
        processes: vec![
            process("P-1", "2024-03-02", "Pergamino", "100", vec![]),
            process("P-2", "2024-03-03", "Pergamino", "200", vec![]),
        ],
        ..Ledger::default()
    };

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let c1 = report.processes[0].cost.unwrap();
    let c2 = report.processes[1].cost.unwrap();
    assert_eq!(c1, dec("1000"));
    assert_eq!(c2, dec("2000"));
    assert_eq!(c1 / c2, dec("100") / dec("200"));
    assert_eq!(c1 + c2, dec("3000"));
}

#[tokio::test]
async fn test_direct_reference_takes_precedence_over_fifo() {
    let ledger = Ledger {
        purchases: vec![
            purchase("C-1", "2024-03-01", "Pergamino", "100", Some("10")),
            purchase("C-2", "2024-03-02", "Pergamino", "100", Some("20")),
        ],
        warehouse_entries: vec![
            warehouse("A-1", "C-1", "2024-03-01", "Pergamino", "100"),
            warehouse("A-2", "C-2", "2024-03-02", "Pergamino", "100"),
        ],
        processes: vec![
            process("P-1", "2024-03-10", "Pergamino", "100", vec![]),
            process(
                "P-2",
                "2024-03-12",
                "Pergamino",
                "100",
                vec![ProcessInput::warehouse("A-1")],
            ),
        ],
        ..Ledger::default()
    };

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let p1 = &report.processes[0];
    let p2 = &report.processes[1];
    assert_eq!(p2.cost, Some(dec("1000")));
    assert_eq!(p2.source.warehouse_entries[0].warehouse_entry_id, "A-1");
    assert_eq!(p1.cost, Some(dec("2000")));
    assert_eq!(p1.source.warehouse_entries[0].warehouse_entry_id, "A-2");
}

#[tokio::test]
async fn test_process_cost_does_not_move_with_window_end() {
    // P-2 names A-1 and is dated after February; P-1's draws must not
    // depend on whether the window reaches P-2.
    let ledger = Ledger {
        purchases: vec![
            purchase("C-1", "2024-01-10", "Verde", "40", Some("10")),
            purchase("C-2", "2024-01-12", "Verde", "40", Some("20")),
        ],
        warehouse_entries: vec![
            warehouse("A-1", "C-1", "2024-01-11", "Verde", "40"),
            warehouse("A-2", "C-2", "2024-01-13", "Verde", "40"),
        ],
        processes: vec![
            process("P-1", "2024-02-01", "Verde", "40", vec![]),
            process("P-2", "2024-04-01", "Verde", "40", vec![ProcessInput::warehouse("A-1")]),
        ],
        sales: vec![sale("V-1", "2024-05-01", "Verde", "40", "25", Some("P-1"))],
        ..Ledger::default()
    };

    let february = report(ledger.clone(), "2024-02-01", "2024-02-29").await;
    let through_april = report(ledger, "2024-02-01", "2024-04-30").await;

    let p1_feb = &february.processes[0];
    let p1_apr = through_april
        .processes
        .iter()
        .find(|p| p.process_id == "P-1")
        .unwrap();
    assert_eq!(p1_feb.cost, Some(dec("800")));
    assert_eq!(p1_feb, p1_apr);
    assert_eq!(february.summary.total_profit, dec("200"));
}

#[tokio::test]
async fn test_overflowing_purchase_degrades_only_its_process() {
    let mut ledger = march_ledger();
    ledger.purchases.push(purchase(
        "C-9",
        "2024-03-04",
        "Natural",
        "100000000000000000000",
        Some("10000000000"),
    ));
    ledger.processes.push(process(
        "P-9",
        "2024-03-06",
        "Natural",
        "100000000000000000000",
        vec![ProcessInput::purchase("C-9")],
    ));

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let p9 = report
        .processes
        .iter()
        .find(|p| p.process_id == "P-9")
        .unwrap();
    assert_eq!(p9.cost, None);
    assert_eq!(p9.profit, None);
    assert!(p9.issues.iter().any(|i| i.code() == "amount_overflow"));
    assert_eq!(report.summary.unpriced_processes, 1);
    assert_eq!(report.summary.total_profit, dec("300"));
}

#[tokio::test]
async fn test_missing_price_is_confined_to_its_process() {
    let mut ledger = march_ledger();
    ledger
        .purchases
        .push(purchase("C-9", "2024-03-04", "Natural", "50", None));
    ledger
        .warehouse_entries
        .push(warehouse("A-9", "C-9", "2024-03-04", "Natural", "50"));
    ledger
        .processes
        .push(process("P-9", "2024-03-06", "Natural", "50", vec![]));

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let unpriced = report
        .processes
        .iter()
        .find(|p| p.process_id == "P-9")
        .unwrap();
    assert_eq!(unpriced.cost, None);
    assert_eq!(unpriced.profit, None);
    assert!(matches!(
        unpriced.issues[0],
        ProcessIssue::MissingCostBasis { .. }
    ));

    let priced: Vec<_> = report
        .processes
        .iter()
        .filter(|p| p.process_id != "P-9")
        .collect();
    assert!(priced.iter().all(|p| p.cost.is_some() && p.issues.is_empty()));
    assert_eq!(report.summary.unpriced_processes, 1);
    assert_eq!(report.summary.total_cost, dec("2200"));
}

#[tokio::test]
async fn test_sales_outside_window_still_count_as_revenue() {
    let report = report(march_ledger(), "2024-03-01", "2024-03-31").await;
    let p2 = report
        .processes
        .iter()
        .find(|p| p.process_id == "P-002")
        .unwrap();
    assert_eq!(p2.revenue, Some(dec("1000")));
    assert_eq!(p2.profit, Some(dec("-200")));
    assert_eq!(report.summary.total_profit, dec("300"));
}

#[tokio::test]
async fn test_unpriced_sale_leaves_revenue_undefined() {
    let mut ledger = march_ledger();
    ledger.sales[0].unit_price = None;
    ledger.sales[0].total_revenue = Decimal::ZERO;

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    let p1 = &report.processes[0];
    assert_eq!(p1.revenue, None);
    assert_eq!(p1.margin_percent, None);
    assert!(p1
        .issues
        .iter()
        .any(|i| matches!(i, ProcessIssue::MissingSalePrice { .. })));
}

#[tokio::test]
async fn test_process_without_sales_has_zero_revenue() {
    let mut ledger = march_ledger();
    ledger.sales.clear();

    let report = report(ledger, "2024-03-01", "2024-03-31").await;
    for p in &report.processes {
        assert_eq!(p.revenue, Some(Decimal::ZERO));
        assert_eq!(p.margin_percent, None);
        assert_eq!(p.profit, p.cost.map(|c| -c));
    }
}

// ============================================================================
// Windows, deadlines and evaluation strategy
// ============================================================================

#[tokio::test]
async fn test_window_boundaries_are_inclusive() {
    let single = report(march_ledger(), "2024-03-05", "2024-03-05").await;
    assert_eq!(single.processes.len(), 1);
    assert_eq!(single.processes[0].process_id, "P-001");

    let both = report(march_ledger(), "2024-03-05", "2024-03-10").await;
    assert_eq!(both.processes.len(), 2);
}

#[tokio::test]
async fn test_empty_window_reports_zero() {
    let report = report(march_ledger(), "2023-01-01", "2023-01-31").await;
    assert!(report.processes.is_empty());
    assert_eq!(report.summary.total_processes, 0);
    assert_eq!(report.summary.total_profit, Decimal::ZERO);
}

#[tokio::test]
async fn test_parallel_evaluation_matches_sequential() {
    let mut ledger = Ledger::default();
    for i in 1..=12 {
        let d = format!("2024-03-{:02}", i);
        ledger.purchases.push(purchase(&format!("C-{:02}", i), &d, "Pergamino", "40", Some("9.5")));
        ledger.warehouse_entries.push(warehouse(
            &format!("A-{:02}", i),
            &format!("C-{:02}", i),
            &d,
            "Pergamino",
            "40",
        ));
        ledger.processes.push(process(&format!("P-{:02}", i), &d, "Pergamino", "30", vec![]));
        ledger.sales.push(sale(
            &format!("V-{:02}", i),
            &d,
            "Pergamino",
            "25",
            "12",
            Some(&format!("P-{:02}", i)),
        ));
    }

    let sequential = service(ledger.clone())
        .report(range("2024-03-01", "2024-03-31"))
        .await
        .unwrap();
    let parallel = ProcessProfitService::new(
        memory_store(ledger),
        EngineConfig {
            parallel_threshold: 1,
            chunk_size: 5,
            ..engine_config()
        },
    )
    .report(range("2024-03-01", "2024-03-31"))
    .await
    .unwrap();

    assert_eq!(sequential, parallel);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let service = ProcessProfitService::new(
        Arc::new(SlowStore {
            delay: Duration::from_secs(5),
        }),
        EngineConfig {
            query_timeout_ms: 50,
            ..engine_config()
        },
    );
    let err = service
        .report(range("2024-03-01", "2024-03-31"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QueryTimeout(50)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_deadline_covers_engine_work() {
    let mut ledger = Ledger::default();
    for i in 0..20_000 {
        let d = format!("2024-03-{:02}", i % 28 + 1);
        let id = format!("{:05}", i);
        ledger.purchases.push(purchase(&format!("C-{id}"), &d, "Verde", "10", Some("4")));
        ledger
            .warehouse_entries
            .push(warehouse(&format!("A-{id}"), &format!("C-{id}"), &d, "Verde", "10"));
        ledger.processes.push(process(&format!("P-{id}"), &d, "Verde", "10", vec![]));
        ledger.sales.push(sale(&format!("V-{id}"), &d, "Verde", "10", "6", None));
    }

    let service = ProcessProfitService::new(
        memory_store(ledger),
        EngineConfig {
            query_timeout_ms: 1,
            parallel_threshold: usize::MAX,
            ..engine_config()
        },
    );
    let err = service
        .report(range("2024-03-01", "2024-03-31"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::QueryTimeout(1)));
}

#[tokio::test]
async fn test_open_start_window_begins_at_first_record() {
    let report = service(march_ledger())
        .report(DateRange::until(day("2024-03-31")))
        .await
        .unwrap();
    assert_eq!(report.period.start, day("2024-03-01"));
    assert_eq!(report.period.end, day("2024-03-31"));
    assert_eq!(report.processes.len(), 2);
}

#[tokio::test]
async fn test_report_reflects_replaced_ledger() {
    let store = Arc::new(MemoryLedgerStore::new(Ledger::default()));
    let service = ProcessProfitService::new(store.clone(), engine_config());
    let window = range("2024-03-01", "2024-03-31");

    assert!(service.report(window).await.unwrap().processes.is_empty());
    store.replace(march_ledger()).unwrap();
    assert_eq!(service.report(window).await.unwrap().processes.len(), 2);
}

#[test]
fn test_csv_export_has_one_row_per_process() {
    let report = tokio_test::block_on(report(march_ledger(), "2024-03-01", "2024-03-31"));
    let csv = ProcessProfitService::export_to_csv(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("process_id,process_date,coffee_type"));
    assert!(lines[1].starts_with("P-001,2024-03-05,Pergamino"));
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn prop_total_cost_is_conserved_across_processes(
        qtys in prop::collection::vec(1u32..200, 1..8),
        price in 1u32..50,
    ) {
        let total: u32 = qtys.iter().sum();
        let mut ledger = Ledger {
            purchases: vec![purchase("C-1", "2024-03-01", "Pergamino", &total.to_string(), Some(&price.to_string()))],
            warehouse_entries: vec![warehouse("A-1", "C-1", "2024-03-01", "Pergamino", &total.to_string())],
            ..Ledger::default()
        };
        for (i, q) in qtys.iter().enumerate() {
            ledger.processes.push(process(
                &format!("P-{:02}", i),
                "2024-03-02",
                "Pergamino",
                &q.to_string(),
                vec![],
            ));
        }

        let report = tokio_test::block_on(report(ledger, "2024-03-01", "2024-03-31"));
        let costs: Vec<Decimal> = report.processes.iter().map(|p| p.cost.unwrap()).collect();
        let sum: Decimal = costs.iter().copied().sum();
        prop_assert_eq!(sum, Decimal::from(total) * Decimal::from(price));
        for (p, q) in report.processes.iter().zip(qtys.iter()) {
            prop_assert_eq!(p.cost.unwrap(), Decimal::from(*q) * Decimal::from(price));
        }
    }
}
