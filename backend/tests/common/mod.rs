//! Shared builders and test stores for the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use coffee_ledger::config::{
    Config, DatabaseConfig, EngineConfig, LedgerConfig, LedgerSource, LoggingConfig,
    ServerConfig, SheetTabs, SheetsConfig,
};
use coffee_ledger::store::{
    Ledger, LedgerSnapshot, LedgerStore, MemoryLedgerStore, StoreResult,
};
use coffee_ledger::AppState;
use rust_decimal::Decimal;
use shared::{DateRange, Expense, Process, ProcessInput, Purchase, Sale, WarehouseEntry};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::from_str(s).unwrap()
}

pub fn range(start: &str, end: &str) -> DateRange {
    DateRange::new(day(start), day(end)).unwrap()
}

pub fn purchase(id: &str, date: &str, coffee: &str, qty: &str, price: Option<&str>) -> Purchase {
    let unit_price = price.map(dec);
    Purchase {
        id: id.to_string(),
        date: day(date),
        coffee_type: coffee.to_string(),
        quantity_kg: dec(qty),
        unit_price,
        total_cost: unit_price.and_then(|p| p.checked_mul(dec(qty))).unwrap_or_default(),
        advance_payment: false,
        supplier: None,
    }
}

pub fn warehouse(id: &str, purchase_id: &str, date: &str, coffee: &str, qty: &str) -> WarehouseEntry {
    WarehouseEntry {
        id: id.to_string(),
        purchase_id: purchase_id.to_string(),
        date: day(date),
        coffee_type: coffee.to_string(),
        quantity_kg: dec(qty),
    }
}

pub fn process(id: &str, date: &str, coffee: &str, qty: &str, inputs: Vec<ProcessInput>) -> Process {
    Process {
        id: id.to_string(),
        date: day(date),
        coffee_type: coffee.to_string(),
        input_quantity_kg: dec(qty),
        output_quantity_kg: None,
        inputs,
    }
}

pub fn sale(id: &str, date: &str, coffee: &str, qty: &str, price: &str, process_id: Option<&str>) -> Sale {
    Sale {
        id: id.to_string(),
        date: day(date),
        client: "Tostaduria".to_string(),
        coffee_type: coffee.to_string(),
        quantity_kg: dec(qty),
        unit_price: Some(dec(price)),
        total_revenue: dec(qty) * dec(price),
        process_id: process_id.map(str::to_string),
    }
}

pub fn expense(id: &str, date: &str, amount: &str, description: Option<&str>) -> Expense {
    Expense {
        id: id.to_string(),
        date: day(date),
        category: "operacion".to_string(),
        description: description.map(str::to_string),
        amount: dec(amount),
    }
}

pub fn engine_config() -> EngineConfig {
    EngineConfig::default()
}

pub fn test_config(engine: EngineConfig) -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        ledger: LedgerConfig {
            source: LedgerSource::Memory,
            seed_file: None,
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
        },
        sheets: SheetsConfig {
            base_url: String::new(),
            spreadsheet_id: String::new(),
            request_timeout_secs: 1,
            tabs: SheetTabs::default(),
        },
        engine,
        logging: LoggingConfig::default(),
    }
}

pub fn app_state(store: Arc<dyn LedgerStore>) -> AppState {
    AppState {
        store,
        config: Arc::new(test_config(engine_config())),
    }
}

pub fn memory_store(ledger: Ledger) -> Arc<dyn LedgerStore> {
    Arc::new(MemoryLedgerStore::new(ledger))
}

/// Memory store that counts snapshot requests
pub struct CountingStore {
    inner: MemoryLedgerStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: MemoryLedgerStore::new(ledger),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for CountingStore {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.snapshot(range).await
    }
}

/// Store that takes longer than any reasonable deadline
pub struct SlowStore {
    pub delay: Duration,
}

#[async_trait]
impl LedgerStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot> {
        tokio::time::sleep(self.delay).await;
        Ok(LedgerSnapshot::new(*range, Ledger::default()))
    }
}

/// A small month of trading used across tests
pub fn march_ledger() -> Ledger {
    Ledger {
        purchases: vec![
            purchase("C-001", "2024-03-01", "Pergamino", "100", Some("10")),
            purchase("C-002", "2024-03-03", "Pergamino", "100", Some("12")),
        ],
        warehouse_entries: vec![
            warehouse("A-001", "C-001", "2024-03-02", "Pergamino", "100"),
            warehouse("A-002", "C-002", "2024-03-04", "Pergamino", "100"),
        ],
        processes: vec![
            process("P-001", "2024-03-05", "Pergamino", "100", vec![]),
            process("P-002", "2024-03-10", "Pergamino", "100", vec![]),
        ],
        sales: vec![
            sale("V-001", "2024-03-12", "Pergamino", "100", "15", Some("P-001")),
            sale("V-002", "2024-04-05", "Pergamino", "50", "20", Some("P-002")),
        ],
        expenses: vec![
            expense("G-001", "2024-03-06", "200", Some("Flete EFECTIVO")),
            expense("G-002", "2024-03-20", "300", Some("TRANSFERENCIA planilla")),
        ],
    }
}
