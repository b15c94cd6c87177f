//! PostgreSQL ledger store
//!
//! All reads of one snapshot share a single `REPEATABLE READ, READ ONLY`
//! transaction, so they observe the same committed state. Lineage tables are
//! read whole; only expenses are filtered by the query window.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    DateRange, Expense, InputSource, Process, ProcessInput, Purchase, Sale, WarehouseEntry,
};
use sqlx::PgPool;

use super::{Ledger, LedgerSnapshot, LedgerStore, StoreError, StoreResult};

/// SQLSTATE raised when a repeatable-read transaction cannot be serialized
const SERIALIZATION_FAILURE: &str = "40001";

#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn load(&self, range: &DateRange) -> Result<Ledger, sqlx::Error> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let sales = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, date, client, coffee_type, quantity_kg, unit_price, total_revenue, process_id
            FROM sales
            ORDER BY date, id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let process_rows = sqlx::query_as::<_, ProcessRow>(
            r#"
            SELECT id, date, coffee_type, input_quantity_kg, output_quantity_kg
            FROM processes
            ORDER BY date, id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let input_rows = sqlx::query_as::<_, ProcessInputRow>(
            r#"
            SELECT process_id, warehouse_entry_id, purchase_id, quantity_kg
            FROM process_inputs
            ORDER BY process_id, position
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut inputs: HashMap<String, Vec<ProcessInput>> = HashMap::new();
        for row in input_rows {
            let source = match (row.warehouse_entry_id, row.purchase_id) {
                (Some(id), _) => InputSource::WarehouseEntry(id),
                (None, Some(id)) => InputSource::Purchase(id),
                (None, None) => continue,
            };
            inputs.entry(row.process_id).or_default().push(ProcessInput {
                source,
                quantity_kg: row.quantity_kg,
            });
        }

        let warehouse_entries = sqlx::query_as::<_, WarehouseRow>(
            r#"
            SELECT id, purchase_id, date, coffee_type, quantity_kg
            FROM warehouse_entries
            ORDER BY date, id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let purchases = sqlx::query_as::<_, PurchaseRow>(
            r#"
            SELECT id, date, coffee_type, quantity_kg, unit_price, total_cost, advance_payment, supplier
            FROM purchases
            ORDER BY date, id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let expenses = sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, date, category, description, amount
            FROM expenses
            WHERE ($1::date IS NULL OR date >= $1) AND date <= $2
            ORDER BY date, id
            "#,
        )
        .bind(range.bounded_start())
        .bind(range.end)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let processes = process_rows
            .into_iter()
            .map(|row| {
                let inputs = inputs.remove(&row.id).unwrap_or_default();
                row.into_process(inputs)
            })
            .collect();

        Ok(Ledger {
            purchases: purchases.into_iter().map(Into::into).collect(),
            warehouse_entries: warehouse_entries.into_iter().map(Into::into).collect(),
            processes,
            sales: sales.into_iter().map(Into::into).collect(),
            expenses: expenses.into_iter().map(Into::into).collect(),
        })
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot> {
        let ledger = self.load(range).await.map_err(classify)?;
        Ok(LedgerSnapshot::new(*range, ledger))
    }
}

fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(SERIALIZATION_FAILURE) => {
            StoreError::InconsistentSnapshot(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Database(err),
    }
}

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: String,
    date: NaiveDate,
    coffee_type: String,
    quantity_kg: Decimal,
    unit_price: Option<Decimal>,
    total_cost: Decimal,
    advance_payment: bool,
    supplier: Option<String>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: row.id,
            date: row.date,
            coffee_type: row.coffee_type,
            quantity_kg: row.quantity_kg,
            unit_price: row.unit_price,
            total_cost: row.total_cost,
            advance_payment: row.advance_payment,
            supplier: row.supplier,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    id: String,
    purchase_id: String,
    date: NaiveDate,
    coffee_type: String,
    quantity_kg: Decimal,
}

impl From<WarehouseRow> for WarehouseEntry {
    fn from(row: WarehouseRow) -> Self {
        WarehouseEntry {
            id: row.id,
            purchase_id: row.purchase_id,
            date: row.date,
            coffee_type: row.coffee_type,
            quantity_kg: row.quantity_kg,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessRow {
    id: String,
    date: NaiveDate,
    coffee_type: String,
    input_quantity_kg: Decimal,
    output_quantity_kg: Option<Decimal>,
}

impl ProcessRow {
    fn into_process(self, inputs: Vec<ProcessInput>) -> Process {
        Process {
            id: self.id,
            date: self.date,
            coffee_type: self.coffee_type,
            input_quantity_kg: self.input_quantity_kg,
            output_quantity_kg: self.output_quantity_kg,
            inputs,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessInputRow {
    process_id: String,
    warehouse_entry_id: Option<String>,
    purchase_id: Option<String>,
    quantity_kg: Option<Decimal>,
}

#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    date: NaiveDate,
    client: String,
    coffee_type: String,
    quantity_kg: Decimal,
    unit_price: Option<Decimal>,
    total_revenue: Decimal,
    process_id: Option<String>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            date: row.date,
            client: row.client,
            coffee_type: row.coffee_type,
            quantity_kg: row.quantity_kg,
            unit_price: row.unit_price,
            total_revenue: row.total_revenue,
            process_id: row.process_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExpenseRow {
    id: String,
    date: NaiveDate,
    category: String,
    description: Option<String>,
    amount: Decimal,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            date: row.date,
            category: row.category,
            description: row.description,
            amount: row.amount,
        }
    }
}
