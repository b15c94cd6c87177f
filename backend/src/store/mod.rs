//! Ledger stores
//!
//! Read-only access to the five ledger collections. Every store hands out a
//! [`LedgerSnapshot`] taken atomically enough that a process's inputs and
//! outputs come from the same point in time.

mod memory;
mod postgres;
mod sheets;
mod snapshot;

use async_trait::async_trait;
use shared::{Collection, DateRange};
use thiserror::Error;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;
pub use sheets::SheetLedgerStore;
pub use snapshot::{DanglingReference, Ledger, LedgerSnapshot};

/// Errors raised while reading the ledger
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing source could not be reached
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),

    /// Collections were read at different points in time
    #[error("inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("malformed {collection} record at row {row}: {message}")]
    MalformedRecord {
        collection: Collection,
        row: usize,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether the same query may succeed if retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::InconsistentSnapshot(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to a ledger
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short name of the backing source, for logs and health checks
    fn name(&self) -> &'static str;

    /// Take a consistent snapshot of everything needed to answer a query over `range`.
    ///
    /// See [`Ledger::select_for`] for which records are included.
    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot>;
}

/// Collections a store must be able to read, in dependency order
pub const LINEAGE_ORDER: [Collection; 5] = [
    Collection::Purchases,
    Collection::WarehouseEntries,
    Collection::Processes,
    Collection::Sales,
    Collection::Expenses,
];
