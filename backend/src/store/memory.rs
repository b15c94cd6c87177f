//! In-process ledger store

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use shared::DateRange;

use super::{Ledger, LedgerSnapshot, LedgerStore, StoreError, StoreResult};

/// Ledger held in memory, snapshotted under a single read guard
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledger: RwLock<Ledger>,
}

impl MemoryLedgerStore {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger: RwLock::new(ledger),
        }
    }

    /// Load a ledger from a JSON seed file with one array per collection
    pub fn from_json_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Unavailable(format!("cannot read seed file {}: {}", path.display(), e))
        })?;
        let ledger: Ledger = serde_json::from_str(&raw).map_err(|e| {
            StoreError::Unavailable(format!("invalid seed file {}: {}", path.display(), e))
        })?;
        tracing::info!(
            purchases = ledger.purchases.len(),
            warehouse_entries = ledger.warehouse_entries.len(),
            processes = ledger.processes.len(),
            sales = ledger.sales.len(),
            expenses = ledger.expenses.len(),
            "Loaded ledger seed from {}",
            path.display()
        );
        Ok(Self::new(ledger))
    }

    /// Replace the ledger contents, as an upstream writer would
    pub fn replace(&self, ledger: Ledger) -> StoreResult<()> {
        let mut guard = self
            .ledger
            .write()
            .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))?;
        *guard = ledger;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot> {
        let selected = {
            let guard = self
                .ledger
                .read()
                .map_err(|_| StoreError::Unavailable("ledger lock poisoned".to_string()))?;
            guard.select_for(range)
        };
        Ok(LedgerSnapshot::new(*range, selected))
    }
}
