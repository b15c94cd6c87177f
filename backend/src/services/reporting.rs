//! Reporting service for the dashboard
//!
//! Period summary, daily series, coffee type breakdown and raw collection
//! passthrough. Accounting figures come straight from the snapshot; real
//! profit is delegated to [`ProcessProfitService`] over the same snapshot.

use std::sync::Arc;

use shared::{Collection, CoffeeTypeBreakdown, DailySummary, DateRange, LedgerSummary};

use super::{run_blocking, with_deadline, ProcessProfitService};
use crate::config::EngineConfig;
use crate::engine::accounting;
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn LedgerStore>,
    process_profit: ProcessProfitService,
    engine: EngineConfig,
}

impl ReportingService {
    pub fn new(store: Arc<dyn LedgerStore>, engine: EngineConfig) -> Self {
        Self {
            process_profit: ProcessProfitService::new(Arc::clone(&store), engine.clone()),
            store,
            engine,
        }
    }

    /// Accounting and real profit for `range`, side by side
    pub async fn summary(&self, range: DateRange) -> AppResult<LedgerSummary> {
        with_deadline(self.engine.query_timeout(), async {
            let snapshot = Arc::new(self.store.snapshot(&range).await?);
            let report = self.process_profit.report_for(Arc::clone(&snapshot)).await?;
            let real_profit = report.summary.total_profit;
            run_blocking(move || Ok(accounting::ledger_summary(&snapshot, real_profit)?)).await
        })
        .await
    }

    /// Per-day activity in `range`, oldest first
    pub async fn daily(&self, range: DateRange) -> AppResult<Vec<DailySummary>> {
        with_deadline(self.engine.query_timeout(), async {
            let snapshot = self.store.snapshot(&range).await?;
            run_blocking(move || Ok(accounting::daily_summaries(&snapshot)?)).await
        })
        .await
    }

    pub async fn coffee_types(&self, range: DateRange) -> AppResult<CoffeeTypeBreakdown> {
        with_deadline(self.engine.query_timeout(), async {
            let snapshot = self.store.snapshot(&range).await?;
            run_blocking(move || Ok(accounting::coffee_type_breakdown(&snapshot)?)).await
        })
        .await
    }

    /// Records of one collection in `range`, plus those referenced from it
    pub async fn raw(
        &self,
        collection: Collection,
        range: DateRange,
    ) -> AppResult<Vec<serde_json::Value>> {
        with_deadline(self.engine.query_timeout(), async {
            let snapshot = self.store.snapshot(&range).await?;
            run_blocking(move || {
                snapshot.records_for(collection).map_err(|e| {
                    AppError::Internal(format!("cannot serialize {}: {}", collection, e))
                })
            })
            .await
        })
        .await
    }
}
