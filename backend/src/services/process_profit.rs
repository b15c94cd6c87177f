//! Process profit service
//!
//! Real profit per processing batch. Linking runs once per snapshot on the
//! blocking pool; the per-process evaluation after it is independent and is
//! split into chunks for large windows.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{DateRange, ProcessProfit, ProcessProfitReport};
use tokio::task::JoinSet;

use super::{run_blocking, with_deadline};
use crate::config::EngineConfig;
use crate::engine::{self, Lineage};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerSnapshot, LedgerStore};

/// Process profit service
#[derive(Clone)]
pub struct ProcessProfitService {
    store: Arc<dyn LedgerStore>,
    engine: EngineConfig,
}

/// One CSV line per process
#[derive(Debug, Serialize)]
pub struct ProcessProfitRow {
    pub process_id: String,
    pub process_date: String,
    pub coffee_type: String,
    pub input_quantity: Decimal,
    pub output_quantity: Decimal,
    pub cost: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub purchase_id: Option<String>,
    pub sales: usize,
    pub issues: String,
}

impl From<&ProcessProfit> for ProcessProfitRow {
    fn from(p: &ProcessProfit) -> Self {
        Self {
            process_id: p.process_id.clone(),
            process_date: p.process_date.to_string(),
            coffee_type: p.coffee_type.clone(),
            input_quantity: p.input_quantity,
            output_quantity: p.output_quantity,
            cost: p.cost,
            revenue: p.revenue,
            profit: p.profit,
            margin_percent: p.margin_percent,
            purchase_id: p.source.purchase.as_ref().map(|c| c.purchase_id.clone()),
            sales: p.sales.len(),
            issues: p
                .issues
                .iter()
                .map(|i| i.code())
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

impl ProcessProfitService {
    pub fn new(store: Arc<dyn LedgerStore>, engine: EngineConfig) -> Self {
        Self { store, engine }
    }

    /// Real profit for every process dated in `range`
    pub async fn report(&self, range: DateRange) -> AppResult<ProcessProfitReport> {
        with_deadline(self.engine.query_timeout(), async {
            let snapshot = Arc::new(self.store.snapshot(&range).await?);
            self.report_for(snapshot).await
        })
        .await
    }

    /// Run the engine over a snapshot already taken
    pub(crate) async fn report_for(
        &self,
        snapshot: Arc<LedgerSnapshot>,
    ) -> AppResult<ProcessProfitReport> {
        let lineage = {
            let snapshot = Arc::clone(&snapshot);
            Arc::new(run_blocking(move || Ok(engine::link(&snapshot))).await?)
        };
        let in_window: Vec<String> = snapshot
            .processes_in_window()
            .into_iter()
            .map(|p| p.id.clone())
            .collect();

        let processes = if in_window.len() >= self.engine.parallel_threshold {
            evaluate_parallel(
                Arc::clone(&snapshot),
                Arc::clone(&lineage),
                in_window,
                self.engine.chunk_size,
            )
            .await?
        } else {
            let snapshot = Arc::clone(&snapshot);
            let lineage = Arc::clone(&lineage);
            run_blocking(move || {
                Ok(engine::evaluate(&snapshot, &lineage, &snapshot.processes_in_window()))
            })
            .await?
        };

        let warnings = lineage.warnings.clone();
        let report = engine::build_report(&snapshot, processes, warnings)?;
        tracing::info!(
            window = %snapshot.window(),
            processes = report.summary.total_processes,
            unpriced = report.summary.unpriced_processes,
            warnings = report.warnings.len(),
            "Process profit computed"
        );
        Ok(report)
    }

    /// Export the process list as CSV
    pub fn export_to_csv(report: &ProcessProfitReport) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for process in &report.processes {
            wtr.serialize(ProcessProfitRow::from(process))
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

async fn evaluate_parallel(
    snapshot: Arc<LedgerSnapshot>,
    lineage: Arc<Lineage>,
    process_ids: Vec<String>,
    chunk_size: usize,
) -> AppResult<Vec<ProcessProfit>> {
    let mut tasks = JoinSet::new();
    for chunk in process_ids.chunks(chunk_size.max(1)) {
        let chunk = chunk.to_vec();
        let snapshot = Arc::clone(&snapshot);
        let lineage = Arc::clone(&lineage);
        tasks.spawn_blocking(move || {
            chunk
                .iter()
                .filter_map(|id| snapshot.process(id))
                .map(|process| engine::evaluate_process(&snapshot, &lineage, process))
                .collect::<Vec<_>>()
        });
    }

    let mut processes = Vec::with_capacity(process_ids.len());
    while let Some(joined) = tasks.join_next().await {
        let chunk = joined
            .map_err(|e| AppError::Internal(format!("process evaluation task failed: {}", e)))?;
        processes.extend(chunk);
    }
    processes.sort_by(|a, b| {
        a.process_date
            .cmp(&b.process_date)
            .then_with(|| a.process_id.cmp(&b.process_id))
    });
    Ok(processes)
}
