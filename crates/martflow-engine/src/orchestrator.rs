//! Report run orchestrator: one streaming read → write pass per run, with
//! run bookkeeping persisted before and after the pass.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use martflow_sdk::capability::{ReportReader, ReportWriter};
use martflow_sdk::registry::Capabilities;
use martflow_state::ReportStore;
use martflow_types::entity::{ReportContext, ReportId, RunStatus};
use tokio::task::JoinHandle;

use crate::errors::{PassError, RunError};
use crate::store;

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub report_id: ReportId,
    pub status: RunStatus,
    /// Raw backend error text when `status` is `ERROR`.
    pub error: Option<String>,
    pub batches: u64,
    pub rows: u64,
    pub duration_secs: f64,
}

impl RunSummary {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PassCounts {
    batches: u64,
    rows: u64,
}

/// Runs reports through their storage reader and destination writer.
pub struct ReportRunner {
    store: Arc<dyn ReportStore>,
    capabilities: Arc<Capabilities>,
    batch_size: usize,
}

impl ReportRunner {
    #[must_use]
    pub fn new(
        store: Arc<dyn ReportStore>,
        capabilities: Arc<Capabilities>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            capabilities,
            batch_size,
        }
    }

    /// Run a report to completion.
    ///
    /// Backend failures do not surface here: they end the run with status
    /// `ERROR` and are reported in the returned [`RunSummary`].
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AlreadyRunning`] without touching the report when
    /// a run is in progress, [`RunError::ReportNotFound`] when the report,
    /// its data mart or its destination is missing, and
    /// [`RunError::Infrastructure`] when run bookkeeping cannot be persisted.
    pub async fn run_report(&self, report_id: &ReportId) -> Result<RunSummary, RunError> {
        let id = report_id.clone();
        let context = store::call(&self.store, "get_report_context", move |s| {
            s.get_report_context(&id)
        })
        .await?
        .ok_or_else(|| RunError::ReportNotFound(report_id.clone()))?;

        let id = report_id.clone();
        let started = store::call(&self.store, "try_start_run", move |s| {
            s.try_start_run(&id, Utc::now())
        })
        .await?;
        if !started {
            tracing::warn!(report_id = %report_id, "Report is already running, run rejected");
            return Err(RunError::AlreadyRunning(report_id.clone()));
        }

        tracing::info!(
            report_id = %report_id,
            storage = %context.storage_type(),
            destination = %context.destination_type(),
            "Report run started"
        );
        let start = Instant::now();
        let mut counts = PassCounts::default();
        let outcome = self.execute_pass(&context, &mut counts).await;
        let duration_secs = start.elapsed().as_secs_f64();

        let (status, error) = match outcome {
            Ok(()) => (RunStatus::Success, None),
            Err(e) => (RunStatus::Error, Some(e.to_string())),
        };

        let id = report_id.clone();
        let last_error = error.clone();
        store::call(&self.store, "complete_run", move |s| {
            s.complete_run(&id, status, last_error.as_deref())
        })
        .await?;

        match &error {
            None => tracing::info!(
                report_id = %report_id,
                batches = counts.batches,
                rows = counts.rows,
                duration_secs,
                "Report run succeeded"
            ),
            Some(message) => tracing::error!(
                report_id = %report_id,
                batches = counts.batches,
                rows = counts.rows,
                error = %message,
                "Report run failed"
            ),
        }

        Ok(RunSummary {
            report_id: report_id.clone(),
            status,
            error,
            batches: counts.batches,
            rows: counts.rows,
            duration_secs,
        })
    }

    /// Start a run in the background. The caller only learns that the run
    /// was accepted; every outcome is logged.
    pub fn spawn_run(self: &Arc<Self>, report_id: ReportId) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            match runner.run_report(&report_id).await {
                Ok(summary) => tracing::debug!(
                    report_id = %report_id,
                    status = %summary.status,
                    "Background run finished"
                ),
                Err(e) if e.is_rejection() => {
                    tracing::warn!(report_id = %report_id, error = %e, "Background run rejected");
                }
                Err(e) => {
                    tracing::error!(report_id = %report_id, error = ?e, "Background run failed");
                }
            }
        })
    }

    /// Resolve, prepare, stream, and finalize. Both finalizers are attempted
    /// once the components exist, whatever the loop outcome.
    async fn execute_pass(
        &self,
        context: &ReportContext,
        counts: &mut PassCounts,
    ) -> Result<(), PassError> {
        let mut reader = self
            .capabilities
            .storage
            .readers
            .resolve_transient(context.storage_type())?;
        let mut writer = match self
            .capabilities
            .destination
            .writers
            .resolve_transient(context.destination_type())
        {
            Ok(writer) => writer,
            Err(e) => {
                finalize_reader(reader.as_mut(), context.report_id()).await;
                return Err(e.into());
            }
        };

        let streamed = self
            .stream(reader.as_mut(), writer.as_mut(), context, counts)
            .await;

        let finalized = writer.finalize().await;
        finalize_reader(reader.as_mut(), context.report_id()).await;

        streamed?;
        finalized.map_err(PassError::from)
    }

    async fn stream(
        &self,
        reader: &mut dyn ReportReader,
        writer: &mut dyn ReportWriter,
        context: &ReportContext,
        counts: &mut PassCounts,
    ) -> Result<(), PassError> {
        let description = reader.prepare_report_data(context).await?;
        writer.prepare_to_write_report(context, &description).await?;
        tracing::debug!(
            report_id = %context.report_id(),
            columns = description.headers.len(),
            "Reader and writer prepared"
        );

        let mut cursor: Option<String> = None;
        loop {
            let batch = reader
                .read_report_data_batch(cursor.as_deref(), Some(self.batch_size))
                .await?;
            let next = batch.next_batch_cursor.clone();
            let rows = batch.rows.len() as u64;
            writer.write_report_data_batch(batch).await?;
            counts.batches += 1;
            counts.rows += rows;
            tracing::debug!(
                report_id = %context.report_id(),
                batch = counts.batches,
                rows,
                "Batch written"
            );
            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(())
    }
}

async fn finalize_reader(reader: &mut dyn ReportReader, report_id: &ReportId) {
    if let Err(e) = reader.finalize().await {
        tracing::warn!(report_id = %report_id, error = %e, "Reader finalize failed");
    }
}
