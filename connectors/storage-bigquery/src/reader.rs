//! Paginated report reader over a query job's destination table.

use std::sync::Arc;

use martflow_sdk::prelude::*;
use martflow_types::reader_state::BigQueryReaderState;
use martflow_types::schema::BigQuerySchema;

use crate::api::{BigQueryApi, QueryJob, RowPage, Session};
use crate::query::render;
use crate::schema::{convert_fields, introspect};
use crate::{call, session};

/// Page size used when the caller does not cap the batch.
const DEFAULT_PAGE_SIZE: usize = 5_000;

pub struct BigQueryReportReader {
    api: Arc<dyn BigQueryApi>,
    retry: RetryPolicy,
    session: Option<Session>,
    query: Option<String>,
    headers: Vec<ReportDataHeader>,
    job: Option<QueryJob>,
}

impl BigQueryReportReader {
    #[must_use]
    pub fn new(api: Arc<dyn BigQueryApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            session: None,
            query: None,
            headers: Vec::new(),
            job: None,
        }
    }

    /// Reorder a page's cells into header order. Columns missing from the
    /// page read as null.
    fn project(&self, page: RowPage) -> Vec<Row> {
        let positions: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| page.columns.iter().position(|c| *c == h.name))
            .collect();
        page.rows
            .into_iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| {
                        pos.and_then(|i| row.get(i).cloned())
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect()
            })
            .collect()
    }
}

impl BackendComponent for BigQueryReportReader {
    type Kind = StorageType;

    fn backend_type(&self) -> StorageType {
        StorageType::BigQuery
    }
}

#[async_trait]
impl ReportReader for BigQueryReportReader {
    async fn prepare_report_data(
        &mut self,
        context: &ReportContext,
    ) -> BackendResult<ReportDataDescription> {
        let data_mart = &context.data_mart;
        let session = session(&data_mart.config, &data_mart.credentials)?;
        let query = render(&data_mart.definition, QueryOptions::default())?;

        let headers = match &data_mart.schema {
            Some(schema) => {
                let schema = BigQuerySchema::try_from(schema.clone())?;
                DataMartSchema::BigQuery(schema).report_headers()
            }
            None => {
                let columns =
                    introspect(self.api.as_ref(), self.retry, &session, &data_mart.definition)
                        .await?;
                convert_fields(&columns)
                    .iter()
                    .map(|f| f.report_header())
                    .collect()
            }
        };
        if headers.is_empty() {
            return Err(BackendError::business_rule(
                "NO_CONNECTED_FIELDS",
                format!("data mart {} has no connected fields", data_mart.id),
            ));
        }

        tracing::debug!(
            report_id = %context.report_id(),
            columns = headers.len(),
            "BigQuery reader prepared"
        );
        self.session = Some(session);
        self.query = Some(query);
        self.headers = headers.clone();
        self.job = None;
        Ok(ReportDataDescription::new(headers))
    }

    async fn read_report_data_batch(
        &mut self,
        cursor: Option<&str>,
        max_rows: Option<usize>,
    ) -> BackendResult<ReportDataBatch> {
        let (Some(session), Some(query)) = (&self.session, &self.query) else {
            return Err(BackendError::business_rule(
                "READER_NOT_PREPARED",
                "read_report_data_batch called before prepare_report_data",
            ));
        };

        let job = match self.job.clone() {
            Some(job) => job,
            None if cursor.is_some() => {
                return Err(BackendError::business_rule(
                    "CURSOR_WITHOUT_JOB",
                    "a page cursor was supplied but no query job is attached",
                ));
            }
            None => {
                let api = &self.api;
                let job = call(self.retry, "run_query", || api.run_query(session, query)).await?;
                tracing::info!(
                    job_id = %job.job_id,
                    total_rows = ?job.total_rows,
                    "BigQuery query job finished"
                );
                self.job = Some(job.clone());
                job
            }
        };

        let page_size = max_rows.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let api = &self.api;
        let page = call(self.retry, "list_rows", || {
            api.list_rows(session, &job.destination_table, cursor, page_size)
        })
        .await?;
        let next = page.next_page_token.clone();
        let rows = self.project(page);
        tracing::debug!(job_id = %job.job_id, rows = rows.len(), "BigQuery page read");
        Ok(ReportDataBatch::new(rows, next))
    }

    async fn finalize(&mut self) -> BackendResult<()> {
        // Anonymous result tables expire on their own.
        if let Some(job) = &self.job {
            tracing::debug!(job_id = %job.job_id, "BigQuery reader finalized");
        }
        Ok(())
    }

    fn state(&self) -> Option<ReaderState> {
        self.job.as_ref().map(|job| {
            ReaderState::BigQuery(BigQueryReaderState {
                job_id: job.job_id.clone(),
                location: job.location.clone(),
                destination_table: job.destination_table.clone(),
            })
        })
    }

    fn init_from_state(
        &mut self,
        state: ReaderState,
        headers: Vec<ReportDataHeader>,
    ) -> BackendResult<()> {
        let state = BigQueryReaderState::try_from(state)?;
        self.job = Some(QueryJob {
            job_id: state.job_id,
            location: state.location,
            destination_table: state.destination_table,
            total_rows: None,
        });
        self.headers = headers;
        Ok(())
    }
}
