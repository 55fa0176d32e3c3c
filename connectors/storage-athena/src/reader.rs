//! Report reader over an Athena query's result set.

use std::sync::Arc;

use martflow_sdk::prelude::*;
use martflow_types::reader_state::AthenaReaderState;
use martflow_types::schema::AthenaSchema;

use crate::api::{AthenaApi, ResultPage, Session};
use crate::execution::{remove_output, run_to_completion, OutputLocation};
use crate::query::render;
use crate::schema::{convert_columns, introspect};
use crate::{call, session, AthenaOptions};

/// `GetQueryResults` never returns more than this many rows per page.
const MAX_PAGE_SIZE: usize = 1_000;

#[derive(Debug, Clone)]
struct Execution {
    id: String,
    output: OutputLocation,
}

pub struct AthenaReportReader {
    api: Arc<dyn AthenaApi>,
    options: AthenaOptions,
    session: Option<Session>,
    query: Option<String>,
    headers: Vec<ReportDataHeader>,
    execution: Option<Execution>,
}

impl AthenaReportReader {
    #[must_use]
    pub fn new(api: Arc<dyn AthenaApi>, options: AthenaOptions) -> Self {
        Self {
            api,
            options,
            session: None,
            query: None,
            headers: Vec::new(),
            execution: None,
        }
    }

    async fn start(&mut self, session: &Session, query: &str) -> BackendResult<Execution> {
        let output = OutputLocation::fresh(&session.output_bucket);
        let done = run_to_completion(self.api.as_ref(), self.options, session, query, &output).await?;
        tracing::info!(
            execution_id = %done.execution_id,
            output = %output.uri(),
            scanned_bytes = ?done.data_scanned_bytes,
            "Athena query finished"
        );
        let execution = Execution {
            id: done.execution_id,
            output,
        };
        self.execution = Some(execution.clone());
        Ok(execution)
    }

    fn project(&self, page: ResultPage, skip_labels: bool) -> Vec<Row> {
        let positions: Vec<Option<usize>> = self
            .headers
            .iter()
            .map(|h| page.columns.iter().position(|c| c.name == h.name))
            .collect();
        page.rows
            .into_iter()
            .skip(usize::from(skip_labels))
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| match pos {
                        Some(i) => row.get(*i).cloned().unwrap_or(serde_json::Value::Null),
                        None => serde_json::Value::Null,
                    })
                    .collect()
            })
            .collect()
    }
}

impl BackendComponent for AthenaReportReader {
    type Kind = StorageType;

    fn backend_type(&self) -> StorageType {
        StorageType::Athena
    }
}

#[async_trait]
impl ReportReader for AthenaReportReader {
    async fn prepare_report_data(
        &mut self,
        context: &ReportContext,
    ) -> BackendResult<ReportDataDescription> {
        let data_mart = &context.data_mart;
        let session = session(&data_mart.config, &data_mart.credentials)?;
        let query = render(&data_mart.definition, QueryOptions::default())?;

        let headers = if let Some(schema) = &data_mart.schema {
            let schema = AthenaSchema::try_from(schema.clone())?;
            DataMartSchema::Athena(schema).report_headers()
        } else {
            let columns =
                introspect(self.api.as_ref(), self.options, &session, &data_mart.definition).await?;
            convert_columns(&columns)
                .iter()
                .map(|f| f.report_header())
                .collect()
        };
        if headers.is_empty() {
            return Err(BackendError::business_rule(
                "NO_CONNECTED_FIELDS",
                format!("data mart {} has no connected fields", data_mart.id),
            ));
        }

        self.session = Some(session);
        self.query = Some(query);
        self.headers = headers.clone();
        self.execution = None;
        Ok(ReportDataDescription::new(headers))
    }

    async fn read_report_data_batch(
        &mut self,
        cursor: Option<&str>,
        max_rows: Option<usize>,
    ) -> BackendResult<ReportDataBatch> {
        let (Some(session), Some(query)) = (self.session.clone(), self.query.clone()) else {
            return Err(BackendError::business_rule(
                "READER_NOT_PREPARED",
                "read_report_data_batch called before prepare_report_data",
            ));
        };
        let execution = match self.execution.clone() {
            Some(execution) => execution,
            None if cursor.is_some() => {
                return Err(BackendError::business_rule(
                    "CURSOR_WITHOUT_JOB",
                    "a page cursor was supplied but no query execution is attached",
                ))
            }
            None => self.start(&session, &query).await?,
        };

        // The first page leads with the column labels; fetch one extra row.
        let first_page = cursor.is_none();
        let wanted = max_rows.unwrap_or(MAX_PAGE_SIZE).max(1);
        let page_size = (wanted + usize::from(first_page)).min(MAX_PAGE_SIZE);
        let api = &self.api;
        let page = call(self.options.retry, "query_results", || {
            api.query_results(&session, &execution.id, cursor, page_size)
        })
        .await?;
        let next = page.next_token.clone();
        let rows = self.project(page, first_page);
        tracing::debug!(execution_id = %execution.id, rows = rows.len(), "Athena page read");
        Ok(ReportDataBatch::new(rows, next))
    }

    async fn finalize(&mut self) -> BackendResult<()> {
        let (Some(session), Some(execution)) = (&self.session, self.execution.take()) else {
            return Ok(());
        };
        remove_output(self.api.as_ref(), self.options, session, &execution.output).await?;
        tracing::debug!(execution_id = %execution.id, "Athena reader finalized");
        Ok(())
    }

    fn state(&self) -> Option<ReaderState> {
        self.execution.as_ref().map(|execution| {
            ReaderState::Athena(AthenaReaderState {
                query_execution_id: execution.id.clone(),
                output_bucket: execution.output.bucket.clone(),
                output_prefix: execution.output.prefix.clone(),
            })
        })
    }

    fn init_from_state(
        &mut self,
        state: ReaderState,
        headers: Vec<ReportDataHeader>,
    ) -> BackendResult<()> {
        let state = AthenaReaderState::try_from(state)?;
        self.execution = Some(Execution {
            id: state.query_execution_id,
            output: OutputLocation {
                bucket: state.output_bucket,
                prefix: state.output_prefix,
            },
        });
        self.headers = headers;
        Ok(())
    }
}
