//! Adapter contract for the BigQuery REST API.
//!
//! Implementations own authentication, wire protocol, and job polling.
//! Calls that can hit quotas are wrapped in the connector's retry policy,
//! so adapters report rate limits as [`ApiError::rate_limited`] and do not
//! retry on their own.

use async_trait::async_trait;
use martflow_sdk::api::ApiError;
use martflow_types::config::ServiceAccountKey;
use martflow_types::reader_state::TableReference;
use martflow_types::report::Row;

/// Project, location, and key every call is made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub project_id: String,
    pub location: String,
    pub key: ServiceAccountKey,
}

/// A column as reported by the API (`TableFieldSchema`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiField {
    pub name: String,
    /// Native type name, e.g. `INT64` or `RECORD`.
    pub field_type: String,
    /// `NULLABLE`, `REQUIRED` or `REPEATED`; absent means `NULLABLE`.
    pub mode: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<ApiField>,
}

impl ApiField {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            ..Self::default()
        }
    }
}

/// Statistics from a dry-run job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DryRunStats {
    pub total_bytes_processed: u64,
}

/// A completed query job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJob {
    pub job_id: String,
    pub location: String,
    /// Anonymous table the results were written into.
    pub destination_table: TableReference,
    pub total_rows: Option<u64>,
}

/// One `tabledata.list` page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowPage {
    /// Column names, in cell order.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub next_page_token: Option<String>,
}

#[async_trait]
pub trait BigQueryApi: Send + Sync {
    /// Cheapest authenticated call against the project (lists datasets).
    async fn check_access(&self, session: &Session) -> Result<(), ApiError>;

    async fn dry_run(&self, session: &Session, sql: &str) -> Result<DryRunStats, ApiError>;

    async fn table_schema(
        &self,
        session: &Session,
        table: &TableReference,
    ) -> Result<Vec<ApiField>, ApiError>;

    /// Result schema of `sql`, from a dry-run job.
    async fn query_schema(&self, session: &Session, sql: &str) -> Result<Vec<ApiField>, ApiError>;

    /// Insert a query job and wait for it to finish.
    async fn run_query(&self, session: &Session, sql: &str) -> Result<QueryJob, ApiError>;

    async fn list_rows(
        &self,
        session: &Session,
        table: &TableReference,
        page_token: Option<&str>,
        max_results: usize,
    ) -> Result<RowPage, ApiError>;
}
