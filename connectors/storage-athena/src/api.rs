//! Adapter boundary for the Athena and S3 APIs.

use async_trait::async_trait;
use martflow_sdk::api::ApiError;
use martflow_types::report::Row;

/// Credentials and placement for a batch of API calls.
#[derive(Clone)]
pub struct Session {
    pub region: String,
    pub output_bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("region", &self.region)
            .field("output_bucket", &self.output_bucket)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExecution {
    pub execution_id: String,
    pub state: QueryState,
    /// Athena's explanation for a failed or cancelled query.
    pub state_change_reason: Option<String>,
    pub data_scanned_bytes: Option<u64>,
}

/// Result-set column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiColumn {
    pub name: String,
    /// Native type name, e.g. `varchar` or `decimal(10,2)`.
    pub column_type: String,
}

impl ApiColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// One page of `GetQueryResults`. The first page of a `SELECT` starts with
/// a row echoing the column labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub columns: Vec<ApiColumn>,
    pub rows: Vec<Row>,
    pub next_token: Option<String>,
}

#[async_trait]
pub trait AthenaApi: Send + Sync {
    /// Cheap authenticated call proving the credentials and bucket work.
    async fn check_access(&self, session: &Session) -> Result<(), ApiError>;

    /// Start a query writing results under `output_location`; returns the
    /// execution id.
    async fn start_query(
        &self,
        session: &Session,
        sql: &str,
        output_location: &str,
    ) -> Result<String, ApiError>;

    async fn query_execution(
        &self,
        session: &Session,
        execution_id: &str,
    ) -> Result<QueryExecution, ApiError>;

    async fn query_results(
        &self,
        session: &Session,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: usize,
    ) -> Result<ResultPage, ApiError>;

    /// Delete every object under `prefix`; returns how many were removed.
    async fn delete_objects(
        &self,
        session: &Session,
        bucket: &str,
        prefix: &str,
    ) -> Result<usize, ApiError>;
}
