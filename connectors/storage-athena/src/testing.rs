//! In-memory Athena and S3 for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use martflow_sdk::api::{ApiError, RetryPolicy};
use martflow_types::backend::{DestinationType, StorageType};
use martflow_types::config::{
    AthenaConfig, AthenaCredentials, DestinationConfig, DestinationCredentials, EmailConfig,
    EmailCredentials, StorageConfig, StorageCredentials,
};
use martflow_types::definition::DataMartDefinition;
use martflow_types::entity::{
    DataMart, DataMartId, Destination, DestinationId, Report, ReportContext, ReportId,
    ReportRunState,
};
use martflow_types::report::Row;
use martflow_types::schema::DataMartSchema;

use crate::api::{ApiColumn, AthenaApi, QueryExecution, QueryState, ResultPage, Session};
use crate::AthenaOptions;

pub(crate) fn config() -> StorageConfig {
    StorageConfig::Athena(AthenaConfig {
        region: "eu-west-1".into(),
        output_bucket: "results".into(),
    })
}

pub(crate) fn credentials() -> StorageCredentials {
    StorageCredentials::Athena(AthenaCredentials {
        access_key_id: "AKIAEXAMPLE".into(),
        secret_access_key: "wJalrXUtnFEMI".into(),
    })
}

pub(crate) fn session() -> Session {
    crate::session(&config(), &credentials()).unwrap()
}

pub(crate) fn options() -> AthenaOptions {
    AthenaOptions {
        retry: RetryPolicy::immediate(2),
        poll_interval: Duration::ZERO,
        max_wait: Duration::from_secs(60),
    }
}

pub(crate) fn context(definition: DataMartDefinition, schema: Option<DataMartSchema>) -> ReportContext {
    let data_mart = DataMart {
        id: DataMartId::new("dm-events"),
        title: "Events".into(),
        storage_type: StorageType::Athena,
        definition,
        config: config(),
        credentials: credentials(),
        schema,
    };
    let destination = Destination {
        id: DestinationId::new("dst-mail"),
        title: "Ops".into(),
        destination_type: DestinationType::Email,
        credentials: DestinationCredentials::Email(EmailCredentials {
            sender_address: "reports@acme.test".into(),
        }),
    };
    let report = Report {
        id: ReportId::new("rep-events"),
        title: "Events digest".into(),
        data_mart_id: data_mart.id.clone(),
        destination_id: destination.id.clone(),
        destination_config: DestinationConfig::Email(EmailConfig {
            recipients: vec!["ops@acme.test".into()],
            subject: "Events".into(),
        }),
        run: ReportRunState::default(),
    };
    ReportContext {
        report,
        data_mart,
        destination,
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeLog {
    /// `(sql, output location)` per started query.
    pub queries: Vec<(String, String)>,
    pub polls: u32,
    pub polls_by_execution: HashMap<String, u32>,
    pub result_calls: Vec<(String, Option<String>, usize)>,
    pub deleted: Vec<(String, String)>,
}

/// Every query returns `columns`/`rows`; results page by row offset and the
/// first row of the result set echoes the column labels.
#[derive(Default)]
pub(crate) struct FakeAthena {
    pub columns: Vec<ApiColumn>,
    pub rows: Vec<Row>,
    /// Polls answered with `RUNNING` before a query succeeds.
    pub polls_before_done: u32,
    /// Queries containing the needle fail with the reason.
    pub fail_when: Option<(String, String)>,
    pub access_error: Option<ApiError>,
    pub log: Mutex<FakeLog>,
}

impl FakeAthena {
    pub(crate) fn with_results(columns: Vec<ApiColumn>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            ..Self::default()
        }
    }

    fn result_set(&self) -> Vec<Row> {
        let labels: Row = self
            .columns
            .iter()
            .map(|c| serde_json::Value::String(c.name.clone()))
            .collect();
        std::iter::once(labels).chain(self.rows.iter().cloned()).collect()
    }

    fn sql_of(log: &FakeLog, execution_id: &str) -> Option<String> {
        let n: usize = execution_id.strip_prefix("qe-")?.parse().ok()?;
        log.queries.get(n.checked_sub(1)?).map(|(sql, _)| sql.clone())
    }
}

#[async_trait]
impl AthenaApi for FakeAthena {
    async fn check_access(&self, _session: &Session) -> Result<(), ApiError> {
        self.access_error.clone().map_or(Ok(()), Err)
    }

    async fn start_query(
        &self,
        _session: &Session,
        sql: &str,
        output_location: &str,
    ) -> Result<String, ApiError> {
        let mut log = self.log.lock().unwrap();
        log.queries.push((sql.to_string(), output_location.to_string()));
        Ok(format!("qe-{}", log.queries.len()))
    }

    async fn query_execution(
        &self,
        _session: &Session,
        execution_id: &str,
    ) -> Result<QueryExecution, ApiError> {
        let mut log = self.log.lock().unwrap();
        log.polls += 1;
        let sql = Self::sql_of(&log, execution_id)
            .ok_or_else(|| ApiError::not_found(format!("QueryExecution {execution_id} was not found")))?;
        let seen = log
            .polls_by_execution
            .entry(execution_id.to_string())
            .or_insert(0);
        *seen += 1;

        let (state, reason) = match &self.fail_when {
            Some((needle, reason)) if sql.contains(needle.as_str()) => {
                (QueryState::Failed, Some(reason.clone()))
            }
            _ if *seen <= self.polls_before_done => (QueryState::Running, None),
            _ => (QueryState::Succeeded, None),
        };
        Ok(QueryExecution {
            execution_id: execution_id.to_string(),
            state,
            state_change_reason: reason,
            data_scanned_bytes: (state == QueryState::Succeeded).then_some(4096),
        })
    }

    async fn query_results(
        &self,
        _session: &Session,
        execution_id: &str,
        next_token: Option<&str>,
        max_results: usize,
    ) -> Result<ResultPage, ApiError> {
        let mut log = self.log.lock().unwrap();
        log.result_calls.push((
            execution_id.to_string(),
            next_token.map(str::to_string),
            max_results,
        ));
        if Self::sql_of(&log, execution_id).is_none() {
            return Err(ApiError::not_found(format!(
                "QueryExecution {execution_id} was not found"
            )));
        }
        let all = self.result_set();
        let start: usize = next_token
            .map_or(Ok(0), str::parse)
            .map_err(|_| ApiError::invalid_request("Invalid NextToken"))?;
        let end = (start + max_results).min(all.len());
        Ok(ResultPage {
            columns: self.columns.clone(),
            rows: all.get(start..end).unwrap_or_default().to_vec(),
            next_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    async fn delete_objects(
        &self,
        _session: &Session,
        bucket: &str,
        prefix: &str,
    ) -> Result<usize, ApiError> {
        self.log
            .lock()
            .unwrap()
            .deleted
            .push((bucket.to_string(), prefix.to_string()));
        Ok(2)
    }
}
