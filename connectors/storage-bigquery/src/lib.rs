//! BigQuery storage backend.
//!
//! Queries run as jobs whose results land in an anonymous destination
//! table; readers page through that table with page tokens, so a reader
//! can be re-attached to a finished job from its [`ReaderState`].
//!
//! [`ReaderState`]: martflow_types::reader_state::ReaderState

pub mod api;
mod query;
mod reader;
mod schema;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use martflow_sdk::api::{with_retry, ApiError, RetryPolicy};
use martflow_sdk::prelude::*;

pub use api::{ApiField, BigQueryApi, DryRunStats, QueryJob, RowPage, Session};
pub use reader::BigQueryReportReader;

pub(crate) const CODE_PREFIX: &str = "BIGQUERY";

/// Identifiers are at most `project.dataset.table`.
pub(crate) const MAX_NAME_SEGMENTS: usize = 3;

/// Every stateless BigQuery capability.
pub struct BigQueryStorage {
    api: Arc<dyn BigQueryApi>,
    retry: RetryPolicy,
}

impl BigQueryStorage {
    #[must_use]
    pub fn new(api: Arc<dyn BigQueryApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

impl BackendComponent for BigQueryStorage {
    type Kind = StorageType;

    fn backend_type(&self) -> StorageType {
        StorageType::BigQuery
    }
}

/// Register every BigQuery capability with the default retry policy.
pub fn register(builder: &mut CapabilitiesBuilder, api: Arc<dyn BigQueryApi>) {
    register_with_policy(builder, api, RetryPolicy::default());
}

pub fn register_with_policy(
    builder: &mut CapabilitiesBuilder,
    api: Arc<dyn BigQueryApi>,
    retry: RetryPolicy,
) {
    let storage = Arc::new(BigQueryStorage::new(Arc::clone(&api), retry));
    builder
        .storage_access_validator(Arc::clone(&storage) as _)
        .query_builder(Arc::clone(&storage) as _)
        .schema_provider(Arc::clone(&storage) as _)
        .schema_merger(Arc::clone(&storage) as _)
        .schema_parser(Arc::clone(&storage) as _)
        .sql_dry_run_executor(Arc::clone(&storage) as _)
        .title_generator(storage as _)
        .report_reader(move || {
            Ok(Box::new(BigQueryReportReader::new(Arc::clone(&api), retry)) as Box<dyn ReportReader>)
        });
}

/// Session for a data mart's config and credentials.
pub(crate) fn session(
    config: &StorageConfig,
    credentials: &StorageCredentials,
) -> BackendResult<Session> {
    let config: &BigQueryConfig = config.try_into()?;
    let credentials: &BigQueryCredentials = credentials.try_into()?;
    Ok(Session {
        project_id: config.project_id.clone(),
        location: config.location.clone(),
        key: credentials.service_account_key.clone(),
    })
}

/// Run an API call under the retry policy, converting the final failure.
pub(crate) async fn call<T, F, Fut>(retry: RetryPolicy, operation: &str, op: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry(retry, operation, op)
        .await
        .map_err(|e| e.into_backend(CODE_PREFIX))
}
