//! Athena storage backend.
//!
//! Every query writes its results under a fresh `martflow/<uuid>/` prefix of
//! the configured output bucket. Readers remember that prefix in their
//! [`ReaderState`] and delete it on finalize.
//!
//! [`ReaderState`]: martflow_types::reader_state::ReaderState

pub mod api;
mod execution;
mod query;
mod reader;
mod schema;
mod validate;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use martflow_sdk::prelude::*;

pub use api::{ApiColumn, AthenaApi, QueryExecution, QueryState, ResultPage, Session};
pub use reader::AthenaReportReader;

pub(crate) const CODE_PREFIX: &str = "ATHENA";

/// `catalog.database.table`
pub(crate) const MAX_NAME_SEGMENTS: usize = 3;

/// Retry and polling knobs shared by every Athena capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AthenaOptions {
    pub retry: RetryPolicy,
    /// Delay between `GetQueryExecution` polls.
    pub poll_interval: Duration,
    /// Give up on a query still running after this long.
    pub max_wait: Duration,
}

impl Default for AthenaOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(30 * 60),
        }
    }
}

pub struct AthenaStorage {
    api: Arc<dyn AthenaApi>,
    options: AthenaOptions,
}

impl AthenaStorage {
    #[must_use]
    pub fn new(api: Arc<dyn AthenaApi>, options: AthenaOptions) -> Self {
        Self { api, options }
    }
}

impl BackendComponent for AthenaStorage {
    type Kind = StorageType;

    fn backend_type(&self) -> StorageType {
        StorageType::Athena
    }
}

pub fn register(builder: &mut CapabilitiesBuilder, api: Arc<dyn AthenaApi>) {
    register_with_options(builder, api, AthenaOptions::default());
}

pub fn register_with_options(
    builder: &mut CapabilitiesBuilder,
    api: Arc<dyn AthenaApi>,
    options: AthenaOptions,
) {
    let storage = Arc::new(AthenaStorage::new(Arc::clone(&api), options));
    builder
        .storage_access_validator(Arc::clone(&storage) as _)
        .query_builder(Arc::clone(&storage) as _)
        .schema_provider(Arc::clone(&storage) as _)
        .schema_merger(Arc::clone(&storage) as _)
        .schema_parser(Arc::clone(&storage) as _)
        .sql_dry_run_executor(Arc::clone(&storage) as _)
        .title_generator(storage as _)
        .report_reader(move || {
            Ok(Box::new(AthenaReportReader::new(Arc::clone(&api), options)) as Box<dyn ReportReader>)
        });
}

pub(crate) fn session(
    config: &StorageConfig,
    credentials: &StorageCredentials,
) -> BackendResult<Session> {
    let config: &AthenaConfig = config.try_into()?;
    let credentials: &AthenaCredentials = credentials.try_into()?;
    Ok(Session {
        region: config.region.clone(),
        output_bucket: config.output_bucket.clone(),
        access_key_id: credentials.access_key_id.clone(),
        secret_access_key: credentials.secret_access_key.clone(),
    })
}

pub(crate) async fn call<T, F, Fut>(retry: RetryPolicy, operation: &str, op: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry(retry, operation, op)
        .await
        .map_err(|e| e.into_backend(CODE_PREFIX))
}
