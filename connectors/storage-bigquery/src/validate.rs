//! Access validation and SQL dry-runs.

use martflow_sdk::prelude::*;

use crate::{call, session, BigQueryStorage, CODE_PREFIX};

#[async_trait]
impl StorageAccessValidator for BigQueryStorage {
    async fn validate(
        &self,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<ValidationResult> {
        let session = session(config, credentials)?;

        let mut errors = session.key.field_errors("credentials.service_account_key");
        if session.project_id.trim().is_empty() {
            errors.push(FieldError::new("config.project_id", "must not be empty"));
        }
        if !errors.is_empty() {
            return Ok(ValidationResult::invalid_fields(errors));
        }

        match call(self.retry, "check_access", || self.api.check_access(&session)).await {
            Ok(()) => Ok(ValidationResult::success()),
            Err(e) => {
                tracing::debug!(project = %session.project_id, error = %e, "BigQuery access check failed");
                Ok(ValidationResult::failed(
                    format!("Cannot access BigQuery project {}", session.project_id),
                    Some(e.message),
                ))
            }
        }
    }
}

#[async_trait]
impl SqlDryRunExecutor for BigQueryStorage {
    async fn execute(
        &self,
        credentials: &StorageCredentials,
        config: &StorageConfig,
        sql: &str,
    ) -> BackendResult<SqlDryRunResult> {
        let session = session(config, credentials)?;
        if sql.trim().is_empty() {
            return Ok(SqlDryRunResult::invalid("SQL query is empty"));
        }
        match with_retry(self.retry, "dry_run", || self.api.dry_run(&session, sql)).await {
            Ok(stats) => Ok(SqlDryRunResult::valid(Some(stats.total_bytes_processed))),
            Err(e) if e.kind == ApiErrorKind::InvalidRequest => Ok(SqlDryRunResult::invalid(e.message)),
            Err(e) => Err(e.into_backend(CODE_PREFIX)),
        }
    }
}
