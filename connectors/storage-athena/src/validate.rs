//! Access validation and `EXPLAIN` dry-runs.

use martflow_sdk::prelude::*;

use crate::execution::run_and_discard;
use crate::query::explain;
use crate::{call, session, AthenaStorage};

#[async_trait]
impl StorageAccessValidator for AthenaStorage {
    async fn validate(
        &self,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<ValidationResult> {
        let session = session(config, credentials)?;
        let required = [
            ("config.region", &session.region),
            ("config.output_bucket", &session.output_bucket),
            ("credentials.access_key_id", &session.access_key_id),
            ("credentials.secret_access_key", &session.secret_access_key),
        ];
        let errors: Vec<FieldError> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| FieldError::new(*field, "must not be empty"))
            .collect();
        if !errors.is_empty() {
            return Ok(ValidationResult::invalid_fields(errors));
        }

        Ok(
            match call(self.options.retry, "check_access", || self.api.check_access(&session)).await {
                Ok(()) => ValidationResult::success(),
                Err(e) => ValidationResult::failed(
                    format!("Cannot access Athena in {}", session.region),
                    Some(e.message),
                ),
            },
        )
    }
}

#[async_trait]
impl SqlDryRunExecutor for AthenaStorage {
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
        match run_and_discard(self.api.as_ref(), self.options, &session, &explain(sql)).await {
            // EXPLAIN scans nothing, so there is no byte estimate.
            Ok(_) => Ok(SqlDryRunResult::valid(None)),
            Err(e) if e.code == "ATHENA_QUERY_FAILED" => Ok(SqlDryRunResult::invalid(e.message)),
            Err(e) => Err(e),
        }
    }
}
