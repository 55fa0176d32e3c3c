//! Query execution: result placement, completion polling, and cleanup.

use martflow_sdk::prelude::*;
use tokio::time::Instant;
use uuid::Uuid;

use crate::api::{AthenaApi, QueryState, Session};
use crate::{call, AthenaOptions};

/// Where one query's result objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputLocation {
    pub bucket: String,
    pub prefix: String,
}

impl OutputLocation {
    /// A fresh `martflow/<uuid>/` prefix in `bucket`.
    pub(crate) fn fresh(bucket: &str) -> Self {
        Self {
            bucket: bucket.trim_start_matches("s3://").trim_end_matches('/').to_string(),
            prefix: format!("martflow/{}/", Uuid::new_v4()),
        }
    }

    pub(crate) fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompletedQuery {
    pub execution_id: String,
    pub data_scanned_bytes: Option<u64>,
}

/// Start `sql` and poll until it reaches a terminal state.
///
/// A failed query surfaces as `ATHENA_QUERY_FAILED` carrying Athena's
/// reason verbatim.
pub(crate) async fn run_to_completion(
    api: &dyn AthenaApi,
    options: AthenaOptions,
    session: &Session,
    sql: &str,
    output: &OutputLocation,
) -> BackendResult<CompletedQuery> {
    let uri = output.uri();
    let execution_id = call(options.retry, "start_query", || {
        api.start_query(session, sql, &uri)
    })
    .await?;
    tracing::debug!(execution_id = %execution_id, output = %uri, "Athena query started");

    let started = Instant::now();
    loop {
        let execution = call(options.retry, "query_execution", || {
            api.query_execution(session, &execution_id)
        })
        .await?;
        match execution.state {
            QueryState::Succeeded => {
                return Ok(CompletedQuery {
                    execution_id,
                    data_scanned_bytes: execution.data_scanned_bytes,
                })
            }
            QueryState::Failed => {
                return Err(BackendError::upstream(
                    "ATHENA_QUERY_FAILED",
                    execution
                        .state_change_reason
                        .unwrap_or_else(|| format!("query {execution_id} failed")),
                ))
            }
            QueryState::Cancelled => {
                return Err(BackendError::upstream(
                    "ATHENA_QUERY_CANCELLED",
                    format!("query {execution_id} was cancelled"),
                ))
            }
            QueryState::Queued | QueryState::Running => {}
        }
        if started.elapsed() >= options.max_wait {
            return Err(BackendError::upstream(
                "ATHENA_QUERY_TIMEOUT",
                format!(
                    "query {execution_id} still {:?} after {}s",
                    execution.state,
                    options.max_wait.as_secs()
                ),
            ));
        }
        tokio::time::sleep(options.poll_interval).await;
    }
}

/// Delete a query's result objects.
pub(crate) async fn remove_output(
    api: &dyn AthenaApi,
    options: AthenaOptions,
    session: &Session,
    output: &OutputLocation,
) -> BackendResult<usize> {
    let deleted = call(options.retry, "delete_objects", || {
        api.delete_objects(session, &output.bucket, &output.prefix)
    })
    .await?;
    tracing::debug!(
        bucket = %output.bucket,
        prefix = %output.prefix,
        deleted,
        "Athena query output removed"
    );
    Ok(deleted)
}

/// Run `sql` for its outcome only, removing whatever it wrote.
pub(crate) async fn run_and_discard(
    api: &dyn AthenaApi,
    options: AthenaOptions,
    session: &Session,
    sql: &str,
) -> BackendResult<CompletedQuery> {
    let output = OutputLocation::fresh(&session.output_bucket);
    let outcome = run_to_completion(api, options, session, sql, &output).await;
    if let Err(e) = remove_output(api, options, session, &output).await {
        tracing::warn!(prefix = %output.prefix, error = %e, "Failed to remove Athena query output");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{options, session, FakeAthena};

    #[test]
    fn test_fresh_prefix_is_unique_and_normalized() {
        let a = OutputLocation::fresh("s3://results/");
        let b = OutputLocation::fresh("results");
        assert_eq!(a.bucket, "results");
        assert!(a.prefix.starts_with("martflow/") && a.prefix.ends_with('/'));
        assert_ne!(a.prefix, b.prefix);
        assert!(a.uri().starts_with("s3://results/martflow/"));
    }

    #[tokio::test]
    async fn test_polls_until_succeeded() {
        let fake = FakeAthena {
            polls_before_done: 3,
            ..FakeAthena::default()
        };
        let output = OutputLocation::fresh("results");
        let done = run_to_completion(&fake, options(), &session(), "SELECT 1", &output)
            .await
            .unwrap();
        assert_eq!(done.execution_id, "qe-1");
        assert_eq!(fake.log.lock().unwrap().polls, 4);
    }

    #[tokio::test]
    async fn test_failed_query_keeps_reason() {
        let fake = FakeAthena {
            fail_when: Some((
                "missing".into(),
                "TABLE_NOT_FOUND: line 1:15: Table 'awsdatacatalog.sales.missing' does not exist".into(),
            )),
            ..FakeAthena::default()
        };
        let output = OutputLocation::fresh("results");
        let err = run_to_completion(&fake, options(), &session(), "SELECT * FROM missing", &output)
            .await
            .unwrap_err();
        assert_eq!(err.code, "ATHENA_QUERY_FAILED");
        assert!(err.message.starts_with("TABLE_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_wait() {
        let fake = FakeAthena {
            polls_before_done: u32::MAX,
            ..FakeAthena::default()
        };
        let opts = AthenaOptions {
            max_wait: Duration::ZERO,
            ..options()
        };
        let output = OutputLocation::fresh("results");
        let err = run_to_completion(&fake, opts, &session(), "SELECT 1", &output)
            .await
            .unwrap_err();
        assert_eq!(err.code, "ATHENA_QUERY_TIMEOUT");
    }

    #[tokio::test]
    async fn test_discard_removes_output_even_on_failure() {
        let fake = FakeAthena {
            fail_when: Some(("SELECT".into(), "SYNTAX_ERROR".into())),
            ..FakeAthena::default()
        };
        let result = run_and_discard(&fake, options(), &session(), "SELECT").await;
        assert!(result.is_err());
        let log = fake.log.lock().unwrap();
        assert_eq!(log.deleted.len(), 1);
        assert_eq!(log.deleted[0].0, "results");
    }
}
