//! Shared error type and retry policy for vendor API adapters.
//!
//! Adapters report failures as [`ApiError`]; connectors convert them into
//! [`BackendError`] once retries are exhausted.

use std::future::Future;
use std::time::Duration;

use martflow_types::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Credentials rejected or permission missing.
    Unauthorized,
    NotFound,
    /// The request itself is malformed (bad SQL, unknown column, ...).
    InvalidRequest,
    /// Quota or rate limit; retried with backoff.
    RateLimited,
    /// Transient service or network failure; retried with backoff.
    Unavailable,
}

/// Failure reported by a vendor API adapter. `message` is the raw API text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// Server-provided retry hint.
    pub retry_after: Option<Duration>,
}

impl ApiError {
    #[must_use]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(ApiErrorKind::RateLimited, message)
        }
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unavailable, message)
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ApiErrorKind::RateLimited | ApiErrorKind::Unavailable)
    }

    /// Convert into a backend error, tagging it with `code_prefix`
    /// (e.g. `BIGQUERY`).
    #[must_use]
    pub fn into_backend(self, code_prefix: &str) -> BackendError {
        match self.kind {
            ApiErrorKind::Unauthorized => {
                BackendError::access(format!("{code_prefix}_ACCESS_DENIED"), self.message)
            }
            ApiErrorKind::NotFound => {
                BackendError::access(format!("{code_prefix}_NOT_FOUND"), self.message)
            }
            ApiErrorKind::InvalidRequest => {
                BackendError::upstream(format!("{code_prefix}_INVALID_REQUEST"), self.message)
            }
            ApiErrorKind::RateLimited => {
                BackendError::upstream(format!("{code_prefix}_RATE_LIMITED"), self.message)
            }
            ApiErrorKind::Unavailable => {
                BackendError::upstream(format!("{code_prefix}_UNAVAILABLE"), self.message)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Exponential backoff with a small fixed attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps; for tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, err: &ApiError, attempt: u32) -> Duration {
        if let Some(hint) = err.retry_after {
            return hint.min(BACKOFF_MAX);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(BACKOFF_MAX)
    }
}

/// Run `op`, retrying retryable failures until the policy's attempt cap.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the
/// attempts are exhausted.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation: &str, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(&e, attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retryable API failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
