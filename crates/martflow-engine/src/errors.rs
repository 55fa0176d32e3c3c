//! Engine error model.
//!
//! Backend failures during a run never surface as [`RunError`]; they are
//! recorded on the report as `ERROR` with the backend's message. A
//! `RunError` means the run was rejected or its bookkeeping failed.

use martflow_sdk::resolver::ResolveError;
use martflow_types::entity::ReportId;
use martflow_types::error::BackendError;

// ---------------------------------------------------------------------------
// RunError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("report {0} not found")]
    ReportNotFound(ReportId),
    /// The report is already `RUNNING`; no second pass was started.
    #[error("report {0} is already running")]
    AlreadyRunning(ReportId),
    /// Store or task failure around the run itself.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ReportNotFound(_) | Self::AlreadyRunning(_))
    }
}

/// Failure inside the read/write pass, recorded as the run's error text.
#[derive(Debug, thiserror::Error)]
pub(crate) enum PassError {
    #[error("{0}")]
    Resolve(#[from] ResolveError),
    #[error("{}", .0.message)]
    Backend(#[from] BackendError),
}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Report data cache failure.
///
/// `Clone` so that every caller awaiting one in-flight population receives
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("report {0} not found")]
    ReportNotFound(ReportId),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("report store: {0}")]
    Store(String),
    #[error("cache population task failed: {0}")]
    Task(String),
    #[error("single-flight map lock poisoned")]
    LockPoisoned,
}

impl From<anyhow::Error> for CacheError {
    fn from(e: anyhow::Error) -> Self {
        Self::Store(format!("{e:#}"))
    }
}

// ---------------------------------------------------------------------------
// ServiceError
// ---------------------------------------------------------------------------

/// Data-mart and destination service failure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl ServiceError {
    pub(crate) fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// The backend error, when this is one.
    #[must_use]
    pub fn as_backend_error(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e) => Some(e),
            _ => None,
        }
    }
}
