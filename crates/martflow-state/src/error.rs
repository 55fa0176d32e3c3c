//! Store error types.

/// Errors produced by [`ReportStore`](crate::ReportStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON payload column could not be encoded or decoded.
    #[error("payload error in {column}: {source}")]
    Payload {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A stored value does not parse back into its model type.
    #[error("corrupt {column} value: {value}")]
    Corrupt { column: &'static str, value: String },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("report store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn payload(column: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Payload { column, source }
    }

    pub(crate) fn corrupt(column: &'static str, value: impl Into<String>) -> Self {
        Self::Corrupt {
            column,
            value: value.into(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StoreError>;
