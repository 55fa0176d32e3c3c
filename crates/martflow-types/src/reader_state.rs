//! Serializable reader snapshots.
//!
//! A [`ReaderState`] is enough to re-attach a reader to an already executed
//! query without running it again.

use serde::{Deserialize, Serialize};

use crate::backend::StorageType;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderState {
    #[serde(rename = "BIGQUERY")]
    BigQuery(BigQueryReaderState),
    Athena(AthenaReaderState),
}

impl ReaderState {
    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::BigQuery(_) => StorageType::BigQuery,
            Self::Athena(_) => StorageType::Athena,
        }
    }
}

/// Fully qualified BigQuery table coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl std::fmt::Display for TableReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigQueryReaderState {
    pub job_id: String,
    pub location: String,
    /// Anonymous table holding the job's results.
    pub destination_table: TableReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaReaderState {
    pub query_execution_id: String,
    pub output_bucket: String,
    pub output_prefix: String,
}

impl TryFrom<ReaderState> for BigQueryReaderState {
    type Error = BackendError;

    fn try_from(value: ReaderState) -> Result<Self, Self::Error> {
        match value {
            ReaderState::BigQuery(state) => Ok(state),
            other @ ReaderState::Athena(_) => Err(BackendError::business_rule(
                "READER_STATE_MISMATCH",
                format!("expected BIGQUERY reader state, got {}", other.storage_type()),
            )),
        }
    }
}

impl TryFrom<ReaderState> for AthenaReaderState {
    type Error = BackendError;

    fn try_from(value: ReaderState) -> Result<Self, Self::Error> {
        match value {
            ReaderState::Athena(state) => Ok(state),
            other @ ReaderState::BigQuery(_) => Err(BackendError::business_rule(
                "READER_STATE_MISMATCH",
                format!("expected ATHENA reader state, got {}", other.storage_type()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn athena() -> ReaderState {
        ReaderState::Athena(AthenaReaderState {
            query_execution_id: "qe-1".into(),
            output_bucket: "results".into(),
            output_prefix: "martflow/abc".into(),
        })
    }

    #[test]
    fn serde_roundtrip_keeps_tag() {
        let json = serde_json::to_string(&athena()).unwrap();
        assert!(json.contains("\"type\":\"ATHENA\""));
        let back: ReaderState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, athena());
    }

    #[test]
    fn guard_rejects_foreign_state() {
        let err = BigQueryReaderState::try_from(athena()).unwrap_err();
        assert_eq!(err.code, "READER_STATE_MISMATCH");
        assert!(AthenaReaderState::try_from(athena()).is_ok());
    }

    #[test]
    fn table_reference_display() {
        let t = TableReference {
            project_id: "p".into(),
            dataset_id: "_anon".into(),
            table_id: "t1".into(),
        };
        assert_eq!(t.to_string(), "p._anon.t1");
    }
}
