//! Data-mart schemas and field type mapping.
//!
//! A [`DataMartSchema`] is tagged by storage type. Fields carry a
//! [`FieldStatus`] maintained by schema reconciliation; nested fields exist
//! only for record-capable storages.

pub mod athena;
pub mod bigquery;

use serde::{Deserialize, Serialize};

use crate::backend::StorageType;
use crate::error::BackendError;
use crate::report::ReportDataHeader;

pub use athena::{AthenaField, AthenaFieldType, AthenaSchema};
pub use bigquery::{BigQueryField, BigQueryFieldMode, BigQueryFieldType, BigQuerySchema};

/// Reconciliation status of a schema field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldStatus {
    /// Present in the backend with the stored definition.
    #[default]
    Connected,
    /// Present in the backend, but its native type or mode drifted.
    ConnectedWithDefinitionMismatch,
    /// No longer present in the backend; kept for history.
    Disconnected,
}

/// Output-facing field type, independent of the storage dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputFieldType {
    String,
    Integer,
    Number,
    Boolean,
    Date,
    #[serde(rename = "DATETIME")]
    DateTime,
    Timestamp,
    Time,
    Json,
    Bytes,
    Geography,
    Array,
    Record,
}

/// Storage-native type of an emitted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "storage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NativeFieldType {
    #[serde(rename = "BIGQUERY")]
    BigQuery {
        #[serde(rename = "type")]
        field_type: BigQueryFieldType,
        mode: BigQueryFieldMode,
    },
    Athena {
        #[serde(rename = "type")]
        field_type: AthenaFieldType,
    },
}

impl NativeFieldType {
    #[must_use]
    pub fn output_type(&self) -> OutputFieldType {
        match self {
            Self::BigQuery { field_type, mode } => {
                if *mode == BigQueryFieldMode::Repeated {
                    OutputFieldType::Array
                } else {
                    field_type.output_type()
                }
            }
            Self::Athena { field_type } => field_type.output_type(),
        }
    }

    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::BigQuery { .. } => StorageType::BigQuery,
            Self::Athena { .. } => StorageType::Athena,
        }
    }
}

/// Persisted schema of a data mart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataMartSchema {
    #[serde(rename = "BIGQUERY")]
    BigQuery(BigQuerySchema),
    Athena(AthenaSchema),
}

impl DataMartSchema {
    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::BigQuery(_) => StorageType::BigQuery,
            Self::Athena(_) => StorageType::Athena,
        }
    }

    /// Headers for every field still connected to the backend, in schema order.
    #[must_use]
    pub fn report_headers(&self) -> Vec<ReportDataHeader> {
        match self {
            Self::BigQuery(schema) => schema
                .fields
                .iter()
                .filter(|f| f.status != FieldStatus::Disconnected)
                .map(BigQueryField::report_header)
                .collect(),
            Self::Athena(schema) => schema
                .fields
                .iter()
                .filter(|f| f.status != FieldStatus::Disconnected)
                .map(AthenaField::report_header)
                .collect(),
        }
    }

    /// Top-level field names, in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Self::BigQuery(schema) => schema.fields.iter().map(|f| f.name.as_str()).collect(),
            Self::Athena(schema) => schema.fields.iter().map(|f| f.name.as_str()).collect(),
        }
    }
}

impl TryFrom<DataMartSchema> for BigQuerySchema {
    type Error = BackendError;

    fn try_from(value: DataMartSchema) -> Result<Self, Self::Error> {
        match value {
            DataMartSchema::BigQuery(schema) => Ok(schema),
            other @ DataMartSchema::Athena(_) => Err(BackendError::business_rule(
                "BACKEND_TYPE_MISMATCH",
                format!("expected BIGQUERY schema, got {}", other.storage_type()),
            )),
        }
    }
}

impl TryFrom<DataMartSchema> for AthenaSchema {
    type Error = BackendError;

    fn try_from(value: DataMartSchema) -> Result<Self, Self::Error> {
        match value {
            DataMartSchema::Athena(schema) => Ok(schema),
            other @ DataMartSchema::BigQuery(_) => Err(BackendError::business_rule(
                "BACKEND_TYPE_MISMATCH",
                format!("expected ATHENA schema, got {}", other.storage_type()),
            )),
        }
    }
}

/// Strip type parameters and normalize case: `decimal(10,2)` -> `DECIMAL`,
/// `array<string>` -> `ARRAY`.
pub(crate) fn base_type_name(native: &str) -> String {
    native
        .trim()
        .split(['(', '<'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}
