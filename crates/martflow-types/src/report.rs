//! Report data flowing from a reader to a writer.

use serde::{Deserialize, Serialize};

use crate::schema::{NativeFieldType, OutputFieldType};

/// One cell matrix row. Cells are opaque JSON values.
pub type Row = Vec<serde_json::Value>;

/// Output-facing projection of a schema field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDataHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub field_type: NativeFieldType,
}

impl ReportDataHeader {
    /// Label shown to report consumers: the alias when set, else the name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(&self.name)
    }

    #[must_use]
    pub fn output_type(&self) -> OutputFieldType {
        self.field_type.output_type()
    }
}

/// Produced once per read session, before any batch is pulled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDataDescription {
    pub headers: Vec<ReportDataHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_row_count: Option<u64>,
}

impl ReportDataDescription {
    #[must_use]
    pub fn new(headers: Vec<ReportDataHeader>) -> Self {
        Self {
            headers,
            estimated_row_count: None,
        }
    }

    /// Position of a header by field name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }
}

/// A page of rows. A `None` cursor is the only end-of-stream signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDataBatch {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub next_batch_cursor: Option<String>,
}

impl ReportDataBatch {
    #[must_use]
    pub fn new(rows: Vec<Row>, next_batch_cursor: Option<String>) -> Self {
        Self {
            rows,
            next_batch_cursor,
        }
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_batch_cursor.is_none()
    }
}
