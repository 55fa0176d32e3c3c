//! BigQuery-style schema: typed fields with modes and nested records.

use serde::{Deserialize, Serialize};

use super::{base_type_name, FieldStatus, NativeFieldType, OutputFieldType};
use crate::report::ReportDataHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BigQueryFieldType {
    String,
    Bytes,
    Integer,
    Float,
    Numeric,
    #[serde(rename = "BIGNUMERIC")]
    BigNumeric,
    Boolean,
    Timestamp,
    Date,
    Time,
    #[serde(rename = "DATETIME")]
    DateTime,
    Geography,
    Json,
    Interval,
    Record,
}

impl BigQueryFieldType {
    /// Parse a native type name, accepting standard-SQL aliases.
    ///
    /// Returns `None` for names this mapper does not know.
    #[must_use]
    pub fn from_native(native: &str) -> Option<Self> {
        let ty = match base_type_name(native).as_str() {
            "STRING" => Self::String,
            "BYTES" => Self::Bytes,
            "INTEGER" | "INT64" => Self::Integer,
            "FLOAT" | "FLOAT64" => Self::Float,
            "NUMERIC" | "DECIMAL" => Self::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => Self::BigNumeric,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "TIMESTAMP" => Self::Timestamp,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" => Self::DateTime,
            "GEOGRAPHY" => Self::Geography,
            "JSON" => Self::Json,
            "INTERVAL" => Self::Interval,
            "RECORD" | "STRUCT" => Self::Record,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn output_type(self) -> OutputFieldType {
        match self {
            Self::String | Self::Interval => OutputFieldType::String,
            Self::Bytes => OutputFieldType::Bytes,
            Self::Integer => OutputFieldType::Integer,
            Self::Float | Self::Numeric | Self::BigNumeric => OutputFieldType::Number,
            Self::Boolean => OutputFieldType::Boolean,
            Self::Timestamp => OutputFieldType::Timestamp,
            Self::Date => OutputFieldType::Date,
            Self::Time => OutputFieldType::Time,
            Self::DateTime => OutputFieldType::DateTime,
            Self::Geography => OutputFieldType::Geography,
            Self::Json => OutputFieldType::Json,
            Self::Record => OutputFieldType::Record,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BigQueryFieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

impl BigQueryFieldMode {
    #[must_use]
    pub fn from_native(native: &str) -> Option<Self> {
        match native.trim().to_ascii_uppercase().as_str() {
            "" | "NULLABLE" => Some(Self::Nullable),
            "REQUIRED" => Some(Self::Required),
            "REPEATED" => Some(Self::Repeated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigQueryField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: BigQueryFieldType,
    #[serde(default)]
    pub mode: BigQueryFieldMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<BigQueryField>,
}

impl BigQueryField {
    /// A connected, nullable field with no metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: BigQueryFieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: BigQueryFieldMode::Nullable,
            alias: None,
            description: None,
            is_primary_key: false,
            status: FieldStatus::Connected,
            fields: Vec::new(),
        }
    }

    /// A connected record field with the given children.
    #[must_use]
    pub fn record(name: impl Into<String>, fields: Vec<BigQueryField>) -> Self {
        let mut field = Self::new(name, BigQueryFieldType::Record);
        field.fields = fields;
        field
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BigQueryFieldMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn is_record(&self) -> bool {
        self.field_type == BigQueryFieldType::Record
    }

    #[must_use]
    pub fn report_header(&self) -> ReportDataHeader {
        ReportDataHeader {
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            field_type: NativeFieldType::BigQuery {
                field_type: self.field_type,
                mode: self.mode,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigQuerySchema {
    pub fields: Vec<BigQueryField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_sql_aliases() {
        assert_eq!(
            BigQueryFieldType::from_native("int64"),
            Some(BigQueryFieldType::Integer)
        );
        assert_eq!(
            BigQueryFieldType::from_native("STRUCT<a INT64>"),
            Some(BigQueryFieldType::Record)
        );
        assert_eq!(
            BigQueryFieldType::from_native("NUMERIC(10, 2)"),
            Some(BigQueryFieldType::Numeric)
        );
        assert_eq!(BigQueryFieldType::from_native("RANGE"), None);
    }

    #[test]
    fn output_types() {
        assert_eq!(BigQueryFieldType::BigNumeric.output_type(), OutputFieldType::Number);
        assert_eq!(BigQueryFieldType::DateTime.output_type(), OutputFieldType::DateTime);
        assert_eq!(BigQueryFieldType::Interval.output_type(), OutputFieldType::String);
    }

    #[test]
    fn field_deserializes_with_defaults() {
        let field: BigQueryField =
            serde_json::from_str(r#"{"name":"id","type":"INTEGER"}"#).unwrap();
        assert_eq!(field.mode, BigQueryFieldMode::Nullable);
        assert_eq!(field.status, FieldStatus::Connected);
        assert!(field.fields.is_empty());
        assert!(!field.is_primary_key);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(
            BigQueryFieldMode::from_native(""),
            Some(BigQueryFieldMode::Nullable)
        );
        assert_eq!(
            BigQueryFieldMode::from_native("repeated"),
            Some(BigQueryFieldMode::Repeated)
        );
        assert_eq!(BigQueryFieldMode::from_native("OPTIONAL"), None);
    }
}
