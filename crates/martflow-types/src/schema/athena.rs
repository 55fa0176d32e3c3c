//! Athena-style schema: flat columns with Trino/Hive type names.

use serde::{Deserialize, Serialize};

use super::{base_type_name, FieldStatus, NativeFieldType, OutputFieldType};
use crate::report::ReportDataHeader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AthenaFieldType {
    Boolean,
    Tinyint,
    Smallint,
    Integer,
    Bigint,
    Double,
    Float,
    Decimal,
    Char,
    Varchar,
    String,
    Binary,
    Date,
    Timestamp,
    Array,
    Map,
    Struct,
    Json,
}

impl AthenaFieldType {
    /// Parse a native type name such as `varchar(255)` or `array<string>`.
    #[must_use]
    pub fn from_native(native: &str) -> Option<Self> {
        let ty = match base_type_name(native).as_str() {
            "BOOLEAN" => Self::Boolean,
            "TINYINT" => Self::Tinyint,
            "SMALLINT" => Self::Smallint,
            "INT" | "INTEGER" => Self::Integer,
            "BIGINT" => Self::Bigint,
            "DOUBLE" => Self::Double,
            "FLOAT" | "REAL" => Self::Float,
            "DECIMAL" => Self::Decimal,
            "CHAR" => Self::Char,
            "VARCHAR" => Self::Varchar,
            "STRING" => Self::String,
            "BINARY" | "VARBINARY" => Self::Binary,
            "DATE" => Self::Date,
            "TIMESTAMP" => Self::Timestamp,
            "ARRAY" => Self::Array,
            "MAP" => Self::Map,
            "STRUCT" | "ROW" => Self::Struct,
            "JSON" => Self::Json,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn output_type(self) -> OutputFieldType {
        match self {
            Self::Boolean => OutputFieldType::Boolean,
            Self::Tinyint | Self::Smallint | Self::Integer | Self::Bigint => {
                OutputFieldType::Integer
            }
            Self::Double | Self::Float | Self::Decimal => OutputFieldType::Number,
            Self::Char | Self::Varchar | Self::String => OutputFieldType::String,
            Self::Binary => OutputFieldType::Bytes,
            Self::Date => OutputFieldType::Date,
            // Athena timestamps carry no zone.
            Self::Timestamp => OutputFieldType::DateTime,
            Self::Array => OutputFieldType::Array,
            Self::Struct => OutputFieldType::Record,
            Self::Map | Self::Json => OutputFieldType::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: AthenaFieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub status: FieldStatus,
}

impl AthenaField {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: AthenaFieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            alias: None,
            description: None,
            is_primary_key: false,
            status: FieldStatus::Connected,
        }
    }

    #[must_use]
    pub fn report_header(&self) -> ReportDataHeader {
        ReportDataHeader {
            name: self.name.clone(),
            alias: self.alias.clone(),
            description: self.description.clone(),
            field_type: NativeFieldType::Athena {
                field_type: self.field_type,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaSchema {
    pub fields: Vec<AthenaField>,
}
