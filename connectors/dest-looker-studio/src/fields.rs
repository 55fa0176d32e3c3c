//! Looker Studio field model and value formatting.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use martflow_types::report::ReportDataHeader;
use martflow_types::schema::OutputFieldType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookerDataType {
    Number,
    Text,
    Boolean,
    YearMonthDay,
    YearMonthDaySecond,
}

impl From<OutputFieldType> for LookerDataType {
    fn from(output: OutputFieldType) -> Self {
        match output {
            OutputFieldType::Integer | OutputFieldType::Number => Self::Number,
            OutputFieldType::Boolean => Self::Boolean,
            OutputFieldType::Date => Self::YearMonthDay,
            OutputFieldType::DateTime | OutputFieldType::Timestamp => Self::YearMonthDaySecond,
            OutputFieldType::String
            | OutputFieldType::Time
            | OutputFieldType::Json
            | OutputFieldType::Bytes
            | OutputFieldType::Geography
            | OutputFieldType::Array
            | OutputFieldType::Record => Self::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookerConcept {
    Dimension,
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookerField {
    pub name: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: LookerDataType,
    pub concept_type: LookerConcept,
}

impl From<&ReportDataHeader> for LookerField {
    fn from(header: &ReportDataHeader) -> Self {
        let data_type = LookerDataType::from(header.output_type());
        Self {
            name: header.name.clone(),
            label: header.display_name().to_string(),
            description: header.description.clone(),
            data_type,
            concept_type: if data_type == LookerDataType::Number {
                LookerConcept::Metric
            } else {
                LookerConcept::Dimension
            },
        }
    }
}

/// Format one cell the way Looker Studio expects for `data_type`.
///
/// Dates become `YYYYMMDD` and date-times `YYYYMMDDHHMMSS`; values that do
/// not parse are passed through as text.
#[must_use]
pub fn format_value(value: &Value, data_type: LookerDataType) -> Value {
    match (data_type, value) {
        (_, Value::Null) => Value::Null,
        (LookerDataType::YearMonthDay, Value::String(s)) => {
            Value::String(compact_digits(s, 8).unwrap_or_else(|| s.clone()))
        }
        (LookerDataType::YearMonthDaySecond, Value::String(s)) => {
            Value::String(compact_digits(s, 14).unwrap_or_else(|| s.clone()))
        }
        (LookerDataType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(s.clone()), Value::Number),
        (LookerDataType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(s.clone()),
        },
        (LookerDataType::Text, Value::String(_)) => value.clone(),
        (LookerDataType::Text, other) => Value::String(other.to_string()),
        _ => value.clone(),
    }
}

/// First `width` digits of an ISO-style date or timestamp.
fn compact_digits(raw: &str, width: usize) -> Option<String> {
    let digits: String = raw
        .chars()
        .take_while(|c| !matches!(c, '.' | 'Z' | '+'))
        .filter(char::is_ascii_digit)
        .take(width)
        .collect();
    (digits.len() == width).then_some(digits)
}
