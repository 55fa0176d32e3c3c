//! Backend discriminants.
//!
//! One variant per supported storage or destination kind. These are the keys
//! capability implementations register under and the `type` tag carried by
//! every backend-specific payload.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Analytical warehouse a data mart reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    #[serde(rename = "BIGQUERY")]
    BigQuery,
    Athena,
}

impl StorageType {
    pub const ALL: [Self; 2] = [Self::BigQuery, Self::Athena];

    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BigQuery => "BIGQUERY",
            Self::Athena => "ATHENA",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = UnknownBackendType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownBackendType(s.to_string()))
    }
}

/// Output sink a report delivers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    GoogleSheets,
    Email,
    LookerStudio,
}

impl DestinationType {
    pub const ALL: [Self; 3] = [Self::GoogleSheets, Self::Email, Self::LookerStudio];

    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoogleSheets => "GOOGLE_SHEETS",
            Self::Email => "EMAIL",
            Self::LookerStudio => "LOOKER_STUDIO",
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = UnknownBackendType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownBackendType(s.to_string()))
    }
}

/// Returned when a persisted discriminant names no known backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend type '{0}'")]
pub struct UnknownBackendType(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_wire_format() {
        assert_eq!(StorageType::BigQuery.as_str(), "BIGQUERY");
        let json = serde_json::to_string(&StorageType::BigQuery).unwrap();
        assert_eq!(json, "\"BIGQUERY\"");
        let json = serde_json::to_string(&StorageType::Athena).unwrap();
        assert_eq!(json, "\"ATHENA\"");
    }

    #[test]
    fn destination_type_serde_matches_as_str() {
        for t in DestinationType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<DestinationType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_type_rejected() {
        let err = "SNOWFLAKE".parse::<StorageType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown backend type 'SNOWFLAKE'");
    }
}
