//! Aggregates the core reads and mutates: data marts, destinations, reports,
//! and reader cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{DestinationType, StorageType};
use crate::config::{DestinationConfig, DestinationCredentials, StorageConfig, StorageCredentials};
use crate::definition::DataMartDefinition;
use crate::reader_state::ReaderState;
use crate::report::ReportDataDescription;
use crate::schema::DataMartSchema;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl<S: Into<String>> From<S> for $name {
            fn from(value: S) -> Self {
                Self(value.into())
            }
        }
    };
}

id_newtype!(
    /// Opaque report identifier.
    ReportId
);
id_newtype!(
    /// Opaque data-mart identifier.
    DataMartId
);
id_newtype!(
    /// Opaque destination identifier.
    DestinationId
);

// ---------------------------------------------------------------------------
// Run tracking
// ---------------------------------------------------------------------------

/// Status of a report's most recent run.
///
/// `Running` guards against overlapping runs; it says nothing about progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run bookkeeping carried on the report aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRunState {
    pub last_run_status: Option<RunStatus>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_error: Option<String>,
    pub runs_count: u64,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMart {
    pub id: DataMartId,
    pub title: String,
    pub storage_type: StorageType,
    pub definition: DataMartDefinition,
    pub config: StorageConfig,
    pub credentials: StorageCredentials,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<DataMartSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: DestinationId,
    pub title: String,
    pub destination_type: DestinationType,
    pub credentials: DestinationCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub data_mart_id: DataMartId,
    pub destination_id: DestinationId,
    pub destination_config: DestinationConfig,
    #[serde(default)]
    pub run: ReportRunState,
}

/// A report hydrated with the data mart it reads and the destination it
/// writes to. Readers and writers are prepared against this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub report: Report,
    pub data_mart: DataMart,
    pub destination: Destination,
}

impl ReportContext {
    #[must_use]
    pub fn report_id(&self) -> &ReportId {
        &self.report.id
    }

    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        self.data_mart.storage_type
    }

    #[must_use]
    pub fn destination_type(&self) -> DestinationType {
        self.destination.destination_type
    }
}

/// A prepared reader persisted for pull-based consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedReaderEntry {
    pub id: String,
    pub report_id: ReportId,
    pub data_description: ReportDataDescription,
    pub reader_state: Option<ReaderState>,
    pub storage_type: StorageType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedReaderEntry {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
