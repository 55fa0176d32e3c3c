//! Abstract data-mart definitions.
//!
//! A definition says *what* a data mart selects; each storage's query builder
//! decides *how* that is rendered in the backend's SQL dialect.

use serde::{Deserialize, Serialize};

/// What a data mart reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataMartDefinition {
    /// A physical table, e.g. `project.dataset.orders`.
    Table { fully_qualified_name: String },
    /// A view, addressed like a table.
    View { fully_qualified_name: String },
    /// Free-form SQL passed through verbatim.
    Sql { sql_query: String },
    /// A wildcard over sharded tables, e.g. `project.dataset.events_*`.
    TablePattern { pattern: String },
    /// A table populated by an ingestion connector.
    Connector { connector: ConnectorDefinition },
}

impl DataMartDefinition {
    /// Short name of the variant, for logs and error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Table { .. } => "TABLE",
            Self::View { .. } => "VIEW",
            Self::Sql { .. } => "SQL",
            Self::TablePattern { .. } => "TABLE_PATTERN",
            Self::Connector { .. } => "CONNECTOR",
        }
    }
}

/// Connector-sourced table reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDefinition {
    /// Source system the connector ingests from (e.g. `"FacebookAds"`).
    pub source: String,
    /// Table the connector writes into.
    pub fully_qualified_name: String,
}

/// Rendering options for [`DataMartDefinition`] queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Row limit; `Some(0)` requests a schema-only query.
    pub limit: Option<u64>,
}

impl QueryOptions {
    #[must_use]
    pub fn with_limit(limit: u64) -> Self {
        Self { limit: Some(limit) }
    }

    /// Options for a query that returns column metadata and no rows.
    #[must_use]
    pub fn schema_only() -> Self {
        Self::with_limit(0)
    }
}
