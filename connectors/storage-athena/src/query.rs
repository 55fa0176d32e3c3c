//! Trino-dialect rendering of data-mart definitions.

use martflow_sdk::prelude::*;
use martflow_sdk::sql::{quote_qualified_name, select_all, wrap_free_form, QuoteStyle};
use martflow_sdk::title::default_title;

use crate::{AthenaStorage, MAX_NAME_SEGMENTS};

pub(crate) fn render(definition: &DataMartDefinition, options: QueryOptions) -> BackendResult<String> {
    let (field, name) = match definition {
        DataMartDefinition::Table {
            fully_qualified_name,
        }
        | DataMartDefinition::View {
            fully_qualified_name,
        } => ("fully_qualified_name", fully_qualified_name),
        DataMartDefinition::Connector { connector } => {
            ("connector.fully_qualified_name", &connector.fully_qualified_name)
        }
        DataMartDefinition::TablePattern { .. } => {
            return Err(BackendError::business_rule(
                "TABLE_PATTERN_UNSUPPORTED",
                "Athena has no wildcard tables; use a view or a SQL definition",
            ))
        }
        DataMartDefinition::Sql { sql_query } => {
            if sql_query.trim().is_empty() {
                return Err(BackendError::validation(
                    "EMPTY_SQL",
                    vec![FieldError::new("sql_query", "must not be empty")],
                ));
            }
            return Ok(wrap_free_form(sql_query, options));
        }
    };
    let relation = quote_qualified_name(field, name, QuoteStyle::DoubleQuote, MAX_NAME_SEGMENTS)?;
    Ok(select_all(&relation, options))
}

/// `EXPLAIN` wrapper used for dry-runs.
pub(crate) fn explain(sql: &str) -> String {
    format!("EXPLAIN {}", sql.trim().trim_end_matches(';').trim_end())
}

impl QueryBuilder for AthenaStorage {
    fn build_query(
        &self,
        definition: &DataMartDefinition,
        options: QueryOptions,
    ) -> BackendResult<String> {
        render(definition, options)
    }
}

impl TitleGenerator for AthenaStorage {
    fn generate_title(&self, definition: &DataMartDefinition) -> String {
        default_title(definition)
    }
}
