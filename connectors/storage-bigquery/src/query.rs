//! GoogleSQL rendering of data-mart definitions.

use martflow_sdk::prelude::*;
use martflow_sdk::sql::{quote_qualified_name, select_all, split_qualified_name, wrap_free_form, QuoteStyle};
use martflow_sdk::title::default_title;
use martflow_types::reader_state::TableReference;

use crate::{BigQueryStorage, MAX_NAME_SEGMENTS};

/// Render `definition` as a GoogleSQL query.
pub(crate) fn render(definition: &DataMartDefinition, options: QueryOptions) -> BackendResult<String> {
    let relation = match definition {
        DataMartDefinition::Table {
            fully_qualified_name,
        }
        | DataMartDefinition::View {
            fully_qualified_name,
        } => quote_qualified_name(
            "fully_qualified_name",
            fully_qualified_name,
            QuoteStyle::Backtick,
            MAX_NAME_SEGMENTS,
        )?,
        DataMartDefinition::Connector { connector } => quote_qualified_name(
            "connector.fully_qualified_name",
            &connector.fully_qualified_name,
            QuoteStyle::Backtick,
            MAX_NAME_SEGMENTS,
        )?,
        // Wildcard tables must be quoted as one identifier.
        DataMartDefinition::TablePattern { pattern } => {
            let segments =
                split_qualified_name("pattern", pattern, QuoteStyle::Backtick, MAX_NAME_SEGMENTS)?;
            QuoteStyle::Backtick.quote(&segments.join("."))
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
    Ok(select_all(&relation, options))
}

/// Table addressed directly by a definition, if any. Two-segment names are
/// resolved against `default_project`.
pub(crate) fn direct_table(
    definition: &DataMartDefinition,
    default_project: &str,
) -> BackendResult<Option<TableReference>> {
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
        DataMartDefinition::TablePattern { .. } | DataMartDefinition::Sql { .. } => {
            return Ok(None)
        }
    };
    let segments = split_qualified_name(field, name, QuoteStyle::Backtick, MAX_NAME_SEGMENTS)?;
    match segments.as_slice() {
        [project, dataset, table] => Ok(Some(TableReference {
            project_id: (*project).to_string(),
            dataset_id: (*dataset).to_string(),
            table_id: (*table).to_string(),
        })),
        [dataset, table] => Ok(Some(TableReference {
            project_id: default_project.to_string(),
            dataset_id: (*dataset).to_string(),
            table_id: (*table).to_string(),
        })),
        _ => Err(BackendError::validation(
            "INVALID_IDENTIFIER",
            vec![FieldError::new(
                field,
                format!("'{name}' must name a dataset and a table"),
            )],
        )),
    }
}

impl QueryBuilder for BigQueryStorage {
    fn build_query(
        &self,
        definition: &DataMartDefinition,
        options: QueryOptions,
    ) -> BackendResult<String> {
        render(definition, options)
    }
}

impl TitleGenerator for BigQueryStorage {
    fn generate_title(&self, definition: &DataMartDefinition) -> String {
        default_title(definition)
    }
}
