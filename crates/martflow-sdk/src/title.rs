//! Human titles derived from data-mart definitions.

use martflow_types::definition::DataMartDefinition;

/// Title used when nothing recognizable can be derived.
pub const FALLBACK_TITLE: &str = "Custom query";

/// Default title for a definition: the last identifier segment in words,
/// or the first source table of free-form SQL.
#[must_use]
pub fn default_title(definition: &DataMartDefinition) -> String {
    match definition {
        DataMartDefinition::Table { fully_qualified_name }
        | DataMartDefinition::View { fully_qualified_name } => humanize_identifier(fully_qualified_name),
        DataMartDefinition::Connector { connector } => {
            let table = humanize_identifier(&connector.fully_qualified_name);
            if connector.source.trim().is_empty() {
                table
            } else {
                format!("{} {table}", connector.source.trim())
            }
        }
        DataMartDefinition::TablePattern { pattern } => {
            humanize_identifier(pattern.trim_end_matches(['*', '_', '-']))
        }
        DataMartDefinition::Sql { sql_query } => {
            first_source_table(sql_query).map_or_else(|| FALLBACK_TITLE.to_string(), humanize_identifier)
        }
    }
}

/// `acme.sales.daily_orders` -> `Daily Orders`.
#[must_use]
pub fn humanize_identifier(name: &str) -> String {
    let last = name
        .rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches(|c| c == '`' || c == '"' || c == ' ');
    let title = last
        .split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Identifier following the first top-level `FROM`, unless it opens a
/// subquery.
fn first_source_table(sql: &str) -> Option<&str> {
    let mut tokens = sql.split_whitespace();
    tokens.find(|t| t.eq_ignore_ascii_case("from"))?;
    let table = tokens.next()?.trim_end_matches([',', ';', ')']);
    if table.starts_with('(') || table.is_empty() {
        None
    } else {
        Some(table)
    }
}
