//! SQL text helpers shared by storage query builders.

use martflow_types::definition::QueryOptions;
use martflow_types::error::{BackendError, FieldError};

/// Identifier quoting convention of a SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `` `name` ``, embedded backslashes and backticks backslash-escaped.
    Backtick,
    /// `"name"`, embedded quotes doubled.
    DoubleQuote,
}

impl QuoteStyle {
    fn quote_char(self) -> char {
        match self {
            Self::Backtick => '`',
            Self::DoubleQuote => '"',
        }
    }

    /// Quote one identifier segment.
    #[must_use]
    pub fn quote(self, segment: &str) -> String {
        let q = self.quote_char();
        let escaped = match self {
            Self::Backtick => segment.replace('\\', "\\\\").replace('`', "\\`"),
            Self::DoubleQuote => segment.replace('"', "\"\""),
        };
        format!("{q}{escaped}{q}")
    }
}

/// Split a dotted name into trimmed segments, dropping surrounding quotes
/// already present in the input.
///
/// # Errors
///
/// Returns a validation error for an empty name, an empty segment, or more
/// than `max_segments` segments.
pub fn split_qualified_name<'a>(
    field: &str,
    name: &'a str,
    style: QuoteStyle,
    max_segments: usize,
) -> Result<Vec<&'a str>, BackendError> {
    let q = style.quote_char();
    let segments: Vec<&str> = name
        .split('.')
        .map(|s| {
            let s = s.trim();
            s.strip_prefix(q)
                .and_then(|s| s.strip_suffix(q))
                .unwrap_or(s)
        })
        .collect();

    if name.trim().is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(BackendError::validation(
            "INVALID_IDENTIFIER",
            vec![FieldError::new(field, format!("'{name}' is not a valid qualified name"))],
        ));
    }
    if segments.len() > max_segments {
        return Err(BackendError::validation(
            "INVALID_IDENTIFIER",
            vec![FieldError::new(
                field,
                format!("'{name}' has more than {max_segments} segments"),
            )],
        ));
    }
    Ok(segments)
}

/// Quote every segment of a dotted name.
///
/// # Errors
///
/// See [`split_qualified_name`].
pub fn quote_qualified_name(
    field: &str,
    name: &str,
    style: QuoteStyle,
    max_segments: usize,
) -> Result<String, BackendError> {
    Ok(split_qualified_name(field, name, style, max_segments)?
        .into_iter()
        .map(|s| style.quote(s))
        .collect::<Vec<_>>()
        .join("."))
}

/// `SELECT *` over a quoted relation, honoring the row limit.
#[must_use]
pub fn select_all(relation: &str, options: QueryOptions) -> String {
    apply_limit(format!("SELECT * FROM {relation}"), options)
}

/// Append a `LIMIT` clause when one is requested.
#[must_use]
pub fn apply_limit(query: String, options: QueryOptions) -> String {
    match options.limit {
        Some(limit) => format!("{query} LIMIT {limit}"),
        None => query,
    }
}

/// Free-form SQL, verbatim unless a limit is requested. A limited query is
/// wrapped in a subquery with the body on its own lines, so a trailing line
/// comment cannot swallow the closing paren.
#[must_use]
pub fn wrap_free_form(sql: &str, options: QueryOptions) -> String {
    match options.limit {
        Some(_) => {
            let body = sql.trim().trim_end_matches(';').trim_end();
            apply_limit(format!("SELECT * FROM (\n{body}\n)"), options)
        }
        None => sql.to_string(),
    }
}
