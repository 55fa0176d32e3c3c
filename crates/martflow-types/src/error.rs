//! Structured error model for backend capability calls.
//!
//! [`BackendError`] carries a classification, a stable code, the raw backend
//! message, and optional field-level details. Construct via the
//! category-specific factory methods.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad classification of a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Structurally invalid config, credentials, schema or definition.
    Validation,
    /// The external system refused the connection or permission.
    Access,
    /// Caller broke a contract (read before prepare, wrong backend payload, ...).
    BusinessRule,
    /// Quota, rate limit or transient failure left after adapter retries.
    Upstream,
    /// Anything else raised inside a backend adapter.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Access => "access",
            Self::BusinessRule => "business_rule",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the offending field (e.g. `fields[2].name`).
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Structured error from a backend capability call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct BackendError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl BackendError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    /// Validation error built from one or more field failures.
    #[must_use]
    pub fn validation(code: impl Into<String>, field_errors: Vec<FieldError>) -> Self {
        let message = field_errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        let mut err = Self::new(ErrorCategory::Validation, code, message);
        err.field_errors = field_errors;
        err
    }

    /// The external system refused access.
    #[must_use]
    pub fn access(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Access, code, message)
    }

    /// Caller-contract violation.
    #[must_use]
    pub fn business_rule(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BusinessRule, code, message)
    }

    /// Upstream failure that survived adapter-level retries.
    #[must_use]
    pub fn upstream(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Upstream, code, message)
    }

    /// Unclassified adapter failure.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.category == ErrorCategory::Validation
    }
}
