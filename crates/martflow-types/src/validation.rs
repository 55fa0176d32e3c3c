//! Explicit validity objects returned by validators and dry-run executors.
//!
//! Validation and access failures are values, not errors, so callers can
//! branch on them without unwinding.

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Validation check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
}

/// Result of an access or credentials validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Backend-provided diagnostic (e.g. the raw API error text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

impl ValidationResult {
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: ValidationStatus::Success,
            error_message: None,
            reason: None,
            field_errors: Vec::new(),
        }
    }

    /// Live check failed; `reason` carries the backend diagnostic.
    #[must_use]
    pub fn failed(message: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            error_message: Some(message.into()),
            reason,
            field_errors: Vec::new(),
        }
    }

    /// Structural check failed before anything was sent to the backend.
    #[must_use]
    pub fn invalid_fields(field_errors: Vec<FieldError>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            error_message: Some("Invalid configuration".to_string()),
            reason: None,
            field_errors,
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Success
    }
}

/// Outcome of validating SQL without materializing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlDryRunResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Bytes the query would scan, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes_processed: Option<u64>,
}

impl SqlDryRunResult {
    #[must_use]
    pub fn valid(total_bytes_processed: Option<u64>) -> Self {
        Self {
            is_valid: true,
            error: None,
            total_bytes_processed,
        }
    }

    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            total_bytes_processed: None,
        }
    }
}
