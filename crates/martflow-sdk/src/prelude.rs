//! Everything a connector crate needs to implement and register capabilities.

pub use async_trait::async_trait;

pub use crate::api::{with_retry, ApiError, ApiErrorKind, RetryPolicy};
pub use crate::capability::*;
pub use crate::registry::CapabilitiesBuilder;
pub use crate::resolver::BackendComponent;

pub use martflow_types::backend::{DestinationType, StorageType};
pub use martflow_types::config::*;
pub use martflow_types::definition::{DataMartDefinition, QueryOptions};
pub use martflow_types::entity::ReportContext;
pub use martflow_types::error::{BackendError, FieldError};
pub use martflow_types::reader_state::ReaderState;
pub use martflow_types::report::{ReportDataBatch, ReportDataDescription, ReportDataHeader, Row};
pub use martflow_types::schema::{DataMartSchema, FieldStatus, NativeFieldType};
pub use martflow_types::validation::{SqlDryRunResult, ValidationResult};
