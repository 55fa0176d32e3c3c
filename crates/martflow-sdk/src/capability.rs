//! Capability contracts implemented once per storage or destination backend.
//!
//! Every capability is `Send + Sync`; stateless ones are registered as singletons.
//! [`ReportReader`] and [`ReportWriter`] accumulate per-run state and are
//! always registered as transient factories.
//!
//! Validators report reachability problems inside their [`ValidationResult`]
//! and reserve `Err` for caller-contract violations such as a payload of the
//! wrong backend type.

use async_trait::async_trait;
use martflow_types::backend::{DestinationType, StorageType};
use martflow_types::config::{
    DestinationConfig, DestinationCredentials, StorageConfig, StorageCredentials,
};
use martflow_types::definition::{DataMartDefinition, QueryOptions};
use martflow_types::entity::ReportContext;
use martflow_types::error::BackendError;
use martflow_types::reader_state::ReaderState;
use martflow_types::report::{ReportDataBatch, ReportDataDescription, ReportDataHeader};
use martflow_types::schema::DataMartSchema;
use martflow_types::validation::{SqlDryRunResult, ValidationResult};

use crate::resolver::BackendComponent;

pub type BackendResult<T> = Result<T, BackendError>;

// ---------------------------------------------------------------------------
// Storage capabilities
// ---------------------------------------------------------------------------

/// Live reachability check against a warehouse.
#[async_trait]
pub trait StorageAccessValidator: BackendComponent<Kind = StorageType> + Send + Sync {
    async fn validate(
        &self,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<ValidationResult>;
}

/// Renders backend-native query text for a data-mart definition.
pub trait QueryBuilder: BackendComponent<Kind = StorageType> + Send + Sync {
    /// # Errors
    ///
    /// Fails with a business-rule error for definition variants the backend
    /// cannot express, and a validation error for malformed identifiers.
    fn build_query(
        &self,
        definition: &DataMartDefinition,
        options: QueryOptions,
    ) -> BackendResult<String>;
}

/// Introspects the schema the definition currently produces.
#[async_trait]
pub trait SchemaProvider: BackendComponent<Kind = StorageType> + Send + Sync {
    async fn get_actual_data_mart_schema(
        &self,
        definition: &DataMartDefinition,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<DataMartSchema>;
}

/// Reconciles a stored schema with a freshly introspected one.
pub trait SchemaMerger: BackendComponent<Kind = StorageType> + Send + Sync {
    /// # Errors
    ///
    /// Fails when either schema belongs to another backend.
    fn merge_schemas(
        &self,
        existing: Option<&DataMartSchema>,
        fresh: DataMartSchema,
    ) -> BackendResult<DataMartSchema>;
}

/// Parses a persisted schema payload.
pub trait SchemaParser: BackendComponent<Kind = StorageType> + Send + Sync {
    /// # Errors
    ///
    /// Fails with a validation error carrying field-level details.
    fn parse(&self, payload: &serde_json::Value) -> BackendResult<DataMartSchema>;
}

/// Checks SQL without materializing results.
#[async_trait]
pub trait SqlDryRunExecutor: BackendComponent<Kind = StorageType> + Send + Sync {
    async fn execute(
        &self,
        credentials: &StorageCredentials,
        config: &StorageConfig,
        sql: &str,
    ) -> BackendResult<SqlDryRunResult>;
}

pub trait TitleGenerator: BackendComponent<Kind = StorageType> + Send + Sync {
    fn generate_title(&self, definition: &DataMartDefinition) -> String;
}

/// Paginated reader for one report run.
///
/// Call order is `prepare_report_data`, then any number of
/// `read_report_data_batch` calls until the cursor is `None`, then
/// `finalize`. A reader can instead be re-attached to an executed query with
/// `init_from_state` after `prepare_report_data`.
#[async_trait]
pub trait ReportReader: BackendComponent<Kind = StorageType> + Send + Sync {
    async fn prepare_report_data(
        &mut self,
        context: &ReportContext,
    ) -> BackendResult<ReportDataDescription>;

    /// Read the page at `cursor`; `None` reads the first page.
    async fn read_report_data_batch(
        &mut self,
        cursor: Option<&str>,
        max_rows: Option<usize>,
    ) -> BackendResult<ReportDataBatch>;

    /// Release backend-side resources held by the read session.
    async fn finalize(&mut self) -> BackendResult<()>;

    /// Snapshot sufficient to re-attach without re-running the query.
    fn state(&self) -> Option<ReaderState>;

    /// # Errors
    ///
    /// Fails when `state` belongs to another backend.
    fn init_from_state(
        &mut self,
        state: ReaderState,
        headers: Vec<ReportDataHeader>,
    ) -> BackendResult<()>;
}

// ---------------------------------------------------------------------------
// Destination capabilities
// ---------------------------------------------------------------------------

/// Live check that the destination accepts writes for a report config.
#[async_trait]
pub trait DestinationAccessValidator: BackendComponent<Kind = DestinationType> + Send + Sync {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
        config: &DestinationConfig,
    ) -> BackendResult<ValidationResult>;
}

/// Structural and liveness check of destination credentials alone.
#[async_trait]
pub trait CredentialsValidator: BackendComponent<Kind = DestinationType> + Send + Sync {
    async fn validate(&self, credentials: &DestinationCredentials)
        -> BackendResult<ValidationResult>;
}

/// Injects backend-managed secrets into user-supplied credentials.
pub trait CredentialsProcessor: BackendComponent<Kind = DestinationType> + Send + Sync {
    /// `existing` is the stored credentials on the update path; managed
    /// secrets found there are carried forward.
    ///
    /// # Errors
    ///
    /// Fails when a payload belongs to another backend.
    fn process_credentials(
        &self,
        input: DestinationCredentials,
        existing: Option<&DestinationCredentials>,
    ) -> BackendResult<DestinationCredentials>;
}

/// Replaces the backend-managed secret, leaving every other field intact.
pub trait SecretKeyRotator: BackendComponent<Kind = DestinationType> + Send + Sync {
    /// # Errors
    ///
    /// Fails when the payload belongs to another backend.
    fn rotate_secret_key(
        &self,
        credentials: DestinationCredentials,
    ) -> BackendResult<DestinationCredentials>;
}

/// Push writer for one report run.
///
/// Writers own destination-side provisioning; calling
/// `prepare_to_write_report` again for the same report must leave the
/// destination in the same state.
#[async_trait]
pub trait ReportWriter: BackendComponent<Kind = DestinationType> + Send + Sync {
    async fn prepare_to_write_report(
        &mut self,
        context: &ReportContext,
        description: &ReportDataDescription,
    ) -> BackendResult<()>;

    async fn write_report_data_batch(&mut self, batch: ReportDataBatch) -> BackendResult<()>;

    async fn finalize(&mut self) -> BackendResult<()>;
}
