//! Data-mart operations dispatched to the data mart's storage backend.

use std::sync::Arc;

use martflow_sdk::registry::Capabilities;
use martflow_sdk::title::default_title;
use martflow_state::ReportStore;
use martflow_types::backend::StorageType;
use martflow_types::definition::{DataMartDefinition, QueryOptions};
use martflow_types::entity::{DataMart, DataMartId};
use martflow_types::schema::DataMartSchema;
use martflow_types::validation::{SqlDryRunResult, ValidationResult};

use crate::errors::ServiceError;
use crate::store;

pub struct DataMartService {
    store: Arc<dyn ReportStore>,
    capabilities: Arc<Capabilities>,
}

impl DataMartService {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, capabilities: Arc<Capabilities>) -> Self {
        Self {
            store,
            capabilities,
        }
    }

    async fn load(&self, id: &DataMartId) -> Result<DataMart, ServiceError> {
        let lookup = id.clone();
        store::call(&self.store, "get_data_mart", move |s| s.get_data_mart(&lookup))
            .await?
            .ok_or_else(|| ServiceError::not_found("data mart", id))
    }

    /// Introspect the live schema, reconcile it with the persisted one, and
    /// persist the result.
    ///
    /// # Errors
    ///
    /// Fails when the data mart is missing, a capability is unregistered,
    /// the backend errors, or the schema cannot be persisted.
    pub async fn actualize_schema(&self, id: &DataMartId) -> Result<DataMartSchema, ServiceError> {
        let data_mart = self.load(id).await?;
        let storage = data_mart.storage_type;
        let provider = self.capabilities.storage.schema_providers.resolve(storage)?;
        let merger = self.capabilities.storage.schema_mergers.resolve(storage)?;

        let fresh = provider
            .get_actual_data_mart_schema(
                &data_mart.definition,
                &data_mart.config,
                &data_mart.credentials,
            )
            .await?;
        let merged = merger.merge_schemas(data_mart.schema.as_ref(), fresh)?;

        let target = id.clone();
        let persisted = merged.clone();
        let updated = store::call(&self.store, "update_data_mart_schema", move |s| {
            s.update_data_mart_schema(&target, &persisted)
        })
        .await?;
        if !updated {
            return Err(ServiceError::not_found("data mart", id));
        }

        tracing::info!(
            data_mart_id = %id,
            storage = %storage,
            fields = merged.field_names().len(),
            "Data mart schema actualized"
        );
        Ok(merged)
    }

    /// Live reachability check of the data mart's storage.
    ///
    /// # Errors
    ///
    /// Fails when the data mart is missing or no validator is registered.
    pub async fn validate_access(&self, id: &DataMartId) -> Result<ValidationResult, ServiceError> {
        let data_mart = self.load(id).await?;
        let validator = self
            .capabilities
            .storage
            .access_validators
            .resolve(data_mart.storage_type)?;
        let result = validator
            .validate(&data_mart.config, &data_mart.credentials)
            .await?;
        tracing::debug!(
            data_mart_id = %id,
            valid = result.is_valid(),
            "Storage access validated"
        );
        Ok(result)
    }

    /// Check `sql` against the data mart's storage without running it.
    ///
    /// # Errors
    ///
    /// Fails when the data mart is missing or no executor is registered.
    pub async fn dry_run(&self, id: &DataMartId, sql: &str) -> Result<SqlDryRunResult, ServiceError> {
        let data_mart = self.load(id).await?;
        let executor = self
            .capabilities
            .storage
            .dry_runners
            .resolve(data_mart.storage_type)?;
        Ok(executor
            .execute(&data_mart.credentials, &data_mart.config, sql)
            .await?)
    }

    /// Human-readable title for a definition. Storages without a registered
    /// generator get the shared default.
    #[must_use]
    pub fn generate_title(&self, definition: &DataMartDefinition, storage: StorageType) -> String {
        match self.capabilities.storage.title_generators.try_resolve(storage) {
            Some(generator) => generator.generate_title(definition),
            None => default_title(definition),
        }
    }

    /// Render the data mart's query in its storage's dialect.
    ///
    /// # Errors
    ///
    /// Fails when the data mart is missing, no builder is registered, or the
    /// definition cannot be rendered.
    pub async fn build_query(
        &self,
        id: &DataMartId,
        limit: Option<u64>,
    ) -> Result<String, ServiceError> {
        let data_mart = self.load(id).await?;
        let builder = self
            .capabilities
            .storage
            .query_builders
            .resolve(data_mart.storage_type)?;
        Ok(builder.build_query(&data_mart.definition, QueryOptions { limit })?)
    }

    /// Parse a persisted schema payload for `storage`.
    ///
    /// # Errors
    ///
    /// Fails when no parser is registered or the payload is invalid.
    pub fn parse_schema(
        &self,
        storage: StorageType,
        payload: &serde_json::Value,
    ) -> Result<DataMartSchema, ServiceError> {
        let parser = self.capabilities.storage.schema_parsers.resolve(storage)?;
        Ok(parser.parse(payload)?)
    }
}
