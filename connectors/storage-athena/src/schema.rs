//! Schema introspection, reconciliation, and parsing.

use std::collections::HashSet;

use martflow_sdk::prelude::*;
use martflow_sdk::reconcile::merge_schemas;
use martflow_types::schema::{AthenaField, AthenaFieldType, AthenaSchema};

use crate::api::{ApiColumn, AthenaApi, Session};
use crate::execution::{remove_output, run_to_completion, OutputLocation};
use crate::query::render;
use crate::{call, session, AthenaOptions, AthenaStorage};

pub(crate) fn convert_columns(columns: &[ApiColumn]) -> Vec<AthenaField> {
    columns
        .iter()
        .map(|column| {
            let field_type = AthenaFieldType::from_native(&column.column_type).unwrap_or_else(|| {
                tracing::warn!(
                    field = %column.name,
                    native_type = %column.column_type,
                    "Unknown Athena type, treating as STRING"
                );
                AthenaFieldType::String
            });
            AthenaField::new(&column.name, field_type)
        })
        .collect()
}

/// Result columns of `definition`, read from the metadata of a `LIMIT 0`
/// query whose output is removed afterwards.
pub(crate) async fn introspect(
    api: &dyn AthenaApi,
    options: AthenaOptions,
    session: &Session,
    definition: &DataMartDefinition,
) -> BackendResult<Vec<ApiColumn>> {
    let sql = render(definition, QueryOptions::schema_only())?;
    let output = OutputLocation::fresh(&session.output_bucket);
    let columns = async {
        let done = run_to_completion(api, options, session, &sql, &output).await?;
        let page = call(options.retry, "query_results", || {
            api.query_results(session, &done.execution_id, None, 1)
        })
        .await?;
        Ok::<_, BackendError>(page.columns)
    }
    .await;
    if let Err(e) = remove_output(api, options, session, &output).await {
        tracing::warn!(prefix = %output.prefix, error = %e, "Failed to remove schema probe output");
    }
    columns
}

#[async_trait]
impl SchemaProvider for AthenaStorage {
    async fn get_actual_data_mart_schema(
        &self,
        definition: &DataMartDefinition,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<DataMartSchema> {
        let session = session(config, credentials)?;
        let columns = introspect(self.api.as_ref(), self.options, &session, definition).await?;
        Ok(DataMartSchema::Athena(AthenaSchema {
            fields: convert_columns(&columns),
        }))
    }
}

impl SchemaMerger for AthenaStorage {
    fn merge_schemas(
        &self,
        existing: Option<&DataMartSchema>,
        fresh: DataMartSchema,
    ) -> BackendResult<DataMartSchema> {
        let fresh = AthenaSchema::try_from(fresh)?;
        merge_schemas(existing, DataMartSchema::Athena(fresh))
    }
}

impl SchemaParser for AthenaStorage {
    fn parse(&self, payload: &serde_json::Value) -> BackendResult<DataMartSchema> {
        let invalid = |field: &str, message: String| {
            BackendError::validation("INVALID_SCHEMA", vec![FieldError::new(field, message)])
        };
        let schema: DataMartSchema =
            serde_json::from_value(payload.clone()).map_err(|e| invalid("schema", e.to_string()))?;
        let DataMartSchema::Athena(athena) = &schema else {
            return Err(invalid(
                "type",
                format!("expected ATHENA schema, got {}", schema.storage_type()),
            ));
        };

        let mut seen = HashSet::new();
        let errors: Vec<FieldError> = athena
            .fields
            .iter()
            .enumerate()
            .filter_map(|(i, field)| {
                if field.name.trim().is_empty() {
                    Some(FieldError::new(format!("fields[{i}].name"), "must not be empty"))
                } else if !seen.insert(field.name.to_ascii_lowercase()) {
                    // Athena identifiers are case-insensitive.
                    Some(FieldError::new(
                        format!("fields[{i}].name"),
                        format!("duplicate field name '{}'", field.name),
                    ))
                } else {
                    None
                }
            })
            .collect();
        if errors.is_empty() {
            Ok(schema)
        } else {
            Err(BackendError::validation("INVALID_SCHEMA", errors))
        }
    }
}
