//! Schema introspection, reconciliation, and parsing.

use std::collections::HashSet;

use martflow_sdk::prelude::*;
use martflow_sdk::reconcile::merge_bigquery;
use martflow_types::schema::{BigQueryField, BigQueryFieldMode, BigQueryFieldType, BigQuerySchema};

use crate::api::{ApiField, BigQueryApi, Session};
use crate::query::{direct_table, render};
use crate::{call, session, BigQueryStorage};

/// Map API columns to schema fields. Unknown types become `STRING`.
pub(crate) fn convert_fields(columns: &[ApiField]) -> Vec<BigQueryField> {
    columns.iter().map(convert_field).collect()
}

fn convert_field(column: &ApiField) -> BigQueryField {
    let field_type = BigQueryFieldType::from_native(&column.field_type).unwrap_or_else(|| {
        tracing::warn!(
            field = %column.name,
            native_type = %column.field_type,
            "Unknown BigQuery type, treating as STRING"
        );
        BigQueryFieldType::String
    });
    let mode = column
        .mode
        .as_deref()
        .and_then(BigQueryFieldMode::from_native)
        .unwrap_or_default();
    let mut field = BigQueryField::new(&column.name, field_type).with_mode(mode);
    field.description = column.description.clone().filter(|d| !d.trim().is_empty());
    field.fields = convert_fields(&column.fields);
    field
}

/// Result columns of `definition`: table metadata for directly addressed
/// tables, a schema-only query otherwise.
pub(crate) async fn introspect(
    api: &dyn BigQueryApi,
    retry: RetryPolicy,
    session: &Session,
    definition: &DataMartDefinition,
) -> BackendResult<Vec<ApiField>> {
    match direct_table(definition, &session.project_id)? {
        Some(table) => call(retry, "table_schema", || api.table_schema(session, &table)).await,
        None => {
            let sql = render(definition, QueryOptions::schema_only())?;
            call(retry, "query_schema", || api.query_schema(session, &sql)).await
        }
    }
}

#[async_trait]
impl SchemaProvider for BigQueryStorage {
    async fn get_actual_data_mart_schema(
        &self,
        definition: &DataMartDefinition,
        config: &StorageConfig,
        credentials: &StorageCredentials,
    ) -> BackendResult<DataMartSchema> {
        let session = session(config, credentials)?;
        let columns = introspect(self.api.as_ref(), self.retry, &session, definition).await?;
        tracing::debug!(
            definition = definition.kind(),
            columns = columns.len(),
            "BigQuery schema introspected"
        );
        Ok(DataMartSchema::BigQuery(BigQuerySchema {
            fields: convert_fields(&columns),
        }))
    }
}

impl SchemaMerger for BigQueryStorage {
    fn merge_schemas(
        &self,
        existing: Option<&DataMartSchema>,
        fresh: DataMartSchema,
    ) -> BackendResult<DataMartSchema> {
        let fresh = BigQuerySchema::try_from(fresh)?;
        let existing = match existing {
            Some(DataMartSchema::BigQuery(schema)) => Some(schema),
            Some(other) => {
                return Err(BackendError::business_rule(
                    "SCHEMA_BACKEND_MISMATCH",
                    format!("cannot merge BIGQUERY schema into {} schema", other.storage_type()),
                ))
            }
            None => None,
        };
        Ok(DataMartSchema::BigQuery(merge_bigquery(existing, fresh)))
    }
}

impl SchemaParser for BigQueryStorage {
    fn parse(&self, payload: &serde_json::Value) -> BackendResult<DataMartSchema> {
        let schema: DataMartSchema = serde_json::from_value(payload.clone()).map_err(|e| {
            BackendError::validation("INVALID_SCHEMA", vec![FieldError::new("schema", e.to_string())])
        })?;
        let DataMartSchema::BigQuery(parsed) = &schema else {
            return Err(BackendError::validation(
                "INVALID_SCHEMA",
                vec![FieldError::new(
                    "type",
                    format!("expected BIGQUERY schema, got {}", schema.storage_type()),
                )],
            ));
        };
        let mut errors = Vec::new();
        check_level(&parsed.fields, "fields", &mut errors);
        if errors.is_empty() {
            Ok(schema)
        } else {
            Err(BackendError::validation("INVALID_SCHEMA", errors))
        }
    }
}

fn check_level(fields: &[BigQueryField], path: &str, errors: &mut Vec<FieldError>) {
    let mut seen = HashSet::new();
    for (i, field) in fields.iter().enumerate() {
        let here = format!("{path}[{i}]");
        if field.name.trim().is_empty() {
            errors.push(FieldError::new(format!("{here}.name"), "must not be empty"));
        } else if !seen.insert(field.name.as_str()) {
            errors.push(FieldError::new(
                format!("{here}.name"),
                format!("duplicate field name '{}'", field.name),
            ));
        }
        if !field.is_record() && !field.fields.is_empty() {
            errors.push(FieldError::new(
                format!("{here}.fields"),
                "only RECORD fields may have nested fields",
            ));
        }
        check_level(&field.fields, &format!("{here}.fields"), errors);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use martflow_sdk::api::RetryPolicy;
    use martflow_types::schema::FieldStatus;
    use serde_json::json;

    use super::*;
    use crate::testing::{config, credentials, FakeBigQuery};

    fn storage(fake: FakeBigQuery) -> BigQueryStorage {
        BigQueryStorage::new(Arc::new(fake), RetryPolicy::immediate(2))
    }

    #[test]
    fn test_convert_nested_and_unknown_types() {
        let mut address = ApiField::new("address", "STRUCT");
        address.fields = vec![ApiField::new("city", "STRING"), ApiField::new("geo", "RANGE<DATE>")];
        let mut tags = ApiField::new("tags", "STRING");
        tags.mode = Some("REPEATED".into());

        let fields = convert_fields(&[ApiField::new("id", "INT64"), address, tags]);
        assert_eq!(fields[0].field_type, BigQueryFieldType::Integer);
        assert!(fields[1].is_record());
        assert_eq!(fields[1].fields[1].field_type, BigQueryFieldType::String);
        assert_eq!(fields[2].mode, BigQueryFieldMode::Repeated);
    }

    #[tokio::test]
    async fn test_provider_reads_table_metadata() {
        let fake = FakeBigQuery::with_table(
            "acme.sales.orders",
            vec![ApiField::new("id", "INTEGER"), ApiField::new("amount", "NUMERIC")],
            Vec::new(),
        );
        let schema = storage(fake)
            .get_actual_data_mart_schema(
                &DataMartDefinition::Table {
                    fully_qualified_name: "sales.orders".into(),
                },
                &config(),
                &credentials(),
            )
            .await
            .unwrap();
        assert_eq!(schema.field_names(), vec!["id", "amount"]);
    }

    #[tokio::test]
    async fn test_provider_rejects_foreign_config() {
        let err = storage(FakeBigQuery::default())
            .get_actual_data_mart_schema(
                &DataMartDefinition::Sql {
                    sql_query: "SELECT 1".into(),
                },
                &StorageConfig::Athena(AthenaConfig {
                    region: "eu-west-1".into(),
                    output_bucket: "r".into(),
                }),
                &credentials(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, "BACKEND_TYPE_MISMATCH");
    }

    #[test]
    fn test_merger_marks_nested_mismatch_on_parent() {
        let storage = storage(FakeBigQuery::default());
        let stored = DataMartSchema::BigQuery(BigQuerySchema {
            fields: vec![BigQueryField::record(
                "address",
                vec![BigQueryField::new("zip", BigQueryFieldType::Integer)],
            )],
        });
        let fresh = DataMartSchema::BigQuery(BigQuerySchema {
            fields: vec![BigQueryField::record(
                "address",
                vec![BigQueryField::new("zip", BigQueryFieldType::String)],
            )],
        });
        let merged = BigQuerySchema::try_from(storage.merge_schemas(Some(&stored), fresh).unwrap())
            .unwrap();
        assert_eq!(merged.fields[0].status, FieldStatus::ConnectedWithDefinitionMismatch);
        assert_eq!(
            merged.fields[0].fields[0].status,
            FieldStatus::ConnectedWithDefinitionMismatch
        );
    }

    #[test]
    fn test_parser_reports_duplicates_per_level() {
        let payload = json!({
            "type": "BIGQUERY",
            "fields": [
                {"name": "id", "type": "INTEGER"},
                {"name": "id", "type": "STRING"},
                {"name": "address", "type": "RECORD", "fields": [
                    {"name": "id", "type": "STRING"},
                    {"name": "city", "type": "STRING"},
                    {"name": "city", "type": "STRING"}
                ]}
            ]
        });
        let err = storage(FakeBigQuery::default()).parse(&payload).unwrap_err();
        let fields: Vec<_> = err.field_errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["fields[1].name", "fields[2].fields[2].name"]);
    }

    #[test]
    fn test_parser_rejects_other_backend() {
        let payload = json!({"type": "ATHENA", "fields": []});
        let err = storage(FakeBigQuery::default()).parse(&payload).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.field_errors[0].field, "type");
    }
}
