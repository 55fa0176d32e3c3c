//! Schema and data endpoints backing the Looker Studio connector.
//!
//! Every request carries the report id and the destination secret key.
//! Data is served from the engine's report data cache so repeated polls of
//! one report attach to the same executed query.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use martflow_engine::{CacheError, ReportDataCache};
use martflow_state::ReportStore;
use martflow_types::backend::DestinationType;
use martflow_types::config::LookerStudioCredentials;
use martflow_types::entity::{ReportContext, ReportId};
use martflow_types::error::BackendError;
use martflow_types::report::Row;

use crate::fields::{format_value, LookerField};

#[derive(Debug, thiserror::Error)]
pub enum DataServiceError {
    #[error("invalid secret key")]
    Unauthorized,
    #[error("report {0} not found")]
    ReportNotFound(ReportId),
    #[error("report {report_id} delivers to {destination}, not LOOKER_STUDIO")]
    NotLookerStudio {
        report_id: ReportId,
        destination: DestinationType,
    },
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("report store: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaRequest {
    pub report_id: ReportId,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub report_id: ReportId,
    pub secret_key: String,
    /// Requested field names, in response order. Empty means every field.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub max_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    pub schema: Vec<LookerField>,
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub from_cache: bool,
}

pub struct LookerStudioDataService {
    store: Arc<dyn ReportStore>,
    cache: ReportDataCache,
}

impl LookerStudioDataService {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, cache: ReportDataCache) -> Self {
        Self { store, cache }
    }

    /// # Errors
    ///
    /// Fails when the request does not authenticate or the cache cannot
    /// produce a reader.
    pub async fn get_schema(
        &self,
        request: &SchemaRequest,
    ) -> Result<Vec<LookerField>, DataServiceError> {
        self.authenticate(&request.report_id, &request.secret_key)
            .await?;
        let reader = self
            .cache
            .get_or_create_cached_reader(&request.report_id)
            .await?;
        Ok(reader
            .description()
            .headers
            .iter()
            .map(LookerField::from)
            .collect())
    }

    /// Read one page of the requested fields.
    ///
    /// # Errors
    ///
    /// Fails when the request does not authenticate, names a field the
    /// report does not have, or the read fails.
    pub async fn get_data(&self, request: &DataRequest) -> Result<DataResponse, DataServiceError> {
        self.authenticate(&request.report_id, &request.secret_key)
            .await?;
        let reader = self
            .cache
            .get_or_create_cached_reader(&request.report_id)
            .await?;

        let description = reader.description();
        let positions: Vec<usize> = if request.fields.is_empty() {
            (0..description.headers.len()).collect()
        } else {
            request
                .fields
                .iter()
                .map(|name| {
                    description
                        .position(name)
                        .ok_or_else(|| DataServiceError::UnknownField(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };
        let schema: Vec<LookerField> = positions
            .iter()
            .map(|&i| LookerField::from(&description.headers[i]))
            .collect();

        let batch = reader
            .read_batch(request.cursor.as_deref(), request.max_rows)
            .await?;
        let rows = batch
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .zip(&schema)
                    .map(|(&i, field)| {
                        row.get(i)
                            .map_or(serde_json::Value::Null, |v| format_value(v, field.data_type))
                    })
                    .collect()
            })
            .collect::<Vec<Row>>();

        tracing::debug!(
            report_id = %request.report_id,
            rows = rows.len(),
            fields = schema.len(),
            from_cache = reader.from_cache(),
            "Looker Studio data page served"
        );
        Ok(DataResponse {
            schema,
            rows,
            next_cursor: batch.next_batch_cursor,
            from_cache: reader.from_cache(),
        })
    }

    async fn authenticate(
        &self,
        report_id: &ReportId,
        secret_key: &str,
    ) -> Result<ReportContext, DataServiceError> {
        let store = Arc::clone(&self.store);
        let lookup = report_id.clone();
        let context = tokio::task::spawn_blocking(move || store.get_report_context(&lookup))
            .await
            .map_err(|e| DataServiceError::Store(format!("get_report_context task panicked: {e}")))?
            .map_err(|e| DataServiceError::Store(e.to_string()))?
            .ok_or_else(|| DataServiceError::ReportNotFound(report_id.clone()))?;

        let destination = context.destination_type();
        if destination != DestinationType::LookerStudio {
            return Err(DataServiceError::NotLookerStudio {
                report_id: report_id.clone(),
                destination,
            });
        }
        let credentials: &LookerStudioCredentials = (&context.destination.credentials).try_into()?;
        let authorized = credentials
            .destination_secret_key
            .as_deref()
            .is_some_and(|expected| constant_time_eq(expected.as_bytes(), secret_key.as_bytes()));
        if !authorized {
            tracing::warn!(report_id = %report_id, "Looker Studio request rejected");
            return Err(DataServiceError::Unauthorized);
        }
        Ok(context)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
