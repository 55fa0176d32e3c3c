//! Schema reconciliation.
//!
//! Merges a stored field list with a freshly introspected one:
//!
//! - a field in both keeps its stored definition and metadata and becomes
//!   `CONNECTED` when the native definition is unchanged, otherwise
//!   `CONNECTED_WITH_DEFINITION_MISMATCH`;
//! - a field only in the stored list becomes `DISCONNECTED`;
//! - a field only in the fresh list is appended as `CONNECTED`.
//!
//! Record fields recurse. A parent whose children are not all `CONNECTED`
//! is a mismatch. A field flipping between record and non-record is a
//! mismatch and its stored children are disconnected.
//!
//! Output order is stored order followed by new fields in fresh order.

use std::collections::{HashMap, HashSet};

use martflow_types::error::BackendError;
use martflow_types::schema::{
    AthenaField, AthenaSchema, BigQueryField, BigQuerySchema, DataMartSchema, FieldStatus,
};

/// A schema field the merge engine can reconcile.
pub trait ReconcilableField: Clone {
    fn name(&self) -> &str;

    fn status(&self) -> FieldStatus;

    fn set_status(&mut self, status: FieldStatus);

    /// Native type (and mode, where the backend has one) are equal.
    fn same_definition(&self, other: &Self) -> bool;

    fn is_record(&self) -> bool {
        false
    }

    fn children(&self) -> &[Self] {
        &[]
    }

    fn set_children(&mut self, _children: Vec<Self>) {}
}

impl ReconcilableField for BigQueryField {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> FieldStatus {
        self.status
    }

    fn set_status(&mut self, status: FieldStatus) {
        self.status = status;
    }

    fn same_definition(&self, other: &Self) -> bool {
        self.field_type == other.field_type && self.mode == other.mode
    }

    fn is_record(&self) -> bool {
        BigQueryField::is_record(self)
    }

    fn children(&self) -> &[Self] {
        &self.fields
    }

    fn set_children(&mut self, children: Vec<Self>) {
        self.fields = children;
    }
}

impl ReconcilableField for AthenaField {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> FieldStatus {
        self.status
    }

    fn set_status(&mut self, status: FieldStatus) {
        self.status = status;
    }

    fn same_definition(&self, other: &Self) -> bool {
        self.field_type == other.field_type
    }
}

/// Merge a stored field list with a fresh one. With no stored list the
/// fresh list is returned unchanged.
#[must_use]
pub fn merge_fields<F: ReconcilableField>(existing: Option<&[F]>, fresh: Vec<F>) -> Vec<F> {
    match existing {
        None => fresh,
        Some(existing) => merge_level(existing, &fresh),
    }
}

fn merge_level<F: ReconcilableField>(existing: &[F], fresh: &[F]) -> Vec<F> {
    let fresh_by_name: HashMap<&str, &F> = fresh.iter().map(|f| (f.name(), f)).collect();
    let mut merged = Vec::with_capacity(existing.len().max(fresh.len()));

    for stored in existing {
        let mut field = stored.clone();
        match fresh_by_name.get(stored.name()) {
            None => disconnect(&mut field),
            Some(current) if stored.is_record() != current.is_record() => {
                field.set_status(FieldStatus::ConnectedWithDefinitionMismatch);
                let mut children = stored.children().to_vec();
                children.iter_mut().for_each(disconnect);
                field.set_children(children);
            }
            Some(current) if stored.is_record() => {
                let children = merge_level(stored.children(), current.children());
                let children_connected = children
                    .iter()
                    .all(|c| c.status() == FieldStatus::Connected);
                field.set_status(if stored.same_definition(current) && children_connected {
                    FieldStatus::Connected
                } else {
                    FieldStatus::ConnectedWithDefinitionMismatch
                });
                field.set_children(children);
            }
            Some(current) => field.set_status(if stored.same_definition(current) {
                FieldStatus::Connected
            } else {
                FieldStatus::ConnectedWithDefinitionMismatch
            }),
        }
        merged.push(field);
    }

    let known: HashSet<&str> = existing.iter().map(ReconcilableField::name).collect();
    for added in fresh.iter().filter(|f| !known.contains(f.name())) {
        let mut field = added.clone();
        connect(&mut field);
        merged.push(field);
    }
    merged
}

fn disconnect<F: ReconcilableField>(field: &mut F) {
    field.set_status(FieldStatus::Disconnected);
    if !field.children().is_empty() {
        let mut children = field.children().to_vec();
        children.iter_mut().for_each(disconnect);
        field.set_children(children);
    }
}

fn connect<F: ReconcilableField>(field: &mut F) {
    field.set_status(FieldStatus::Connected);
    if !field.children().is_empty() {
        let mut children = field.children().to_vec();
        children.iter_mut().for_each(connect);
        field.set_children(children);
    }
}

// ---------------------------------------------------------------------------
// Schema-level entry points
// ---------------------------------------------------------------------------

/// Merge BigQuery schemas.
#[must_use]
pub fn merge_bigquery(existing: Option<&BigQuerySchema>, fresh: BigQuerySchema) -> BigQuerySchema {
    BigQuerySchema {
        fields: merge_fields(existing.map(|s| s.fields.as_slice()), fresh.fields),
    }
}

/// Merge Athena schemas.
#[must_use]
pub fn merge_athena(existing: Option<&AthenaSchema>, fresh: AthenaSchema) -> AthenaSchema {
    AthenaSchema {
        fields: merge_fields(existing.map(|s| s.fields.as_slice()), fresh.fields),
    }
}

/// Merge two tagged schemas of the same backend.
///
/// # Errors
///
/// Fails with a business-rule error when the schemas belong to different
/// backends.
pub fn merge_schemas(
    existing: Option<&DataMartSchema>,
    fresh: DataMartSchema,
) -> Result<DataMartSchema, BackendError> {
    match (existing, fresh) {
        (None, fresh) => Ok(fresh),
        (Some(DataMartSchema::BigQuery(stored)), DataMartSchema::BigQuery(fresh)) => {
            Ok(DataMartSchema::BigQuery(merge_bigquery(Some(stored), fresh)))
        }
        (Some(DataMartSchema::Athena(stored)), DataMartSchema::Athena(fresh)) => {
            Ok(DataMartSchema::Athena(merge_athena(Some(stored), fresh)))
        }
        (Some(stored), fresh) => Err(BackendError::business_rule(
            "SCHEMA_BACKEND_MISMATCH",
            format!(
                "cannot merge {} schema into {} schema",
                fresh.storage_type(),
                stored.storage_type()
            ),
        )),
    }
}
