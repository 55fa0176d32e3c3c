//! Store trait definition.
//!
//! [`ReportStore`] is the persistence contract the engine depends on. Model
//! types live in [`martflow_types::entity`].

use chrono::{DateTime, Utc};
use martflow_types::config::DestinationCredentials;
use martflow_types::entity::{
    CachedReaderEntry, DataMart, DataMartId, Destination, DestinationId, Report, ReportContext,
    ReportId, RunStatus,
};
use martflow_types::schema::DataMartSchema;

use crate::error;

/// Storage contract for martflow aggregates.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn ReportStore>`.
pub trait ReportStore: Send + Sync {
    /// Insert or replace a data mart.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn save_data_mart(&self, data_mart: &DataMart) -> error::Result<()>;

    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_data_mart(&self, id: &DataMartId) -> error::Result<Option<DataMart>>;

    /// Replace the persisted schema. Returns `false` when the data mart does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn update_data_mart_schema(
        &self,
        id: &DataMartId,
        schema: &DataMartSchema,
    ) -> error::Result<bool>;

    /// Insert or replace a destination.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn save_destination(&self, destination: &Destination) -> error::Result<()>;

    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_destination(&self, id: &DestinationId) -> error::Result<Option<Destination>>;

    /// Replace stored credentials. Returns `false` when the destination does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn update_destination_credentials(
        &self,
        id: &DestinationId,
        credentials: &DestinationCredentials,
    ) -> error::Result<bool>;

    /// Insert a report, or update its definition fields. Run bookkeeping of
    /// an existing report is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn save_report(&self, report: &Report) -> error::Result<()>;

    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_report(&self, id: &ReportId) -> error::Result<Option<Report>>;

    /// All reports, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_reports(&self) -> error::Result<Vec<Report>>;

    /// Load a report with its data mart and destination. Returns `None` when
    /// any of the three is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn get_report_context(&self, id: &ReportId) -> error::Result<Option<ReportContext>>;

    /// Atomically move a report into `RUNNING`.
    ///
    /// Returns `false`, changing nothing, when the report is already running
    /// or does not exist. On success the run counter is incremented, the
    /// last-run timestamp stamped, and the last error cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn try_start_run(&self, id: &ReportId, started_at: DateTime<Utc>) -> error::Result<bool>;

    /// Record the terminal status of the current run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn complete_run(
        &self,
        id: &ReportId,
        status: RunStatus,
        last_error: Option<&str>,
    ) -> error::Result<()>;

    /// Persist a prepared-reader cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn insert_cache_entry(&self, entry: &CachedReaderEntry) -> error::Result<()>;

    /// Newest entry for `report` with `expires_at >= now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn find_newest_unexpired(
        &self,
        report: &ReportId,
        now: DateTime<Utc>,
    ) -> error::Result<Option<CachedReaderEntry>>;

    /// Every entry with `expires_at < now`, oldest expiry first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn find_expired(&self, now: DateTime<Utc>) -> error::Result<Vec<CachedReaderEntry>>;

    /// Delete every entry with `expires_at < now`. Returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn delete_expired(&self, now: DateTime<Utc>) -> error::Result<u64>;

    /// All cache entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn list_cache_entries(&self) -> error::Result<Vec<CachedReaderEntry>>;
}
