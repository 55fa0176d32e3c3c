//! Report data cache for pull-based consumers.
//!
//! A consumer polling the same report repeatedly gets a reader attached to
//! one executed query for the lifetime of a cache entry instead of
//! re-running the query on every poll. Concurrent population for the same
//! report inside this process is coalesced into one backend pass; across
//! processes duplicate population is tolerated and the newest entry wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use martflow_sdk::capability::ReportReader;
use martflow_sdk::registry::Capabilities;
use martflow_state::ReportStore;
use martflow_types::entity::{CachedReaderEntry, ReportContext, ReportId};
use martflow_types::error::BackendError;
use martflow_types::report::{ReportDataBatch, ReportDataDescription};
use tokio::task::JoinHandle;

use crate::errors::CacheError;
use crate::store;

type Population = Shared<BoxFuture<'static, Result<Arc<CachedReader>, CacheError>>>;

// ---------------------------------------------------------------------------
// CachedReader
// ---------------------------------------------------------------------------

/// A prepared reader handed to pull-based consumers.
pub struct CachedReader {
    reader: tokio::sync::Mutex<Box<dyn ReportReader>>,
    description: ReportDataDescription,
    from_cache: bool,
    entry_id: String,
    expires_at: DateTime<Utc>,
}

impl CachedReader {
    #[must_use]
    pub fn description(&self) -> &ReportDataDescription {
        &self.description
    }

    /// `true` when the reader was re-attached to a persisted entry.
    #[must_use]
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Read one page. Concurrent callers are serialized on the reader.
    ///
    /// # Errors
    ///
    /// Propagates the reader's backend error.
    pub async fn read_batch(
        &self,
        cursor: Option<&str>,
        max_rows: Option<usize>,
    ) -> Result<ReportDataBatch, BackendError> {
        let mut reader = self.reader.lock().await;
        reader.read_report_data_batch(cursor, max_rows).await
    }
}

impl fmt::Debug for CachedReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedReader")
            .field("entry_id", &self.entry_id)
            .field("from_cache", &self.from_cache)
            .field("expires_at", &self.expires_at)
            .field("columns", &self.description.headers.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// Outcome of one expiry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Entries whose reader was re-attached and finalized.
    pub finalized: usize,
    /// Entries whose report no longer exists; deleted without finalize.
    pub orphaned: usize,
    /// Entries whose finalize failed; deleted anyway.
    pub failed: usize,
    pub deleted: u64,
}

// ---------------------------------------------------------------------------
// ReportDataCache
// ---------------------------------------------------------------------------

struct CacheInner {
    store: Arc<dyn ReportStore>,
    capabilities: Arc<Capabilities>,
    default_lifetime: Duration,
    in_flight: Mutex<HashMap<ReportId, Population>>,
}

/// TTL-bound, single-flight cache of prepared report readers.
#[derive(Clone)]
pub struct ReportDataCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for ReportDataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportDataCache")
            .field("default_lifetime", &self.inner.default_lifetime)
            .finish_non_exhaustive()
    }
}

/// Removes a report's in-flight entry when its population task ends,
/// including by panic.
struct InFlightGuard {
    cache: ReportDataCache,
    report_id: ReportId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        match self.cache.inner.in_flight.lock() {
            Ok(mut in_flight) => {
                in_flight.remove(&self.report_id);
            }
            Err(_) => tracing::error!(
                report_id = %self.report_id,
                "Single-flight map lock poisoned, in-flight entry not removed"
            ),
        }
    }
}

impl ReportDataCache {
    /// `default_lifetime` applies when the report's destination config
    /// carries no cache lifetime of its own.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReportStore>,
        capabilities: Arc<Capabilities>,
        default_lifetime: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                capabilities,
                default_lifetime,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Return a prepared reader for `report_id`, from cache when an
    /// unexpired entry exists, otherwise by executing the report's query.
    ///
    /// Callers arriving while a population for the same report is in
    /// flight share its result, success or failure.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the report is missing, no reader is
    /// registered for its storage, the backend fails, or the entry cannot
    /// be persisted.
    pub async fn get_or_create_cached_reader(
        &self,
        report_id: &ReportId,
    ) -> Result<Arc<CachedReader>, CacheError> {
        let population = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .map_err(|_| CacheError::LockPoisoned)?;
            if let Some(existing) = in_flight.get(report_id) {
                tracing::debug!(report_id = %report_id, "Joining in-flight cache population");
                existing.clone()
            } else {
                let population = self.start_population(report_id.clone());
                in_flight.insert(report_id.clone(), population.clone());
                population
            }
        };
        population.await
    }

    /// Reports with a population currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().map_or(0, |m| m.len())
    }

    fn start_population(&self, report_id: ReportId) -> Population {
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                cache: cache.clone(),
                report_id: report_id.clone(),
            };
            cache.populate(&report_id).await.map(Arc::new)
        });
        async move {
            handle
                .await
                .map_err(|e| CacheError::Task(e.to_string()))?
        }
        .boxed()
        .shared()
    }

    async fn populate(&self, report_id: &ReportId) -> Result<CachedReader, CacheError> {
        let id = report_id.clone();
        let context = store::call(&self.inner.store, "get_report_context", move |s| {
            s.get_report_context(&id)
        })
        .await?
        .ok_or_else(|| CacheError::ReportNotFound(report_id.clone()))?;

        let id = report_id.clone();
        let now = Utc::now();
        let cached = store::call(&self.inner.store, "find_newest_unexpired", move |s| {
            s.find_newest_unexpired(&id, now)
        })
        .await?;

        let storage = context.storage_type();
        let reader = self
            .inner
            .capabilities
            .storage
            .readers
            .resolve_transient(storage)?;

        match cached {
            Some(entry) if entry.storage_type == storage => {
                Self::restore(reader, &context, entry).await
            }
            Some(entry) => {
                tracing::warn!(
                    report_id = %report_id,
                    entry_id = %entry.id,
                    entry_storage = %entry.storage_type,
                    storage = %storage,
                    "Cached entry belongs to another storage, ignoring"
                );
                self.create(reader, &context).await
            }
            None => self.create(reader, &context).await,
        }
    }

    /// Cache hit: rebind the reader to the report, then re-attach it to the
    /// persisted query state.
    async fn restore(
        mut reader: Box<dyn ReportReader>,
        context: &ReportContext,
        entry: CachedReaderEntry,
    ) -> Result<CachedReader, CacheError> {
        reader.prepare_report_data(context).await?;
        if let Some(state) = entry.reader_state {
            reader.init_from_state(state, entry.data_description.headers.clone())?;
        }
        tracing::debug!(
            report_id = %context.report_id(),
            entry_id = %entry.id,
            "Reader served from cache"
        );
        Ok(CachedReader {
            reader: tokio::sync::Mutex::new(reader),
            description: entry.data_description,
            from_cache: true,
            entry_id: entry.id,
            expires_at: entry.expires_at,
        })
    }

    /// Cache miss: execute the query, probe one row so it materializes,
    /// and persist the reader state.
    async fn create(
        &self,
        mut reader: Box<dyn ReportReader>,
        context: &ReportContext,
    ) -> Result<CachedReader, CacheError> {
        let prepared = async {
            let description = reader.prepare_report_data(context).await?;
            reader.read_report_data_batch(None, Some(1)).await?;
            Ok::<_, BackendError>(description)
        }
        .await;
        let description = match prepared {
            Ok(description) => description,
            Err(e) => {
                release(reader.as_mut(), context.report_id()).await;
                return Err(e.into());
            }
        };

        let lifetime = context
            .report
            .destination_config
            .cache_lifetime_secs()
            .map_or(self.inner.default_lifetime, Duration::from_secs);
        let created_at = Utc::now();
        let entry = CachedReaderEntry {
            id: uuid::Uuid::new_v4().to_string(),
            report_id: context.report_id().clone(),
            data_description: description,
            reader_state: reader.state(),
            storage_type: context.storage_type(),
            created_at,
            expires_at: expiry(created_at, lifetime),
        };

        let persisted = entry.clone();
        if let Err(e) = store::call(&self.inner.store, "insert_cache_entry", move |s| {
            s.insert_cache_entry(&persisted)
        })
        .await
        {
            release(reader.as_mut(), context.report_id()).await;
            return Err(e.into());
        }

        tracing::info!(
            report_id = %context.report_id(),
            entry_id = %entry.id,
            expires_at = %entry.expires_at,
            "Reader cached"
        );
        Ok(CachedReader {
            reader: tokio::sync::Mutex::new(reader),
            description: entry.data_description,
            from_cache: false,
            entry_id: entry.id,
            expires_at: entry.expires_at,
        })
    }

    // -----------------------------------------------------------------------
    // Expiry sweep
    // -----------------------------------------------------------------------

    /// Finalize and delete every entry that expired before `now`.
    ///
    /// Per-entry failures are logged and counted; they never stop the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Store`] when the entries cannot be listed or
    /// deleted.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepSummary, CacheError> {
        let expired = store::call(&self.inner.store, "find_expired", move |s| {
            s.find_expired(now)
        })
        .await?;

        let mut summary = SweepSummary::default();
        for entry in expired {
            let id = entry.report_id.clone();
            let context = match store::call(&self.inner.store, "get_report_context", move |s| {
                s.get_report_context(&id)
            })
            .await
            {
                Ok(Some(context)) => context,
                Ok(None) => {
                    tracing::warn!(
                        report_id = %entry.report_id,
                        entry_id = %entry.id,
                        "Report gone, deleting cache entry without finalize"
                    );
                    summary.orphaned += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(entry_id = %entry.id, error = %e, "Cache entry finalize skipped");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.finalize_entry(&context, &entry).await {
                Ok(()) => summary.finalized += 1,
                Err(e) => {
                    tracing::warn!(
                        report_id = %entry.report_id,
                        entry_id = %entry.id,
                        error = %e,
                        "Cache entry finalize failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary.deleted = store::call(&self.inner.store, "delete_expired", move |s| {
            s.delete_expired(now)
        })
        .await?;

        if summary.deleted > 0 {
            tracing::info!(
                finalized = summary.finalized,
                orphaned = summary.orphaned,
                failed = summary.failed,
                deleted = summary.deleted,
                "Cache sweep completed"
            );
        }
        Ok(summary)
    }

    async fn finalize_entry(
        &self,
        context: &ReportContext,
        entry: &CachedReaderEntry,
    ) -> Result<(), CacheError> {
        let mut reader = self
            .inner
            .capabilities
            .storage
            .readers
            .resolve_transient(entry.storage_type)?;
        reader.prepare_report_data(context).await?;
        if let Some(state) = entry.reader_state.clone() {
            reader.init_from_state(state, entry.data_description.headers.clone())?;
        }
        reader.finalize().await?;
        Ok(())
    }

    /// Sweep on a fixed interval until the runtime shuts down.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = cache.sweep_once(Utc::now()).await {
                    tracing::error!(error = %e, "Cache sweep failed");
                }
            }
        })
    }
}

fn expiry(created_at: DateTime<Utc>, lifetime: Duration) -> DateTime<Utc> {
    let delta = i64::try_from(lifetime.as_secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX);
    created_at
        .checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

async fn release(reader: &mut dyn ReportReader, report_id: &ReportId) {
    if let Err(e) = reader.finalize().await {
        tracing::warn!(report_id = %report_id, error = %e, "Reader release failed");
    }
}
