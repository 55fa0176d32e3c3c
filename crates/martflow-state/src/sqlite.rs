//! `SQLite`-backed implementation of [`ReportStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Tagged payloads are
//! stored as JSON text; timestamps as fixed-width RFC 3339 UTC strings so
//! that text comparison orders them.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use martflow_types::backend::{DestinationType, StorageType};
use martflow_types::config::DestinationCredentials;
use martflow_types::entity::{
    CachedReaderEntry, DataMart, DataMartId, Destination, DestinationId, Report, ReportContext,
    ReportId, ReportRunState, RunStatus,
};
use martflow_types::schema::DataMartSchema;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{self, StoreError};
use crate::store::ReportStore;

/// Idempotent DDL for store tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS data_marts (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    storage_type TEXT NOT NULL,
    definition_json TEXT NOT NULL,
    config_json TEXT NOT NULL,
    credentials_json TEXT NOT NULL,
    schema_json TEXT
);

CREATE TABLE IF NOT EXISTS destinations (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    destination_type TEXT NOT NULL,
    credentials_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    data_mart_id TEXT NOT NULL,
    destination_id TEXT NOT NULL,
    destination_config_json TEXT NOT NULL,
    last_run_status TEXT,
    last_run_at TEXT,
    last_run_error TEXT,
    runs_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS report_data_cache (
    id TEXT PRIMARY KEY,
    report_id TEXT NOT NULL,
    data_description_json TEXT NOT NULL,
    reader_state_json TEXT,
    storage_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_report_expiry ON report_data_cache (report_id, expires_at);
CREATE INDEX IF NOT EXISTS idx_cache_expiry ON report_data_cache (expires_at);
";

const REPORT_COLUMNS: &str = "id, title, data_mart_id, destination_id, destination_config_json, \
     last_run_status, last_run_at, last_run_error, runs_count";

const CACHE_COLUMNS: &str = "id, report_id, data_description_json, reader_state_json, \
     storage_type, created_at, expires_at";

/// `SQLite`-backed report store.
///
/// Create with [`SqliteReportStore::open`] for file-backed persistence
/// or [`SqliteReportStore::in_memory`] for tests.
pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    /// Open or create a `SQLite` database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created,
    /// or [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        tracing::debug!(path = %path.display(), "Opened report store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn query_reports(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> error::Result<Vec<Report>> {
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, RawReport::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawReport::decode).collect()
    }

    fn query_cache(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> error::Result<Vec<CachedReaderEntry>> {
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, RawCacheEntry::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawCacheEntry::decode).collect()
    }

    fn get_data_mart_locked(conn: &Connection, id: &str) -> error::Result<Option<DataMart>> {
        let raw = conn
            .query_row(
                "SELECT id, title, storage_type, definition_json, config_json, credentials_json, \
                 schema_json FROM data_marts WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, title, storage_type, definition, config, credentials, schema)) = raw else {
            return Ok(None);
        };
        Ok(Some(DataMart {
            id: DataMartId::new(id),
            title,
            storage_type: storage_type
                .parse::<StorageType>()
                .map_err(|_| StoreError::corrupt("storage_type", storage_type.clone()))?,
            definition: from_json("definition_json", &definition)?,
            config: from_json("config_json", &config)?,
            credentials: from_json("credentials_json", &credentials)?,
            schema: schema
                .as_deref()
                .map(|s| from_json("schema_json", s))
                .transpose()?,
        }))
    }

    fn get_destination_locked(conn: &Connection, id: &str) -> error::Result<Option<Destination>> {
        let raw = conn
            .query_row(
                "SELECT id, title, destination_type, credentials_json FROM destinations \
                 WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, title, destination_type, credentials)) = raw else {
            return Ok(None);
        };
        Ok(Some(Destination {
            id: DestinationId::new(id),
            title,
            destination_type: destination_type
                .parse::<DestinationType>()
                .map_err(|_| StoreError::corrupt("destination_type", destination_type.clone()))?,
            credentials: from_json("credentials_json", &credentials)?,
        }))
    }

    fn get_report_locked(conn: &Connection, id: &str) -> error::Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1");
        Ok(Self::query_reports(conn, &sql, [id])?.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// Row codecs
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 (microseconds, `Z` suffix).
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(column: &'static str, raw: &str) -> error::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::corrupt(column, raw))
}

fn to_json<T: Serialize>(column: &'static str, value: &T) -> error::Result<String> {
    serde_json::to_string(value).map_err(StoreError::payload(column))
}

fn from_json<T: DeserializeOwned>(column: &'static str, raw: &str) -> error::Result<T> {
    serde_json::from_str(raw).map_err(StoreError::payload(column))
}

struct RawReport {
    id: String,
    title: String,
    data_mart_id: String,
    destination_id: String,
    destination_config: String,
    last_run_status: Option<String>,
    last_run_at: Option<String>,
    last_run_error: Option<String>,
    runs_count: i64,
}

impl RawReport {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            data_mart_id: row.get(2)?,
            destination_id: row.get(3)?,
            destination_config: row.get(4)?,
            last_run_status: row.get(5)?,
            last_run_at: row.get(6)?,
            last_run_error: row.get(7)?,
            runs_count: row.get(8)?,
        })
    }

    fn decode(self) -> error::Result<Report> {
        let last_run_status = self
            .last_run_status
            .map(|s| RunStatus::parse(&s).ok_or_else(|| StoreError::corrupt("last_run_status", s)))
            .transpose()?;
        let last_run_at = self
            .last_run_at
            .as_deref()
            .map(|s| parse_ts("last_run_at", s))
            .transpose()?;
        let runs_count = u64::try_from(self.runs_count)
            .map_err(|_| StoreError::corrupt("runs_count", self.runs_count.to_string()))?;
        Ok(Report {
            id: ReportId::new(self.id),
            title: self.title,
            data_mart_id: DataMartId::new(self.data_mart_id),
            destination_id: DestinationId::new(self.destination_id),
            destination_config: from_json("destination_config_json", &self.destination_config)?,
            run: ReportRunState {
                last_run_status,
                last_run_at,
                last_run_error: self.last_run_error,
                runs_count,
            },
        })
    }
}

struct RawCacheEntry {
    id: String,
    report_id: String,
    data_description: String,
    reader_state: Option<String>,
    storage_type: String,
    created_at: String,
    expires_at: String,
}

impl RawCacheEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            report_id: row.get(1)?,
            data_description: row.get(2)?,
            reader_state: row.get(3)?,
            storage_type: row.get(4)?,
            created_at: row.get(5)?,
            expires_at: row.get(6)?,
        })
    }

    fn decode(self) -> error::Result<CachedReaderEntry> {
        Ok(CachedReaderEntry {
            storage_type: self
                .storage_type
                .parse::<StorageType>()
                .map_err(|_| StoreError::corrupt("storage_type", self.storage_type.clone()))?,
            data_description: from_json("data_description_json", &self.data_description)?,
            reader_state: self
                .reader_state
                .as_deref()
                .map(|s| from_json("reader_state_json", s))
                .transpose()?,
            created_at: parse_ts("created_at", &self.created_at)?,
            expires_at: parse_ts("expires_at", &self.expires_at)?,
            id: self.id,
            report_id: ReportId::new(self.report_id),
        })
    }
}

// ---------------------------------------------------------------------------
// ReportStore
// ---------------------------------------------------------------------------

impl ReportStore for SqliteReportStore {
    fn save_data_mart(&self, data_mart: &DataMart) -> error::Result<()> {
        let definition = to_json("definition_json", &data_mart.definition)?;
        let config = to_json("config_json", &data_mart.config)?;
        let credentials = to_json("credentials_json", &data_mart.credentials)?;
        let schema = data_mart
            .schema
            .as_ref()
            .map(|s| to_json("schema_json", s))
            .transpose()?;

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO data_marts \
             (id, title, storage_type, definition_json, config_json, credentials_json, schema_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(id) DO UPDATE SET title = ?2, storage_type = ?3, definition_json = ?4, \
             config_json = ?5, credentials_json = ?6, schema_json = ?7",
            rusqlite::params![
                data_mart.id.as_str(),
                data_mart.title,
                data_mart.storage_type.as_str(),
                definition,
                config,
                credentials,
                schema,
            ],
        )?;
        Ok(())
    }

    fn get_data_mart(&self, id: &DataMartId) -> error::Result<Option<DataMart>> {
        let conn = self.lock_conn()?;
        Self::get_data_mart_locked(&conn, id.as_str())
    }

    fn update_data_mart_schema(
        &self,
        id: &DataMartId,
        schema: &DataMartSchema,
    ) -> error::Result<bool> {
        let schema = to_json("schema_json", schema)?;
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "UPDATE data_marts SET schema_json = ?1 WHERE id = ?2",
            rusqlite::params![schema, id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn save_destination(&self, destination: &Destination) -> error::Result<()> {
        let credentials = to_json("credentials_json", &destination.credentials)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO destinations (id, title, destination_type, credentials_json) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET title = ?2, destination_type = ?3, \
             credentials_json = ?4",
            rusqlite::params![
                destination.id.as_str(),
                destination.title,
                destination.destination_type.as_str(),
                credentials,
            ],
        )?;
        Ok(())
    }

    fn get_destination(&self, id: &DestinationId) -> error::Result<Option<Destination>> {
        let conn = self.lock_conn()?;
        Self::get_destination_locked(&conn, id.as_str())
    }

    fn update_destination_credentials(
        &self,
        id: &DestinationId,
        credentials: &DestinationCredentials,
    ) -> error::Result<bool> {
        let credentials = to_json("credentials_json", credentials)?;
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "UPDATE destinations SET credentials_json = ?1 WHERE id = ?2",
            rusqlite::params![credentials, id.as_str()],
        )?;
        Ok(rows > 0)
    }

    #[allow(clippy::cast_possible_wrap)]
    fn save_report(&self, report: &Report) -> error::Result<()> {
        let destination_config = to_json("destination_config_json", &report.destination_config)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO reports \
             (id, title, data_mart_id, destination_id, destination_config_json, \
              last_run_status, last_run_at, last_run_error, runs_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(id) DO UPDATE SET title = ?2, data_mart_id = ?3, destination_id = ?4, \
             destination_config_json = ?5",
            rusqlite::params![
                report.id.as_str(),
                report.title,
                report.data_mart_id.as_str(),
                report.destination_id.as_str(),
                destination_config,
                report.run.last_run_status.map(RunStatus::as_str),
                report.run.last_run_at.map(ts),
                report.run.last_run_error,
                report.run.runs_count as i64,
            ],
        )?;
        Ok(())
    }

    fn get_report(&self, id: &ReportId) -> error::Result<Option<Report>> {
        let conn = self.lock_conn()?;
        Self::get_report_locked(&conn, id.as_str())
    }

    fn list_reports(&self) -> error::Result<Vec<Report>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports ORDER BY id");
        Self::query_reports(&conn, &sql, [])
    }

    fn get_report_context(&self, id: &ReportId) -> error::Result<Option<ReportContext>> {
        let conn = self.lock_conn()?;
        let Some(report) = Self::get_report_locked(&conn, id.as_str())? else {
            return Ok(None);
        };
        let Some(data_mart) = Self::get_data_mart_locked(&conn, report.data_mart_id.as_str())?
        else {
            return Ok(None);
        };
        let Some(destination) =
            Self::get_destination_locked(&conn, report.destination_id.as_str())?
        else {
            return Ok(None);
        };
        Ok(Some(ReportContext {
            report,
            data_mart,
            destination,
        }))
    }

    fn try_start_run(&self, id: &ReportId, started_at: DateTime<Utc>) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "UPDATE reports SET last_run_status = ?1, last_run_at = ?2, last_run_error = NULL, \
             runs_count = runs_count + 1 \
             WHERE id = ?3 AND (last_run_status IS NULL OR last_run_status != ?1)",
            rusqlite::params![RunStatus::Running.as_str(), ts(started_at), id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn complete_run(
        &self,
        id: &ReportId,
        status: RunStatus,
        last_error: Option<&str>,
    ) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE reports SET last_run_status = ?1, last_run_error = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), last_error, id.as_str()],
        )?;
        Ok(())
    }

    fn insert_cache_entry(&self, entry: &CachedReaderEntry) -> error::Result<()> {
        let description = to_json("data_description_json", &entry.data_description)?;
        let reader_state = entry
            .reader_state
            .as_ref()
            .map(|s| to_json("reader_state_json", s))
            .transpose()?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO report_data_cache \
             (id, report_id, data_description_json, reader_state_json, storage_type, \
              created_at, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                entry.id,
                entry.report_id.as_str(),
                description,
                reader_state,
                entry.storage_type.as_str(),
                ts(entry.created_at),
                ts(entry.expires_at),
            ],
        )?;
        Ok(())
    }

    fn find_newest_unexpired(
        &self,
        report: &ReportId,
        now: DateTime<Utc>,
    ) -> error::Result<Option<CachedReaderEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {CACHE_COLUMNS} FROM report_data_cache \
             WHERE report_id = ?1 AND expires_at >= ?2 \
             ORDER BY created_at DESC, expires_at DESC LIMIT 1"
        );
        Ok(Self::query_cache(&conn, &sql, rusqlite::params![report.as_str(), ts(now)])?
            .into_iter()
            .next())
    }

    fn find_expired(&self, now: DateTime<Utc>) -> error::Result<Vec<CachedReaderEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {CACHE_COLUMNS} FROM report_data_cache WHERE expires_at < ?1 \
             ORDER BY expires_at"
        );
        Self::query_cache(&conn, &sql, [ts(now)])
    }

    fn delete_expired(&self, now: DateTime<Utc>) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "DELETE FROM report_data_cache WHERE expires_at < ?1",
            [ts(now)],
        )?;
        Ok(rows as u64)
    }

    fn list_cache_entries(&self) -> error::Result<Vec<CachedReaderEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {CACHE_COLUMNS} FROM report_data_cache ORDER BY created_at DESC");
        Self::query_cache(&conn, &sql, [])
    }
}
