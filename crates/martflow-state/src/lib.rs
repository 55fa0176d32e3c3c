//! Persistence for martflow.
//!
//! Provides the [`ReportStore`] trait and a [`SqliteReportStore`]
//! implementation holding data marts, destinations, reports with their run
//! bookkeeping, and prepared-reader cache entries.

#![warn(clippy::pedantic)]

pub mod error;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use sqlite::SqliteReportStore;
pub use store::ReportStore;
