//! Execution core for martflow.
//!
//! Drives report runs from a storage reader into a destination writer,
//! serves pull-based consumers from a TTL-bound reader cache, and exposes
//! data-mart and destination-credential services. Every backend call is
//! dispatched through the capability registry.

pub mod cache;
pub mod config;
pub mod credentials;
pub mod data_mart;
pub mod engine;
pub mod errors;
pub mod orchestrator;
pub(crate) mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CachedReader, ReportDataCache, SweepSummary};
pub use credentials::DestinationCredentialsService;
pub use data_mart::DataMartService;
pub use engine::Engine;
pub use errors::{CacheError, RunError, ServiceError};
pub use orchestrator::{ReportRunner, RunSummary};
