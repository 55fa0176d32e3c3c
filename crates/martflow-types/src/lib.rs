//! Shared martflow data model.
//!
//! Pure data types used by the capability SDK, the connectors, the state
//! store and the engine. Every payload whose shape depends on the backend is
//! a tagged enum keyed by [`StorageType`](backend::StorageType) or
//! [`DestinationType`](backend::DestinationType).

pub mod backend;
pub mod config;
pub mod definition;
pub mod entity;
pub mod error;
pub mod reader_state;
pub mod report;
pub mod schema;
pub mod validation;
