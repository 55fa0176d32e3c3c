//! Backend-facing SDK for martflow.
//!
//! Storages and destinations implement the traits in [`capability`] and
//! register them through a [`registry::CapabilitiesBuilder`]. The engine
//! never names a concrete backend; it resolves components by backend type.

pub mod api;
pub mod capability;
pub mod sql;
pub mod prelude;
pub mod reconcile;
pub mod registry;
pub mod resolver;
pub mod secret;
pub mod title;

pub use martflow_types as types;
