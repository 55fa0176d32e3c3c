//! Looker Studio destination.
//!
//! Looker Studio pulls report data instead of receiving it, so this crate
//! registers no writer. It manages the destination secret key that
//! authenticates the connector, and serves schema and data requests from
//! the engine's report data cache through [`LookerStudioDataService`].

mod credentials;
pub mod fields;
pub mod service;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use martflow_sdk::prelude::*;

pub use fields::{LookerConcept, LookerDataType, LookerField};
pub use service::{DataRequest, DataResponse, DataServiceError, LookerStudioDataService, SchemaRequest};

/// Shortest cache lifetime a report may configure.
pub const MIN_CACHE_LIFETIME_SECS: u64 = 60;
/// Longest cache lifetime a report may configure (one day).
pub const MAX_CACHE_LIFETIME_SECS: u64 = 86_400;

#[derive(Debug, Default)]
pub struct LookerStudioDestination;

impl BackendComponent for LookerStudioDestination {
    type Kind = DestinationType;

    fn backend_type(&self) -> DestinationType {
        DestinationType::LookerStudio
    }
}

pub fn register(builder: &mut CapabilitiesBuilder) {
    let destination = Arc::new(LookerStudioDestination);
    builder
        .destination_access_validator(Arc::clone(&destination) as _)
        .credentials_validator(Arc::clone(&destination) as _)
        .credentials_processor(Arc::clone(&destination) as _)
        .secret_key_rotator(destination as _);
}

#[cfg(test)]
mod tests {
    use martflow_sdk::registry::Capabilities;

    use super::*;

    #[test]
    fn test_registers_secret_management_without_writer() {
        let mut builder = Capabilities::builder();
        register(&mut builder);
        let caps = builder.build().unwrap();
        let dest = &caps.destination;
        let looker = DestinationType::LookerStudio;
        assert!(dest.credentials_processors.is_registered(looker));
        assert!(dest.secret_key_rotators.is_registered(looker));
        assert!(dest.access_validators.is_registered(looker));
        assert!(dest.credentials_validators.is_registered(looker));
        assert!(!dest.writers.is_registered(looker));
    }
}
