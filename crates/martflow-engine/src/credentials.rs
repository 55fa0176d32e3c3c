//! Destination credential handling: managed-secret injection, rotation,
//! and validation.

use std::sync::Arc;

use martflow_sdk::registry::Capabilities;
use martflow_state::ReportStore;
use martflow_types::backend::DestinationType;
use martflow_types::config::{DestinationConfig, DestinationCredentials};
use martflow_types::entity::DestinationId;
use martflow_types::error::BackendError;
use martflow_types::validation::ValidationResult;

use crate::errors::ServiceError;
use crate::store;

pub struct DestinationCredentialsService {
    store: Arc<dyn ReportStore>,
    capabilities: Arc<Capabilities>,
}

impl DestinationCredentialsService {
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>, capabilities: Arc<Capabilities>) -> Self {
        Self {
            store,
            capabilities,
        }
    }

    /// Apply the destination's credentials processor, if it has one.
    /// Destinations without managed secrets get `input` back unchanged.
    ///
    /// # Errors
    ///
    /// Propagates the processor's error.
    pub fn process_credentials(
        &self,
        destination_type: DestinationType,
        input: DestinationCredentials,
        existing: Option<&DestinationCredentials>,
    ) -> Result<DestinationCredentials, ServiceError> {
        match self
            .capabilities
            .destination
            .credentials_processors
            .try_resolve(destination_type)
        {
            Some(processor) => Ok(processor.process_credentials(input, existing)?),
            None => Ok(input),
        }
    }

    /// Replace the destination's managed secret and persist the result.
    ///
    /// # Errors
    ///
    /// Fails with a business-rule error when the destination type has no
    /// rotator, and when the destination is missing or cannot be updated.
    pub async fn rotate_secret_key(
        &self,
        destination_id: &DestinationId,
    ) -> Result<DestinationCredentials, ServiceError> {
        let lookup = destination_id.clone();
        let destination = store::call(&self.store, "get_destination", move |s| {
            s.get_destination(&lookup)
        })
        .await?
        .ok_or_else(|| ServiceError::not_found("destination", destination_id))?;

        let Some(rotator) = self
            .capabilities
            .destination
            .secret_key_rotators
            .try_resolve(destination.destination_type)
        else {
            return Err(BackendError::business_rule(
                "SECRET_ROTATION_UNSUPPORTED",
                format!(
                    "destination type {} has no managed secret key",
                    destination.destination_type
                ),
            )
            .into());
        };

        let rotated = rotator.rotate_secret_key(destination.credentials)?;
        let target = destination_id.clone();
        let persisted = rotated.clone();
        store::call(&self.store, "update_destination_credentials", move |s| {
            s.update_destination_credentials(&target, &persisted)
        })
        .await?;

        tracing::info!(
            destination_id = %destination_id,
            destination = %destination.destination_type,
            "Destination secret key rotated"
        );
        Ok(rotated)
    }

    /// # Errors
    ///
    /// Fails when no credentials validator is registered for the type.
    pub async fn validate_credentials(
        &self,
        destination_type: DestinationType,
        credentials: &DestinationCredentials,
    ) -> Result<ValidationResult, ServiceError> {
        let validator = self
            .capabilities
            .destination
            .credentials_validators
            .resolve(destination_type)?;
        Ok(validator.validate(credentials).await?)
    }

    /// # Errors
    ///
    /// Fails when no access validator is registered for the type.
    pub async fn validate_access(
        &self,
        destination_type: DestinationType,
        credentials: &DestinationCredentials,
        config: &DestinationConfig,
    ) -> Result<ValidationResult, ServiceError> {
        let validator = self
            .capabilities
            .destination
            .access_validators
            .resolve(destination_type)?;
        Ok(validator.validate(credentials, config).await?)
    }
}

#[cfg(test)]
mod tests {
    use martflow_sdk::capability::{BackendResult, CredentialsProcessor, SecretKeyRotator};
    use martflow_sdk::resolver::BackendComponent;
    use martflow_types::config::{EmailCredentials, LookerStudioCredentials};

    use super::*;
    use crate::testing::{email_destination, looker_destination, seeded_store};

    struct FixedSecret;

    impl BackendComponent for FixedSecret {
        type Kind = DestinationType;

        fn backend_type(&self) -> DestinationType {
            DestinationType::LookerStudio
        }
    }

    impl CredentialsProcessor for FixedSecret {
        fn process_credentials(
            &self,
            _input: DestinationCredentials,
            existing: Option<&DestinationCredentials>,
        ) -> BackendResult<DestinationCredentials> {
            Ok(existing.cloned().unwrap_or_else(|| {
                DestinationCredentials::LookerStudio(LookerStudioCredentials {
                    destination_secret_key: Some("generated".into()),
                })
            }))
        }
    }

    impl SecretKeyRotator for FixedSecret {
        fn rotate_secret_key(
            &self,
            _credentials: DestinationCredentials,
        ) -> BackendResult<DestinationCredentials> {
            Ok(DestinationCredentials::LookerStudio(LookerStudioCredentials {
                destination_secret_key: Some("rotated".into()),
            }))
        }
    }

    fn service() -> (DestinationCredentialsService, Arc<dyn ReportStore>) {
        let store = seeded_store(&[]);
        let fixed = Arc::new(FixedSecret);
        let mut builder = Capabilities::builder();
        builder
            .credentials_processor(Arc::clone(&fixed) as _)
            .secret_key_rotator(fixed as _);
        let caps = Arc::new(builder.build().unwrap());
        (
            DestinationCredentialsService::new(Arc::clone(&store), caps),
            store,
        )
    }

    #[test]
    fn test_unprocessed_type_passes_input_through() {
        let (service, _) = service();
        let input = DestinationCredentials::Email(EmailCredentials {
            sender_address: "ops@acme.test".into(),
        });
        let out = service
            .process_credentials(DestinationType::Email, input.clone(), None)
            .unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_processor_applied() {
        let (service, _) = service();
        let out = service
            .process_credentials(
                DestinationType::LookerStudio,
                DestinationCredentials::LookerStudio(LookerStudioCredentials::default()),
                None,
            )
            .unwrap();
        let DestinationCredentials::LookerStudio(creds) = out else {
            panic!("expected Looker Studio credentials");
        };
        assert_eq!(creds.destination_secret_key.as_deref(), Some("generated"));
    }

    #[tokio::test]
    async fn test_rotation_persists() {
        let (service, store) = service();
        let id = looker_destination().id;
        service.rotate_secret_key(&id).await.unwrap();
        let stored = store.get_destination(&id).unwrap().unwrap();
        assert_eq!(
            stored.credentials,
            DestinationCredentials::LookerStudio(LookerStudioCredentials {
                destination_secret_key: Some("rotated".into()),
            })
        );
    }

    #[tokio::test]
    async fn test_rotation_without_rotator_is_business_rule_error() {
        let (service, store) = service();
        let id = email_destination().id;
        let err = service.rotate_secret_key(&id).await.unwrap_err();
        let backend = err.as_backend_error().unwrap();
        assert_eq!(backend.code, "SECRET_ROTATION_UNSUPPORTED");
        assert_eq!(
            store.get_destination(&id).unwrap().unwrap().credentials,
            email_destination().credentials
        );
    }

    #[tokio::test]
    async fn test_validation_requires_registration() {
        let (service, _) = service();
        let err = service
            .validate_credentials(
                DestinationType::Email,
                &email_destination().credentials,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Resolve(_)));
    }
}
