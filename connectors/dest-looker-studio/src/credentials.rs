//! Managed secret key handling and validation.

use martflow_sdk::prelude::*;
use martflow_sdk::secret::{generate_secret_key, SECRET_KEY_LENGTH};

use crate::{LookerStudioDestination, MAX_CACHE_LIFETIME_SECS, MIN_CACHE_LIFETIME_SECS};

fn fresh_credentials() -> DestinationCredentials {
    DestinationCredentials::LookerStudio(LookerStudioCredentials {
        destination_secret_key: Some(generate_secret_key(&mut rand::rng())),
    })
}

fn key_is_well_formed(key: &str) -> bool {
    key.len() == SECRET_KEY_LENGTH && key.chars().all(|c| c.is_ascii_alphanumeric())
}

impl CredentialsProcessor for LookerStudioDestination {
    fn process_credentials(
        &self,
        input: DestinationCredentials,
        existing: Option<&DestinationCredentials>,
    ) -> BackendResult<DestinationCredentials> {
        let _: &LookerStudioCredentials = (&input).try_into()?;
        if let Some(existing) = existing {
            let existing: &LookerStudioCredentials = existing.try_into()?;
            if let Some(key) = &existing.destination_secret_key {
                return Ok(DestinationCredentials::LookerStudio(LookerStudioCredentials {
                    destination_secret_key: Some(key.clone()),
                }));
            }
        }
        Ok(fresh_credentials())
    }
}

impl SecretKeyRotator for LookerStudioDestination {
    fn rotate_secret_key(
        &self,
        credentials: DestinationCredentials,
    ) -> BackendResult<DestinationCredentials> {
        let _: &LookerStudioCredentials = (&credentials).try_into()?;
        Ok(fresh_credentials())
    }
}

#[async_trait]
impl CredentialsValidator for LookerStudioDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
    ) -> BackendResult<ValidationResult> {
        let credentials: &LookerStudioCredentials = credentials.try_into()?;
        match credentials.destination_secret_key.as_deref() {
            Some(key) if !key_is_well_formed(key) => {
                Ok(ValidationResult::invalid_fields(vec![FieldError::new(
                    "credentials.destination_secret_key",
                    format!("must be {SECRET_KEY_LENGTH} alphanumeric characters"),
                )]))
            }
            _ => Ok(ValidationResult::success()),
        }
    }
}

#[async_trait]
impl DestinationAccessValidator for LookerStudioDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
        config: &DestinationConfig,
    ) -> BackendResult<ValidationResult> {
        let credentials: &LookerStudioCredentials = credentials.try_into()?;
        let config: &LookerStudioConfig = config.try_into()?;

        if let Some(secs) = config.cache_lifetime_secs {
            if !(MIN_CACHE_LIFETIME_SECS..=MAX_CACHE_LIFETIME_SECS).contains(&secs) {
                return Ok(ValidationResult::invalid_fields(vec![FieldError::new(
                    "config.cache_lifetime_secs",
                    format!(
                        "must be between {MIN_CACHE_LIFETIME_SECS} and {MAX_CACHE_LIFETIME_SECS} seconds"
                    ),
                )]));
            }
        }
        if credentials.destination_secret_key.is_none() {
            return Ok(ValidationResult::failed(
                "Destination has no secret key",
                Some("save the destination or rotate its key to generate one".into()),
            ));
        }
        Ok(ValidationResult::success())
    }
}
