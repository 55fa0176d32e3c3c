use martflow_sdk::prelude::*;

use crate::{looks_like_address, EmailDestination};

impl EmailDestination {
    async fn check_sender(&self, sender: &str) -> ValidationResult {
        match with_retry(self.retry, "verify_sender", || self.api.verify_sender(sender)).await {
            Ok(()) => ValidationResult::success(),
            Err(e) => ValidationResult::failed(
                format!("Sender {sender} is not verified"),
                Some(e.message),
            ),
        }
    }
}

#[async_trait]
impl CredentialsValidator for EmailDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
    ) -> BackendResult<ValidationResult> {
        let credentials: &EmailCredentials = credentials.try_into()?;
        if !looks_like_address(&credentials.sender_address) {
            return Ok(ValidationResult::invalid_fields(vec![FieldError::new(
                "credentials.sender_address",
                "must be an e-mail address",
            )]));
        }
        Ok(self.check_sender(&credentials.sender_address).await)
    }
}

#[async_trait]
impl DestinationAccessValidator for EmailDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
        config: &DestinationConfig,
    ) -> BackendResult<ValidationResult> {
        let credentials: &EmailCredentials = credentials.try_into()?;
        let config: &EmailConfig = config.try_into()?;

        let mut errors = Vec::new();
        if config.recipients.is_empty() {
            errors.push(FieldError::new("config.recipients", "at least one recipient is required"));
        }
        for (i, recipient) in config.recipients.iter().enumerate() {
            if !looks_like_address(recipient) {
                errors.push(FieldError::new(
                    format!("config.recipients[{i}]"),
                    format!("'{recipient}' is not an e-mail address"),
                ));
            }
        }
        if !errors.is_empty() {
            return Ok(ValidationResult::invalid_fields(errors));
        }
        Ok(self.check_sender(&credentials.sender_address).await)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::FakeMail;

    fn destination(fake: FakeMail) -> EmailDestination {
        EmailDestination::new(Arc::new(fake), RetryPolicy::immediate(1))
    }

    fn credentials() -> DestinationCredentials {
        DestinationCredentials::Email(EmailCredentials {
            sender_address: "reports@acme.test".into(),
        })
    }

    #[tokio::test]
    async fn test_bad_recipients_listed_by_index() {
        let config = DestinationConfig::Email(EmailConfig {
            recipients: vec!["ok@acme.test".into(), "nope".into()],
            subject: "s".into(),
        });
        let result = DestinationAccessValidator::validate(
            &destination(FakeMail::default()),
            &credentials(),
            &config,
        )
        .await
        .unwrap();
        assert_eq!(result.field_errors.len(), 1);
        assert_eq!(result.field_errors[0].field, "config.recipients[1]");
    }

    #[tokio::test]
    async fn test_unverified_sender() {
        let fake = FakeMail {
            verify_error: Some(ApiError::unauthorized(
                "Email address is not verified. The following identities failed the check",
            )),
            ..FakeMail::default()
        };
        let result = CredentialsValidator::validate(&destination(fake), &credentials())
            .await
            .unwrap();
        assert!(!result.is_valid());
        assert!(result.reason.unwrap().starts_with("Email address is not verified"));
    }
}
