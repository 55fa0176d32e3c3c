use martflow_sdk::prelude::*;

use crate::GoogleSheetsDestination;

#[async_trait]
impl CredentialsValidator for GoogleSheetsDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
    ) -> BackendResult<ValidationResult> {
        let credentials: &GoogleSheetsCredentials = credentials.try_into()?;
        let key = &credentials.service_account_key;
        let errors = key.field_errors("service_account_key");
        if !errors.is_empty() {
            return Ok(ValidationResult::invalid_fields(errors));
        }
        match with_retry(self.retry, "check_credentials", || self.api.check_credentials(key)).await {
            Ok(()) => Ok(ValidationResult::success()),
            Err(e) => Ok(ValidationResult::failed(
                format!("Google rejected the key for {}", key.client_email),
                Some(e.message),
            )),
        }
    }
}

#[async_trait]
impl DestinationAccessValidator for GoogleSheetsDestination {
    async fn validate(
        &self,
        credentials: &DestinationCredentials,
        config: &DestinationConfig,
    ) -> BackendResult<ValidationResult> {
        let credentials: &GoogleSheetsCredentials = credentials.try_into()?;
        let config: &GoogleSheetsConfig = config.try_into()?;
        if config.spreadsheet_id.trim().is_empty() {
            return Ok(ValidationResult::invalid_fields(vec![FieldError::new(
                "config.spreadsheet_id",
                "must not be empty",
            )]));
        }

        let key = &credentials.service_account_key;
        let spreadsheet = match with_retry(self.retry, "get_spreadsheet", || {
            self.api.get_spreadsheet(key, &config.spreadsheet_id)
        })
        .await
        {
            Ok(spreadsheet) => spreadsheet,
            Err(e) => {
                return Ok(ValidationResult::failed(
                    format!(
                        "Cannot open spreadsheet {}; share it with {}",
                        config.spreadsheet_id, key.client_email
                    ),
                    Some(e.message),
                ))
            }
        };
        if spreadsheet.sheet(config.sheet_id).is_none() {
            return Ok(ValidationResult::failed(
                format!(
                    "Spreadsheet '{}' has no sheet with id {}",
                    spreadsheet.title, config.sheet_id
                ),
                None,
            ));
        }
        Ok(ValidationResult::success())
    }
}
