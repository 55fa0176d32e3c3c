//! Recording mail service for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use martflow_sdk::api::ApiError;
use martflow_types::backend::{DestinationType, StorageType};
use martflow_types::config::{
    AthenaConfig, AthenaCredentials, DestinationConfig, DestinationCredentials, EmailConfig,
    EmailCredentials, StorageConfig, StorageCredentials,
};
use martflow_types::definition::DataMartDefinition;
use martflow_types::entity::{
    DataMart, DataMartId, Destination, DestinationId, Report, ReportContext, ReportId,
    ReportRunState,
};
use martflow_types::report::{ReportDataDescription, ReportDataHeader};
use martflow_types::schema::{AthenaFieldType, NativeFieldType};

use crate::api::{EmailMessage, MailApi};

pub(crate) fn context() -> ReportContext {
    let data_mart = DataMart {
        id: DataMartId::new("dm-revenue"),
        title: "Revenue".into(),
        storage_type: StorageType::Athena,
        definition: DataMartDefinition::View {
            fully_qualified_name: "finance.weekly_revenue".into(),
        },
        config: StorageConfig::Athena(AthenaConfig {
            region: "eu-west-1".into(),
            output_bucket: "results".into(),
        }),
        credentials: StorageCredentials::Athena(AthenaCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
        }),
        schema: None,
    };
    let destination = Destination {
        id: DestinationId::new("dst-mail"),
        title: "Finance mail".into(),
        destination_type: DestinationType::Email,
        credentials: DestinationCredentials::Email(EmailCredentials {
            sender_address: "reports@acme.test".into(),
        }),
    };
    let report = Report {
        id: ReportId::new("rep-revenue"),
        title: "Revenue by region".into(),
        data_mart_id: data_mart.id.clone(),
        destination_id: destination.id.clone(),
        destination_config: DestinationConfig::Email(EmailConfig {
            recipients: vec!["finance@acme.test".into()],
            subject: "Weekly revenue".into(),
        }),
        run: ReportRunState::default(),
    };
    ReportContext {
        report,
        data_mart,
        destination,
    }
}

pub(crate) fn description() -> ReportDataDescription {
    let header = |name: &str, field_type| ReportDataHeader {
        name: name.into(),
        alias: None,
        description: None,
        field_type: NativeFieldType::Athena { field_type },
    };
    ReportDataDescription::new(vec![
        header("region", AthenaFieldType::Varchar),
        header("revenue", AthenaFieldType::Decimal),
    ])
}

#[derive(Default)]
pub(crate) struct FakeMail {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub send_error: Option<ApiError>,
    pub verify_error: Option<ApiError>,
}

#[async_trait]
impl MailApi for FakeMail {
    async fn verify_sender(&self, _sender: &str) -> Result<(), ApiError> {
        self.verify_error.clone().map_or(Ok(()), Err)
    }

    async fn send(&self, message: &EmailMessage) -> Result<String, ApiError> {
        if let Some(e) = &self.send_error {
            return Err(e.clone());
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("msg-{}", sent.len()))
    }
}
