//! Adapter boundary for the outbound mail service.

use async_trait::async_trait;
use martflow_sdk::api::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[async_trait]
pub trait MailApi: Send + Sync {
    /// Confirm the service will send as `sender`.
    async fn verify_sender(&self, sender: &str) -> Result<(), ApiError>;

    /// Returns the provider's message id.
    async fn send(&self, message: &EmailMessage) -> Result<String, ApiError>;
}
