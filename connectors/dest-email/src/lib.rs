//! E-mail destination: buffers the report and mails it as an HTML table
//! once the last batch arrives.

pub mod api;
mod render;
mod validate;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use martflow_sdk::prelude::*;

pub use api::{EmailMessage, MailApi};
pub use writer::{EmailReportWriter, DEFAULT_ROW_CAP};

pub(crate) const CODE_PREFIX: &str = "EMAIL";

pub struct EmailDestination {
    api: Arc<dyn MailApi>,
    retry: RetryPolicy,
}

impl EmailDestination {
    #[must_use]
    pub fn new(api: Arc<dyn MailApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

impl BackendComponent for EmailDestination {
    type Kind = DestinationType;

    fn backend_type(&self) -> DestinationType {
        DestinationType::Email
    }
}

pub fn register(builder: &mut CapabilitiesBuilder, api: Arc<dyn MailApi>) {
    register_with_policy(builder, api, RetryPolicy::default());
}

pub fn register_with_policy(
    builder: &mut CapabilitiesBuilder,
    api: Arc<dyn MailApi>,
    retry: RetryPolicy,
) {
    let destination = Arc::new(EmailDestination::new(Arc::clone(&api), retry));
    builder
        .destination_access_validator(Arc::clone(&destination) as _)
        .credentials_validator(destination as _)
        .report_writer(move || {
            Ok(Box::new(EmailReportWriter::new(Arc::clone(&api), retry)) as Box<dyn ReportWriter>)
        });
}

pub(crate) async fn call<T, F, Fut>(retry: RetryPolicy, operation: &str, op: F) -> BackendResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    with_retry(retry, operation, op)
        .await
        .map_err(|e| e.into_backend(CODE_PREFIX))
}

/// Loose address shape check; the mail service has the final word.
pub(crate) fn looks_like_address(address: &str) -> bool {
    let Some((local, domain)) = address.trim().split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}
