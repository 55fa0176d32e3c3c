use std::sync::Arc;

use martflow_sdk::prelude::*;

use crate::api::{EmailMessage, MailApi};
use crate::render::render;
use crate::call;

/// Rows kept for the message body; the rest are only counted.
pub const DEFAULT_ROW_CAP: usize = 1_000;

#[derive(Debug)]
struct Pending {
    sender: String,
    recipients: Vec<String>,
    subject: String,
    title: String,
    headers: Vec<String>,
    rows: Vec<Row>,
    truncated: u64,
    sent: bool,
}

pub struct EmailReportWriter {
    api: Arc<dyn MailApi>,
    retry: RetryPolicy,
    row_cap: usize,
    pending: Option<Pending>,
}

impl EmailReportWriter {
    #[must_use]
    pub fn new(api: Arc<dyn MailApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            row_cap: DEFAULT_ROW_CAP,
            pending: None,
        }
    }

    #[must_use]
    pub fn with_row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = row_cap;
        self
    }
}

impl BackendComponent for EmailReportWriter {
    type Kind = DestinationType;

    fn backend_type(&self) -> DestinationType {
        DestinationType::Email
    }
}

#[async_trait]
impl ReportWriter for EmailReportWriter {
    async fn prepare_to_write_report(
        &mut self,
        context: &ReportContext,
        description: &ReportDataDescription,
    ) -> BackendResult<()> {
        let credentials: &EmailCredentials = (&context.destination.credentials).try_into()?;
        let config: &EmailConfig = (&context.report.destination_config).try_into()?;
        if config.recipients.is_empty() {
            return Err(BackendError::validation(
                "NO_RECIPIENTS",
                vec![FieldError::new("config.recipients", "at least one recipient is required")],
            ));
        }
        let subject = if config.subject.trim().is_empty() {
            context.report.title.clone()
        } else {
            config.subject.clone()
        };
        self.pending = Some(Pending {
            sender: credentials.sender_address.clone(),
            recipients: config.recipients.clone(),
            subject,
            title: context.report.title.clone(),
            headers: description
                .headers
                .iter()
                .map(|h| h.display_name().to_string())
                .collect(),
            rows: Vec::new(),
            truncated: 0,
            sent: false,
        });
        Ok(())
    }

    async fn write_report_data_batch(&mut self, batch: ReportDataBatch) -> BackendResult<()> {
        let Some(pending) = self.pending.as_mut() else {
            return Err(BackendError::business_rule(
                "WRITER_NOT_PREPARED",
                "write_report_data_batch called before prepare_to_write_report",
            ));
        };
        if pending.sent {
            return Err(BackendError::business_rule(
                "EMAIL_ALREADY_SENT",
                "received a batch after the final batch",
            ));
        }

        let is_last = batch.is_last();
        let room = self.row_cap.saturating_sub(pending.rows.len());
        let incoming = batch.rows.len();
        pending.rows.extend(batch.rows.into_iter().take(room));
        pending.truncated += u64::try_from(incoming.saturating_sub(room)).unwrap_or(u64::MAX);
        if !is_last {
            return Ok(());
        }

        let body = render(&pending.title, &pending.headers, &pending.rows, pending.truncated);
        let message = EmailMessage {
            from: pending.sender.clone(),
            to: pending.recipients.clone(),
            subject: pending.subject.clone(),
            html_body: body.html,
            text_body: body.text,
        };
        let api = &self.api;
        let message_id = call(self.retry, "send", || api.send(&message)).await?;
        pending.sent = true;
        tracing::info!(
            message_id = %message_id,
            recipients = message.to.len(),
            rows = pending.rows.len(),
            truncated = pending.truncated,
            "Report e-mail sent"
        );
        Ok(())
    }

    async fn finalize(&mut self) -> BackendResult<()> {
        if let Some(pending) = self.pending.take() {
            if !pending.sent {
                tracing::warn!(
                    subject = %pending.subject,
                    buffered_rows = pending.rows.len(),
                    "Report stream ended before the final batch; nothing was sent"
                );
            }
        }
        Ok(())
    }
}
