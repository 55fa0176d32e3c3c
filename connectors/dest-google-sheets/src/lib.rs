//! Google Sheets destination: overwrites one sheet of a spreadsheet with
//! the report, header row first.

pub mod api;
mod validate;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use martflow_sdk::prelude::*;

pub use api::{CellNote, SheetProperties, SheetsApi, Spreadsheet};
pub use writer::GoogleSheetsReportWriter;

pub(crate) const CODE_PREFIX: &str = "GOOGLE_SHEETS";

/// Hard cap on cells across all sheets of one spreadsheet.
pub const SPREADSHEET_CELL_LIMIT: u64 = 10_000_000;

pub struct GoogleSheetsDestination {
    api: Arc<dyn SheetsApi>,
    retry: RetryPolicy,
}

impl GoogleSheetsDestination {
    #[must_use]
    pub fn new(api: Arc<dyn SheetsApi>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }
}

impl BackendComponent for GoogleSheetsDestination {
    type Kind = DestinationType;

    fn backend_type(&self) -> DestinationType {
        DestinationType::GoogleSheets
    }
}

pub fn register(builder: &mut CapabilitiesBuilder, api: Arc<dyn SheetsApi>) {
    register_with_policy(builder, api, RetryPolicy::default());
}

pub fn register_with_policy(
    builder: &mut CapabilitiesBuilder,
    api: Arc<dyn SheetsApi>,
    retry: RetryPolicy,
) {
    let destination = Arc::new(GoogleSheetsDestination::new(Arc::clone(&api), retry));
    builder
        .destination_access_validator(Arc::clone(&destination) as _)
        .credentials_validator(destination as _)
        .report_writer(move || {
            Ok(Box::new(GoogleSheetsReportWriter::new(Arc::clone(&api), retry)) as Box<dyn ReportWriter>)
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
