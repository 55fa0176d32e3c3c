//! Adapter boundary for the Google Sheets API.

use async_trait::async_trait;
use martflow_sdk::api::ApiError;
use martflow_types::config::ServiceAccountKey;
use martflow_types::report::Row;

/// Grid properties of one sheet (tab).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    pub row_count: u64,
    pub column_count: u64,
}

impl SheetProperties {
    #[must_use]
    pub fn cells(&self) -> u64 {
        self.row_count.saturating_mul(self.column_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spreadsheet {
    pub spreadsheet_id: String,
    pub title: String,
    pub sheets: Vec<SheetProperties>,
}

impl Spreadsheet {
    #[must_use]
    pub fn sheet(&self, sheet_id: i64) -> Option<&SheetProperties> {
        self.sheets.iter().find(|s| s.sheet_id == sheet_id)
    }
}

/// A note attached to a zero-based cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellNote {
    pub row: u64,
    pub column: u64,
    pub text: String,
}

#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Exchange the key for an access token without touching any document.
    async fn check_credentials(&self, key: &ServiceAccountKey) -> Result<(), ApiError>;

    async fn get_spreadsheet(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
    ) -> Result<Spreadsheet, ApiError>;

    /// Remove every value and note from the sheet, keeping its grid.
    async fn clear_sheet(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        sheet_id: i64,
    ) -> Result<(), ApiError>;

    async fn resize_sheet(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        sheet_id: i64,
        row_count: u64,
        column_count: u64,
    ) -> Result<(), ApiError>;

    /// Overwrite values starting at zero-based `start_row`, column A.
    async fn update_values(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        sheet_id: i64,
        start_row: u64,
        rows: Vec<Row>,
    ) -> Result<(), ApiError>;

    async fn set_notes(
        &self,
        key: &ServiceAccountKey,
        spreadsheet_id: &str,
        sheet_id: i64,
        notes: Vec<CellNote>,
    ) -> Result<(), ApiError>;
}
