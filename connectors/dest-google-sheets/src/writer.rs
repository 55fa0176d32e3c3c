//! Report writer for one sheet.
//!
//! `prepare_to_write_report` clears the sheet and writes the header row, so
//! repeating it leaves the sheet in the same state. Batches are appended
//! below the previous batch, growing the grid first when needed.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use martflow_sdk::prelude::*;
use serde_json::Value;

use crate::api::{CellNote, SheetsApi};
use crate::{call, SPREADSHEET_CELL_LIMIT};

/// Position and budget of the sheet being written.
#[derive(Debug)]
struct Target {
    key: ServiceAccountKey,
    spreadsheet_id: String,
    sheet_id: i64,
    columns: u64,
    /// Zero-based row the next batch starts at.
    next_row: u64,
    grid_rows: u64,
    grid_columns: u64,
    /// Cells this sheet may occupy without breaking the spreadsheet limit.
    cell_budget: u64,
    /// Description note of the first header; the run stamp shares its cell.
    first_note: Option<String>,
}

pub struct GoogleSheetsReportWriter {
    api: Arc<dyn SheetsApi>,
    retry: RetryPolicy,
    target: Option<Target>,
    rows_written: u64,
}

impl GoogleSheetsReportWriter {
    #[must_use]
    pub fn new(api: Arc<dyn SheetsApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            target: None,
            rows_written: 0,
        }
    }
}

impl BackendComponent for GoogleSheetsReportWriter {
    type Kind = DestinationType;

    fn backend_type(&self) -> DestinationType {
        DestinationType::GoogleSheets
    }
}

fn cell_limit_error(cells: u64) -> BackendError {
    BackendError::business_rule(
        "SPREADSHEET_CELL_LIMIT",
        format!("report needs {cells} cells; a spreadsheet holds at most {SPREADSHEET_CELL_LIMIT}"),
    )
}

/// Sheets cells hold scalars; nested values are written as JSON text.
fn to_cell(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar,
    }
}

fn width(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[async_trait]
impl ReportWriter for GoogleSheetsReportWriter {
    async fn prepare_to_write_report(
        &mut self,
        context: &ReportContext,
        description: &ReportDataDescription,
    ) -> BackendResult<()> {
        let credentials: &GoogleSheetsCredentials = (&context.destination.credentials).try_into()?;
        let config: &GoogleSheetsConfig = (&context.report.destination_config).try_into()?;
        let key = credentials.service_account_key.clone();
        let spreadsheet_id = config.spreadsheet_id.clone();
        let sheet_id = config.sheet_id;
        let columns = width(description.headers.len());
        let api = &self.api;

        let spreadsheet = call(self.retry, "get_spreadsheet", || {
            api.get_spreadsheet(&key, &spreadsheet_id)
        })
        .await?;
        let Some(sheet) = spreadsheet.sheet(sheet_id).cloned() else {
            return Err(BackendError::access(
                "GOOGLE_SHEETS_SHEET_NOT_FOUND",
                format!("sheet {sheet_id} does not exist in spreadsheet '{}'", spreadsheet.title),
            ));
        };
        let other_cells: u64 = spreadsheet
            .sheets
            .iter()
            .filter(|s| s.sheet_id != sheet_id)
            .map(|s| s.cells())
            .sum();
        let cell_budget = SPREADSHEET_CELL_LIMIT.saturating_sub(other_cells);
        if let Some(estimated) = description.estimated_row_count {
            let cells = estimated.saturating_add(1).saturating_mul(columns);
            if cells > cell_budget {
                return Err(cell_limit_error(cells.saturating_add(other_cells)));
            }
        }

        call(self.retry, "clear_sheet", || {
            api.clear_sheet(&key, &spreadsheet_id, sheet_id)
        })
        .await?;
        if sheet.column_count < columns || sheet.row_count == 0 {
            let rows = sheet.row_count.max(1);
            let cols = sheet.column_count.max(columns);
            call(self.retry, "resize_sheet", || {
                api.resize_sheet(&key, &spreadsheet_id, sheet_id, rows, cols)
            })
            .await?;
        }

        let header_row: Row = description
            .headers
            .iter()
            .map(|h| Value::String(h.display_name().to_string()))
            .collect();
        call(self.retry, "update_values", || {
            api.update_values(&key, &spreadsheet_id, sheet_id, 0, vec![header_row.clone()])
        })
        .await?;

        let notes: Vec<CellNote> = description
            .headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                let text = h.description.as_deref()?.trim();
                (!text.is_empty()).then(|| CellNote {
                    row: 0,
                    column: width(i),
                    text: text.to_string(),
                })
            })
            .collect();
        let first_note = notes
            .iter()
            .find(|n| n.column == 0)
            .map(|n| n.text.clone());
        if !notes.is_empty() {
            call(self.retry, "set_notes", || {
                api.set_notes(&key, &spreadsheet_id, sheet_id, notes.clone())
            })
            .await?;
        }

        tracing::info!(
            report_id = %context.report_id(),
            spreadsheet_id = %spreadsheet_id,
            sheet_id,
            columns,
            "Google Sheet prepared"
        );
        self.target = Some(Target {
            key,
            spreadsheet_id,
            sheet_id,
            columns,
            next_row: 1,
            grid_rows: sheet.row_count.max(1),
            grid_columns: sheet.column_count.max(columns),
            cell_budget,
            first_note,
        });
        self.rows_written = 0;
        Ok(())
    }

    async fn write_report_data_batch(&mut self, batch: ReportDataBatch) -> BackendResult<()> {
        let Some(target) = self.target.as_mut() else {
            return Err(BackendError::business_rule(
                "WRITER_NOT_PREPARED",
                "write_report_data_batch called before prepare_to_write_report",
            ));
        };
        if batch.rows.is_empty() {
            return Ok(());
        }

        let count = width(batch.rows.len());
        let end_row = target.next_row.saturating_add(count);
        let cells = end_row.saturating_mul(target.columns);
        if cells > target.cell_budget {
            return Err(cell_limit_error(cells));
        }

        let api = &self.api;
        if end_row > target.grid_rows {
            let (rows, cols) = (end_row, target.grid_columns);
            call(self.retry, "resize_sheet", || {
                api.resize_sheet(&target.key, &target.spreadsheet_id, target.sheet_id, rows, cols)
            })
            .await?;
            target.grid_rows = end_row;
        }

        let rows: Vec<Row> = batch
            .rows
            .into_iter()
            .map(|row| row.into_iter().map(to_cell).collect())
            .collect();
        let start = target.next_row;
        call(self.retry, "update_values", || {
            api.update_values(
                &target.key,
                &target.spreadsheet_id,
                target.sheet_id,
                start,
                rows.clone(),
            )
        })
        .await?;

        target.next_row = end_row;
        self.rows_written += count;
        tracing::debug!(
            spreadsheet_id = %target.spreadsheet_id,
            rows = count,
            total_rows = self.rows_written,
            "Rows appended to sheet"
        );
        Ok(())
    }

    async fn finalize(&mut self) -> BackendResult<()> {
        let Some(target) = self.target.take() else {
            return Ok(());
        };
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let run = format!("Last updated: {stamp}\nRows: {}", self.rows_written);
        let note = CellNote {
            row: 0,
            column: 0,
            text: match &target.first_note {
                Some(description) => format!("{description}\n\n{run}"),
                None => run,
            },
        };
        let api = &self.api;
        call(self.retry, "set_notes", || {
            api.set_notes(
                &target.key,
                &target.spreadsheet_id,
                target.sheet_id,
                vec![note.clone()],
            )
        })
        .await?;
        tracing::info!(
            spreadsheet_id = %target.spreadsheet_id,
            sheet_id = target.sheet_id,
            rows = self.rows_written,
            "Google Sheet write finished"
        );
        Ok(())
    }
}
