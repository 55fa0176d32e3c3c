use std::path::Path;

use anyhow::{bail, Result};
use martflow_types::entity::{Report, ReportId};

/// Execute the `status` command: print run bookkeeping per report.
pub fn execute(config_path: &Path, report: Option<&str>) -> Result<()> {
    let engine = super::open_engine(config_path)?;
    let reports = match report {
        Some(id) => match engine.store().get_report(&ReportId::new(id))? {
            Some(report) => vec![report],
            None => bail!("Report {id} not found"),
        },
        None => engine.store().list_reports()?,
    };

    if reports.is_empty() {
        println!("No reports.");
        return Ok(());
    }
    for report in &reports {
        println!("{}", format_report(report));
    }
    Ok(())
}

fn format_report(report: &Report) -> String {
    let run = &report.run;
    let status = run
        .last_run_status
        .map_or_else(|| "NEVER_RUN".to_string(), |s| s.to_string());
    let at = run
        .last_run_at
        .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
    let mut line = format!(
        "{:24} {:10} runs={:<5} last={}  {}",
        report.id.as_str(),
        status,
        run.runs_count,
        at,
        report.title
    );
    if let Some(error) = &run.last_run_error {
        line.push_str(&format!("\n  error: {error}"));
    }
    line
}
