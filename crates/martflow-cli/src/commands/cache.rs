use std::path::Path;

use anyhow::Result;
use chrono::Utc;

/// Execute the `cache` command: list persisted reader cache entries.
pub fn execute(config_path: &Path, expired_only: bool) -> Result<()> {
    let engine = super::open_engine(config_path)?;
    let now = Utc::now();
    let entries: Vec<_> = engine
        .store()
        .list_cache_entries()?
        .into_iter()
        .filter(|e| !expired_only || e.is_expired_at(now))
        .collect();

    if entries.is_empty() {
        println!("No cache entries.");
        return Ok(());
    }
    for entry in &entries {
        let state = if entry.is_expired_at(now) {
            "expired"
        } else {
            "live"
        };
        println!(
            "{}  report={}  storage={}  columns={}  expires={}  [{}]",
            entry.id,
            entry.report_id,
            entry.storage_type,
            entry.data_description.headers.len(),
            entry.expires_at.to_rfc3339(),
            state,
        );
    }
    Ok(())
}
