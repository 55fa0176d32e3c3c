use std::path::Path;

use anyhow::Result;

/// Execute the `check` command: validate the config and open the store.
pub fn execute(config_path: &Path) -> Result<()> {
    let engine = super::open_engine(config_path)?;
    let config = engine.config();
    println!("Config:            OK");
    println!("State store:       OK ({})", config.state.path.display());

    let reports = engine.store().list_reports()?;
    let entries = engine.store().list_cache_entries()?;
    println!("Reports:           {}", reports.len());
    println!("Cache entries:     {}", entries.len());
    println!("Run batch size:    {}", config.runs.batch_size);
    println!(
        "Cache lifetime:    {}s (sweep every {}s)",
        config.cache.default_lifetime_secs, config.cache.sweep_interval_secs
    );

    let registered = engine
        .capabilities()
        .destination
        .secret_key_rotators
        .registered_types();
    let names: Vec<String> = registered.iter().map(ToString::to_string).collect();
    println!("Managed secrets:   {}", names.join(", "));
    println!("\nAll checks passed.");
    Ok(())
}
