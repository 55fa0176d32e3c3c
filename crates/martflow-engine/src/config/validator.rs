//! Semantic validation for parsed engine configuration values.

use anyhow::{bail, Result};

use crate::config::types::EngineConfig;

/// Longest accepted reader cache lifetime (one week).
const MAX_CACHE_LIFETIME_SECS: u64 = 7 * 24 * 3_600;

/// Validate a parsed engine configuration.
///
/// # Errors
///
/// Returns an error listing every validation failure found.
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "Unsupported config version '{}', expected '1.0'",
            config.version
        ));
    }

    if config.state.path.as_os_str().is_empty() {
        errors.push("state.path must not be empty".to_string());
    }

    if config.runs.batch_size == 0 {
        errors.push("runs.batch_size must be at least 1".to_string());
    }

    if config.cache.default_lifetime_secs == 0 {
        errors.push("cache.default_lifetime_secs must be at least 1".to_string());
    } else if config.cache.default_lifetime_secs > MAX_CACHE_LIFETIME_SECS {
        errors.push(format!(
            "cache.default_lifetime_secs must be at most {MAX_CACHE_LIFETIME_SECS}"
        ));
    }

    if config.cache.sweep_interval_secs == 0 {
        errors.push("cache.sweep_interval_secs must be at least 1".to_string());
    }

    if !errors.is_empty() {
        bail!("Config validation failed:\n  - {}", errors.join("\n  - "));
    }
    Ok(())
}
