pub mod cache;
pub mod check;
pub mod secret;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use martflow_engine::config::parse_config;
use martflow_engine::Engine;
use martflow_sdk::registry::Capabilities;

/// Capabilities that need no vendor API adapter.
fn capabilities() -> Result<Arc<Capabilities>> {
    let mut builder = Capabilities::builder();
    dest_looker_studio::register(&mut builder);
    Ok(Arc::new(builder.build()?))
}

/// Parse the config at `path` and open the engine it describes.
pub(crate) fn open_engine(path: &Path) -> Result<Engine> {
    let config = parse_config(path)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Engine::open(config, capabilities()?)
}

#[cfg(test)]
mod tests {
    use martflow_types::backend::DestinationType;

    use super::*;

    #[test]
    fn test_open_engine_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("state.db");
        let config = dir.path().join("martflow.yaml");
        std::fs::write(
            &config,
            format!("state:\n  path: {}\nruns:\n  batch_size: 250\n", db.display()),
        )
        .unwrap();

        let engine = open_engine(&config).unwrap();
        assert_eq!(engine.config().runs.batch_size, 250);
        assert!(db.exists());
        assert!(engine
            .capabilities()
            .destination
            .secret_key_rotators
            .is_registered(DestinationType::LookerStudio));
    }

    #[test]
    fn test_missing_config_names_path() {
        let err = open_engine(Path::new("/nonexistent/martflow.yaml"))
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/martflow.yaml"));
    }
}
