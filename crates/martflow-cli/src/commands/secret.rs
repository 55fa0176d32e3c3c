use std::path::Path;

use anyhow::Result;
use martflow_types::config::DestinationCredentials;
use martflow_types::entity::DestinationId;

/// Execute the `rotate-secret` command. The new key is printed once so it
/// can be pasted into the consuming connector.
pub async fn execute(config_path: &Path, destination: &str) -> Result<()> {
    let engine = super::open_engine(config_path)?;
    let id = DestinationId::new(destination);
    let rotated = engine.credentials().rotate_secret_key(&id).await?;
    println!("Secret key rotated for destination {id}");
    if let Some(secret) = managed_secret(&rotated) {
        println!("New key: {secret}");
    }
    Ok(())
}

fn managed_secret(credentials: &DestinationCredentials) -> Option<&str> {
    match credentials {
        DestinationCredentials::LookerStudio(c) => c.destination_secret_key.as_deref(),
        DestinationCredentials::GoogleSheets(_) | DestinationCredentials::Email(_) => None,
    }
}
