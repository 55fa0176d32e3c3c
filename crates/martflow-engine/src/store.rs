//! Bridge from async callers to the synchronous report store.

use std::sync::Arc;

use anyhow::Context;
use martflow_state::{error, ReportStore};

/// Run `op` against the store on the blocking pool.
pub(crate) async fn call<T, F>(store: &Arc<dyn ReportStore>, name: &'static str, op: F) -> anyhow::Result<T>
where
    F: FnOnce(&dyn ReportStore) -> error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| anyhow::anyhow!("{name} task panicked: {e}"))?
        .with_context(|| format!("{name} failed"))
}
