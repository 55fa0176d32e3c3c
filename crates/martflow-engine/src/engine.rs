//! Wiring of the engine services around one store and one registry.

use std::sync::Arc;

use anyhow::Context;
use martflow_sdk::registry::Capabilities;
use martflow_state::{ReportStore, SqliteReportStore};
use tokio::task::JoinHandle;

use crate::cache::ReportDataCache;
use crate::config::{validate_config, EngineConfig};
use crate::credentials::DestinationCredentialsService;
use crate::data_mart::DataMartService;
use crate::orchestrator::ReportRunner;

/// Every engine service, sharing one store and one capability registry.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn ReportStore>,
    capabilities: Arc<Capabilities>,
    runner: Arc<ReportRunner>,
    cache: ReportDataCache,
    data_marts: DataMartService,
    credentials: DestinationCredentialsService,
}

impl Engine {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ReportStore>,
        capabilities: Arc<Capabilities>,
    ) -> Self {
        let runner = Arc::new(ReportRunner::new(
            Arc::clone(&store),
            Arc::clone(&capabilities),
            config.runs.batch_size,
        ));
        let cache = ReportDataCache::new(
            Arc::clone(&store),
            Arc::clone(&capabilities),
            config.cache.default_lifetime(),
        );
        let data_marts = DataMartService::new(Arc::clone(&store), Arc::clone(&capabilities));
        let credentials =
            DestinationCredentialsService::new(Arc::clone(&store), Arc::clone(&capabilities));
        Self {
            config,
            store,
            capabilities,
            runner,
            cache,
            data_marts,
            credentials,
        }
    }

    /// Validate `config` and open the SQLite store it names.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the store cannot be opened.
    pub fn open(config: EngineConfig, capabilities: Arc<Capabilities>) -> anyhow::Result<Self> {
        validate_config(&config)?;
        let store = SqliteReportStore::open(&config.state.path).with_context(|| {
            format!(
                "Failed to open state store at {}",
                config.state.path.display()
            )
        })?;
        tracing::info!(path = %config.state.path.display(), "State store opened");
        Ok(Self::new(config, Arc::new(store), capabilities))
    }

    /// Start the periodic cache sweep.
    #[must_use]
    pub fn spawn_cache_sweeper(&self) -> JoinHandle<()> {
        self.cache.spawn_sweeper(self.config.cache.sweep_interval())
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    #[must_use]
    pub fn capabilities(&self) -> &Arc<Capabilities> {
        &self.capabilities
    }

    #[must_use]
    pub fn runner(&self) -> &Arc<ReportRunner> {
        &self.runner
    }

    #[must_use]
    pub fn cache(&self) -> &ReportDataCache {
        &self.cache
    }

    #[must_use]
    pub fn data_marts(&self) -> &DataMartService {
        &self.data_marts
    }

    #[must_use]
    pub fn credentials(&self) -> &DestinationCredentialsService {
        &self.credentials
    }
}
