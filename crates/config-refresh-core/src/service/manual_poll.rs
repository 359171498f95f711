//! Manual policy: only `refresh_config` ever fetches.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::ServiceOptions;
use super::core::{ConfigService, RefreshEngine};
use crate::fetch::ConfigFetcher;
use crate::project_config::ProjectConfig;

#[derive(Debug)]
pub struct ManualPollConfigService {
    engine: RefreshEngine,
}

impl ManualPollConfigService {
    /// Builds the service; it is ready immediately.
    pub fn new(fetcher: Arc<dyn ConfigFetcher>, options: ServiceOptions) -> Self {
        let engine = RefreshEngine::new(fetcher, &options);
        engine.hooks().client_ready();
        Self { engine }
    }
}

#[async_trait]
impl ConfigService for ManualPollConfigService {
    /// Reads the cache; never fetches, however stale or empty it is.
    async fn get_config(&self) -> Option<Arc<ProjectConfig>> {
        self.engine.read_cache().await
    }

    fn engine(&self) -> &RefreshEngine {
        &self.engine
    }
}
