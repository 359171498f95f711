//! Lazy-TTL policy: no background work, reads refresh an expired cache.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::config::{LazyLoadOptions, ServiceOptions};
use super::core::{ConfigService, RefreshEngine};
use crate::fetch::ConfigFetcher;
use crate::project_config::ProjectConfig;

#[derive(Debug)]
pub struct LazyLoadConfigService {
    engine: RefreshEngine,
    options: LazyLoadOptions,
}

impl LazyLoadConfigService {
    /// Builds the service; it is ready immediately.
    pub fn new(
        fetcher: Arc<dyn ConfigFetcher>,
        options: ServiceOptions,
        lazy: LazyLoadOptions,
    ) -> Self {
        let engine = RefreshEngine::new(fetcher, &options);
        engine.hooks().client_ready();
        Self {
            engine,
            options: lazy.sanitise(),
        }
    }

    pub fn options(&self) -> LazyLoadOptions {
        self.options
    }
}

#[async_trait]
impl ConfigService for LazyLoadConfigService {
    async fn get_config(&self) -> Option<Arc<ProjectConfig>> {
        let cached = self.engine.read_cache().await;
        if !ProjectConfig::is_expired(cached.as_deref(), self.options.cache_ttl) {
            debug!("config-refresh: cache is valid, returning cached config");
            return cached;
        }
        if self.engine.is_offline() {
            debug!("config-refresh: cache is empty or expired, offline so serving it as-is");
            return cached;
        }

        debug!("config-refresh: cache is empty or expired, refreshing");
        let (_, config) = self.engine.refresh(cached).await;
        config
    }

    fn engine(&self) -> &RefreshEngine {
        &self.engine
    }
}
