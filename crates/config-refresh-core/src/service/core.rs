use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::auto_poll::AutoPollConfigService;
use super::config::{PollingMode, ServiceOptions};
use super::hooks::HookDispatcher;
use super::lazy_load::LazyLoadConfigService;
use super::manual_poll::ManualPollConfigService;
use super::refresh::EngineShared;
use super::single_flight::SingleFlight;
use crate::fetch::{ConfigFetcher, FetchResult, RefreshResult};
use crate::project_config::ProjectConfig;
use crate::status::{RefreshStatus, StatusSnapshot};

/// Shared refresh engine used by every policy.
///
/// Cloning is cheap; clones share the same cache, mode flags and in-flight
/// fetch.
#[derive(Debug, Clone)]
pub struct RefreshEngine {
    pub(crate) shared: Arc<EngineShared>,
}

impl RefreshEngine {
    /// Builds an engine; the initial mode comes from `options.offline`.
    pub fn new(fetcher: Arc<dyn ConfigFetcher>, options: &ServiceOptions) -> Self {
        let shared = EngineShared {
            fetcher,
            cache: Arc::clone(&options.cache),
            cache_key: options.cache_key(),
            hooks: HookDispatcher::new(Arc::clone(&options.hooks)),
            offline: AtomicBool::new(options.offline),
            disposed: AtomicBool::new(false),
            in_flight: SingleFlight::new(),
            status: Arc::new(RefreshStatus::new()),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Refreshes from the backend, using `previous` for the conditional fetch.
    ///
    /// Concurrent calls share one fetch and all receive its result. Offline,
    /// the call returns `previous` with a skipped result and never touches the
    /// fetcher. Once disposed, no new fetch is started.
    pub async fn refresh(
        &self,
        previous: Option<Arc<ProjectConfig>>,
    ) -> (RefreshResult, Option<Arc<ProjectConfig>>) {
        if self.is_offline() {
            debug!("config-refresh: offline, skipping refresh");
            return self.shared.reconcile(FetchResult::Skipped, previous).await;
        }
        if self.is_disposed() {
            debug!("config-refresh: service disposed, refusing to fetch");
            return (
                RefreshResult::failure("config service has been disposed"),
                previous,
            );
        }

        let shared = Arc::clone(&self.shared);
        let starter_previous = previous.clone();
        let (pending, started) = self
            .shared
            .in_flight
            .join_or_start(move || shared.perform_refresh(starter_previous));
        if !started {
            debug!("config-refresh: joining in-flight refresh");
        }

        match pending.await {
            Some(outcome) => outcome,
            None => (
                RefreshResult::failure("refresh task terminated unexpectedly"),
                previous,
            ),
        }
    }

    /// Reads the currently cached document.
    pub async fn read_cache(&self) -> Option<Arc<ProjectConfig>> {
        self.shared.read_cache().await
    }

    pub fn set_online(&self) {
        if self.shared.offline.swap(false, Ordering::SeqCst) {
            info!("config-refresh: switched to online mode");
        }
    }

    pub fn set_offline(&self) {
        if !self.shared.offline.swap(true, Ordering::SeqCst) {
            info!("config-refresh: switched to offline mode");
        }
    }

    pub fn is_offline(&self) -> bool {
        self.shared.offline.load(Ordering::SeqCst)
    }

    /// Marks the engine disposed; idempotent.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn dispose(&self) -> bool {
        let first = !self.shared.disposed.swap(true, Ordering::SeqCst);
        if first {
            debug!("config-refresh: engine disposed");
        }
        first
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Returns refresh counters and the last error.
    pub async fn status(&self) -> StatusSnapshot {
        self.shared.status.snapshot(self.is_offline()).await
    }

    pub(crate) fn hooks(&self) -> &HookDispatcher {
        &self.shared.hooks
    }
}

/// Read/refresh surface shared by the three policies.
#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Returns the document to serve, applying the policy's freshness rules.
    async fn get_config(&self) -> Option<Arc<ProjectConfig>>;

    /// Refreshes unconditionally through the shared single-flight path.
    async fn refresh_config(&self) -> (RefreshResult, Option<Arc<ProjectConfig>>) {
        let engine = self.engine();
        let cached = engine.read_cache().await;
        engine.refresh(cached).await
    }

    /// Returns the engine backing this service.
    fn engine(&self) -> &RefreshEngine;

    fn set_online(&self) {
        self.engine().set_online();
    }

    fn set_offline(&self) {
        self.engine().set_offline();
    }

    fn is_offline(&self) -> bool {
        self.engine().is_offline()
    }

    /// Releases background resources; further calls are no-ops.
    fn dispose(&self) {
        self.engine().dispose();
    }
}

/// Builds the service selected by `mode`.
///
/// Must be called within a Tokio runtime when `mode` is continuous polling,
/// since that policy spawns its background loop immediately.
pub fn create_config_service(
    fetcher: Arc<dyn ConfigFetcher>,
    options: ServiceOptions,
    mode: PollingMode,
) -> Arc<dyn ConfigService> {
    match mode {
        PollingMode::AutoPoll(auto) => {
            Arc::new(AutoPollConfigService::new(fetcher, options, auto))
        }
        PollingMode::LazyLoad(lazy) => {
            Arc::new(LazyLoadConfigService::new(fetcher, options, lazy))
        }
        PollingMode::ManualPoll(_) => Arc::new(ManualPollConfigService::new(fetcher, options)),
    }
}
