//! Fetch/cache reconciliation.
//!
//! This module hosts the engine internals shared by every policy: the
//! collaborators, the online/offline and disposal flags, the single-flight
//! slot, and the routine that turns one fetch outcome into the document the
//! caller should see. Higher-level APIs in `core.rs` delegate to these helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use super::hooks::HookDispatcher;
use super::single_flight::SingleFlight;
use crate::cache::ConfigCache;
use crate::fetch::{ConfigFetcher, FetchResult, RefreshResult};
use crate::project_config::ProjectConfig;
use crate::status::RefreshStatus;

/// What a refresh hands back: the result flag and the document to serve.
pub(crate) type RefreshOutcome = (RefreshResult, Option<Arc<ProjectConfig>>);

/// Shared engine internals used by policy services and background tasks.
pub(crate) struct EngineShared {
    /// Performs conditional requests against the backend.
    pub(crate) fetcher: Arc<dyn ConfigFetcher>,
    /// Document store addressed by `cache_key`.
    pub(crate) cache: Arc<dyn ConfigCache>,
    /// Key derived from the SDK key.
    pub(crate) cache_key: String,
    /// Panic-isolating hook notifier.
    pub(crate) hooks: HookDispatcher,
    pub(crate) offline: AtomicBool,
    pub(crate) disposed: AtomicBool,
    /// At most one fetch is outstanding at any time.
    pub(crate) in_flight: SingleFlight<RefreshOutcome>,
    /// Counters and last error exposed to embedders.
    pub(crate) status: Arc<RefreshStatus>,
}

impl std::fmt::Debug for EngineShared {
    /// Keeps debug output concise by only printing the mode flags.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineShared")
            .field("offline", &self.offline.load(Ordering::Relaxed))
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EngineShared {
    /// Reads the cached document; backend failures read as "absent".
    pub(crate) async fn read_cache(&self) -> Option<Arc<ProjectConfig>> {
        match self.cache.get(&self.cache_key).await {
            Ok(config) => config,
            Err(err) => {
                warn!("config-refresh: cache read failed: {err}");
                None
            }
        }
    }

    /// Persists a document; failures are logged and otherwise ignored.
    async fn write_cache(&self, config: &Arc<ProjectConfig>) {
        if let Err(err) = self.cache.set(&self.cache_key, Arc::clone(config)).await {
            warn!("config-refresh: cache write failed, keeping previous entry: {err}");
        }
    }

    /// Runs one de-duplicated refresh: fetch with the previous tag, then reconcile.
    pub(crate) async fn perform_refresh(
        self: Arc<Self>,
        previous: Option<Arc<ProjectConfig>>,
    ) -> RefreshOutcome {
        let last_etag = previous.as_ref().and_then(|config| config.identity_tag());
        debug!(etag = ?last_etag, "config-refresh: fetching config");
        self.status.record_fetch_started();

        let response = self.fetcher.fetch(last_etag).await;
        let fetched = FetchResult::from_response(response);
        self.reconcile(fetched, previous).await
    }

    /// Applies one fetch outcome to the cache and picks the document to serve.
    pub(crate) async fn reconcile(
        &self,
        fetched: FetchResult,
        previous: Option<Arc<ProjectConfig>>,
    ) -> RefreshOutcome {
        let now = OffsetDateTime::now_utc();
        match fetched {
            FetchResult::Fetched {
                payload,
                identity_tag,
            } => {
                let config = Arc::new(ProjectConfig::new(payload, identity_tag, now));
                self.write_cache(&config).await;
                if previous.as_deref() != Some(config.as_ref()) {
                    debug!(etag = ?config.identity_tag(), "config-refresh: config changed");
                    self.hooks.config_changed(previous.as_deref(), &config);
                }
                self.status.record_success(now).await;
                (RefreshResult::success(), Some(config))
            }
            FetchResult::Unchanged => match previous {
                Some(previous) => {
                    debug!("config-refresh: config not modified, extending freshness");
                    let config = Arc::new(previous.with_timestamp(now));
                    self.write_cache(&config).await;
                    self.status.record_success(now).await;
                    (RefreshResult::success(), Some(config))
                }
                None => {
                    self.fail(
                        "backend reported the config as not modified but no config is cached",
                        None,
                    )
                    .await
                }
            },
            FetchResult::Failed { cause } => self.fail(&cause, previous).await,
            FetchResult::Skipped => {
                self.status.record_skipped();
                (RefreshResult::skipped(), previous)
            }
        }
    }

    async fn fail(&self, cause: &str, previous: Option<Arc<ProjectConfig>>) -> RefreshOutcome {
        warn!(
            has_cached_config = previous.is_some(),
            "config-refresh: refresh failed, serving cached config: {cause}"
        );
        self.status.record_failure(cause).await;
        self.hooks.fetch_error(cause);
        (RefreshResult::failure(cause), previous)
    }
}
