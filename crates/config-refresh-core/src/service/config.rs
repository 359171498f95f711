//! Static configuration for the refresh services.
//!
//! [`ServiceOptions`] carries what every policy shares (client identity,
//! cache, hooks, initial mode). The per-policy option structs carry the
//! timing knobs and are clamped by `sanitise` when a service is built.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::cache::{cache_key, ConfigCache, InMemoryConfigCache};
use crate::service::hooks::{ConfigHooks, NoopHooks};

/// Default background polling cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Minimum polling cadence accepted by the continuous-poll policy.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default bound on how long the first reads wait for initial data.
pub const DEFAULT_MAX_INIT_WAIT: Duration = Duration::from_secs(5);
/// Default time-to-live of cached documents under the lazy policy.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Minimum time-to-live accepted by the lazy policy.
pub const MIN_CACHE_TTL: Duration = Duration::from_secs(1);

/// Options shared by every refresh policy.
#[derive(Clone)]
pub struct ServiceOptions {
    /// SDK key identifying the configuration document.
    pub sdk_key: String,
    /// Document store; defaults to a process-local cache.
    pub cache: Arc<dyn ConfigCache>,
    /// Lifecycle observers; defaults to no-op hooks.
    pub hooks: Arc<dyn ConfigHooks>,
    /// Start in offline mode (no fetches until `set_online`).
    pub offline: bool,
}

impl ServiceOptions {
    pub fn new(sdk_key: impl Into<String>) -> Self {
        Self {
            sdk_key: sdk_key.into(),
            cache: Arc::new(InMemoryConfigCache::new()),
            hooks: Arc::new(NoopHooks),
            offline: false,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ConfigCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ConfigHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Returns the cache key derived from the SDK key.
    pub fn cache_key(&self) -> String {
        cache_key(&self.sdk_key)
    }
}

impl fmt::Debug for ServiceOptions {
    /// Omits the SDK key and the trait objects.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("sdk_key", &"<redacted>")
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

/// Timing knobs of the continuous-poll policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPollOptions {
    /// Interval between background refreshes; also the freshness window of reads.
    pub poll_interval: Duration,
    /// Upper bound on how long reads wait for the first refresh.
    pub max_init_wait: Duration,
}

impl Default for AutoPollOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_init_wait: DEFAULT_MAX_INIT_WAIT,
        }
    }
}

impl AutoPollOptions {
    pub(crate) fn sanitise(mut self) -> Self {
        if self.poll_interval < MIN_POLL_INTERVAL {
            warn!(
                "config-refresh: poll interval {:?} is below the minimum {:?}; clamping",
                self.poll_interval, MIN_POLL_INTERVAL
            );
            self.poll_interval = MIN_POLL_INTERVAL;
        }
        self
    }
}

/// Timing knobs of the lazy-TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LazyLoadOptions {
    /// Maximum age of a cached document before a read refreshes it.
    pub cache_ttl: Duration,
}

impl Default for LazyLoadOptions {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl LazyLoadOptions {
    pub(crate) fn sanitise(mut self) -> Self {
        if self.cache_ttl < MIN_CACHE_TTL {
            warn!(
                "config-refresh: cache TTL {:?} is below the minimum {:?}; clamping",
                self.cache_ttl, MIN_CACHE_TTL
            );
            self.cache_ttl = MIN_CACHE_TTL;
        }
        self
    }
}

/// The manual policy has no timing knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManualPollOptions;

/// Selects the refresh policy of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingMode {
    AutoPoll(AutoPollOptions),
    LazyLoad(LazyLoadOptions),
    ManualPoll(ManualPollOptions),
}

impl Default for PollingMode {
    fn default() -> Self {
        Self::AutoPoll(AutoPollOptions::default())
    }
}
