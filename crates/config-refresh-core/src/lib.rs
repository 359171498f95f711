//! Public entry points for the config refresh core crate.
//!
//! The crate keeps a locally cached configuration document fresh with respect
//! to a backend under one of three policies (continuous polling, lazy TTL,
//! manual), sharing a single deduplicated fetch/cache reconciliation engine.
//! The re-exports below cover everything needed to embed it without digging
//! into the internal module layout.

pub mod cache;
pub mod fetch;
pub mod hooks;
pub mod http;
pub mod project_config;
pub mod service;
pub mod status;

pub use cache::{
    cache_key, CacheError, ConfigCache, ExternalCache, ExternalConfigCache, InMemoryConfigCache,
};
pub use fetch::{ConfigFetcher, FetchError, FetchResponse, FetchResult, RefreshResult};
pub use hooks::{CompositeHooks, CountingHooks, HookCounters, HookSnapshot};
pub use http::{HttpConfigFetcher, HttpFetcherOptions};
pub use project_config::{ProjectConfig, ProjectConfigParseError};
pub use service::{
    create_config_service, AutoPollConfigService, AutoPollOptions, ConfigHooks, ConfigService,
    LazyLoadConfigService, LazyLoadOptions, ManualPollConfigService, ManualPollOptions, NoopHooks,
    PollingMode, RefreshEngine, ServiceOptions,
};
pub use status::{RefreshStatus, StatusSnapshot};
