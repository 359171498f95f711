//! Refresh service module facade.
//!
//! This module re-exports the engine, the three refresh policies and their
//! options, while wiring the submodules that implement single-flight
//! coordination, reconciliation and hook dispatch.

mod auto_poll;
pub(crate) mod config;
mod core;
pub(crate) mod hooks;
mod lazy_load;
mod manual_poll;
pub(crate) mod refresh;
pub(crate) mod single_flight;
#[cfg(test)]
pub(crate) mod test_support;

pub use auto_poll::AutoPollConfigService;
pub use config::{
    AutoPollOptions, LazyLoadOptions, ManualPollOptions, PollingMode, ServiceOptions,
    DEFAULT_CACHE_TTL, DEFAULT_MAX_INIT_WAIT, DEFAULT_POLL_INTERVAL, MIN_CACHE_TTL,
    MIN_POLL_INTERVAL,
};
pub use self::core::*;
pub use hooks::{ConfigHooks, NoopHooks};
pub use lazy_load::LazyLoadConfigService;
pub use manual_poll::ManualPollConfigService;
