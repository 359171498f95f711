//! Ready-made [`ConfigHooks`] implementations.
//!
//! [`CountingHooks`] keeps atomic counters that callers can export to their
//! metrics backend, and [`CompositeHooks`] fans events out to several
//! observers (for example counters plus an application callback).

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::project_config::ProjectConfig;
use crate::service::hooks::panic_message;
use crate::service::ConfigHooks;

/// Aggregated hook counters (all values use relaxed atomics).
#[derive(Debug, Default)]
pub struct HookCounters {
    client_ready: AtomicU64,
    config_changed: AtomicU64,
    fetch_error: AtomicU64,
}

impl HookCounters {
    /// Captures a point-in-time snapshot of the counters.
    pub fn snapshot(&self) -> HookSnapshot {
        HookSnapshot {
            client_ready: self.client_ready.load(Ordering::Relaxed),
            config_changed: self.config_changed.load(Ordering::Relaxed),
            fetch_error: self.fetch_error.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`HookCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookSnapshot {
    /// Number of ready notifications.
    pub client_ready: u64,
    /// Number of content changes observed.
    pub config_changed: u64,
    /// Number of failed refreshes.
    pub fetch_error: u64,
}

impl fmt::Display for HookSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "client_ready={}, config_changed={}, fetch_error={}",
            self.client_ready, self.config_changed, self.fetch_error
        )
    }
}

/// Hook implementation that maintains an atomic counter per event.
#[derive(Debug, Clone)]
pub struct CountingHooks {
    counters: Arc<HookCounters>,
}

impl CountingHooks {
    /// Creates a hook instance backed by the provided counter set.
    pub fn new(counters: Arc<HookCounters>) -> Self {
        Self { counters }
    }

    /// Returns the underlying counter set.
    pub fn counters(&self) -> Arc<HookCounters> {
        self.counters.clone()
    }
}

impl Default for CountingHooks {
    fn default() -> Self {
        Self::new(Arc::new(HookCounters::default()))
    }
}

impl ConfigHooks for CountingHooks {
    fn on_client_ready(&self) {
        self.counters.client_ready.fetch_add(1, Ordering::Relaxed);
    }

    fn on_config_changed(&self, _previous: Option<&ProjectConfig>, _current: &ProjectConfig) {
        self.counters.config_changed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fetch_error(&self, _cause: &str) {
        self.counters.fetch_error.fetch_add(1, Ordering::Relaxed);
    }
}

/// Hook implementation that forwards events to multiple observers.
pub struct CompositeHooks {
    observers: Vec<Arc<dyn ConfigHooks>>,
}

impl CompositeHooks {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Adds an observer to the dispatcher.
    pub fn with_observer(mut self, hooks: Arc<dyn ConfigHooks>) -> Self {
        self.observers.push(hooks);
        self
    }

    /// Extends the dispatcher with additional observers.
    pub fn extend<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = Arc<dyn ConfigHooks>>,
    {
        self.observers.extend(iter);
    }
}

impl Default for CompositeHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompositeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeHooks")
            .field("observer_count", &self.observers.len())
            .finish()
    }
}

impl CompositeHooks {
    /// Calls `notify` on every observer; a panicking observer does not stop the rest.
    fn each(&self, hook: &'static str, notify: impl Fn(&dyn ConfigHooks)) {
        for observer in &self.observers {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| notify(observer.as_ref()))) {
                warn!(
                    "config-refresh: {hook} observer panicked: {}",
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

impl ConfigHooks for CompositeHooks {
    fn on_client_ready(&self) {
        self.each("on_client_ready", |observer| observer.on_client_ready());
    }

    fn on_config_changed(&self, previous: Option<&ProjectConfig>, current: &ProjectConfig) {
        self.each("on_config_changed", |observer| {
            observer.on_config_changed(previous, current)
        });
    }

    fn on_fetch_error(&self, cause: &str) {
        self.each("on_fetch_error", |observer| observer.on_fetch_error(cause));
    }
}
