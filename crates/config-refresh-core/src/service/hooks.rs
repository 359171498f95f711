//! Lifecycle hook abstractions.
//!
//! Embedders implement [`ConfigHooks`] to observe readiness, content changes
//! and fetch failures. Hooks are a side channel: the service calls them
//! through [`HookDispatcher`], which contains panics so a misbehaving observer
//! never fails a refresh.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::project_config::ProjectConfig;

/// Hook invoked on significant service events.
pub trait ConfigHooks: Send + Sync {
    /// Called once when the service is ready to serve reads.
    fn on_client_ready(&self) {}
    /// Called after a refresh stored content that differs from the previous document.
    fn on_config_changed(&self, _previous: Option<&ProjectConfig>, _current: &ProjectConfig) {}
    /// Called when a refresh attempt fails.
    fn on_fetch_error(&self, _cause: &str) {}
}

/// Default hook implementation that performs no-ops.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl ConfigHooks for NoopHooks {}

/// Panic-isolating wrapper used by the service to notify hooks.
#[derive(Clone)]
pub(crate) struct HookDispatcher {
    hooks: Arc<dyn ConfigHooks>,
}

impl HookDispatcher {
    pub(crate) fn new(hooks: Arc<dyn ConfigHooks>) -> Self {
        Self { hooks }
    }

    pub(crate) fn client_ready(&self) {
        self.guarded("on_client_ready", || self.hooks.on_client_ready());
    }

    pub(crate) fn config_changed(&self, previous: Option<&ProjectConfig>, current: &ProjectConfig) {
        self.guarded("on_config_changed", || {
            self.hooks.on_config_changed(previous, current)
        });
    }

    pub(crate) fn fetch_error(&self, cause: &str) {
        self.guarded("on_fetch_error", || self.hooks.on_fetch_error(cause));
    }

    fn guarded(&self, hook: &'static str, call: impl FnOnce()) {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(call)) {
            warn!(
                "config-refresh: {hook} hook panicked: {}",
                panic_message(panic.as_ref())
            );
        }
    }
}

impl fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDispatcher").finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
