//! Continuous-poll policy.
//!
//! A background loop refreshes the cache every poll interval until the
//! service is disposed. Reads return fresh cached data immediately; while the
//! cache is missing or older than the poll interval, reads wait for the next
//! refresh, but never past `max_init_wait` after construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::config::{AutoPollOptions, ServiceOptions};
use super::core::{ConfigService, RefreshEngine};
use crate::fetch::{ConfigFetcher, RefreshResult};
use crate::project_config::ProjectConfig;

/// Initialization state shared by the service, the loop and the watchdog.
#[derive(Debug)]
struct InitGate {
    initialized: watch::Sender<bool>,
    /// Reads stop waiting for the first refresh after this instant.
    deadline: Instant,
    ready_fired: AtomicBool,
}

impl InitGate {
    fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Marks the service initialized and fires the ready hook once.
    fn signal(&self, engine: &RefreshEngine) {
        if !self.initialized.send_replace(true) {
            debug!("config-refresh: auto-poll initialized");
        }
        self.fire_ready(engine);
    }

    fn fire_ready(&self, engine: &RefreshEngine) {
        if engine.is_disposed() {
            return;
        }
        if !self.ready_fired.swap(true, Ordering::SeqCst) {
            engine.hooks().client_ready();
        }
    }
}

/// Service that keeps the cache warm with a background refresh loop.
#[derive(Debug)]
pub struct AutoPollConfigService {
    engine: RefreshEngine,
    options: AutoPollOptions,
    gate: Arc<InitGate>,
    shutdown: broadcast::Sender<()>,
    join_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AutoPollConfigService {
    /// Starts the poll loop and the readiness watchdog.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(
        fetcher: Arc<dyn ConfigFetcher>,
        options: ServiceOptions,
        auto: AutoPollOptions,
    ) -> Self {
        let auto = auto.sanitise();
        let engine = RefreshEngine::new(fetcher, &options);
        let (initialized, _) = watch::channel(false);
        let gate = Arc::new(InitGate {
            initialized,
            deadline: Instant::now() + auto.max_init_wait,
            ready_fired: AtomicBool::new(false),
        });
        if options.offline {
            gate.signal(&engine);
        }

        let (shutdown, _) = broadcast::channel(1);
        let poller = tokio::spawn(run_poll_loop(
            engine.clone(),
            Arc::clone(&gate),
            auto.poll_interval,
            shutdown.subscribe(),
        ));
        let watchdog = {
            let engine = engine.clone();
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                sleep_until(gate.deadline).await;
                gate.fire_ready(&engine);
            })
        };

        Self {
            engine,
            options: auto,
            gate,
            shutdown,
            join_handles: Mutex::new(vec![poller, watchdog]),
        }
    }

    /// Returns the sanitised options in effect.
    pub fn options(&self) -> AutoPollOptions {
        self.options
    }

    async fn wait_for_initialization(&self) {
        let mut initialized = self.gate.initialized.subscribe();
        let timed_out = timeout_at(self.gate.deadline, initialized.wait_for(|ready| *ready))
            .await
            .is_err();
        if timed_out {
            debug!("config-refresh: max init wait elapsed, serving cached config");
            self.gate.fire_ready(&self.engine);
        }
    }
}

#[async_trait]
impl ConfigService for AutoPollConfigService {
    async fn get_config(&self) -> Option<Arc<ProjectConfig>> {
        let cached = self.engine.read_cache().await;
        if self.engine.is_offline()
            || !ProjectConfig::is_expired(cached.as_deref(), self.options.poll_interval)
        {
            return cached;
        }
        if self.gate.is_initialized() || Instant::now() >= self.gate.deadline {
            return cached;
        }

        debug!("config-refresh: cache empty or expired, waiting for initial refresh");
        self.wait_for_initialization().await;
        self.engine.read_cache().await
    }

    async fn refresh_config(&self) -> (RefreshResult, Option<Arc<ProjectConfig>>) {
        let cached = self.engine.read_cache().await;
        let outcome = self.engine.refresh(cached).await;
        if !outcome.0.skipped_offline() && !self.engine.is_disposed() {
            self.gate.signal(&self.engine);
        }
        outcome
    }

    fn engine(&self) -> &RefreshEngine {
        &self.engine
    }

    /// Stops the poll loop and watchdog; idempotent.
    fn dispose(&self) {
        if !self.engine.dispose() {
            return;
        }
        let _ = self.shutdown.send(());
        let mut handles = self
            .join_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for AutoPollConfigService {
    fn drop(&mut self) {
        ConfigService::dispose(self);
    }
}

/// Refreshes every `poll_interval` until shutdown.
///
/// The first tick fires immediately. It only fetches when the cache is
/// missing or expired; later ticks always refresh the current cache entry.
async fn run_poll_loop(
    engine: RefreshEngine,
    gate: Arc<InitGate>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first_iteration = true;
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!("config-refresh: poll loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                poll_once(&engine, &gate, poll_interval, first_iteration).await;
                first_iteration = false;
            }
        }
    }
}

async fn poll_once(
    engine: &RefreshEngine,
    gate: &InitGate,
    poll_interval: Duration,
    first_iteration: bool,
) {
    let cached = engine.read_cache().await;
    if engine.is_offline() {
        if first_iteration {
            gate.signal(engine);
        }
        return;
    }
    if first_iteration && !ProjectConfig::is_expired(cached.as_deref(), poll_interval) {
        debug!("config-refresh: cached config is fresh, skipping initial fetch");
        gate.signal(engine);
        return;
    }

    let (result, _) = engine.refresh(cached).await;
    debug!(result = %result, "config-refresh: poll completed");
    gate.signal(engine);
}
