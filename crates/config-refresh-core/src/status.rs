//! Lightweight refresh diagnostics exposed to embedders: refresh counters,
//! the last error and the last successful refresh.
//!
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Tracks refresh activity observed by the engine.
#[derive(Debug, Default)]
pub struct RefreshStatus {
    fetches: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
    last_error: RwLock<Option<String>>,
    last_success: RwLock<Option<OffsetDateTime>>,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last refresh error (cleared by the next success).
    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub(crate) fn record_fetch_started(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) async fn record_success(&self, at: OffsetDateTime) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        *self.last_success.write().await = Some(at);
        *self.last_error.write().await = None;
    }

    pub(crate) async fn record_failure(&self, cause: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write().await = Some(cause.to_string());
    }

    /// Returns a status snapshot suitable for logging/exporting.
    pub async fn snapshot(&self, offline: bool) -> StatusSnapshot {
        StatusSnapshot {
            offline,
            fetches: self.fetches.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            last_error: self.last_error().await,
            last_success: *self.last_success.read().await,
        }
    }
}

/// Point-in-time view of [`RefreshStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub offline: bool,
    /// Number of fetches actually sent to the fetcher.
    pub fetches: u64,
    pub successes: u64,
    pub failures: u64,
    /// Refresh requests answered without a fetch because the engine was offline.
    pub skipped: u64,
    pub last_error: Option<String>,
    pub last_success: Option<OffsetDateTime>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusJson<'a> {
    offline: bool,
    fetches: u64,
    successes: u64,
    failures: u64,
    skipped: u64,
    last_error: Option<&'a str>,
    last_success: Option<String>,
}

impl StatusSnapshot {
    /// Renders the snapshot as a camelCase JSON object.
    pub fn to_json(&self) -> Value {
        let body = StatusJson {
            offline: self.offline,
            fetches: self.fetches,
            successes: self.successes,
            failures: self.failures,
            skipped: self.skipped,
            last_error: self.last_error.as_deref(),
            last_success: self
                .last_success
                .and_then(|at| at.format(&Rfc3339).ok()),
        };
        serde_json::to_value(body).unwrap_or(Value::Null)
    }
}
