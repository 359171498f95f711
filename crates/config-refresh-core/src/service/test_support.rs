#![cfg(test)]

//! Shared fakes for service-level tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::config::ServiceOptions;
use super::core::RefreshEngine;
use super::hooks::ConfigHooks;
use super::refresh::EngineShared;
use crate::cache::{CacheError, ConfigCache, InMemoryConfigCache};
use crate::fetch::{ConfigFetcher, FetchError, FetchResponse};
use crate::project_config::ProjectConfig;

pub(crate) const TEST_SDK_KEY: &str = "test-sdk-key/abcdefghijklmnopqrstuv";

/// Fetcher that replays scripted responses; the last one repeats once the script runs out.
pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<FetchResponse, String>>>,
    last: Mutex<Option<Result<FetchResponse, String>>>,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    etags: Mutex<Vec<Option<String>>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(
        script: impl IntoIterator<Item = Result<FetchResponse, String>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            etags: Mutex::new(Vec::new()),
        })
    }

    /// Responds with `body`/`etag` to every call.
    pub(crate) fn always(body: &str, etag: &str) -> Arc<Self> {
        Self::new([Ok(fetched(body, etag))])
    }

    /// Responds with a 502 to every call.
    pub(crate) fn failing() -> Arc<Self> {
        Self::new([Ok(FetchResponse::Failed {
            status: Some(502),
            reason: "Bad Gateway".into(),
        })])
    }

    /// Makes every call take `delay` before answering.
    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Identity tags the fetcher was called with, in call order.
    pub(crate) fn seen_etags(&self) -> Vec<Option<String>> {
        self.etags.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<FetchResponse, String> {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| {
                Ok(FetchResponse::Failed {
                    status: Some(500),
                    reason: "no scripted response".into(),
                })
            }),
        }
    }
}

#[async_trait]
impl ConfigFetcher for ScriptedFetcher {
    async fn fetch(&self, last_etag: Option<&str>) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.etags
            .lock()
            .unwrap()
            .push(last_etag.map(str::to_string));
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.next_response().map_err(FetchError::Other)
    }
}

pub(crate) fn fetched(body: &str, etag: &str) -> FetchResponse {
    FetchResponse::Fetched {
        body: body.to_string(),
        etag: Some(etag.to_string()),
    }
}

/// In-memory cache that counts operations and optionally yields before answering.
#[derive(Default)]
pub(crate) struct RecordingCache {
    inner: InMemoryConfigCache,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deferred: bool,
}

impl RecordingCache {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A cache whose results are only available after a scheduler round-trip.
    pub(crate) fn deferred() -> Arc<Self> {
        Arc::new(Self {
            deferred: true,
            ..Default::default()
        })
    }

    pub(crate) fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub(crate) fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Stores `config` under the test SDK key without counting it as a write.
    pub(crate) async fn seed(&self, config: Arc<ProjectConfig>) {
        self.inner
            .set(&crate::cache::cache_key(TEST_SDK_KEY), config)
            .await
            .unwrap();
    }

    pub(crate) async fn current(&self) -> Option<Arc<ProjectConfig>> {
        self.inner
            .get(&crate::cache::cache_key(TEST_SDK_KEY))
            .await
            .unwrap()
    }
}

#[async_trait]
impl ConfigCache for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Arc<ProjectConfig>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.deferred {
            tokio::task::yield_now().await;
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, config: Arc<ProjectConfig>) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.deferred {
            tokio::task::yield_now().await;
        }
        self.inner.set(key, config).await
    }
}

/// Cache whose backend is always down.
pub(crate) struct BrokenCache;

#[async_trait]
impl ConfigCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Arc<ProjectConfig>>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _config: Arc<ProjectConfig>) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

/// A document fetched `age` ago.
pub(crate) fn config_aged(payload: &str, etag: &str, age: Duration) -> Arc<ProjectConfig> {
    Arc::new(ProjectConfig::new(
        payload,
        Some(etag.to_string()),
        OffsetDateTime::now_utc() - age,
    ))
}

pub(crate) fn options(cache: Arc<dyn ConfigCache>, hooks: Arc<dyn ConfigHooks>) -> ServiceOptions {
    ServiceOptions::new(TEST_SDK_KEY)
        .with_cache(cache)
        .with_hooks(hooks)
}

/// Engine internals wired to `fetcher`, a fresh in-memory cache and `hooks`.
pub(crate) fn engine_shared(
    fetcher: Arc<ScriptedFetcher>,
    hooks: Arc<dyn ConfigHooks>,
) -> Arc<EngineShared> {
    let options = options(Arc::new(InMemoryConfigCache::new()), hooks);
    RefreshEngine::new(fetcher, &options).shared
}
