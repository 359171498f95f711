//! Cache collaborators for configuration documents.
//!
//! The engine only talks to [`ConfigCache`], a single asynchronous contract.
//! A synchronous backend simply completes immediately; [`InMemoryConfigCache`]
//! is the default. Applications that persist documents elsewhere (Redis, a
//! file, a key-value service) implement the string-valued [`ExternalCache`]
//! and wrap it in [`ExternalConfigCache`], which handles serialisation and
//! keeps a local copy to fall back on when the external store misbehaves.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::warn;

use crate::project_config::ProjectConfig;

/// Version suffix mixed into cache keys; bump when the cached format changes.
const CACHE_KEY_VERSION: &str = "v2";
/// Document name mixed into cache keys.
const CONFIG_FILE_NAME: &str = "config_v6.json";

/// Failures reported by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or rejected the operation.
    #[error("cache backend error: {0}")]
    Backend(String),
    /// The stored value could not be decoded.
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Derives the cache key for the given SDK key.
///
/// The key is the lowercase hex SHA-256 digest of
/// `"{sdk_key}_config_v6.json_v2"`, so it is stable per client identity and
/// does not leak the SDK key into shared stores.
pub fn cache_key(sdk_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{sdk_key}_{CONFIG_FILE_NAME}_{CACHE_KEY_VERSION}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Document store addressed by the cache key.
#[async_trait]
pub trait ConfigCache: Send + Sync {
    /// Returns the stored document, or `None` when nothing is cached.
    async fn get(&self, key: &str) -> Result<Option<Arc<ProjectConfig>>, CacheError>;
    /// Replaces the stored document.
    async fn set(&self, key: &str, config: Arc<ProjectConfig>) -> Result<(), CacheError>;
}

/// Process-local cache; returns the same `Arc` that was stored.
#[derive(Debug, Default)]
pub struct InMemoryConfigCache {
    entries: RwLock<HashMap<String, Arc<ProjectConfig>>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigCache for InMemoryConfigCache {
    async fn get(&self, key: &str) -> Result<Option<Arc<ProjectConfig>>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, config: Arc<ProjectConfig>) -> Result<(), CacheError> {
        self.entries.write().await.insert(key.to_string(), config);
        Ok(())
    }
}

/// String-valued store implemented by applications.
#[async_trait]
pub trait ExternalCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
}

/// Last value seen by [`ExternalConfigCache`] for one key, kept in its serialised and decoded forms.
struct LocalEntry {
    serialized: String,
    config: Arc<ProjectConfig>,
}

/// Adapts an [`ExternalCache`] to [`ConfigCache`].
///
/// Writes go to a per-key local copy first and then to the external store.
/// Reads prefer the external store but fall back to the local copy of the same
/// key when it fails or holds an undecodable value. When the external value matches the local copy
/// the same `Arc` is returned, so unchanged reads keep their identity.
pub struct ExternalConfigCache {
    external: Arc<dyn ExternalCache>,
    local: RwLock<HashMap<String, LocalEntry>>,
}

impl ExternalConfigCache {
    pub fn new(external: Arc<dyn ExternalCache>) -> Self {
        Self {
            external,
            local: RwLock::new(HashMap::new()),
        }
    }

    async fn local_config(&self, key: &str) -> Option<Arc<ProjectConfig>> {
        self.local
            .read()
            .await
            .get(key)
            .map(|entry| Arc::clone(&entry.config))
    }
}

impl fmt::Debug for ExternalConfigCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalConfigCache").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigCache for ExternalConfigCache {
    async fn get(&self, key: &str) -> Result<Option<Arc<ProjectConfig>>, CacheError> {
        let serialized = match self.external.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(self.local_config(key).await),
            Err(err) => {
                warn!("config-refresh: external cache read failed, using local copy: {err}");
                return Ok(self.local_config(key).await);
            }
        };

        if let Some(entry) = self.local.read().await.get(key) {
            if entry.serialized == serialized {
                return Ok(Some(Arc::clone(&entry.config)));
            }
        }

        match ProjectConfig::deserialize(&serialized) {
            Ok(config) => {
                let config = Arc::new(config);
                self.local.write().await.insert(
                    key.to_string(),
                    LocalEntry {
                        serialized,
                        config: Arc::clone(&config),
                    },
                );
                Ok(Some(config))
            }
            Err(err) => {
                warn!("config-refresh: external cache holds an invalid entry, using local copy: {err}");
                Ok(self.local_config(key).await)
            }
        }
    }

    async fn set(&self, key: &str, config: Arc<ProjectConfig>) -> Result<(), CacheError> {
        let serialized = config.serialize();
        self.local.write().await.insert(
            key.to_string(),
            LocalEntry {
                serialized: serialized.clone(),
                config,
            },
        );
        if let Err(err) = self.external.set(key, serialized).await {
            warn!("config-refresh: external cache write failed, keeping local copy: {err}");
        }
        Ok(())
    }
}
