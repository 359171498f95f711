//! The versioned configuration document kept fresh by the refresh engine.
//!
//! A [`ProjectConfig`] is an immutable snapshot: the opaque payload returned by
//! the backend, the identity tag (ETag) used for conditional requests, and the
//! wall-clock instant at which the snapshot was obtained or last confirmed
//! unchanged. "No document" is modelled as `Option::None` at every API
//! boundary, so an empty payload (`""`) remains a real, cacheable document.

use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;

/// Errors raised while decoding a document from its cache representation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectConfigParseError {
    /// The serialised value does not contain the timestamp/etag header lines.
    #[error("serialized config is missing the {0} line")]
    MissingLine(&'static str),
    /// The timestamp line is not a valid millisecond Unix timestamp.
    #[error("invalid config timestamp: {0}")]
    InvalidTimestamp(String),
}

/// One fetched (or confirmed-unchanged) configuration snapshot.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    payload: String,
    identity_tag: Option<String>,
    fetched_at: OffsetDateTime,
}

impl ProjectConfig {
    /// Builds a document from its parts.
    pub fn new(
        payload: impl Into<String>,
        identity_tag: Option<String>,
        fetched_at: OffsetDateTime,
    ) -> Self {
        Self {
            payload: payload.into(),
            identity_tag,
            fetched_at,
        }
    }

    /// Builds a document stamped with the current UTC time.
    pub fn fetched_now(payload: impl Into<String>, identity_tag: Option<String>) -> Self {
        Self::new(payload, identity_tag, OffsetDateTime::now_utc())
    }

    /// Returns the opaque configuration body.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the identity tag (ETag) used for conditional fetches, if any.
    pub fn identity_tag(&self) -> Option<&str> {
        self.identity_tag.as_deref()
    }

    /// Returns when this snapshot was fetched or last confirmed unchanged.
    pub fn fetched_at(&self) -> OffsetDateTime {
        self.fetched_at
    }

    /// Returns a copy of this document carrying a new timestamp.
    ///
    /// Used when the backend confirms that the content is still current: the
    /// freshness window moves forward while payload and tag stay the same.
    pub fn with_timestamp(&self, fetched_at: OffsetDateTime) -> Self {
        Self {
            payload: self.payload.clone(),
            identity_tag: self.identity_tag.clone(),
            fetched_at,
        }
    }

    /// Returns the age of the snapshot relative to `now`, saturating at zero.
    pub fn age_at(&self, now: OffsetDateTime) -> Duration {
        let elapsed = now - self.fetched_at;
        Duration::try_from(elapsed).unwrap_or(Duration::ZERO)
    }

    /// Returns whether `config` must be refreshed before being served.
    ///
    /// A missing document is always expired. Otherwise the document expires
    /// once `fetched_at + max_age` is no longer in the future.
    pub fn is_expired(config: Option<&ProjectConfig>, max_age: Duration) -> bool {
        let Some(config) = config else {
            return true;
        };
        let Ok(max_age) = time::Duration::try_from(max_age) else {
            return false;
        };
        match config.fetched_at.checked_add(max_age) {
            Some(expires_at) => expires_at <= OffsetDateTime::now_utc(),
            None => false,
        }
    }

    /// Renders the document in the line-oriented format used by external caches.
    ///
    /// Layout: `<unix millis>\n<etag or empty>\n<payload>`. The payload is
    /// written last so it may contain newlines itself.
    pub fn serialize(&self) -> String {
        let millis = self.fetched_at.unix_timestamp_nanos() / 1_000_000;
        format!(
            "{}\n{}\n{}",
            millis,
            self.identity_tag.as_deref().unwrap_or_default(),
            self.payload
        )
    }

    /// Parses a value previously produced by [`ProjectConfig::serialize`].
    pub fn deserialize(value: &str) -> Result<Self, ProjectConfigParseError> {
        let mut parts = value.splitn(3, '\n');
        let timestamp = parts
            .next()
            .ok_or(ProjectConfigParseError::MissingLine("timestamp"))?;
        let identity_tag = parts
            .next()
            .ok_or(ProjectConfigParseError::MissingLine("etag"))?;
        let payload = parts
            .next()
            .ok_or(ProjectConfigParseError::MissingLine("payload"))?;

        let millis: i128 = timestamp
            .trim()
            .parse()
            .map_err(|_| ProjectConfigParseError::InvalidTimestamp(timestamp.to_string()))?;
        let nanos = millis
            .checked_mul(1_000_000)
            .ok_or_else(|| ProjectConfigParseError::InvalidTimestamp(timestamp.to_string()))?;
        let fetched_at = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| ProjectConfigParseError::InvalidTimestamp(err.to_string()))?;

        let identity_tag = if identity_tag.is_empty() {
            None
        } else {
            Some(identity_tag.to_string())
        };
        Ok(Self::new(payload, identity_tag, fetched_at))
    }
}

/// Documents are equal when tag and payload match; the timestamp is ignored.
impl PartialEq for ProjectConfig {
    fn eq(&self, other: &Self) -> bool {
        self.identity_tag == other.identity_tag && self.payload == other.payload
    }
}

impl Eq for ProjectConfig {}
