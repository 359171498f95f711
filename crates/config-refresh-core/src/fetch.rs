//! Fetcher contract and the outcome types produced by one refresh.
//!
//! A [`ConfigFetcher`] performs exactly one conditional request per call and
//! reports HTTP-level results as a three-way [`FetchResponse`]. Only
//! transport problems surface as [`FetchError`]. The refresh engine folds both
//! into a [`FetchResult`] and reports the caller-facing [`RefreshResult`].

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures raised by a fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, TLS or protocol failure while talking to the backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The configured base URL violates the transport policy.
    #[error("insecure base url requires explicit opt-in: {0}")]
    InsecureUrl(String),
    /// A request header could not be encoded.
    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),
    /// Any other fetcher-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Raw outcome of one conditional request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// The backend returned a (possibly new) document body.
    Fetched {
        /// Response body, treated as an opaque payload.
        body: String,
        /// Identity tag announced by the backend.
        etag: Option<String>,
    },
    /// The document identified by the supplied tag is still current.
    NotModified,
    /// The backend answered with an unexpected status.
    Failed {
        /// HTTP status code, when one was received.
        status: Option<u16>,
        /// Human-readable reason phrase.
        reason: String,
    },
}

/// Performs conditional fetches against the configuration backend.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// Issues one request, passing `last_etag` as the conditional-fetch context.
    async fn fetch(&self, last_etag: Option<&str>) -> Result<FetchResponse, FetchError>;
}

/// Outcome of one refresh attempt, as seen by the reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// New content arrived.
    Fetched {
        /// Opaque document body.
        payload: String,
        /// Identity tag to send with the next request.
        identity_tag: Option<String>,
    },
    /// The backend confirmed the previous document is still current.
    Unchanged,
    /// Transport or server failure.
    Failed {
        /// Human-readable cause.
        cause: String,
    },
    /// No request was made because the engine is offline.
    Skipped,
}

impl FetchResult {
    /// Folds a fetcher response (or transport error) into an outcome.
    pub fn from_response(response: Result<FetchResponse, FetchError>) -> Self {
        match response {
            Ok(FetchResponse::Fetched { body, etag }) => Self::Fetched {
                payload: body,
                identity_tag: etag,
            },
            Ok(FetchResponse::NotModified) => Self::Unchanged,
            Ok(FetchResponse::Failed { status, reason }) => Self::Failed {
                cause: match status {
                    Some(code) => format!("unexpected HTTP response: {code} {reason}"),
                    None => format!("unexpected HTTP response: {reason}"),
                },
            },
            Err(err) => Self::Failed {
                cause: format!("config fetch failed: {err}"),
            },
        }
    }
}

/// Result reported to callers of a refresh, always paired with a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshResult {
    is_success: bool,
    error_message: Option<String>,
    skipped_offline: bool,
}

impl RefreshResult {
    /// A refresh that obtained new or confirmed-unchanged content.
    pub fn success() -> Self {
        Self {
            is_success: true,
            error_message: None,
            skipped_offline: false,
        }
    }

    /// A refresh that failed; the previous document is served instead.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error_message: Some(message.into()),
            skipped_offline: false,
        }
    }

    /// A refresh that was not attempted because the engine is offline.
    pub fn skipped() -> Self {
        Self {
            is_success: false,
            error_message: Some("client is in offline mode, it cannot initiate HTTP calls".into()),
            skipped_offline: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.is_success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns whether the refresh was skipped because the engine is offline.
    pub fn skipped_offline(&self) -> bool {
        self.skipped_offline
    }
}

impl fmt::Display for RefreshResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error_message, self.is_success) {
            (_, true) => write!(f, "success"),
            (Some(message), false) => write!(f, "failure: {message}"),
            (None, false) => write!(f, "failure"),
        }
    }
}
