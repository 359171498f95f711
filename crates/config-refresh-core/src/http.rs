//! HTTP fetcher for configuration documents.
//!
//! Issues conditional `GET` requests against the configuration CDN, reusing
//! the last identity tag through `If-None-Match`, and classifies responses
//! into the three-way [`FetchResponse`] taxonomy. HTTP-level failures are
//! outcomes, never errors; only transport problems are returned as
//! [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_NONE_MATCH, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::fetch::{ConfigFetcher, FetchError, FetchResponse};

/// Default configuration CDN.
pub const DEFAULT_BASE_URL: &str = "https://cdn-global.configcat.com";
/// Default upper bound for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Options governing how the fetcher is constructed.
#[derive(Debug, Clone)]
pub struct HttpFetcherOptions {
    /// Scheme + host of the configuration backend.
    pub base_url: String,
    /// Whether plaintext (HTTP) endpoints are allowed.
    pub allow_plaintext: bool,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
    /// Upper bound for one request, including the body download.
    pub request_timeout: Duration,
}

impl Default for HttpFetcherOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            allow_plaintext: false,
            user_agent: format!("config-refresh-core/{}", env!("CARGO_PKG_VERSION")),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Conditional fetcher backed by a reusable `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpConfigFetcher {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl HttpConfigFetcher {
    /// Builds a fetcher for the document belonging to `sdk_key`.
    pub fn new(sdk_key: &str, options: HttpFetcherOptions) -> Result<Self, FetchError> {
        let base_url = options.base_url.trim_end_matches('/').to_string();
        if !options.allow_plaintext && base_url.starts_with("http://") {
            return Err(FetchError::InsecureUrl(base_url));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&options.user_agent)
                .map_err(|_| FetchError::InvalidHeader("user-agent"))?,
        );
        headers.insert(
            "X-ConfigCat-UserAgent",
            HeaderValue::from_str(&options.user_agent)
                .map_err(|_| FetchError::InvalidHeader("x-configcat-useragent"))?,
        );

        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            url: config_url(&base_url, sdk_key),
            headers,
        })
    }

    /// Returns the full document URL this fetcher polls.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConfigFetcher for HttpConfigFetcher {
    async fn fetch(&self, last_etag: Option<&str>) -> Result<FetchResponse, FetchError> {
        let mut headers = self.headers.clone();
        // Only send the conditional header when we have something to compare against.
        if let Some(etag) = last_etag {
            headers.insert(
                IF_NONE_MATCH,
                HeaderValue::from_str(etag).map_err(|_| FetchError::InvalidHeader("if-none-match"))?,
            );
        }

        tracing::debug!(
            url = %redact_url(&self.url),
            headers = ?headers,
            "config-refresh HTTP request"
        );

        let response = self.client.get(&self.url).headers(headers).send().await?;
        let status = response.status();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        tracing::debug!(
            url = %redact_url(&self.url),
            status = %status,
            etag = ?etag,
            "config-refresh HTTP response"
        );

        match classify_status(status) {
            StatusClass::Fetched => {
                let body = response.text().await?;
                Ok(FetchResponse::Fetched { body, etag })
            }
            StatusClass::NotModified => Ok(FetchResponse::NotModified),
            StatusClass::Failed => Ok(FetchResponse::Failed {
                status: Some(status.as_u16()),
                reason: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Fetched,
    NotModified,
    Failed,
}

/// Maps HTTP status codes to the fetch taxonomy.
fn classify_status(status: StatusCode) -> StatusClass {
    if status == StatusCode::NOT_MODIFIED {
        return StatusClass::NotModified;
    }
    if status.is_success() {
        return StatusClass::Fetched;
    }
    StatusClass::Failed
}

fn config_url(base_url: &str, sdk_key: &str) -> String {
    format!("{base_url}/configuration-files/{sdk_key}/config_v6.json")
}

/// Hides the SDK key segment of a document URL for logging.
fn redact_url(url: &str) -> String {
    match url.split_once("/configuration-files/") {
        Some((base, rest)) => match rest.rsplit_once('/') {
            Some((_, file)) => format!("{base}/configuration-files/<redacted>/{file}"),
            None => format!("{base}/configuration-files/<redacted>"),
        },
        None => url.to_string(),
    }
}
