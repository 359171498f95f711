//! End-to-end refresh scenarios against a local HTTP backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use config_refresh_core::{
    create_config_service, AutoPollOptions, CacheError, ConfigService, CountingHooks,
    ExternalCache, ExternalConfigCache, HttpConfigFetcher, HttpFetcherOptions, LazyLoadOptions,
    ManualPollOptions, PollingMode, ServiceOptions,
};
use httptest::matchers::{all_of, contains, key, not, request};
use httptest::{responders::status_code, Expectation, Server};

const SDK_KEY: &str = "integration-sdk-key/0123456789abcdefghij";
const DOC_PATH: &str = "/configuration-files/integration-sdk-key/0123456789abcdefghij/config_v6.json";

fn fetcher_for(server: &Server) -> Arc<HttpConfigFetcher> {
    let base_url = server.url_str("").trim_end_matches('/').to_string();
    Arc::new(
        HttpConfigFetcher::new(
            SDK_KEY,
            HttpFetcherOptions {
                base_url,
                allow_plaintext: true,
                ..Default::default()
            },
        )
        .expect("fetcher"),
    )
}

/// Shared string store standing in for Redis or a similar backend.
#[derive(Default)]
struct SharedStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl ExternalCache for SharedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// 200 with an ETag, then a conditional request answered with 304.
#[tokio::test]
async fn manual_poll_uses_etag_for_conditional_refresh() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", DOC_PATH),
            request::headers(not(contains(key("if-none-match")))),
        ])
        .respond_with(
            status_code(200)
                .append_header("ETag", "\"v1\"")
                .body(r#"{"p":{"s":"x"},"f":{}}"#),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", DOC_PATH),
            request::headers(contains(("if-none-match", "\"v1\""))),
        ])
        .respond_with(status_code(304)),
    );

    let hooks = Arc::new(CountingHooks::default());
    let service = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY).with_hooks(hooks.clone()),
        PollingMode::ManualPoll(ManualPollOptions),
    );

    let (result, first) = service.refresh_config().await;
    assert!(result.is_success());
    let first = first.expect("config");
    assert_eq!(first.identity_tag(), Some("\"v1\""));

    let (result, second) = service.refresh_config().await;
    assert!(result.is_success());
    let second = second.expect("config");
    assert_eq!(*second, *first);
    assert!(second.fetched_at() >= first.fetched_at());

    let snapshot = hooks.counters().snapshot();
    assert_eq!(snapshot.config_changed, 1);
    assert_eq!(snapshot.client_ready, 1);
}

/// The first read of a continuous-poll service waits for the initial download.
#[tokio::test(flavor = "multi_thread")]
async fn auto_poll_serves_downloaded_config() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", DOC_PATH))
            .times(1..)
            .respond_with(
                status_code(200)
                    .append_header("ETag", "\"v1\"")
                    .body("{}"),
            ),
    );

    let service = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY),
        PollingMode::AutoPoll(AutoPollOptions {
            poll_interval: Duration::from_secs(60),
            max_init_wait: Duration::from_secs(5),
        }),
    );

    let config = service.get_config().await.expect("config");
    assert_eq!(config.payload(), "{}");
    service.dispose();
}

/// A failing backend leaves an empty cache empty and reports the failure.
#[tokio::test]
async fn lazy_load_reports_backend_failure() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", DOC_PATH))
            .times(2)
            .respond_with(status_code(500)),
    );

    let hooks = Arc::new(CountingHooks::default());
    let service = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY).with_hooks(hooks.clone()),
        PollingMode::LazyLoad(LazyLoadOptions::default()),
    );

    assert!(service.get_config().await.is_none());
    let (result, config) = service.refresh_config().await;
    assert!(!result.is_success());
    assert!(config.is_none());
    assert_eq!(hooks.counters().snapshot().fetch_error, 2);
}

/// A second client sharing the external cache is served without hitting the backend.
#[tokio::test]
async fn external_cache_is_shared_between_clients() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", DOC_PATH))
            .times(1)
            .respond_with(
                status_code(200)
                    .append_header("ETag", "\"v7\"")
                    .body(r#"{"f":{"flag":{"v":true}}}"#),
            ),
    );

    let store = Arc::new(SharedStore::default());
    let writer = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY).with_cache(Arc::new(ExternalConfigCache::new(store.clone()))),
        PollingMode::ManualPoll(ManualPollOptions),
    );
    let reader = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY).with_cache(Arc::new(ExternalConfigCache::new(store.clone()))),
        PollingMode::LazyLoad(LazyLoadOptions::default()),
    );

    let (result, written) = writer.refresh_config().await;
    assert!(result.is_success());
    assert_eq!(store.values.lock().unwrap().len(), 1);

    let read = reader.get_config().await.expect("shared config");
    assert_eq!(*read, *written.expect("config"));
    assert_eq!(read.identity_tag(), Some("\"v7\""));
}

/// Offline clients never reach the backend.
#[tokio::test]
async fn offline_client_makes_no_requests() {
    let server = Server::run();
    let service = create_config_service(
        fetcher_for(&server),
        ServiceOptions::new(SDK_KEY).with_offline(true),
        PollingMode::LazyLoad(LazyLoadOptions::default()),
    );

    assert!(service.get_config().await.is_none());
    let (result, _) = service.refresh_config().await;
    assert!(result.skipped_offline());
    // The server verifies on drop that no unexpected request arrived.
}
