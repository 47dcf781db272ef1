//! Retry and exponential backoff timing.

use super::support;
use course_downloader::events;
use course_downloader::fetch::{ConcurrencyGate, FetchEngine, FetchError, FetchRequest};
use course_downloader::{CancelToken, DocumentVariant, ItemKind};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn engine() -> FetchEngine {
    let (publisher, _consumer) = events::bus_with_capacity(64);
    let gate = ConcurrencyGate::new(3, Duration::ZERO);
    FetchEngine::new(gate, publisher, CancelToken::new()).unwrap()
}

fn request(server_uri: &str, dest: std::path::PathBuf) -> FetchRequest {
    FetchRequest {
        item_id: "aula-1-flaky.pdf-original".to_string(),
        display_name: "Flaky".to_string(),
        url: Url::parse(&format!("{server_uri}/flaky.pdf")).unwrap(),
        dest,
        kind: ItemKind::Document {
            variant: DocumentVariant::Original,
        },
    }
}

#[tokio::test]
async fn test_server_errors_are_retried_with_backoff() {
    let server = MockServer::start().await;
    // First two attempts fail with a retryable status, the third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let dest = root.path().join("flaky.pdf");

    let started = Instant::now();
    let outcome = engine()
        .fetch(&request(&server.uri(), dest.clone()))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.attempts, 3);
    assert!(dest.exists());
    // Backoff doubles: 2s after the first failure, 4s after the second
    assert!(elapsed >= Duration::from_millis(5500), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(15), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.pdf"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let started = Instant::now();
    let result = engine()
        .fetch(&request(&server.uri(), root.path().join("flaky.pdf")))
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
    // No backoff sleep happened
    assert!(started.elapsed() < Duration::from_secs(1));
}
