//! The gate caps in-flight transfers even when many fetches are spawned.

use super::support;
use course_downloader::events;
use course_downloader::fetch::{ConcurrencyGate, FetchEngine, FetchRequest};
use course_downloader::{CancelToken, DocumentVariant, ItemKind};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_nine_fetches_run_in_waves_of_three() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(support::pdf_bytes(11 * 1024))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(9)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let (publisher, _consumer) = events::bus_with_capacity(256);
    let gate = ConcurrencyGate::new(3, Duration::ZERO);
    let engine = FetchEngine::new(gate, publisher, CancelToken::new()).unwrap();

    let started = Instant::now();
    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..9 {
        let engine = engine.clone();
        let request = FetchRequest {
            item_id: format!("aula-1-doc.pdf-original-{i}"),
            display_name: format!("Doc {i}"),
            url: Url::parse(&format!("{}/doc.pdf", server.uri())).unwrap(),
            dest: root.path().join(format!("doc-{i}.pdf")),
            kind: ItemKind::Document {
                variant: DocumentVariant::Original,
            },
        };
        tasks.spawn(async move { engine.fetch(&request).await });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    // 9 fetches at 300ms each through 3 permits is at least 3 waves
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "elapsed {elapsed:?}");

    for i in 0..9 {
        assert!(root.path().join(format!("doc-{i}.pdf")).exists());
    }
}
