//! Cancellation stops the walk without touching the network or the ledger.

use super::support::{self, COURSE_URL};
use course_downloader::CancelToken;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_cancelled_run_downloads_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/notes.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .expect(0)
        .mount(&server)
        .await;

    let manifest = format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Civil Law",
                "lessons": [
                    {{
                        "id": "aula-1",
                        "title": "Lesson 01",
                        "items": [
                            {{
                                "type": "document",
                                "title": "Notes",
                                "fileName": "notes.pdf",
                                "variants": {{ "original": "{}/notes.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#,
        server.uri()
    );

    let root = TempDir::new().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let orchestrator = support::orchestrator_with_cancel(root.path(), &manifest, cancel);
    let report = orchestrator
        .start(vec![COURSE_URL.to_string()])
        .await
        .unwrap();

    assert_eq!(report.files_ok, 0);
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.files_skipped, 0);

    let ledger = support::reload_ledger(root.path());
    assert_eq!(ledger.stats().total_items, 0);
}

#[tokio::test]
async fn test_mid_run_cancel_keeps_completed_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .expect(1)
        .mount(&server)
        .await;
    // Slow enough that the cancel lands while it is still in flight; hit
    // once per run because the aborted attempt still reaches the server
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(support::pdf_bytes(11 * 1024))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let manifest = format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Civil Law",
                "lessons": [
                    {{
                        "id": "aula-1",
                        "title": "Lesson 01",
                        "items": [
                            {{
                                "type": "document",
                                "title": "Fast",
                                "fileName": "fast.pdf",
                                "variants": {{ "original": "{0}/fast.pdf" }}
                            }},
                            {{
                                "type": "document",
                                "title": "Slow",
                                "fileName": "slow.pdf",
                                "variants": {{ "original": "{0}/slow.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#,
        server.uri()
    );

    let root = TempDir::new().unwrap();
    let cancel = CancelToken::new();
    let orchestrator = support::orchestrator_with_cancel(root.path(), &manifest, cancel.clone());

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(700)).await;
        trigger.cancel();
    });

    let report = orchestrator
        .start(vec![COURSE_URL.to_string()])
        .await
        .unwrap();
    assert_eq!(report.files_ok, 1);
    assert_eq!(report.files_failed, 0);

    // Exactly the completed prefix survives in the ledger
    let ledger = support::reload_ledger(root.path());
    assert!(ledger.is_completed("aula-1-fast.pdf-original"));
    assert!(!ledger.is_completed("aula-1-slow.pdf-original"));
    assert_eq!(ledger.stats().completed, 1);

    // A rerun fetches only the remainder
    let report = support::run_course(root.path(), &manifest).await;
    assert_eq!(report.files_skipped, 1);
    assert_eq!(report.files_ok, 1);
    assert_eq!(support::reload_ledger(root.path()).stats().completed, 2);
}
