//! Bodies served with a 200 status still have to look like the artifact.

use super::support::{self, COURSE_URL};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn manifest(server_uri: &str) -> String {
    format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Tax Law",
                "lessons": [
                    {{
                        "id": "aula-2",
                        "title": "Lesson 02",
                        "items": [
                            {{
                                "type": "document",
                                "title": "Expired Session",
                                "fileName": "expired.pdf",
                                "variants": {{ "original": "{server_uri}/expired.pdf" }}
                            }},
                            {{
                                "type": "document",
                                "title": "Stub File",
                                "fileName": "stub.pdf",
                                "variants": {{ "original": "{server_uri}/stub.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#
    )
}

#[tokio::test]
async fn test_html_and_undersized_bodies_never_count_as_downloads() {
    let server = MockServer::start().await;
    // An HTML login page, padded past the size floor
    let mut html = b"<html><body>Session expired</body></html>".to_vec();
    html.resize(11 * 1024, b' ');
    Mock::given(method("GET"))
        .and(path("/expired.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(html))
        .mount(&server)
        .await;
    // A real PDF header, but far below any plausible document size
    Mock::given(method("GET"))
        .and(path("/stub.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(512)))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let report = support::run_course(root.path(), &manifest(&server.uri())).await;

    assert_eq!(report.files_ok, 0);
    assert_eq!(report.files_failed, 2);
    assert_eq!(report.bytes_downloaded, 0);
    // Nothing downloaded or skipped, so the course did not succeed
    assert_eq!(report.courses_failed, 1);

    let ledger = support::reload_ledger(root.path());
    assert!(!ledger.is_completed("aula-2-expired.pdf-original"));
    assert!(!ledger.is_completed("aula-2-stub.pdf-original"));

    // Rejected bodies are gone, not parked at the destination or as temps
    let lesson_dir = root.path().join("documents/Tax Law/Lesson 02");
    if lesson_dir.exists() {
        let leftovers: Vec<_> = std::fs::read_dir(&lesson_dir).unwrap().collect();
        assert!(leftovers.is_empty(), "leftovers: {leftovers:?}");
    }
}
