//! One failing item, lesson or course must not sink the rest of the run.

use super::support::{self, COURSE_URL};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Five documents in one lesson; the middle one does not exist upstream.
fn manifest(server_uri: &str) -> String {
    let items: Vec<String> = (1..=5)
        .map(|i| {
            format!(
                r#"{{
                    "type": "document",
                    "title": "Chapter {i}",
                    "fileName": "chapter-{i}.pdf",
                    "variants": {{ "original": "{server_uri}/chapter-{i}.pdf" }}
                }}"#
            )
        })
        .collect();
    format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Constitutional Law",
                "lessons": [
                    {{ "id": "aula-5", "title": "Lesson 05", "items": [{}] }}
                ]
            }}
        ]"#,
        items.join(",")
    )
}

#[tokio::test]
async fn test_failed_item_does_not_stop_its_lesson() {
    let server = MockServer::start().await;
    for i in [1, 2, 4, 5] {
        Mock::given(method("GET"))
            .and(path(format!("/chapter-{i}.pdf")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
            .expect(1)
            .mount(&server)
            .await;
    }
    // 404 is terminal, so the failure costs no retries
    Mock::given(method("GET"))
        .and(path("/chapter-3.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let report = support::run_course(root.path(), &manifest(&server.uri())).await;

    assert_eq!(report.files_ok, 4);
    assert_eq!(report.files_failed, 1);
    assert_eq!(report.files_skipped, 0);

    let ledger = support::reload_ledger(root.path());
    for i in [1, 2, 4, 5] {
        assert!(ledger.is_completed(&format!("aula-5-chapter-{i}.pdf-original")));
    }
    assert!(!ledger.is_completed("aula-5-chapter-3.pdf-original"));

    let lesson_dir = root.path().join("documents/Constitutional Law/Lesson 05");
    assert!(lesson_dir.join("01 - Chapter 1 (original version).pdf").exists());
    assert!(!lesson_dir.join("03 - Chapter 3 (original version).pdf").exists());
}

#[tokio::test]
async fn test_failed_course_does_not_stop_the_queue() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chapter-1.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .mount(&server)
        .await;

    let manifest = format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Constitutional Law",
                "lessons": [
                    {{
                        "id": "aula-1",
                        "title": "Lesson 01",
                        "items": [
                            {{
                                "type": "document",
                                "title": "Chapter 1",
                                "fileName": "chapter-1.pdf",
                                "variants": {{ "original": "{}/chapter-1.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#,
        server.uri()
    );

    let root = TempDir::new().unwrap();
    let mut orchestrator = support::orchestrator(root.path(), &manifest);

    let fractions = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = fractions.clone();
    orchestrator.on_course_progress(move |fraction| sink.lock().unwrap().push(fraction));

    // Spawned like the CLI runs it, so the walk happens off this task
    let run = tokio::spawn(orchestrator.start(vec![
        // Not parseable as a URL at all
        "not a url".to_string(),
        // Parseable but unknown to discovery
        "https://www.estrategiaconcursos.com.br/app/cursos/999/aulas".to_string(),
        COURSE_URL.to_string(),
    ]));
    let report = run.await.unwrap().unwrap();

    // The good course at the back of the queue still ran
    assert_eq!(report.files_ok, 1);
    assert_eq!(report.courses_ok, 1);
    assert_eq!(report.courses_failed, 2);

    // Fraction advances once per processed queue entry
    let fractions = fractions.lock().unwrap();
    assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-9);
    assert!((fractions[2] - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unoffered_rendition_is_skipped_not_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/offered.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .expect(1)
        .mount(&server)
        .await;

    // The first document only exists in its simplified rendition; the
    // default configuration asks for the original one
    let manifest = format!(
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
                                "title": "Simplified Only",
                                "fileName": "simplified-only.pdf",
                                "variants": {{ "simplified": "{0}/simplified-only.pdf" }}
                            }},
                            {{
                                "type": "document",
                                "title": "Offered",
                                "fileName": "offered.pdf",
                                "variants": {{ "original": "{0}/offered.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#,
        server.uri()
    );

    let root = TempDir::new().unwrap();
    let report = support::run_course(root.path(), &manifest).await;

    // Absent content costs nothing; the rest of the lesson still lands
    assert_eq!(report.files_ok, 1);
    assert_eq!(report.files_failed, 0);
    assert_eq!(report.courses_ok, 1);
    assert_eq!(report.courses_failed, 0);

    let ledger = support::reload_ledger(root.path());
    assert!(ledger.is_completed("aula-2-offered.pdf-original"));
    assert!(!ledger.is_completed("aula-2-simplified-only.pdf-original"));
}

#[tokio::test]
async fn test_ledger_failure_does_not_abort_in_flight_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/first.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(support::pdf_bytes(11 * 1024)))
        .expect(1)
        .mount(&server)
        .await;
    // Still streaming when the first item's ledger mark fails
    Mock::given(method("GET"))
        .and(path("/second.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(support::pdf_bytes(11 * 1024))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manifest = format!(
        r#"[
            {{
                "url": "{COURSE_URL}",
                "title": "Tax Law",
                "lessons": [
                    {{
                        "id": "aula-7",
                        "title": "Lesson 07",
                        "items": [
                            {{
                                "type": "document",
                                "title": "First",
                                "fileName": "first.pdf",
                                "variants": {{ "original": "{0}/first.pdf" }}
                            }},
                            {{
                                "type": "document",
                                "title": "Second",
                                "fileName": "second.pdf",
                                "variants": {{ "original": "{0}/second.pdf" }}
                            }}
                        ]
                    }}
                ]
            }}
        ]"#,
        server.uri()
    );

    let root = TempDir::new().unwrap();
    // A directory squatting on the lock path makes every ledger save fail
    std::fs::create_dir(root.path().join("progress.lock")).unwrap();

    let report = support::run_course(root.path(), &manifest).await;

    // Nothing could be recorded, so the course counts as failed
    assert_eq!(report.files_ok, 0);
    assert_eq!(report.courses_failed, 1);

    // Both fetches still ran to completion and were placed; no temp
    // sibling was stranded by an aborted task
    let lesson_dir = root.path().join("documents/Tax Law/Lesson 07");
    assert!(lesson_dir.join("01 - First (original version).pdf").exists());
    assert!(lesson_dir.join("02 - Second (original version).pdf").exists());
    for entry in std::fs::read_dir(&lesson_dir).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(
            !name.to_string_lossy().ends_with(".part"),
            "stranded temp file: {name:?}"
        );
    }
}
