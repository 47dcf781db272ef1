//! A connection dropped mid-body must leave no file at the final path.

use course_downloader::events;
use course_downloader::fetch::{ConcurrencyGate, FetchEngine, FetchRequest};
use course_downloader::{CancelToken, DocumentVariant, ItemKind};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// Serves responses that advertise a large Content-Length and then close
/// the socket after the first kilobyte.
async fn truncating_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let header = "HTTP/1.1 200 OK\r\n\
                    Content-Length: 200000\r\n\
                    Content-Type: application/pdf\r\n\r\n";
                let _ = socket.write_all(header.as_bytes()).await;
                let mut body = b"%PDF-1.7\n".to_vec();
                body.resize(1024, b'x');
                let _ = socket.write_all(&body).await;
                // Socket drops here, truncating the body
            });
        }
    });
    addr
}

#[tokio::test]
async fn test_truncated_stream_leaves_no_artifact() {
    let addr = truncating_server().await;
    let root = TempDir::new().unwrap();
    let dest = root.path().join("lesson").join("book.pdf");

    let (publisher, _consumer) = events::bus_with_capacity(64);
    let gate = ConcurrencyGate::new(1, Duration::ZERO);
    let engine = FetchEngine::new(gate, publisher, CancelToken::new())
        .unwrap()
        .with_max_attempts(1);

    let request = FetchRequest {
        item_id: "aula-1-book.pdf-original".to_string(),
        display_name: "Book".to_string(),
        url: Url::parse(&format!("http://{addr}/book.pdf")).unwrap(),
        dest: dest.clone(),
        kind: ItemKind::Document {
            variant: DocumentVariant::Original,
        },
    };

    let result = engine.fetch(&request).await;
    assert!(result.is_err());

    // Neither the final path nor the temp sibling may exist
    assert!(!dest.exists());
    assert!(!dest.with_file_name("book.pdf.part").exists());
    let entries: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
        .unwrap()
        .collect();
    assert!(entries.is_empty(), "partial output left behind: {entries:?}");
}
