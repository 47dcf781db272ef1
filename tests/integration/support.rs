//! Shared fixtures: manifest-backed orchestrator runs against a mock server.

use course_downloader::config::DownloadConfig;
use course_downloader::discovery::{CourseManifest, ManifestDiscovery};
use course_downloader::metrics::RunReport;
use course_downloader::progress::ProgressLedger;
use course_downloader::{CancelToken, Orchestrator};
use std::path::Path;
use std::sync::Arc;

/// Course URL used throughout the suite; must match the manifests below.
pub const COURSE_URL: &str = "https://www.estrategiaconcursos.com.br/app/cursos/1/aulas";

/// A PDF-looking payload of `len` bytes.
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut body = b"%PDF-1.7\n".to_vec();
    body.resize(len, b'x');
    body
}

/// An MP4-looking payload of `len` bytes (ftyp box at offset 4).
pub fn mp4_bytes(len: usize) -> Vec<u8> {
    let mut body = vec![0x00, 0x00, 0x00, 0x20];
    body.extend_from_slice(b"ftyp");
    body.resize(len, 0);
    body
}

/// Default configuration rooted under a test directory.
pub fn config_in(root: &Path) -> DownloadConfig {
    DownloadConfig {
        document_dir: root.join("documents"),
        video_dir: root.join("videos"),
        ..DownloadConfig::default()
    }
}

/// Parse a manifest JSON array into a discovery adapter.
pub fn discovery(manifest_json: &str) -> Arc<ManifestDiscovery> {
    let courses: Vec<CourseManifest> =
        serde_json::from_str(manifest_json).expect("test manifest parses");
    Arc::new(ManifestDiscovery::new(courses))
}

/// Build an orchestrator over `root` with a fresh cancel token.
pub fn orchestrator(root: &Path, manifest_json: &str) -> Orchestrator {
    orchestrator_with_cancel(root, manifest_json, CancelToken::new())
}

/// Build an orchestrator observing the given cancel token.
pub fn orchestrator_with_cancel(
    root: &Path,
    manifest_json: &str,
    cancel: CancelToken,
) -> Orchestrator {
    let ledger = ProgressLedger::load(root.join("progress.json"));
    Orchestrator::new(config_in(root), discovery(manifest_json), ledger, cancel)
        .expect("orchestrator builds")
}

/// Run the default course through a fresh orchestrator.
pub async fn run_course(root: &Path, manifest_json: &str) -> RunReport {
    orchestrator(root, manifest_json)
        .start(vec![COURSE_URL.to_string()])
        .await
        .expect("run completes")
}

/// Reload the ledger from disk, as a restarted process would.
pub fn reload_ledger(root: &Path) -> ProgressLedger {
    ProgressLedger::load(root.join("progress.json"))
}
