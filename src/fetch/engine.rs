//! Streamed download engine with retry, verification and atomic placement.
//!
//! One fetch = one URL to one destination path. Bytes stream into a `.part`
//! sibling; only after the stream completes, syncs and the artifact passes
//! verification does the file take its final name. The destination path
//! therefore never holds a partial or corrupt artifact.

use crate::cancel::CancelToken;
use crate::config::{calculate_backoff, CHUNK_SIZE, DOWNLOAD_TIMEOUT, MAX_ATTEMPTS, PROGRESS_CADENCE};
use crate::events::{EventPublisher, ProgressEvent};
use crate::fetch::gate::{ConcurrencyGate, GateError};
use crate::fetch::verify::{verify_artifact, VerifyError};
use crate::ItemKind;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn, Instrument};
use url::Url;

/// Fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection, timeout or mid-stream transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP status {status} from {url}")]
    Status {
        /// Response status code
        status: u16,
        /// Request URL
        url: String,
    },

    /// The resource does not exist on the platform
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Downloaded artifact failed verification
    #[error(transparent)]
    Validation(#[from] VerifyError),

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(String),

    /// The run was cancelled
    #[error("download cancelled")]
    Cancelled,

    /// Every attempt failed
    #[error("download failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last attempt's failure
        last: String,
    },

    /// Could not get a slot from the concurrency gate
    #[error(transparent)]
    Gate(#[from] GateError),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Io(_) | FetchError::Validation(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::NotFound(_)
            | FetchError::Cancelled
            | FetchError::RetriesExhausted { .. }
            | FetchError::Gate(_) => false,
        }
    }
}

/// One unit of download work.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Stable ledger id of the item
    pub item_id: String,
    /// Display name for progress UIs
    pub display_name: String,
    /// Resolved source URL
    pub url: Url,
    /// Final artifact path
    pub dest: PathBuf,
    /// Artifact kind, drives verification
    pub kind: ItemKind,
}

/// Result of a successful fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOutcome {
    /// Verified artifact size in bytes
    pub bytes: u64,
    /// Attempts taken, 1 when the first try succeeded
    pub attempts: u32,
}

/// Shared download engine.
#[derive(Clone)]
pub struct FetchEngine {
    client: reqwest::Client,
    gate: ConcurrencyGate,
    events: EventPublisher,
    cancel: CancelToken,
    max_attempts: u32,
}

impl FetchEngine {
    /// Create an engine over `gate`, publishing progress to `events` and
    /// observing `cancel`.
    pub fn new(
        gate: ConcurrencyGate,
        events: EventPublisher,
        cancel: CancelToken,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            gate,
            events,
            cancel,
            max_attempts: MAX_ATTEMPTS,
        })
    }

    /// Override the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Download one item: gate admission, retries with exponential backoff,
    /// streaming to a temp sibling, verification and atomic rename.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let span = tracing::info_span!("fetch", item = %request.item_id);
        self.fetch_inner(request).instrument(span).await
    }

    async fn fetch_inner(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let _permit = self.gate.admit().await?;

        self.events.publish(ProgressEvent::ItemStarted {
            id: request.item_id.clone(),
            name: request.display_name.clone(),
        });

        let mut last_error = String::from("no attempts made");
        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            match self.attempt(request).await {
                Ok(bytes) => {
                    info!(
                        item = %request.item_id,
                        bytes,
                        attempt,
                        "Download complete"
                    );
                    return Ok(FetchOutcome { bytes, attempts: attempt });
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(
                        item = %request.item_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Download attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt < self.max_attempts {
                        let backoff = calculate_backoff(attempt);
                        crate::metrics::record_retry_backoff(backoff, attempt);
                        debug!(backoff_ms = backoff.as_millis() as u64, "Waiting before retry");
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
                        }
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.max_attempts,
            last: last_error,
        })
    }

    /// One streaming attempt. Any partial output is removed before this
    /// returns an error.
    async fn attempt(&self, request: &FetchRequest) -> Result<u64, FetchError> {
        if let Some(parent) = request.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::Io(e.to_string()))?;
        }

        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(request.url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request.url.to_string(),
            });
        }

        let total = response.content_length();
        let temp_path = temp_sibling(&request.dest);

        let result = self
            .stream_to_file(request, response, &temp_path, total)
            .await;

        match result {
            Ok(()) => {}
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        }

        tokio::fs::rename(&temp_path, &request.dest)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        match verify_artifact(&request.dest, request.kind) {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                // A corrupt artifact must not survive at the final path
                let _ = tokio::fs::remove_file(&request.dest).await;
                Err(FetchError::Validation(e))
            }
        }
    }

    async fn stream_to_file(
        &self,
        request: &FetchRequest,
        response: reqwest::Response,
        temp_path: &Path,
        total: Option<u64>,
    ) -> Result<(), FetchError> {
        let file = tokio::fs::File::create(temp_path)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;
        let mut writer = tokio::io::BufWriter::with_capacity(CHUNK_SIZE, file);

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let started = Instant::now();
        let mut last_emit: Option<Instant> = None;

        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            };
            let chunk = match chunk {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(FetchError::Network(e.to_string())),
                None => break,
            };

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| FetchError::Io(e.to_string()))?;
            downloaded += chunk.len() as u64;

            if last_emit.map_or(true, |t| t.elapsed() >= PROGRESS_CADENCE) {
                let elapsed = started.elapsed().as_secs_f64();
                let bytes_per_sec = if elapsed > 0.0 {
                    downloaded as f64 / elapsed
                } else {
                    0.0
                };
                self.events.publish(ProgressEvent::ItemProgress {
                    id: request.item_id.clone(),
                    downloaded,
                    total,
                    bytes_per_sec,
                });
                last_emit = Some(Instant::now());
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;
        // Sync before the rename so the bytes are durable under the final name
        writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Temp path next to `dest`: same directory, `.part` appended to the name.
fn temp_sibling(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}
