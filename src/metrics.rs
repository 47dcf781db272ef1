//! Run metrics and observability.
//!
//! Two layers: a process-wide Prometheus exporter fed through the `metrics`
//! crate for operators who scrape, and a per-run [`RunMetrics`] aggregate
//! that produces the [`RunReport`] printed at the end of a run. Recording is
//! cheap and never fails; a missing exporter just means counters go nowhere.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the metrics system with a Prometheus scrape endpoint.
///
/// Called once at startup; subsequent calls are no-ops.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "downloads_completed_total",
        Unit::Count,
        "Total number of artifacts downloaded and verified"
    );

    describe_counter!(
        "downloads_failed_total",
        Unit::Count,
        "Total number of artifacts that failed after all retries"
    );

    describe_counter!(
        "downloads_skipped_total",
        Unit::Count,
        "Total number of artifacts skipped because the ledger already had them"
    );

    describe_counter!(
        "download_bytes_total",
        Unit::Bytes,
        "Total artifact bytes downloaded"
    );

    describe_counter!(
        "download_retries_total",
        Unit::Count,
        "Total number of download retry attempts"
    );

    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff waits in seconds"
    );

    describe_counter!(
        "progress_events_dropped_total",
        Unit::Count,
        "Progress events discarded because the event bus was full"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if the metrics system is initialized.
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record a retry backoff wait.
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!(
        "download_retries_total",
        "attempt" => attempt.to_string(),
    )
    .increment(1);

    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());

    debug!(
        attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Final summary of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Courses that ended with at least one item downloaded or skipped
    pub courses_ok: u64,
    /// Courses that ended with nothing to show
    pub courses_failed: u64,
    /// Artifacts downloaded and verified this run
    pub files_ok: u64,
    /// Artifacts that failed after all retries
    pub files_failed: u64,
    /// Artifacts skipped because the ledger already had them
    pub files_skipped: u64,
    /// Total bytes downloaded this run
    pub bytes_downloaded: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Average download throughput over the whole run.
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_downloaded as f64 / secs
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} courses ok; {} downloaded, {} failed, {} skipped, {} in {:.0}s ({}/s)",
            self.courses_ok,
            self.courses_ok + self.courses_failed,
            self.files_ok,
            self.files_failed,
            self.files_skipped,
            format_bytes(self.bytes_downloaded),
            self.elapsed.as_secs_f64(),
            format_bytes(self.bytes_per_sec() as u64),
        )
    }
}

/// Cheap, cloneable per-run counters shared by all download tasks.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    inner: Arc<RunMetricsInner>,
}

#[derive(Debug)]
struct RunMetricsInner {
    courses_ok: AtomicU64,
    courses_failed: AtomicU64,
    files_ok: AtomicU64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    bytes_downloaded: AtomicU64,
    started: Instant,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    /// Start tracking a new run.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RunMetricsInner {
                courses_ok: AtomicU64::new(0),
                courses_failed: AtomicU64::new(0),
                files_ok: AtomicU64::new(0),
                files_failed: AtomicU64::new(0),
                files_skipped: AtomicU64::new(0),
                bytes_downloaded: AtomicU64::new(0),
                started: Instant::now(),
            }),
        }
    }

    /// Record a fully processed course and whether it succeeded.
    pub fn record_course(&self, succeeded: bool) {
        if succeeded {
            self.inner.courses_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.courses_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a verified download of `bytes`.
    pub fn record_download(&self, bytes: u64) {
        self.inner.files_ok.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        counter!("downloads_completed_total").increment(1);
        counter!("download_bytes_total").increment(bytes);
    }

    /// Record an item that failed after all retries.
    pub fn record_failure(&self) {
        self.inner.files_failed.fetch_add(1, Ordering::Relaxed);
        counter!("downloads_failed_total").increment(1);
    }

    /// Record an item skipped via the ledger.
    pub fn record_skip(&self) {
        self.inner.files_skipped.fetch_add(1, Ordering::Relaxed);
        counter!("downloads_skipped_total").increment(1);
    }

    /// Snapshot the run so far.
    pub fn report(&self) -> RunReport {
        RunReport {
            courses_ok: self.inner.courses_ok.load(Ordering::Relaxed),
            courses_failed: self.inner.courses_failed.load(Ordering::Relaxed),
            files_ok: self.inner.files_ok.load(Ordering::Relaxed),
            files_failed: self.inner.files_failed.load(Ordering::Relaxed),
            files_skipped: self.inner.files_skipped.load(Ordering::Relaxed),
            bytes_downloaded: self.inner.bytes_downloaded.load(Ordering::Relaxed),
            elapsed: self.inner.started.elapsed(),
        }
    }
}

/// Render a byte count with a binary-unit suffix.
pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
