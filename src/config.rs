//! Run configuration and engine tuning constants.
//!
//! User-facing options load from a JSON file next to the binary; a missing or
//! corrupt file falls back to defaults with a warning rather than aborting,
//! so a damaged config never blocks a run.

use crate::{DocumentVariant, Resolution};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Maximum download attempts per item (first try plus retries).
/// Three attempts recover from transient faults without hammering a dead
/// endpoint (max total backoff wait 6s).
pub const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds. Doubles on each failed attempt.
pub const INITIAL_BACKOFF_MS: u64 = 2000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Streaming chunk size in bytes for download writes.
pub const CHUNK_SIZE: usize = 8192;

/// Per-item download timeout. Large lecture videos on slow links need a
/// generous window.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum concurrent downloads admitted by the gate.
pub const GATE_PERMITS: usize = 3;

/// Cool-down held on a permit after a fetch finishes, spacing request bursts.
pub const GATE_COOL_DOWN: Duration = Duration::from_millis(500);

/// Minimum interval between per-item progress events.
pub const PROGRESS_CADENCE: Duration = Duration::from_millis(500);

/// Bounded capacity of the progress event bus.
pub const EVENT_BUS_CAPACITY: usize = 1000;

/// Maximum events a consumer drains per poll, so slow consumers cannot
/// starve their own repaint loop.
pub const EVENT_DRAIN_BATCH: usize = 20;

/// Emit a drop summary after this many events are discarded on a full bus.
pub const EVENT_DROP_SUMMARY_EVERY: u64 = 100;

/// Calculate exponential backoff delay after a failed attempt.
///
/// `attempt` is 1-based: the wait after the first failure is 2s, after the
/// second 4s, capped at [`MAX_BACKOFF_MS`].
pub fn calculate_backoff(attempt: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}

/// Error raised when a loaded configuration fails validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A destination directory is empty or not a usable path
    #[error("Invalid destination directory: {0}")]
    InvalidDestination(String),
    /// Could not persist the configuration file
    #[error("Failed to save configuration: {0}")]
    Save(#[from] std::io::Error),
}

/// Which document renditions a run should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VariantSelection {
    /// A single rendition
    One(DocumentVariant),
    /// All available renditions
    All,
}

impl VariantSelection {
    /// The renditions this selection expands to, in platform order.
    pub fn variants(&self) -> Vec<DocumentVariant> {
        match self {
            VariantSelection::One(v) => vec![*v],
            VariantSelection::All => vec![
                DocumentVariant::Simplified,
                DocumentVariant::Original,
                DocumentVariant::Annotated,
            ],
        }
    }
}

impl TryFrom<String> for VariantSelection {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "all" {
            Ok(VariantSelection::All)
        } else {
            s.parse().map(VariantSelection::One)
        }
    }
}

impl From<VariantSelection> for String {
    fn from(v: VariantSelection) -> String {
        match v {
            VariantSelection::All => "all".to_string(),
            VariantSelection::One(variant) => variant.to_string(),
        }
    }
}

/// User-facing run configuration, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadConfig {
    /// Destination directory for documents
    pub document_dir: PathBuf,
    /// Destination directory for videos
    pub video_dir: PathBuf,
    /// Which document renditions to fetch
    pub document_variants: VariantSelection,
    /// Preferred video resolution
    pub resolution: Resolution,
    /// Fetch companion materials alongside document downloads
    pub extras_with_documents: bool,
    /// Fetch companion materials alongside video downloads
    pub extras_with_videos: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            document_dir: PathBuf::from("downloads/documents"),
            video_dir: PathBuf::from("downloads/videos"),
            document_variants: VariantSelection::One(DocumentVariant::Original),
            resolution: Resolution::R720,
            extras_with_documents: false,
            extras_with_videos: true,
        }
    }
}

impl DownloadConfig {
    /// Load configuration from `path`, falling back to defaults if the file
    /// is missing or unreadable as JSON.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt configuration file, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Persist the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Validate the configuration before a run.
    ///
    /// Creates missing destination directories and checks each for write
    /// access, so an unusable destination aborts before any network activity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dir in [&self.document_dir, &self.video_dir] {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::InvalidDestination(
                    "destination directory must not be empty".to_string(),
                ));
            }
            std::fs::create_dir_all(dir).map_err(|e| {
                ConfigError::InvalidDestination(format!("{}: {e}", dir.display()))
            })?;
            // Existence is not enough; prove a file can actually be written
            tempfile::tempfile_in(dir).map_err(|e| {
                ConfigError::InvalidDestination(format!(
                    "{} is not writable: {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(())
    }
}
