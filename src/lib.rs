//! # Course Downloader Library
//!
//! A resilient bulk downloader for hierarchical remote course content
//! (course → lesson → media item). Built to survive flaky networks, partial
//! failures, and mid-run cancellation without re-downloading completed work
//! or leaving corrupt files behind.
//!
//! ## Features
//!
//! - **Resumable Progress**: a durable, crash-safe ledger of completed items
//! - **Retry & Verification**: streamed downloads with exponential backoff,
//!   atomic temp-file renames and magic-byte verification
//! - **Rate Limiting**: bounded concurrent fetches with a cool-down delay
//! - **Cooperative Cancellation**: a shared token checked at every boundary
//! - **Partial-Failure Isolation**: one bad item never aborts a batch
//!
//! ## Quick Start
//!
//! ```no_run
//! use course_downloader::config::DownloadConfig;
//! use course_downloader::orchestrator::Orchestrator;
//! use course_downloader::progress::{CourseQueue, ProgressLedger};
//! use course_downloader::CancelToken;
//! use std::sync::Arc;
//!
//! # async fn example(discovery: Arc<dyn course_downloader::discovery::CourseDiscovery>) -> anyhow::Result<()> {
//! let config = DownloadConfig::load_or_default("config.json");
//! config.validate()?;
//!
//! let ledger = ProgressLedger::load("progress.json");
//! let queue = CourseQueue::load("course-urls.json");
//! let cancel = CancelToken::new();
//!
//! let orchestrator = Orchestrator::new(config, discovery, ledger, cancel.clone())?;
//! let report = orchestrator.start(queue.all()).await?;
//!
//! println!(
//!     "{} ok, {} failed, {} skipped",
//!     report.files_ok, report.files_failed, report.files_skipped
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several core modules:
//!
//! - [`discovery`] - content-discovery adapter seam (site-specific glue lives behind it)
//! - [`fetch`] - streamed download engine, verification and the concurrency gate
//! - [`orchestrator`] - course → lesson → item traversal with failure isolation
//! - [`progress`] - durable completion ledger and the pending course queue
//! - [`events`] - bounded, non-blocking progress event bus for UI consumers
//! - [`metrics`] - run counters, throughput tracking and Prometheus export

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cooperative cancellation token
pub mod cancel;

/// CLI command implementations
pub mod cli;

/// Run configuration loading and validation
pub mod config;

/// Content discovery adapter interface
pub mod discovery;

/// Progress event bus
pub mod events;

/// Download engine, verification and concurrency gate
pub mod fetch;

/// Run metrics and Prometheus export
pub mod metrics;

/// Filename and path hygiene helpers
pub mod naming;

/// Download orchestration
pub mod orchestrator;

/// Durable progress ledger and course queue
pub mod progress;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use orchestrator::{DownloadError, Orchestrator};

/// Document variant offered by the platform for a single logical document.
///
/// The platform exposes up to three renditions of each electronic book; the
/// variant is part of the artifact name and the ledger key so each rendition
/// resumes independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentVariant {
    /// Condensed rendition
    #[serde(rename = "simplified")]
    Simplified,
    /// Unabridged rendition
    #[serde(rename = "original")]
    Original,
    /// Rendition with instructor annotations
    #[serde(rename = "annotated")]
    Annotated,
}

impl DocumentVariant {
    /// Human-readable label used in artifact filenames.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentVariant::Simplified => "simplified version",
            DocumentVariant::Original => "original version",
            DocumentVariant::Annotated => "annotated version",
        }
    }
}

impl std::fmt::Display for DocumentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DocumentVariant::Simplified => "simplified",
            DocumentVariant::Original => "original",
            DocumentVariant::Annotated => "annotated",
        };
        write!(f, "{s}")
    }
}

impl FromStr for DocumentVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simplified" => Ok(DocumentVariant::Simplified),
            "original" => Ok(DocumentVariant::Original),
            "annotated" => Ok(DocumentVariant::Annotated),
            _ => Err(format!("Invalid document variant: {s}")),
        }
    }
}

/// Preferred video resolution, with a fixed fallback ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 720p
    #[serde(rename = "720p")]
    R720,
    /// 480p
    #[serde(rename = "480p")]
    R480,
    /// 360p
    #[serde(rename = "360p")]
    R360,
}

impl Resolution {
    /// Resolutions to try in order when resolving a video source, starting
    /// with the preferred one.
    pub fn fallback_order(&self) -> [Resolution; 3] {
        match self {
            Resolution::R720 => [Resolution::R720, Resolution::R480, Resolution::R360],
            Resolution::R480 => [Resolution::R480, Resolution::R360, Resolution::R720],
            Resolution::R360 => [Resolution::R360, Resolution::R480, Resolution::R720],
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::R720 => "720p",
            Resolution::R480 => "480p",
            Resolution::R360 => "360p",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "720p" => Ok(Resolution::R720),
            "480p" => Ok(Resolution::R480),
            "360p" => Ok(Resolution::R360),
            _ => Err(format!(
                "Invalid resolution: {s} (expected 720p, 480p or 360p)"
            )),
        }
    }
}

/// Companion material kinds attached to a primary item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    /// Mind-map sheet
    #[serde(rename = "mindmap")]
    MindMap,
    /// Written summary
    #[serde(rename = "summary")]
    Summary,
    /// Slide deck
    #[serde(rename = "slides")]
    Slides,
}

impl MaterialKind {
    /// Ledger-key suffix for this material, appended to the primary item id.
    pub fn id_suffix(&self) -> &'static str {
        match self {
            MaterialKind::MindMap => "mindmap",
            MaterialKind::Summary => "summary",
            MaterialKind::Slides => "slides",
        }
    }

    /// Human-readable label used in artifact filenames.
    pub fn label(&self) -> &'static str {
        match self {
            MaterialKind::MindMap => "Mind Map",
            MaterialKind::Summary => "Summary",
            MaterialKind::Slides => "Slides",
        }
    }
}

impl std::fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id_suffix())
    }
}

/// What kind of artifact a downloadable unit is.
///
/// Kind-specific behavior (verification signature, minimum size, naming) is
/// dispatched by matching on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Electronic-book document
    Document {
        /// Which rendition of the document
        variant: DocumentVariant,
    },
    /// Lecture video
    Video {
        /// Resolution the source was resolved at
        resolution: Resolution,
    },
    /// Companion material attached to a primary item
    Companion {
        /// Which companion material
        material: MaterialKind,
    },
}

impl ItemKind {
    /// File extension for artifacts of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ItemKind::Video { .. } => "mp4",
            ItemKind::Document { .. } | ItemKind::Companion { .. } => "pdf",
        }
    }

    /// Minimum plausible artifact size in bytes, enforced by verification.
    ///
    /// Documents below 10 KiB are almost always an HTML error page served
    /// with a 200 status; videos get a larger floor.
    pub fn min_size_bytes(&self) -> u64 {
        match self {
            ItemKind::Document { .. } => 10 * 1024,
            ItemKind::Video { .. } => 64 * 1024,
            ItemKind::Companion { .. } => 1024,
        }
    }
}
