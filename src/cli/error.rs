//! CLI error types and conversions

use crate::config::ConfigError;
use crate::discovery::ManifestError;
use crate::orchestrator::DownloadError;
use crate::progress::{LedgerError, QueueError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Ledger error
    #[error("progress error: {0}")]
    Ledger(#[from] LedgerError),

    /// Queue error
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// Manifest error
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Background task failure
    #[error("internal error: {0}")]
    Internal(String),
}
