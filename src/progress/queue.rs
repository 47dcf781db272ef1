//! Pending course queue with URL validation.
//!
//! The queue is a JSON array of course URLs the user has asked for. URLs go
//! through an allow-list before they are accepted so a typo never sends the
//! downloader crawling an arbitrary site.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Host suffix course URLs must belong to.
const ALLOWED_HOST_SUFFIX: &str = "estrategiaconcursos.com.br";

/// Errors raised by queue mutations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The URL failed the allow-list
    #[error("Invalid course URL: {0}")]
    InvalidUrl(String),

    /// The URL is already queued
    #[error("URL already queued: {0}")]
    Duplicate(String),

    /// The URL is not in the queue
    #[error("URL not found in queue: {0}")]
    NotFound(String),

    /// Could not persist the queue file
    #[error("Failed to save queue: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent, validated list of course URLs to process.
#[derive(Debug)]
pub struct CourseQueue {
    path: PathBuf,
    urls: Vec<String>,
}

impl CourseQueue {
    /// Load the queue from `path`. Missing or corrupt files start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let urls = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Vec<String>>(&contents) {
                Ok(urls) => {
                    info!(path = %path.display(), count = urls.len(), "Loaded course queue");
                    urls
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt course queue, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read course queue, starting empty");
                Vec::new()
            }
        };
        Self { path, urls }
    }

    /// Add a URL after trimming and validating it. Duplicates are rejected.
    pub fn add(&mut self, url: &str) -> Result<(), QueueError> {
        let url = url.trim();
        if !Self::validate(url) {
            return Err(QueueError::InvalidUrl(url.to_string()));
        }
        if self.urls.iter().any(|u| u == url) {
            return Err(QueueError::Duplicate(url.to_string()));
        }
        self.urls.push(url.to_string());
        self.save()?;
        info!(url, "Course URL added");
        Ok(())
    }

    /// Remove a URL from the queue.
    pub fn remove(&mut self, url: &str) -> Result<(), QueueError> {
        let before = self.urls.len();
        self.urls.retain(|u| u != url);
        if self.urls.len() == before {
            return Err(QueueError::NotFound(url.to_string()));
        }
        self.save()?;
        info!(url, "Course URL removed");
        Ok(())
    }

    /// All queued URLs, in insertion order.
    pub fn all(&self) -> Vec<String> {
        self.urls.clone()
    }

    /// Number of queued URLs.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Remove every URL.
    pub fn clear(&mut self) -> Result<(), QueueError> {
        self.urls.clear();
        self.save()?;
        info!("Course queue cleared");
        Ok(())
    }

    /// Atomic rewrite through a synced temp sibling, like the progress
    /// ledger; a crash mid-save leaves the previous queue intact.
    fn save(&self) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.urls).map_err(std::io::Error::other)?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path)?;
        Ok(())
    }

    /// Allow-list for course URLs: https, the platform host, a course path
    /// segment, and the lesson-listing suffix.
    fn validate(url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return false,
        };
        if parsed.scheme() != "https" {
            return false;
        }
        let host_ok = parsed
            .host_str()
            .map(|h| h == ALLOWED_HOST_SUFFIX || h.ends_with(&format!(".{ALLOWED_HOST_SUFFIX}")))
            .unwrap_or(false);
        if !host_ok {
            return false;
        }
        let path = parsed.path();
        path.contains("/cursos/") && path.ends_with("/aulas")
    }
}
