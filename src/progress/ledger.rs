//! Crash-safe ledger of completed downloads.
//!
//! The ledger is a flat JSON map from stable item id to completion flag. An
//! item is marked only after its artifact is fully downloaded, verified and
//! atomically renamed into place, so a `true` entry is always backed by a
//! good file. Every mutation rewrites the whole map through a temp file and
//! rename; a crash mid-save leaves the previous ledger intact.

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Maximum allowed ledger file size (10 MB) to prevent memory exhaustion.
const MAX_LEDGER_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Errors related to ledger persistence.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Ledger file too large
    #[error("ledger file too large: {size} bytes (max: {max} bytes)")]
    TooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Lock error
    #[error("lock error: {0}")]
    Lock(String),
}

/// Summary counts over the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    /// Number of keys present in the ledger
    pub total_items: usize,
    /// Number of keys marked completed
    pub completed: usize,
}

/// Durable map of item id → completed.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    entries: HashMap<String, bool>,
}

impl ProgressLedger {
    /// Load the ledger from `path`. A missing file starts empty; a corrupt
    /// file is logged and treated as empty rather than aborting the run,
    /// since the worst outcome is re-downloading verified items.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(Some(entries)) => {
                info!(path = %path.display(), items = entries.len(), "Loaded progress ledger");
                entries
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt progress ledger, starting empty");
                HashMap::new()
            }
        };
        Self { path, entries }
    }

    fn read_entries(path: &Path) -> Result<Option<HashMap<String, bool>>, LedgerError> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::Io(e.to_string())),
        };
        if metadata.len() > MAX_LEDGER_FILE_SIZE {
            return Err(LedgerError::TooLarge {
                size: metadata.len(),
                max: MAX_LEDGER_FILE_SIZE,
            });
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path.with_extension("lock"))
            .map_err(|e| LedgerError::Lock(format!("Failed to create lock file: {e}")))?;
        let lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire read lock: {e}")))?;

        let contents =
            std::fs::read_to_string(path).map_err(|e| LedgerError::Io(e.to_string()))?;
        let entries =
            serde_json::from_str(&contents).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(Some(entries))
    }

    /// Whether `key` has already been downloaded and verified.
    pub fn is_completed(&self, key: &str) -> bool {
        self.entries.get(key).copied().unwrap_or(false)
    }

    /// Mark `key` completed and persist the whole ledger atomically.
    ///
    /// The save happens before this returns, so a crash immediately after a
    /// download never loses the completion.
    pub fn mark_completed(&mut self, key: &str) -> Result<(), LedgerError> {
        self.entries.insert(key.to_string(), true);
        self.save()?;
        debug!(key, items = self.entries.len(), "Marked item completed");
        Ok(())
    }

    /// Drop every entry and persist the empty ledger.
    pub fn clear(&mut self) -> Result<(), LedgerError> {
        self.entries.clear();
        self.save()?;
        info!("Progress ledger cleared");
        Ok(())
    }

    /// Summary counts over the ledger.
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            total_items: self.entries.len(),
            completed: self.entries.values().filter(|v| **v).count(),
        }
    }

    /// Save the ledger with an atomic temp-file rename and file locking.
    fn save(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))
            .map_err(|e| LedgerError::Lock(format!("Failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| LedgerError::Lock(format!("Failed to acquire write lock: {e}")))?;

        let parent_dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| LedgerError::Io(format!("Failed to create temp file: {e}")))?;

        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| LedgerError::Io(format!("Failed to write to temp file: {e}")))?;

        // Flush to the OS and sync to disk before the rename so the new
        // contents are durable once the target name points at them
        temp_file
            .flush()
            .map_err(|e| LedgerError::Io(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| LedgerError::Io(format!("Failed to sync temp file: {e}")))?;

        temp_file
            .persist(&self.path)
            .map_err(|e| LedgerError::Io(format!("Failed to persist temp file: {e}")))?;

        // Fsync the parent directory so the rename itself is durable
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = std::fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }
}
