//! Artifact verification.
//!
//! The platform serves HTML error pages and truncated bodies with a 200
//! status often enough that every artifact gets a size floor and a
//! magic-byte check before it counts as downloaded.

use crate::ItemKind;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Box types accepted at offset 4 of a valid MP4 container.
const MP4_BOX_TYPES: [&[u8; 4]; 5] = [b"ftyp", b"mdat", b"moov", b"wide", b"free"];

/// Verification failures.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Artifact file missing after download
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Empty file
    #[error("artifact is empty: {0}")]
    Empty(String),

    /// File below the plausible size floor for its kind
    #[error("artifact too small: {name} ({size} bytes, expected >= {min})")]
    TooSmall {
        /// Artifact filename
        name: String,
        /// Actual size in bytes
        size: u64,
        /// Minimum expected size
        min: u64,
    },

    /// Leading bytes do not match the expected container signature
    #[error("artifact is not a valid {expected}: {name}")]
    BadSignature {
        /// Expected format name
        expected: &'static str,
        /// Artifact filename
        name: String,
    },

    /// IO error while reading the artifact
    #[error("failed to read artifact for verification: {0}")]
    Io(#[from] std::io::Error),
}

/// Verify a downloaded artifact: exists, non-empty, above the size floor for
/// its kind, and carries the right magic bytes.
pub fn verify_artifact(path: &Path, kind: ItemKind) -> Result<u64, VerifyError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let metadata = std::fs::metadata(path)
        .map_err(|_| VerifyError::NotFound(path.display().to_string()))?;
    let size = metadata.len();

    if size == 0 {
        return Err(VerifyError::Empty(name));
    }
    let min = kind.min_size_bytes();
    if size < min {
        return Err(VerifyError::TooSmall { name, size, min });
    }

    let mut file = std::fs::File::open(path)?;
    match kind {
        ItemKind::Document { .. } | ItemKind::Companion { .. } => {
            let mut header = [0u8; 4];
            file.read_exact(&mut header)?;
            if &header != b"%PDF" {
                return Err(VerifyError::BadSignature {
                    expected: "PDF",
                    name,
                });
            }
        }
        ItemKind::Video { .. } => {
            // MP4 box type lives at bytes 4..8
            file.seek(SeekFrom::Start(4))?;
            let mut box_type = [0u8; 4];
            file.read_exact(&mut box_type)?;
            if !MP4_BOX_TYPES.iter().any(|t| **t == box_type) {
                return Err(VerifyError::BadSignature {
                    expected: "MP4",
                    name,
                });
            }
        }
    }

    debug!(name, size, "Artifact verified");
    Ok(size)
}
