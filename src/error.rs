//! Closed error kinds for the package pipeline.
//!
//! Expected failure conditions (missing files, bad checksums, unreadable
//! archives) are modeled as explicit variants so callers can match on them;
//! only genuinely unexpected conditions bubble up as `anyhow` errors at the
//! orchestrator level.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Package not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a valid package archive: {0}")]
    InvalidArchive(PathBuf),

    #[error("Failed to extract package: {0}")]
    ExtractionFailed(String),

    #[error("Package has no manifest.json member")]
    MissingManifest,

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid file entry in manifest: {0}")]
    InvalidFileEntry(String),

    #[error("Path traversal attempt in archive: {0}")]
    PathTraversal(String),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
