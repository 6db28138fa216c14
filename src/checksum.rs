//! Content-addressed SHA-256 checksums.
//!
//! Checksums catalog files at export time and re-verify them at import time.
//! The digest is always 64 lowercase hex characters.

use crate::error::PackageError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Compute the SHA-256 digest of a byte slice as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Compute the SHA-256 digest of a file's content.
pub fn checksum_file(path: &Path) -> Result<String, PackageError> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes))
}
