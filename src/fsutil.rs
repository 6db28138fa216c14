//! File system utilities: parent-creating copy and write helpers used by
//! staging, backup, and restore.

use anyhow::Result;
use std::fs;
use std::path::Path;

/// Copy a single file, creating parent directories of the destination.
pub fn copy_file_with_dirs(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Write file content, creating parent directories of the destination.
pub fn write_with_dirs(dst: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dst, content)?;
    Ok(())
}
