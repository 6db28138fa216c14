//! Package archive creation, extraction, and format probing.
//!
//! A package is a zip container holding `manifest.json` at its root plus the
//! content files at the relative paths the manifest records. Extraction is
//! zip-slip safe: entries that would escape the target directory are
//! rejected.

use crate::error::PackageError;
use crate::manifest::{MANIFEST_FILE_NAME, PackageManifest};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::read::ZipArchive;
use zip::write::FileOptions;

/// Pack every file under `staging` into a zip archive at `out`.
///
/// The staging directory is expected to contain `manifest.json` at its root;
/// members are named with forward slashes regardless of host platform.
pub fn pack_dir(staging: &Path, out: &Path) -> Result<(), PackageError> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file = fs::File::create(out)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::<()>::default();

    for entry in WalkDir::new(staging).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::ExtractionFailed(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| PackageError::ExtractionFailed(e.to_string()))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            zip.add_directory(name.as_str(), options)?;
        } else {
            zip.start_file(name.as_str(), options)?;
            let bytes = fs::read(entry.path())?;
            zip.write_all(&bytes)?;
        }
    }

    zip.finish()?;
    Ok(())
}

/// Extract every member of `package` into `target` and parse the manifest.
///
/// Fails with [`PackageError::MissingManifest`] when the archive has no
/// `manifest.json` member and [`PackageError::InvalidArchive`] when the
/// container itself is unreadable.
pub fn extract(package: &Path, target: &Path) -> Result<PackageManifest, PackageError> {
    let file = fs::File::open(package)?;
    let mut zip =
        ZipArchive::new(file).map_err(|_| PackageError::InvalidArchive(package.to_path_buf()))?;

    for i in 0..zip.len() {
        let mut member = zip
            .by_index(i)
            .map_err(|e| PackageError::ExtractionFailed(e.to_string()))?;
        let Some(rel) = member.enclosed_name() else {
            return Err(PackageError::PathTraversal(member.name().to_string()));
        };
        let outpath = target.join(rel);

        if member.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&outpath)?;
            std::io::copy(&mut member, &mut out)?;
        }
    }

    let manifest_path = target.join(MANIFEST_FILE_NAME);
    if !manifest_path.exists() {
        return Err(PackageError::MissingManifest);
    }
    let raw = fs::read_to_string(&manifest_path)?;
    let manifest: PackageManifest = serde_json::from_str(&raw)
        .map_err(|e| PackageError::InvalidManifest(e.to_string()))?;
    Ok(manifest)
}

/// Read a single member of the archive without extracting the rest.
pub fn read_member(package: &Path, name: &str) -> Result<Vec<u8>, PackageError> {
    let file = fs::File::open(package)?;
    let mut zip =
        ZipArchive::new(file).map_err(|_| PackageError::InvalidArchive(package.to_path_buf()))?;
    let mut member = zip
        .by_name(name)
        .map_err(|_| PackageError::ExtractionFailed(format!("missing member: {}", name)))?;
    let mut buf = Vec::new();
    member.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Lightweight acceptance probe: is this file a readable zip container?
///
/// Returns `false` for missing, truncated, or non-zip input; never errors.
pub fn is_package_archive(path: &Path) -> bool {
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() {
        return false;
    }
    // Local file header or empty-archive end-of-central-directory record.
    if magic != [0x50, 0x4b, 0x03, 0x04] && magic != [0x50, 0x4b, 0x05, 0x06] {
        return false;
    }
    let Ok(file) = fs::File::open(path) else {
        return false;
    };
    ZipArchive::new(file).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ConfigCategory, FileDescriptor, PackageManifest};
    use crate::platform::Platform;
    use tempfile::TempDir;

    fn sample_manifest() -> PackageManifest {
        PackageManifest {
            version: "0.4.0".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            platform: Platform::Linux,
            tool: "claude".to_string(),
            scope: vec![ConfigCategory::Settings],
            contains_secrets: false,
            files: vec![FileDescriptor {
                path: ".claude/settings.json".to_string(),
                category: ConfigCategory::Settings,
                size: 2,
                checksum: crate::checksum::sha256_hex(b"{}"),
                sanitized: false,
                source_path: None,
            }],
            description: None,
            tags: Vec::new(),
        }
    }

    fn stage_and_pack(temp: &TempDir) -> std::path::PathBuf {
        let staging = temp.path().join("staging");
        fs::create_dir_all(staging.join(".claude")).unwrap();
        fs::write(staging.join(".claude/settings.json"), "{}").unwrap();
        let manifest = sample_manifest();
        fs::write(
            staging.join(MANIFEST_FILE_NAME),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();

        let out = temp.path().join("pkg.zip");
        pack_dir(&staging, &out).unwrap();
        out
    }

    #[test]
    fn test_pack_then_extract_roundtrip() {
        let temp = TempDir::new().unwrap();
        let pkg = stage_and_pack(&temp);

        let target = temp.path().join("out");
        let manifest = extract(&pkg, &target).unwrap();
        assert_eq!(manifest.tool, "claude");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(
            fs::read_to_string(target.join(".claude/settings.json")).unwrap(),
            "{}"
        );
    }

    #[test]
    fn test_extract_without_manifest_is_distinguished_error() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("orphan.txt"), "x").unwrap();
        let pkg = temp.path().join("bare.zip");
        pack_dir(&staging, &pkg).unwrap();

        let result = extract(&pkg, &temp.path().join("out"));
        assert!(matches!(result, Err(PackageError::MissingManifest)));
    }

    #[test]
    fn test_is_package_archive_accepts_real_zip() {
        let temp = TempDir::new().unwrap();
        let pkg = stage_and_pack(&temp);
        assert!(is_package_archive(&pkg));
    }

    #[test]
    fn test_is_package_archive_rejects_garbage_without_panicking() {
        let temp = TempDir::new().unwrap();

        let missing = temp.path().join("missing.zip");
        assert!(!is_package_archive(&missing));

        let text = temp.path().join("notes.txt");
        fs::write(&text, "not an archive at all").unwrap();
        assert!(!is_package_archive(&text));

        // Right magic bytes, truncated body.
        let truncated = temp.path().join("trunc.zip");
        fs::write(&truncated, [0x50, 0x4b, 0x03, 0x04, 0x00]).unwrap();
        assert!(!is_package_archive(&truncated));
    }

    #[test]
    fn test_read_member_returns_manifest_bytes() {
        let temp = TempDir::new().unwrap();
        let pkg = stage_and_pack(&temp);
        let bytes = read_member(&pkg, MANIFEST_FILE_NAME).unwrap();
        let parsed: PackageManifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.tool, "claude");
    }
}
