//! End-to-end package acceptance check.
//!
//! Stages run in strict order and fail fast at the first fatal one:
//! existence, archive format, extraction, manifest schema, per-file
//! integrity, version compatibility, platform compatibility. The scratch
//! extraction directory is dropped on every path.

use crate::archive;
use crate::checksum::checksum_file;
use crate::manifest::{
    self, IssueCode, Severity, ValidationIssue, ValidationOutcome, ValidationWarning, WarningCode,
};
use crate::platform::Platform;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Validate a package archive without touching any user state.
pub fn validate_package(path: &Path) -> ValidationOutcome {
    // Stage 1: existence.
    if !path.exists() {
        return ValidationOutcome::failed(ValidationIssue::new(
            IssueCode::PackageNotFound,
            format!("package not found: {}", path.display()),
        ));
    }

    // Stage 2: archive format probe.
    if !archive::is_package_archive(path) {
        return ValidationOutcome::failed(ValidationIssue::new(
            IssueCode::InvalidArchiveFormat,
            format!("not a valid package archive: {}", path.display()),
        ));
    }

    // Stage 3: extraction to a disposable directory. `TempDir` cleans up on
    // drop whichever way this function returns.
    let Ok(scratch) = TempDir::new() else {
        return ValidationOutcome::failed(ValidationIssue::new(
            IssueCode::ExtractionFailed,
            "could not create a scratch directory",
        ));
    };
    if let Err(e) = archive::extract(path, scratch.path()) {
        let code = match e {
            crate::error::PackageError::MissingManifest => IssueCode::MissingManifest,
            _ => IssueCode::ExtractionFailed,
        };
        return ValidationOutcome::failed(ValidationIssue::new(code, e.to_string()));
    }

    // Stage 4: manifest schema.
    let raw = match fs::read_to_string(scratch.path().join(manifest::MANIFEST_FILE_NAME)) {
        Ok(raw) => raw,
        Err(e) => {
            return ValidationOutcome::failed(ValidationIssue::new(
                IssueCode::MissingManifest,
                e.to_string(),
            ));
        }
    };
    let raw_value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            return ValidationOutcome::failed(ValidationIssue::new(
                IssueCode::InvalidManifestField,
                format!("manifest is not valid JSON: {}", e),
            ));
        }
    };
    let (mut issues, mut warnings, parsed) = manifest::validate_manifest(&raw_value);
    let Some(parsed) = parsed else {
        // Stages after a fatal schema failure are skipped.
        return ValidationOutcome {
            valid: false,
            issues,
            warnings,
            manifest: None,
            platform_compatible: true,
            version_compatible: true,
        };
    };

    // Stage 5: per-file integrity.
    for descriptor in &parsed.files {
        let extracted = scratch.path().join(&descriptor.path);
        if !extracted.exists() {
            issues.push(ValidationIssue::new(
                IssueCode::FileMissing,
                format!("file listed in manifest is missing: {}", descriptor.path),
            ));
            continue;
        }
        if descriptor.checksum.is_empty() {
            // Already warned during schema validation.
            continue;
        }
        match checksum_file(&extracted) {
            Ok(actual) if actual == descriptor.checksum => {}
            Ok(actual) => {
                issues.push(ValidationIssue::new(
                    IssueCode::ChecksumMismatch,
                    format!(
                        "checksum mismatch for {}: expected {}, got {}",
                        descriptor.path, descriptor.checksum, actual
                    ),
                ));
            }
            Err(e) => {
                warnings.push(ValidationWarning::new(
                    WarningCode::ChecksumUnverifiable,
                    Severity::Medium,
                    format!("could not verify checksum for {}: {}", descriptor.path, e),
                ));
            }
        }
    }

    // Stage 6: version compatibility.
    let (version_compatible, version_warning) = manifest::classify_version(&parsed.version);
    if let Some(w) = version_warning {
        warnings.push(w);
    }

    // Stage 7: platform compatibility.
    let (platform_compatible, platform_warning) =
        manifest::classify_platform(parsed.platform, Platform::current());
    if let Some(w) = platform_warning {
        warnings.push(w);
    }

    ValidationOutcome {
        valid: issues.is_empty(),
        issues,
        warnings,
        manifest: Some(parsed),
        platform_compatible,
        version_compatible,
    }
}
