//! Package manifest: metadata record, schema validation, and compatibility
//! classification.
//!
//! The manifest is built once per export and immutable afterwards. Every
//! `FileDescriptor` checksum describes the *packaged* (post-sanitization)
//! bytes, never the original source content.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// File name of the manifest member at the archive root.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

// =============================================================================
// Categories
// =============================================================================

/// Known configuration categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigCategory {
    Settings,
    Profiles,
    Workflows,
    Agents,
    Mcp,
    Hooks,
    Skills,
}

impl ConfigCategory {
    pub fn all() -> &'static [ConfigCategory] {
        &[
            ConfigCategory::Settings,
            ConfigCategory::Profiles,
            ConfigCategory::Workflows,
            ConfigCategory::Agents,
            ConfigCategory::Mcp,
            ConfigCategory::Hooks,
            ConfigCategory::Skills,
        ]
    }

    pub fn id(&self) -> &'static str {
        match self {
            ConfigCategory::Settings => "settings",
            ConfigCategory::Profiles => "profiles",
            ConfigCategory::Workflows => "workflows",
            ConfigCategory::Agents => "agents",
            ConfigCategory::Mcp => "mcp",
            ConfigCategory::Hooks => "hooks",
            ConfigCategory::Skills => "skills",
        }
    }

    pub fn from_id(id: &str) -> Option<ConfigCategory> {
        match id {
            "settings" => Some(ConfigCategory::Settings),
            "profiles" => Some(ConfigCategory::Profiles),
            "workflows" => Some(ConfigCategory::Workflows),
            "agents" => Some(ConfigCategory::Agents),
            "mcp" => Some(ConfigCategory::Mcp),
            "hooks" => Some(ConfigCategory::Hooks),
            "skills" => Some(ConfigCategory::Skills),
            _ => None,
        }
    }
}

// =============================================================================
// Descriptors and manifest
// =============================================================================

/// One packaged file, keyed by its relative package path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Relative path inside the package, forward slashes.
    pub path: String,
    pub category: ConfigCategory,
    pub size: u64,
    /// Lowercase hex SHA-256 of the packaged content. Empty when the
    /// producing tool recorded none; integrity is then unverifiable.
    #[serde(default)]
    pub checksum: String,
    /// True when sanitization redacted content from this file.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sanitized: bool,
    /// Originating absolute path, export-time only. Never persisted.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    /// Version of the tool that produced the package.
    pub version: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    pub platform: Platform,
    /// Requested tool-type scope ("claude", "codex", "gemini", or "all").
    pub tool: String,
    pub scope: Vec<ConfigCategory>,
    /// True iff any descriptor was redacted by the sanitizer.
    pub contains_secrets: bool,
    pub files: Vec<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Build a manifest for one export, stamping the current tool version,
/// timestamp, and platform.
pub fn build_manifest(
    tool: &str,
    scope: Vec<ConfigCategory>,
    files: Vec<FileDescriptor>,
    description: Option<String>,
    tags: Vec<String>,
) -> PackageManifest {
    let contains_secrets = files.iter().any(|f| f.sanitized);
    PackageManifest {
        version: env!("CARGO_PKG_VERSION").to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        platform: Platform::current(),
        tool: tool.to_string(),
        scope,
        contains_secrets,
        files,
        description,
        tags,
    }
}

// =============================================================================
// Validation taxonomy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    PackageNotFound,
    InvalidArchiveFormat,
    ExtractionFailed,
    MissingManifest,
    InvalidManifestField,
    InvalidFileEntry,
    FileMissing,
    ChecksumMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    VersionMismatch,
    VersionDifference,
    PlatformMismatch,
    PlatformDifference,
    MissingChecksum,
    ChecksumUnverifiable,
    PathAdaptation,
    RollbackPerformed,
    RollbackFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A fatal problem: aborts the operation before user state is mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Informational only: never blocks the operation.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationWarning {
    pub code: WarningCode,
    pub severity: Severity,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(code: WarningCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PackageManifest>,
    pub platform_compatible: bool,
    pub version_compatible: bool,
}

impl ValidationOutcome {
    pub fn failed(issue: ValidationIssue) -> Self {
        Self {
            valid: false,
            issues: vec![issue],
            warnings: Vec::new(),
            manifest: None,
            platform_compatible: true,
            version_compatible: true,
        }
    }
}

// =============================================================================
// Schema validation
// =============================================================================

/// Check that a raw manifest value has the required fields with the right
/// types, and validate every file entry.
///
/// A missing checksum on a file entry is a warning, not fatal; everything
/// else listed here is fatal.
pub fn validate_manifest(
    raw: &Value,
) -> (
    Vec<ValidationIssue>,
    Vec<ValidationWarning>,
    Option<PackageManifest>,
) {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let Some(obj) = raw.as_object() else {
        issues.push(ValidationIssue::new(
            IssueCode::InvalidManifestField,
            "manifest root is not an object",
        ));
        return (issues, warnings, None);
    };

    for field in ["version", "createdAt", "platform", "tool"] {
        match obj.get(field) {
            Some(Value::String(_)) => {}
            Some(_) => issues.push(ValidationIssue::new(
                IssueCode::InvalidManifestField,
                format!("manifest field '{}' must be a string", field),
            )),
            None => issues.push(ValidationIssue::new(
                IssueCode::InvalidManifestField,
                format!("manifest field '{}' is missing", field),
            )),
        }
    }

    if let Some(Value::String(p)) = obj.get("platform")
        && Platform::from_id(p).is_none()
    {
        issues.push(ValidationIssue::new(
            IssueCode::InvalidManifestField,
            format!("unknown platform tag '{}'", p),
        ));
    }

    match obj.get("scope") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                let valid = entry
                    .as_str()
                    .and_then(ConfigCategory::from_id)
                    .is_some();
                if !valid {
                    issues.push(ValidationIssue::new(
                        IssueCode::InvalidManifestField,
                        format!("unknown scope category {}", entry),
                    ));
                }
            }
        }
        _ => issues.push(ValidationIssue::new(
            IssueCode::InvalidManifestField,
            "manifest field 'scope' must be an array",
        )),
    }

    match obj.get("files") {
        Some(Value::Array(entries)) => {
            for (i, entry) in entries.iter().enumerate() {
                validate_file_entry(i, entry, &mut issues, &mut warnings);
            }
        }
        _ => issues.push(ValidationIssue::new(
            IssueCode::InvalidManifestField,
            "manifest field 'files' must be an array",
        )),
    }

    if !issues.is_empty() {
        return (issues, warnings, None);
    }

    match serde_json::from_value::<PackageManifest>(raw.clone()) {
        Ok(manifest) => (issues, warnings, Some(manifest)),
        Err(e) => {
            issues.push(ValidationIssue::new(
                IssueCode::InvalidManifestField,
                format!("manifest deserialization failed: {}", e),
            ));
            (issues, warnings, None)
        }
    }
}

fn validate_file_entry(
    index: usize,
    entry: &Value,
    issues: &mut Vec<ValidationIssue>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let Some(obj) = entry.as_object() else {
        issues.push(ValidationIssue::new(
            IssueCode::InvalidFileEntry,
            format!("file entry {} is not an object", index),
        ));
        return;
    };

    let label = obj
        .get("path")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index));

    match obj.get("path") {
        Some(Value::String(p)) if !p.is_empty() => {
            // Descriptor paths are joined under the config root at import
            // time; anything that could escape it is rejected here.
            let escapes = p.starts_with('/')
                || crate::platform::has_drive_prefix(p)
                || p.split(['/', '\\']).any(|segment| segment == "..");
            if escapes {
                issues.push(ValidationIssue::new(
                    IssueCode::InvalidFileEntry,
                    format!("file entry {} has a non-relative path", label),
                ));
            }
        }
        _ => issues.push(ValidationIssue::new(
            IssueCode::InvalidFileEntry,
            format!("file entry {} has no path", label),
        )),
    }

    let category_ok = obj
        .get("category")
        .and_then(|v| v.as_str())
        .and_then(ConfigCategory::from_id)
        .is_some();
    if !category_ok {
        issues.push(ValidationIssue::new(
            IssueCode::InvalidFileEntry,
            format!("file entry {} has an unknown category", label),
        ));
    }

    if !obj.get("size").map(|v| v.is_u64()).unwrap_or(false) {
        issues.push(ValidationIssue::new(
            IssueCode::InvalidFileEntry,
            format!("file entry {} has no numeric size", label),
        ));
    }

    match obj.get("checksum") {
        Some(Value::String(c)) if !c.is_empty() => {}
        _ => warnings.push(ValidationWarning::new(
            WarningCode::MissingChecksum,
            Severity::Medium,
            format!("file entry {} has no checksum; integrity cannot be verified", label),
        )),
    }
}

// =============================================================================
// Compatibility classification
// =============================================================================

/// Classify package version vs. current tool version.
///
/// Major mismatch is a high-severity warning and marks the package
/// version-incompatible without invalidating it; any other difference is a
/// low-severity note.
pub fn classify_version(package_version: &str) -> (bool, Option<ValidationWarning>) {
    let current = env!("CARGO_PKG_VERSION");
    classify_version_against(package_version, current)
}

pub(crate) fn classify_version_against(
    package_version: &str,
    current: &str,
) -> (bool, Option<ValidationWarning>) {
    let (Ok(pkg), Ok(cur)) = (
        semver::Version::parse(package_version),
        semver::Version::parse(current),
    ) else {
        return (
            true,
            Some(ValidationWarning::new(
                WarningCode::VersionDifference,
                Severity::Low,
                format!("package version '{}' is not valid semver", package_version),
            )),
        );
    };

    if pkg.major != cur.major {
        (
            false,
            Some(ValidationWarning::new(
                WarningCode::VersionMismatch,
                Severity::High,
                format!(
                    "package was created by major version {} but this tool is version {}",
                    pkg, cur
                ),
            )),
        )
    } else if pkg != cur {
        (
            true,
            Some(ValidationWarning::new(
                WarningCode::VersionDifference,
                Severity::Low,
                format!("package version {} differs from tool version {}", pkg, cur),
            )),
        )
    } else {
        (true, None)
    }
}

/// Classify source platform vs. current platform.
///
/// Windows↔non-Windows means embedded paths likely need adaptation; any
/// other pairing is informational only.
pub fn classify_platform(
    source: Platform,
    current: Platform,
) -> (bool, Option<ValidationWarning>) {
    if source == current {
        return (true, None);
    }
    if source.is_windows() != current.is_windows() {
        (
            false,
            Some(ValidationWarning::new(
                WarningCode::PlatformMismatch,
                Severity::Medium,
                format!(
                    "package comes from {} but this is {}; embedded paths will be adapted",
                    source.name(),
                    current.name()
                ),
            )),
        )
    } else {
        (
            true,
            Some(ValidationWarning::new(
                WarningCode::PlatformDifference,
                Severity::Low,
                format!(
                    "package comes from {} but this is {}",
                    source.name(),
                    current.name()
                ),
            )),
        )
    }
}
