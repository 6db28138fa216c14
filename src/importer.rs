//! Import orchestration: validate, back up, extract, adapt, merge, write.
//!
//! The only safety net against a partial failure is the backup taken before
//! any target file is touched: every failure after that point triggers a
//! rollback attempt, and a rollback failure is surfaced loudly with the
//! backup location rather than swallowed.

use crate::archive;
use crate::collector::ToolKind;
use crate::fsutil;
use crate::manifest::{
    ConfigCategory, FileDescriptor, PackageManifest, Severity, ValidationWarning, WarningCode,
};
use crate::merger::{self, Conflict, MergeStrategy};
use crate::path_adapter;
use crate::platform::Platform;
use crate::sanitizer;
use crate::validator;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub strategy: MergeStrategy,
    /// Snapshot current state before writing anything.
    pub backup: bool,
    /// Write credential-bearing content as-is instead of re-sanitizing it.
    pub include_sensitive: bool,
    /// Restrict the import to one tool's files.
    pub tool: Option<ToolKind>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::Merge,
            backup: true,
            include_sensitive: false,
            tool: None,
        }
    }
}

#[derive(Debug)]
pub struct ImportReport {
    pub success: bool,
    pub files_imported: usize,
    pub backup_path: Option<PathBuf>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<ValidationWarning>,
    /// True when a failure occurred but a backup exists to recover from.
    pub rollback_available: bool,
    /// True when a failed import was rolled back to the pre-import state.
    pub rollback_performed: bool,
    pub error: Option<String>,
}

pub struct Importer {
    config_root: PathBuf,
}

impl Importer {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    /// Apply a package onto the current configuration tree.
    ///
    /// Validation failures abort before any state is touched. Failures
    /// during application are reported in the returned [`ImportReport`]
    /// after a rollback attempt, so callers always get the backup location
    /// and conflict list.
    pub fn import(&self, package: &Path, options: &ImportOptions) -> Result<ImportReport> {
        let outcome = validator::validate_package(package);
        if !outcome.valid {
            let details: Vec<String> = outcome
                .issues
                .iter()
                .map(|i| format!("{:?}: {}", i.code, i.message))
                .collect();
            bail!("package validation failed: {}", details.join("; "));
        }
        let manifest = outcome
            .manifest
            .context("validated package has no manifest")?;
        let mut warnings = outcome.warnings;

        let descriptors: Vec<&FileDescriptor> = manifest
            .files
            .iter()
            .filter(|d| match options.tool {
                Some(tool) => d.path.starts_with(&format!(".{}/", tool.id())),
                None => true,
            })
            .collect();

        // Backup before anything is written.
        let backup_path = if options.backup {
            Some(self.take_backup(&descriptors)?)
        } else {
            None
        };

        let scratch = TempDir::new().context("failed to create extraction directory")?;
        archive::extract(package, scratch.path()).context("failed to extract package")?;

        match self.apply_files(&manifest, &descriptors, scratch.path(), options, &mut warnings) {
            Ok((files_imported, conflicts)) => Ok(ImportReport {
                success: true,
                files_imported,
                backup_path,
                conflicts,
                warnings,
                rollback_available: false,
                rollback_performed: false,
                error: None,
            }),
            Err(e) => {
                let mut rollback_performed = false;
                let mut rollback_available = false;
                if let Some(backup) = &backup_path {
                    match self.restore_backup(backup, &descriptors) {
                        Ok(()) => {
                            rollback_performed = true;
                            warnings.push(ValidationWarning::new(
                                WarningCode::RollbackPerformed,
                                Severity::Medium,
                                format!(
                                    "import failed; previous configuration restored from {}",
                                    backup.display()
                                ),
                            ));
                            tracing::warn!(
                                backup = %backup.display(),
                                error = %e,
                                "import failed, rolled back to backup"
                            );
                        }
                        Err(restore_err) => {
                            // Silent data loss is unacceptable: name the
                            // backup so the user can recover manually.
                            rollback_available = true;
                            warnings.push(ValidationWarning::new(
                                WarningCode::RollbackFailed,
                                Severity::High,
                                format!(
                                    "rollback failed ({}); recover manually from {}",
                                    restore_err,
                                    backup.display()
                                ),
                            ));
                            tracing::error!(
                                backup = %backup.display(),
                                error = %restore_err,
                                "rollback failed after import error"
                            );
                        }
                    }
                }
                Ok(ImportReport {
                    success: false,
                    files_imported: 0,
                    backup_path,
                    conflicts: Vec::new(),
                    warnings,
                    rollback_available,
                    rollback_performed,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Snapshot every target file this import could touch.
    fn take_backup(&self, descriptors: &[&FileDescriptor]) -> Result<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let backup_root = self
            .config_root
            .join(".agentpack")
            .join("backups")
            .join(stamp.to_string());
        fs::create_dir_all(&backup_root)
            .with_context(|| format!("failed to create backup dir {}", backup_root.display()))?;

        for descriptor in descriptors {
            let target = self.config_root.join(&descriptor.path);
            if target.is_file() {
                fsutil::copy_file_with_dirs(&target, &backup_root.join(&descriptor.path))
                    .with_context(|| format!("failed to back up {}", descriptor.path))?;
            }
        }
        Ok(backup_root)
    }

    /// Restore the snapshot: backed-up files are copied back, imported files
    /// that had no pre-import counterpart are removed.
    fn restore_backup(&self, backup_root: &Path, descriptors: &[&FileDescriptor]) -> Result<()> {
        for descriptor in descriptors {
            let saved = backup_root.join(&descriptor.path);
            let target = self.config_root.join(&descriptor.path);
            if saved.exists() {
                fsutil::copy_file_with_dirs(&saved, &target)?;
            } else if target.is_file() {
                fs::remove_file(&target)?;
            }
        }
        Ok(())
    }

    fn apply_files(
        &self,
        manifest: &PackageManifest,
        descriptors: &[&FileDescriptor],
        scratch: &Path,
        options: &ImportOptions,
        warnings: &mut Vec<ValidationWarning>,
    ) -> Result<(usize, Vec<Conflict>)> {
        let current = Platform::current();
        let mut conflicts = Vec::new();
        let mut files_imported = 0usize;

        for descriptor in descriptors {
            let extracted = scratch.join(&descriptor.path);
            let bytes = fs::read(&extracted)
                .with_context(|| format!("extracted file missing: {}", descriptor.path))?;
            let target = self.config_root.join(&descriptor.path);

            let incoming_text = match String::from_utf8(bytes) {
                Ok(mut text) => {
                    if !options.include_sensitive {
                        let outcome = sanitizer::sanitize(&descriptor.path, &text);
                        if outcome.redacted {
                            tracing::debug!(path = %descriptor.path, "re-sanitized incoming file");
                            text = outcome.content;
                        }
                    }
                    text
                }
                Err(e) => {
                    // Binary content: no adaptation, file-granularity
                    // strategy like any other unmergeable file.
                    if target.exists() && options.strategy == MergeStrategy::SkipExisting {
                        conflicts.push(Conflict {
                            category: descriptor.category,
                            name: descriptor.path.clone(),
                            existing: Value::String(descriptor.path.clone()),
                            incoming: Value::String(descriptor.path.clone()),
                            suggestion: merger::Resolution::UseExisting,
                        });
                        continue;
                    }
                    fsutil::write_with_dirs(&target, &e.into_bytes())?;
                    files_imported += 1;
                    continue;
                }
            };

            // Path adaptation only applies to parseable config content;
            // everything else degrades to a verbatim copy.
            let mut adapted_paths = false;
            let incoming_value = serde_json::from_str::<Value>(&incoming_text).ok().map(|value| {
                let outcome = if descriptor.category == ConfigCategory::Mcp {
                    path_adapter::adapt_mcp_servers(&value, manifest.platform, current)
                } else {
                    path_adapter::adapt_config(&value, manifest.platform, current)
                };
                adapted_paths = !outcome.mappings.is_empty();
                warnings.extend(outcome.warnings);
                outcome.value
            });

            let existing_value = if target.exists() {
                fs::read_to_string(&target)
                    .ok()
                    .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            } else {
                None
            };

            match (existing_value, incoming_value) {
                // Category-specific merge for keyed collections.
                (Some(existing), Some(incoming))
                    if descriptor.category == ConfigCategory::Mcp =>
                {
                    let outcome =
                        merger::merge_mcp_servers(&existing, &incoming, options.strategy);
                    conflicts.extend(outcome.conflicts);
                    fsutil::write_with_dirs(
                        &target,
                        serde_json::to_string_pretty(&outcome.value)?.as_bytes(),
                    )?;
                }
                (Some(existing), Some(incoming))
                    if descriptor.category == ConfigCategory::Profiles =>
                {
                    let outcome = merger::merge_profiles(&existing, &incoming, options.strategy);
                    conflicts.extend(outcome.conflicts);
                    fsutil::write_with_dirs(
                        &target,
                        serde_json::to_string_pretty(&outcome.value)?.as_bytes(),
                    )?;
                }
                // Generic strategy merge for existing JSON targets.
                (Some(existing), Some(incoming)) => {
                    let outcome = merger::merge_configs(
                        &existing,
                        &incoming,
                        options.strategy,
                        descriptor.category,
                    );
                    conflicts.extend(outcome.conflicts);
                    fsutil::write_with_dirs(
                        &target,
                        serde_json::to_string_pretty(&outcome.value)?.as_bytes(),
                    )?;
                }
                // JSON onto a missing target: verbatim unless adaptation
                // rewrote paths inside it.
                (None, Some(incoming)) if !target.exists() => {
                    if adapted_paths {
                        fsutil::write_with_dirs(
                            &target,
                            serde_json::to_string_pretty(&incoming)?.as_bytes(),
                        )?;
                    } else {
                        fsutil::write_with_dirs(&target, incoming_text.as_bytes())?;
                    }
                }
                // Non-JSON content, or JSON arriving over a non-JSON target:
                // file-granularity strategy.
                (_, adapted) => {
                    let content = match &adapted {
                        Some(value) if adapted_paths => serde_json::to_string_pretty(value)?,
                        _ => incoming_text.clone(),
                    };
                    if target.exists() && options.strategy == MergeStrategy::SkipExisting {
                        conflicts.push(Conflict {
                            category: descriptor.category,
                            name: descriptor.path.clone(),
                            existing: Value::String(descriptor.path.clone()),
                            incoming: Value::String(descriptor.path.clone()),
                            suggestion: merger::Resolution::UseExisting,
                        });
                        continue;
                    }
                    fsutil::write_with_dirs(&target, content.as_bytes())?;
                }
            }
            files_imported += 1;
        }

        Ok((files_imported, conflicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ExportScope;
    use crate::exporter::{ExportOptions, Exporter};
    use tempfile::TempDir;

    fn export_package(source_root: &Path, include_sensitive: bool) -> PathBuf {
        fs::create_dir_all(source_root.join(".claude/commands")).unwrap();
        fs::write(
            source_root.join(".claude/settings.json"),
            r#"{"theme":"dark","fontSize":12}"#,
        )
        .unwrap();
        fs::write(
            source_root.join(".claude/mcp.json"),
            r#"{"mcpServers":{"db":{"command":"npx","args":["db-server"]}}}"#,
        )
        .unwrap();
        fs::write(source_root.join(".claude/commands/review.md"), "# review").unwrap();

        let out = source_root.join("pkg.zip");
        Exporter::new(source_root)
            .export(
                &ExportOptions {
                    tools: vec![ToolKind::Claude],
                    tool_label: "claude".to_string(),
                    scope: ExportScope::All,
                    include_sensitive,
                    output: Some(out.clone()),
                    description: None,
                    tags: Vec::new(),
                },
                None,
            )
            .unwrap();
        out
    }

    #[test]
    fn test_replace_import_onto_empty_target_reproduces_tree() {
        let source = TempDir::new().unwrap();
        let pkg = export_package(source.path(), true);

        let target = TempDir::new().unwrap();
        let importer = Importer::new(target.path());
        let report = importer
            .import(
                &pkg,
                &ImportOptions {
                    strategy: MergeStrategy::Replace,
                    backup: false,
                    include_sensitive: true,
                    tool: None,
                },
            )
            .unwrap();

        assert!(report.success);
        assert_eq!(report.files_imported, 3);
        assert!(report.conflicts.is_empty());

        let settings: Value = serde_json::from_str(
            &fs::read_to_string(target.path().join(".claude/settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["theme"], "dark");
        assert_eq!(
            fs::read_to_string(target.path().join(".claude/commands/review.md")).unwrap(),
            "# review"
        );
    }

    #[test]
    fn test_merge_import_reconciles_existing_settings() {
        let source = TempDir::new().unwrap();
        let pkg = export_package(source.path(), true);

        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join(".claude")).unwrap();
        fs::write(
            target.path().join(".claude/settings.json"),
            r#"{"theme":"light","editor":"vim"}"#,
        )
        .unwrap();
        fs::write(
            target.path().join(".claude/mcp.json"),
            r#"{"mcpServers":{"db":{"command":"npx","args":["db-server","--old"]},"web":{"command":"node"}}}"#,
        )
        .unwrap();

        let importer = Importer::new(target.path());
        let report = importer
            .import(
                &pkg,
                &ImportOptions {
                    strategy: MergeStrategy::Merge,
                    backup: false,
                    include_sensitive: true,
                    tool: None,
                },
            )
            .unwrap();

        assert!(report.success);
        // Scalar conflict on theme, keyed conflict on db.
        assert!(report.conflicts.iter().any(|c| c.name == "theme"));
        assert!(report.conflicts.iter().any(|c| c.name == "db"));

        let settings: Value = serde_json::from_str(
            &fs::read_to_string(target.path().join(".claude/settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["theme"], "dark");
        assert_eq!(settings["editor"], "vim");

        let mcp: Value = serde_json::from_str(
            &fs::read_to_string(target.path().join(".claude/mcp.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(mcp["mcpServers"]["db"]["args"], serde_json::json!(["db-server"]));
        assert!(mcp["mcpServers"]["web"].is_object());
    }

    #[test]
    fn test_skip_existing_preserves_target_keys() {
        let source = TempDir::new().unwrap();
        let pkg = export_package(source.path(), true);

        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join(".claude")).unwrap();
        fs::write(
            target.path().join(".claude/settings.json"),
            r#"{"theme":"light"}"#,
        )
        .unwrap();

        let importer = Importer::new(target.path());
        let report = importer
            .import(
                &pkg,
                &ImportOptions {
                    strategy: MergeStrategy::SkipExisting,
                    backup: false,
                    include_sensitive: true,
                    tool: None,
                },
            )
            .unwrap();

        assert!(report.success);
        let settings: Value = serde_json::from_str(
            &fs::read_to_string(target.path().join(".claude/settings.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(settings["theme"], "light");
        assert_eq!(settings["fontSize"], 12);
    }

    #[test]
    fn test_skip_existing_preserves_binary_files() {
        let source = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join(".claude/hooks")).unwrap();
        fs::write(
            source.path().join(".claude/hooks/notify.bin"),
            [0xffu8, 0xfe, 0x00, 0x01],
        )
        .unwrap();
        let pkg = source.path().join("pkg.zip");
        Exporter::new(source.path())
            .export(
                &ExportOptions {
                    tools: vec![ToolKind::Claude],
                    tool_label: "claude".to_string(),
                    scope: ExportScope::All,
                    include_sensitive: true,
                    output: Some(pkg.clone()),
                    description: None,
                    tags: Vec::new(),
                },
                None,
            )
            .unwrap();

        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join(".claude/hooks")).unwrap();
        fs::write(
            target.path().join(".claude/hooks/notify.bin"),
            [0x00u8, 0x11],
        )
        .unwrap();

        let importer = Importer::new(target.path());
        let report = importer
            .import(
                &pkg,
                &ImportOptions {
                    strategy: MergeStrategy::SkipExisting,
                    backup: false,
                    include_sensitive: true,
                    tool: None,
                },
            )
            .unwrap();

        assert!(report.success);
        // Pre-import bytes untouched, recorded as a file-level conflict.
        assert_eq!(
            fs::read(target.path().join(".claude/hooks/notify.bin")).unwrap(),
            vec![0x00u8, 0x11]
        );
        assert!(report.conflicts.iter().any(|c| {
            c.name == ".claude/hooks/notify.bin"
                && c.suggestion == merger::Resolution::UseExisting
        }));
    }

    #[test]
    fn test_invalid_package_aborts_before_touching_state() {
        let target = TempDir::new().unwrap();
        let bogus = target.path().join("bogus.zip");
        fs::write(&bogus, "nope").unwrap();

        let importer = Importer::new(target.path());
        let result = importer.import(&bogus, &ImportOptions::default());
        assert!(result.is_err());
        assert!(!target.path().join(".agentpack").exists());
    }

    #[test]
    fn test_backup_is_taken_and_reported() {
        let source = TempDir::new().unwrap();
        let pkg = export_package(source.path(), true);

        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join(".claude")).unwrap();
        fs::write(
            target.path().join(".claude/settings.json"),
            r#"{"theme":"light"}"#,
        )
        .unwrap();

        let importer = Importer::new(target.path());
        let report = importer.import(&pkg, &ImportOptions::default()).unwrap();
        assert!(report.success);
        let backup = report.backup_path.unwrap();
        assert!(backup.exists());
        assert_eq!(
            fs::read_to_string(backup.join(".claude/settings.json")).unwrap(),
            r#"{"theme":"light"}"#
        );
    }

    #[test]
    fn test_import_without_sensitive_flag_re_sanitizes() {
        let source = TempDir::new().unwrap();
        fs::create_dir_all(source.path().join(".claude")).unwrap();
        fs::write(
            source.path().join(".claude/settings.json"),
            r#"{"apiKey":"sk-live-secret","theme":"dark"}"#,
        )
        .unwrap();
        let pkg = source.path().join("pkg.zip");
        Exporter::new(source.path())
            .export(
                &ExportOptions {
                    tools: vec![ToolKind::Claude],
                    tool_label: "claude".to_string(),
                    scope: ExportScope::Settings,
                    include_sensitive: true,
                    output: Some(pkg.clone()),
                    description: None,
                    tags: Vec::new(),
                },
                None,
            )
            .unwrap();

        let target = TempDir::new().unwrap();
        let importer = Importer::new(target.path());
        let report = importer
            .import(
                &pkg,
                &ImportOptions {
                    strategy: MergeStrategy::Replace,
                    backup: false,
                    include_sensitive: false,
                    tool: None,
                },
            )
            .unwrap();
        assert!(report.success);

        let text = fs::read_to_string(target.path().join(".claude/settings.json")).unwrap();
        assert!(!text.contains("sk-live-secret"));
        assert!(sanitizer::has_sanitized_data(&text));
    }

    #[test]
    fn test_failed_import_rolls_back_from_backup() {
        let source = TempDir::new().unwrap();
        let pkg = export_package(source.path(), true);

        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join(".claude")).unwrap();
        fs::write(
            target.path().join(".claude/settings.json"),
            r#"{"theme":"light"}"#,
        )
        .unwrap();
        // Make one target unwritable by shadowing it with a directory: the
        // write for that path fails partway through the apply loop.
        fs::create_dir_all(target.path().join(".claude/mcp.json")).unwrap();

        let importer = Importer::new(target.path());
        let report = importer.import(&pkg, &ImportOptions::default()).unwrap();

        assert!(!report.success);
        assert!(report.error.is_some());
        assert!(report.rollback_performed);
        assert!(
            report
                .warnings
                .iter()
                .any(|w| w.code == WarningCode::RollbackPerformed)
        );
        // Pre-import state restored.
        assert_eq!(
            fs::read_to_string(target.path().join(".claude/settings.json")).unwrap(),
            r#"{"theme":"light"}"#
        );
    }
}
