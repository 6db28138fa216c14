//! Export orchestration: collect, sanitize, stage, manifest, pack, verify.
//!
//! Files are processed one at a time in manifest order so progress and
//! descriptor ordering are reproducible across runs. Progress is reported
//! through a synchronous callback at fixed milestones.

use crate::archive;
use crate::checksum::sha256_hex;
use crate::collector::{Collector, ExportScope, ToolKind};
use crate::fsutil;
use crate::manifest::{self, MANIFEST_FILE_NAME};
use crate::sanitizer;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Progress callback: percentage (0..=100) and a stage label.
pub type ProgressFn<'a> = &'a mut dyn FnMut(u8, &str);

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub tools: Vec<ToolKind>,
    /// Tool-type label recorded in the manifest ("claude" or "all").
    pub tool_label: String,
    pub scope: ExportScope,
    /// Skip sanitization and package credentials as-is.
    pub include_sensitive: bool,
    pub output: Option<PathBuf>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug)]
pub struct ExportReport {
    pub package_path: PathBuf,
    pub file_count: usize,
    pub redacted_count: usize,
}

pub struct Exporter {
    collector: Collector,
}

impl Exporter {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            collector: Collector::new(config_root),
        }
    }

    /// Run a full export, producing a verified package archive.
    pub fn export(
        &self,
        options: &ExportOptions,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<ExportReport> {
        let mut report = |pct: u8, stage: &str| {
            if let Some(cb) = progress.as_mut() {
                cb(pct, stage);
            }
        };

        report(0, "collecting configuration files");
        let mut files = self
            .collector
            .collect(&options.tools, &options.scope)
            .context("failed to collect configuration files")?;
        if files.is_empty() {
            bail!(
                "no configuration files found for tool '{}' in the requested scope",
                options.tool_label
            );
        }

        report(20, "preparing staging area");
        let staging = TempDir::new().context("failed to create staging directory")?;

        // Sanitize and stage each file, re-deriving size and checksum from
        // the bytes that actually enter the package.
        report(40, "sanitizing and staging");
        let mut redacted_count = 0usize;
        let total = files.len();
        for (i, descriptor) in files.iter_mut().enumerate() {
            let source = descriptor
                .source_path
                .as_ref()
                .context("collected descriptor has no source path")?;
            let original = fs::read(source)
                .with_context(|| format!("failed to read {}", source.display()))?;

            let staged_bytes = if options.include_sensitive {
                original
            } else {
                match String::from_utf8(original) {
                    Ok(text) => {
                        let outcome = sanitizer::sanitize(&descriptor.path, &text);
                        if outcome.redacted {
                            tracing::debug!(path = %descriptor.path, "redacted secrets");
                            descriptor.sanitized = true;
                            redacted_count += 1;
                        }
                        outcome.content.into_bytes()
                    }
                    // Binary content carries no recognizable secret fields.
                    Err(e) => e.into_bytes(),
                }
            };

            descriptor.size = staged_bytes.len() as u64;
            descriptor.checksum = sha256_hex(&staged_bytes);
            fsutil::write_with_dirs(&staging.path().join(&descriptor.path), &staged_bytes)?;

            // Sanitization spans the 40-60 band.
            let pct = 40 + ((i + 1) * 20 / total) as u8;
            report(pct, "sanitizing and staging");
        }

        report(70, "building manifest");
        let scope_categories = options.scope.categories();
        let manifest = manifest::build_manifest(
            &options.tool_label,
            scope_categories,
            files,
            options.description.clone(),
            options.tags.clone(),
        );
        fs::write(
            staging.path().join(MANIFEST_FILE_NAME),
            serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?,
        )?;

        report(80, "packing archive");
        let package_path = match &options.output {
            Some(path) => path.clone(),
            None => default_output_path(&options.tool_label),
        };
        archive::pack_dir(staging.path(), &package_path)
            .with_context(|| format!("failed to write package {}", package_path.display()))?;

        report(90, "verifying archive");
        if !archive::is_package_archive(&package_path) {
            bail!(
                "produced package is not a readable archive: {}",
                package_path.display()
            );
        }
        archive::read_member(&package_path, MANIFEST_FILE_NAME)
            .context("produced package has no readable manifest")?;

        report(100, "done");
        Ok(ExportReport {
            package_path,
            file_count: manifest.files.len(),
            redacted_count,
        })
    }
}

fn default_output_path(tool_label: &str) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("agentpack-{}-{}.zip", tool_label, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ConfigCategory;
    use std::path::Path;
    use tempfile::TempDir;

    fn seed(root: &Path) {
        fs::create_dir_all(root.join(".claude/commands")).unwrap();
        fs::write(
            root.join(".claude/settings.json"),
            r#"{"apiKey":"sk-ant-test-key","theme":"dark"}"#,
        )
        .unwrap();
        fs::write(root.join(".claude/commands/review.md"), "# review").unwrap();
    }

    fn export_opts(out: PathBuf, include_sensitive: bool) -> ExportOptions {
        ExportOptions {
            tools: vec![ToolKind::Claude],
            tool_label: "claude".to_string(),
            scope: ExportScope::All,
            include_sensitive,
            output: Some(out),
            description: None,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_export_sanitizes_and_checksums_staged_bytes() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let out = temp.path().join("pkg.zip");

        let exporter = Exporter::new(temp.path());
        let report = exporter.export(&export_opts(out.clone(), false), None).unwrap();
        assert_eq!(report.file_count, 2);
        assert_eq!(report.redacted_count, 1);

        let extract_dir = temp.path().join("check");
        let manifest = archive::extract(&out, &extract_dir).unwrap();
        assert!(manifest.contains_secrets);

        let settings = manifest
            .files
            .iter()
            .find(|f| f.category == ConfigCategory::Settings)
            .unwrap();
        assert!(settings.sanitized);

        // Checksum describes the packaged, sanitized bytes.
        let staged = fs::read(extract_dir.join(&settings.path)).unwrap();
        assert_eq!(settings.checksum, sha256_hex(&staged));
        assert_eq!(settings.size, staged.len() as u64);
        let text = String::from_utf8(staged).unwrap();
        assert!(!text.contains("sk-ant-test-key"));
    }

    #[test]
    fn test_export_include_sensitive_keeps_original_bytes() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let out = temp.path().join("pkg.zip");

        let exporter = Exporter::new(temp.path());
        let report = exporter.export(&export_opts(out.clone(), true), None).unwrap();
        assert_eq!(report.redacted_count, 0);

        let extract_dir = temp.path().join("check");
        let manifest = archive::extract(&out, &extract_dir).unwrap();
        assert!(!manifest.contains_secrets);
        let text = fs::read_to_string(extract_dir.join(".claude/settings.json")).unwrap();
        assert!(text.contains("sk-ant-test-key"));
    }

    #[test]
    fn test_export_empty_collection_fails_fast() {
        let temp = TempDir::new().unwrap();
        let exporter = Exporter::new(temp.path());
        let out = temp.path().join("pkg.zip");
        let result = exporter.export(&export_opts(out.clone(), false), None);
        assert!(result.is_err());
        assert!(!out.exists());
    }

    #[test]
    fn test_progress_milestones_are_ordered_and_complete() {
        let temp = TempDir::new().unwrap();
        seed(temp.path());
        let out = temp.path().join("pkg.zip");

        let mut seen: Vec<u8> = Vec::new();
        let mut cb = |pct: u8, _stage: &str| seen.push(pct);
        let exporter = Exporter::new(temp.path());
        exporter
            .export(&export_opts(out, false), Some(&mut cb))
            .unwrap();

        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        for milestone in [20, 40, 70, 80, 90] {
            assert!(seen.contains(&milestone), "missing milestone {}", milestone);
        }
    }
}
