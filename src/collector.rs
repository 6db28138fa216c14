//! Configuration collection: enumerate the known on-disk locations for a
//! tool and turn every discovered file into a [`FileDescriptor`].
//!
//! Locations are a fixed lookup table per tool; the collector itself is
//! rooted at a configurable directory (the home directory in production,
//! a temp directory in tests).

use crate::checksum::checksum_file;
use crate::error::PackageError;
use crate::manifest::{ConfigCategory, FileDescriptor};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// =============================================================================
// Tools
// =============================================================================

/// Known tools whose configuration can be packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Claude,
    Codex,
    Gemini,
}

impl ToolKind {
    pub fn all() -> &'static [ToolKind] {
        &[ToolKind::Claude, ToolKind::Codex, ToolKind::Gemini]
    }

    pub fn id(&self) -> &'static str {
        match self {
            ToolKind::Claude => "claude",
            ToolKind::Codex => "codex",
            ToolKind::Gemini => "gemini",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Claude => "Claude Code",
            ToolKind::Codex => "OpenAI Codex CLI",
            ToolKind::Gemini => "Gemini CLI",
        }
    }

    pub fn from_id(id: &str) -> Option<ToolKind> {
        match id.to_ascii_lowercase().as_str() {
            "claude" => Some(ToolKind::Claude),
            "codex" => Some(ToolKind::Codex),
            "gemini" => Some(ToolKind::Gemini),
            _ => None,
        }
    }

    /// Fixed lookup table of config locations, relative to the config root.
    pub fn locations(&self) -> &'static [CategoryLocation] {
        match self {
            ToolKind::Claude => CLAUDE_LOCATIONS,
            ToolKind::Codex => CODEX_LOCATIONS,
            ToolKind::Gemini => GEMINI_LOCATIONS,
        }
    }
}

/// One known configuration location for a tool.
#[derive(Debug, Clone, Copy)]
pub struct CategoryLocation {
    pub category: ConfigCategory,
    /// Path relative to the config root. May be a file or a directory.
    pub path: &'static str,
}

const fn loc(category: ConfigCategory, path: &'static str) -> CategoryLocation {
    CategoryLocation { category, path }
}

const CLAUDE_LOCATIONS: &[CategoryLocation] = &[
    loc(ConfigCategory::Settings, ".claude/settings.json"),
    loc(ConfigCategory::Settings, ".claude/settings.local.json"),
    loc(ConfigCategory::Profiles, ".claude/profiles.json"),
    loc(ConfigCategory::Mcp, ".claude/mcp.json"),
    loc(ConfigCategory::Workflows, ".claude/commands"),
    loc(ConfigCategory::Agents, ".claude/agents"),
    loc(ConfigCategory::Hooks, ".claude/hooks"),
    loc(ConfigCategory::Skills, ".claude/skills"),
];

const CODEX_LOCATIONS: &[CategoryLocation] = &[
    loc(ConfigCategory::Settings, ".codex/config.toml"),
    loc(ConfigCategory::Profiles, ".codex/profiles.json"),
    loc(ConfigCategory::Mcp, ".codex/mcp.json"),
    loc(ConfigCategory::Workflows, ".codex/prompts"),
    loc(ConfigCategory::Agents, ".codex/agents"),
];

const GEMINI_LOCATIONS: &[CategoryLocation] = &[
    loc(ConfigCategory::Settings, ".gemini/settings.json"),
    loc(ConfigCategory::Profiles, ".gemini/profiles.json"),
    loc(ConfigCategory::Mcp, ".gemini/mcp.json"),
    loc(ConfigCategory::Workflows, ".gemini/commands"),
    loc(ConfigCategory::Agents, ".gemini/agents"),
];

/// Reserved workflow subtrees shipped with the tools themselves. These are
/// installed defaults, not user customizations, and never round-trip
/// through export.
pub const RESERVED_WORKFLOW_DIRS: &[&str] = &["built-in"];

// =============================================================================
// Scope
// =============================================================================

/// Requested subset of configuration categories.
#[derive(Debug, Clone)]
pub enum ExportScope {
    All,
    Workflows,
    Mcp,
    Settings,
    /// Caller-supplied (category, path) pairs, bypassing the lookup table.
    Custom(Vec<(ConfigCategory, PathBuf)>),
}

impl ExportScope {
    /// Categories included by this scope.
    pub fn categories(&self) -> Vec<ConfigCategory> {
        match self {
            ExportScope::All => ConfigCategory::all().to_vec(),
            ExportScope::Workflows => vec![ConfigCategory::Workflows],
            ExportScope::Mcp => vec![ConfigCategory::Mcp],
            ExportScope::Settings => vec![ConfigCategory::Settings],
            ExportScope::Custom(pairs) => {
                let mut categories: Vec<ConfigCategory> =
                    pairs.iter().map(|(c, _)| *c).collect();
                categories.dedup();
                categories
            }
        }
    }
}

// =============================================================================
// Collector
// =============================================================================

pub struct Collector {
    config_root: PathBuf,
}

impl Collector {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Enumerate all files for the given tools and scope.
    ///
    /// Files are emitted in a deterministic order: tools in declaration
    /// order, locations in table order, directory walks sorted by name.
    pub fn collect(
        &self,
        tools: &[ToolKind],
        scope: &ExportScope,
    ) -> Result<Vec<FileDescriptor>, PackageError> {
        if let ExportScope::Custom(pairs) = scope {
            return self.collect_custom(pairs);
        }

        let wanted = scope.categories();
        let mut files = Vec::new();

        for tool in tools {
            for location in tool.locations() {
                if !wanted.contains(&location.category) {
                    continue;
                }
                let abs = self.config_root.join(location.path);
                if !abs.exists() {
                    continue;
                }
                if abs.is_dir() {
                    self.collect_dir(&abs, location.category, &mut files)?;
                } else {
                    files.push(self.describe(&abs, location.category)?);
                }
            }
        }

        Ok(files)
    }

    /// Custom scope: caller-supplied pairs, directories expanded recursively.
    fn collect_custom(
        &self,
        pairs: &[(ConfigCategory, PathBuf)],
    ) -> Result<Vec<FileDescriptor>, PackageError> {
        let mut files = Vec::new();
        for (category, path) in pairs {
            let abs = if path.is_absolute() {
                path.clone()
            } else {
                self.config_root.join(path)
            };
            if !abs.exists() {
                continue;
            }
            if abs.is_dir() {
                self.collect_dir(&abs, *category, &mut files)?;
            } else {
                files.push(self.describe(&abs, *category)?);
            }
        }
        Ok(files)
    }

    fn collect_dir(
        &self,
        dir: &Path,
        category: ConfigCategory,
        files: &mut Vec<FileDescriptor>,
    ) -> Result<(), PackageError> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                // The reserved built-in workflow subtree never leaves the
                // machine.
                if category == ConfigCategory::Workflows
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .map(|name| RESERVED_WORKFLOW_DIRS.contains(&name))
                        .unwrap_or(false)
                {
                    return false;
                }
                true
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                PackageError::Io(std::io::Error::other(e.to_string()))
            })?;
            if entry.file_type().is_file() {
                files.push(self.describe(entry.path(), category)?);
            }
        }
        Ok(())
    }

    fn describe(
        &self,
        abs: &Path,
        category: ConfigCategory,
    ) -> Result<FileDescriptor, PackageError> {
        let rel = abs
            .strip_prefix(&self.config_root)
            .unwrap_or(abs)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = fs::metadata(abs)?;
        Ok(FileDescriptor {
            path: rel,
            category,
            size: metadata.len(),
            checksum: checksum_file(abs)?,
            sanitized: false,
            source_path: Some(abs.to_path_buf()),
        })
    }
}
