//! Cross-platform adaptation of path strings embedded in configuration
//! values.
//!
//! When a package was exported on another platform, every string in the
//! config tree that looks like a filesystem path is translated through the
//! platform primitives, and each rewrite is recorded as a [`PathMapping`].
//! Ambiguous strings are still translated but flagged so the caller can
//! surface them instead of silently trusting the result.

use crate::manifest::{Severity, ValidationWarning, WarningCode};
use crate::platform::{self, Platform};
use serde_json::Value;

/// Classification of a path-like string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Absolute,
    Relative,
    EnvReference,
    /// Ambiguous: separator styles or prose mixed in; translation is a
    /// best effort.
    Mixed,
}

/// Record of one adapted string.
#[derive(Debug, Clone)]
pub struct PathMapping {
    pub original: String,
    pub adapted: String,
    pub kind: PathKind,
    pub success: bool,
    pub note: Option<String>,
}

/// Result of adapting one config tree.
#[derive(Debug)]
pub struct AdaptOutcome {
    pub value: Value,
    pub mappings: Vec<PathMapping>,
    pub warnings: Vec<ValidationWarning>,
}

/// Launch commands that are portable by nature and must never be rewritten.
pub const PORTABLE_COMMANDS: &[&str] = &[
    "node", "npx", "npm", "bun", "deno", "python", "python3", "uv", "uvx", "docker", "sh", "bash",
    "cmd", "powershell",
];

/// Does this string look like a filesystem path at all?
pub fn looks_path_like(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.contains('/')
        || s.contains('\\')
        || platform::has_drive_prefix(s)
        || has_env_placeholder(s)
}

fn has_env_placeholder(s: &str) -> bool {
    if s.contains("$HOME") || s.starts_with('~') {
        return true;
    }
    platform::ENV_PLACEHOLDERS
        .iter()
        .any(|(win, unix)| s.contains(win) || s.contains(unix))
}

/// Classify a path-like string.
pub fn classify(s: &str) -> PathKind {
    let has_forward = s.contains('/');
    let has_back = s.contains('\\');
    if has_forward && has_back {
        return PathKind::Mixed;
    }
    if s.trim() != s || s.contains(' ') {
        return PathKind::Mixed;
    }
    if has_env_placeholder(s) {
        return PathKind::EnvReference;
    }
    if platform::has_drive_prefix(s) || s.starts_with('/') {
        return PathKind::Absolute;
    }
    PathKind::Relative
}

/// Translate one string between platform conventions.
fn translate(s: &str, source: Platform, current: Platform) -> String {
    if source.is_windows() && !current.is_windows() {
        platform::windows_to_unix(s)
    } else if !source.is_windows() && current.is_windows() {
        platform::unix_to_windows(s)
    } else {
        // Same separator family (e.g. macOS vs Linux): nothing to rewrite.
        s.to_string()
    }
}

/// Adapt a single string, recording the mapping when it is path-like.
fn adapt_string(
    s: &str,
    source: Platform,
    current: Platform,
    mappings: &mut Vec<PathMapping>,
    warnings: &mut Vec<ValidationWarning>,
) -> Option<String> {
    if !looks_path_like(s) {
        return None;
    }
    let kind = classify(s);
    let adapted = translate(s, source, current);
    if adapted == s {
        return None;
    }

    let (success, note) = if kind == PathKind::Mixed {
        (
            false,
            Some("ambiguous value; verify the translated path".to_string()),
        )
    } else {
        (true, None)
    };

    if kind == PathKind::Mixed {
        warnings.push(ValidationWarning::new(
            WarningCode::PathAdaptation,
            Severity::Low,
            format!("uncertain path translation: '{}' -> '{}'", s, adapted),
        ));
    }

    mappings.push(PathMapping {
        original: s.to_string(),
        adapted: adapted.clone(),
        kind,
        success,
        note,
    });
    Some(adapted)
}

/// Adapt every path-like string in a config tree for the current platform.
///
/// A no-op deep copy when the package comes from this platform.
pub fn adapt_config(value: &Value, source: Platform, current: Platform) -> AdaptOutcome {
    if source == current {
        return AdaptOutcome {
            value: value.clone(),
            mappings: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let mut mappings = Vec::new();
    let mut warnings = Vec::new();
    let mut adapted = value.clone();
    visit(&mut adapted, source, current, &mut mappings, &mut warnings);
    AdaptOutcome {
        value: adapted,
        mappings,
        warnings,
    }
}

fn visit(
    value: &mut Value,
    source: Platform,
    current: Platform,
    mappings: &mut Vec<PathMapping>,
    warnings: &mut Vec<ValidationWarning>,
) {
    match value {
        Value::String(s) => {
            if let Some(adapted) = adapt_string(s, source, current, mappings, warnings) {
                *s = adapted;
            }
        }
        Value::Array(items) => {
            for item in items {
                visit(item, source, current, mappings, warnings);
            }
        }
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                visit(child, source, current, mappings, warnings);
            }
        }
        _ => {}
    }
}

/// Adapt an MCP server registry, honoring command portability.
///
/// `servers` is the object keyed by server name (the value of `mcpServers`
/// or an entire flat registry). Known interpreter commands are left alone;
/// path-looking commands are translated; args and env values are scanned
/// element by element.
pub fn adapt_mcp_servers(servers: &Value, source: Platform, current: Platform) -> AdaptOutcome {
    if source == current {
        return AdaptOutcome {
            value: servers.clone(),
            mappings: Vec::new(),
            warnings: Vec::new(),
        };
    }

    // Registry files usually wrap the name-keyed map under `mcpServers`.
    if let Some(inner) = servers.get("mcpServers") {
        let outcome = adapt_mcp_servers(inner, source, current);
        let mut root = servers.clone();
        root["mcpServers"] = outcome.value;
        return AdaptOutcome {
            value: root,
            mappings: outcome.mappings,
            warnings: outcome.warnings,
        };
    }

    let mut adapted = servers.clone();
    let mut mappings = Vec::new();
    let mut warnings = Vec::new();

    if let Value::Object(map) = &mut adapted {
        for (_, server) in map.iter_mut() {
            let Value::Object(server) = server else {
                continue;
            };
            if let Some(Value::String(command)) = server.get_mut("command") {
                let portable = PORTABLE_COMMANDS.contains(&command.as_str());
                if !portable
                    && looks_path_like(command)
                    && let Some(adapted) =
                        adapt_string(command, source, current, &mut mappings, &mut warnings)
                {
                    *command = adapted;
                }
            }
            if let Some(Value::Array(args)) = server.get_mut("args") {
                for arg in args.iter_mut() {
                    if let Value::String(s) = arg
                        && let Some(adapted) =
                            adapt_string(s, source, current, &mut mappings, &mut warnings)
                    {
                        *s = adapted;
                    }
                }
            }
            if let Some(Value::Object(env)) = server.get_mut("env") {
                for (_, v) in env.iter_mut() {
                    if let Value::String(s) = v
                        && let Some(adapted) =
                            adapt_string(s, source, current, &mut mappings, &mut warnings)
                    {
                        *s = adapted;
                    }
                }
            }
        }
    }

    AdaptOutcome {
        value: adapted,
        mappings,
        warnings,
    }
}
