//! Secret redaction for packaged configuration files.
//!
//! Only a fixed allow-list of file patterns is ever sanitized; markdown
//! workflows and agent files are user-authored prose and pass through
//! byte-identical. The recognized secret-field names and their placeholders
//! are policy tables, not logic, so they stay module-level constants.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// File-name patterns whose content may carry machine credentials. Matched
/// against the final path segment of the relative package path.
pub const SENSITIVE_FILE_PATTERNS: &[&str] = &[
    "settings.json",
    "settings.local.json",
    ".credentials.json",
    "credentials.json",
    "auth.json",
    "profiles.json",
    "mcp.json",
    "config.toml",
];

/// One recognized secret kind: field names (matched on a normalized form,
/// covering case and underscore variants) and the placeholder they redact to.
pub struct SecretField {
    /// Normalized names: lowercase, underscores stripped.
    pub names: &'static [&'static str],
    pub placeholder: &'static str,
}

pub const SECRET_FIELDS: &[SecretField] = &[
    SecretField {
        names: &["apikey"],
        placeholder: "<REDACTED:API_KEY>",
    },
    SecretField {
        names: &["authtoken", "accesstoken", "refreshtoken", "token"],
        placeholder: "<REDACTED:AUTH_TOKEN>",
    },
];

/// Result of sanitizing one file.
#[derive(Debug)]
pub struct SanitizeOutcome {
    pub content: String,
    /// True when at least one field was redacted.
    pub redacted: bool,
}

/// Is this relative package path on the sanitization allow-list?
pub fn is_sensitive_file(rel_path: &str) -> bool {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    SENSITIVE_FILE_PATTERNS.contains(&file_name)
}

/// Normalize a field name for matching: lowercase, underscores stripped.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn placeholder_for(key: &str) -> Option<&'static str> {
    let normalized = normalize_key(key);
    SECRET_FIELDS
        .iter()
        .find(|field| field.names.contains(&normalized.as_str()))
        .map(|field| field.placeholder)
}

/// Redact recognized secret fields from a file's content.
///
/// Files outside the allow-list are returned unchanged. JSON content is
/// rewritten through the parsed value tree; TOML-like content through a
/// line-level pattern. Unparseable JSON is returned unchanged with
/// `redacted=false` — sanitization failure must never block an export.
pub fn sanitize(rel_path: &str, content: &str) -> SanitizeOutcome {
    if !is_sensitive_file(rel_path) {
        return SanitizeOutcome {
            content: content.to_string(),
            redacted: false,
        };
    }

    if rel_path.ends_with(".toml") {
        return sanitize_toml_lines(content);
    }
    sanitize_json(content)
}

fn sanitize_json(content: &str) -> SanitizeOutcome {
    let Ok(mut value) = serde_json::from_str::<Value>(content) else {
        tracing::debug!("unparseable JSON, skipping secret detection");
        return SanitizeOutcome {
            content: content.to_string(),
            redacted: false,
        };
    };

    let mut redacted = false;
    redact_value(&mut value, &mut redacted);

    if !redacted {
        return SanitizeOutcome {
            content: content.to_string(),
            redacted: false,
        };
    }

    let content = serde_json::to_string_pretty(&value)
        .unwrap_or_else(|_| content.to_string());
    SanitizeOutcome { content, redacted }
}

/// Depth-first walk rewriting matching object fields in place.
fn redact_value(value: &mut Value, redacted: &mut bool) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if let Some(placeholder) = placeholder_for(key) {
                    if child.is_string() || child.is_number() {
                        *child = Value::String(placeholder.to_string());
                        *redacted = true;
                        continue;
                    }
                }
                redact_value(child, redacted);
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_value(item, redacted);
            }
        }
        _ => {}
    }
}

static TOML_SECRET_RE: OnceLock<Regex> = OnceLock::new();

fn toml_secret_re() -> &'static Regex {
    // key = "value" or key = 'value', with the known secret field names in
    // their case/underscore variants.
    TOML_SECRET_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^(\s*(?:api_?key|auth_?token|access_?token|refresh_?token|token)\s*=\s*)("[^"]*"|'[^']*')"#,
        )
        .unwrap()
    })
}

fn sanitize_toml_lines(content: &str) -> SanitizeOutcome {
    let mut redacted = false;
    let lines: Vec<String> = content
        .lines()
        .map(|line| {
            if let Some(caps) = toml_secret_re().captures(line) {
                let key_part = &caps[1];
                let key = key_part
                    .split('=')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if let Some(placeholder) = placeholder_for(&key) {
                    redacted = true;
                    return format!("{}\"{}\"", key_part, placeholder);
                }
            }
            line.to_string()
        })
        .collect();

    if !redacted {
        return SanitizeOutcome {
            content: content.to_string(),
            redacted: false,
        };
    }
    let mut out = lines.join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    SanitizeOutcome {
        content: out,
        redacted,
    }
}

/// Does this content carry a previously redacted placeholder? Downstream
/// tooling uses this to report "redacted" rather than "missing".
pub fn has_sanitized_data(content: &str) -> bool {
    SECRET_FIELDS
        .iter()
        .any(|field| content.contains(field.placeholder))
}
