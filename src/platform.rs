//! Platform identification and cross-platform path translation.
//!
//! Packages record the platform they were exported from so the importer
//! knows whether path strings embedded in configuration values need to be
//! rewritten. Translation covers drive letters, separators, and a fixed
//! table of environment placeholders; anything outside that table is left
//! for the path adapter to flag rather than guess at.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Platform tags recorded in package manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
    /// Android Termux environment: Linux-like but with a relocated prefix.
    Termux,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[
            Platform::Windows,
            Platform::Macos,
            Platform::Linux,
            Platform::Termux,
        ]
    }

    /// Identify the platform this process is running on.
    pub fn current() -> Platform {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else if is_termux() {
            Platform::Termux
        } else {
            Platform::Linux
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
            Platform::Termux => "termux",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::Macos => "macOS",
            Platform::Linux => "Linux",
            Platform::Termux => "Termux",
        }
    }

    pub fn from_id(id: &str) -> Option<Platform> {
        match id.to_ascii_lowercase().as_str() {
            "windows" | "win32" => Some(Platform::Windows),
            "macos" | "darwin" => Some(Platform::Macos),
            "linux" => Some(Platform::Linux),
            "termux" => Some(Platform::Termux),
            _ => None,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

/// Termux is detected through its environment rather than a target triple.
fn is_termux() -> bool {
    std::env::var("TERMUX_VERSION").is_ok()
        || std::env::var("PREFIX")
            .map(|p| p.contains("com.termux"))
            .unwrap_or(false)
}

/// Environment placeholders mapped symmetrically by name. The first entry
/// for a given right-hand side wins on the inverse transform.
pub const ENV_PLACEHOLDERS: &[(&str, &str)] = &[
    ("%USERPROFILE%", "$HOME"),
    ("%HOMEPATH%", "$HOME"),
    ("%APPDATA%", "$HOME/.config"),
    ("%LOCALAPPDATA%", "$HOME/.local/share"),
    ("%TEMP%", "/tmp"),
];

static DRIVE_RE: OnceLock<Regex> = OnceLock::new();
static UNIX_DRIVE_RE: OnceLock<Regex> = OnceLock::new();

fn drive_re() -> &'static Regex {
    DRIVE_RE.get_or_init(|| Regex::new(r"^([A-Za-z]):[\\/]").unwrap())
}

fn unix_drive_re() -> &'static Regex {
    UNIX_DRIVE_RE.get_or_init(|| Regex::new(r"^/([a-zA-Z])(/|$)").unwrap())
}

/// Does the string start with a `C:\` style drive prefix?
pub fn has_drive_prefix(s: &str) -> bool {
    drive_re().is_match(s)
}

/// Translate a Windows path string to its Unix representation.
///
/// `C:\Users\me` becomes `/c/Users/me`; recognized `%VAR%` placeholders are
/// mapped by name; backslashes become forward slashes.
pub fn windows_to_unix(path: &str) -> String {
    let mut out = path.to_string();
    for (win, unix) in ENV_PLACEHOLDERS {
        if out.contains(win) {
            out = out.replace(win, unix);
        }
    }
    if let Some(caps) = drive_re().captures(&out) {
        let drive = caps[1].to_ascii_lowercase();
        out = format!("/{}/{}", drive, &out[3..]);
    }
    out.replace('\\', "/")
}

/// Translate a Unix path string to its Windows representation.
///
/// Exact inverse of [`windows_to_unix`] for the drive-letter and separator
/// cases: `/c/Users/me` becomes `C:\Users\me`.
pub fn unix_to_windows(path: &str) -> String {
    let mut out = path.to_string();
    for (win, unix) in ENV_PLACEHOLDERS {
        // $HOME maps back to %USERPROFILE% (first table entry wins); the
        // longer composite placeholders must be tried before bare $HOME.
        if *unix != "$HOME" && out.contains(unix) {
            out = out.replace(unix, win);
        }
    }
    if out.contains("$HOME") {
        out = out.replace("$HOME", "%USERPROFILE%");
    }
    if let Some(caps) = unix_drive_re().captures(&out) {
        let drive = caps[1].to_ascii_uppercase();
        let rest = out[2..].trim_start_matches('/');
        out = format!("{}:\\{}", drive, rest);
    }
    out.replace('/', "\\")
}

/// Expand a leading `~` or `$HOME` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    if let Some(rest) = path.strip_prefix("~/") {
        home.join(rest)
    } else if path == "~" || path == "$HOME" {
        home
    } else if let Some(rest) = path.strip_prefix("$HOME/") {
        home.join(rest)
    } else {
        PathBuf::from(path)
    }
}
