//! AgentPack - Portable AI Agent Configuration Packages
//!
//! Packages a tool's configuration state (settings, profiles, workflows,
//! agents, MCP servers, hooks, skills) into a verifiable archive and safely
//! re-applies it on another machine: secrets are redacted on the way out,
//! integrity is proven on the way in, embedded paths are adapted across
//! platforms, and a failed import rolls back to the pre-import state.

pub mod archive;
pub mod checksum;
pub mod collector;
pub mod error;
pub mod exporter;
pub mod fsutil;
pub mod importer;
pub mod manifest;
pub mod merger;
pub mod path_adapter;
pub mod platform;
pub mod sanitizer;
pub mod validator;

pub use collector::{Collector, ExportScope, ToolKind};
pub use error::PackageError;
pub use exporter::{ExportOptions, ExportReport, Exporter};
pub use importer::{ImportOptions, ImportReport, Importer};
pub use manifest::{ConfigCategory, FileDescriptor, PackageManifest, ValidationOutcome};
pub use merger::{Conflict, MergeStrategy, Resolution};
pub use platform::Platform;
