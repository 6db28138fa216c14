//! AgentPack CLI
//!
//! Command-line interface for exporting and importing AI agent
//! configuration packages.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;

use agentpack::collector::{ExportScope, ToolKind};
use agentpack::exporter::{ExportOptions, Exporter};
use agentpack::importer::{ImportOptions, Importer};
use agentpack::manifest::Severity;
use agentpack::merger::{MergeStrategy, Resolution};
use agentpack::{Platform, validator};

#[derive(Parser)]
#[command(name = "agentpack")]
#[command(
    author,
    version,
    about = "Export and import AI agent configurations as portable packages"
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ToolArg {
    Claude,
    Codex,
    Gemini,
    All,
}

impl ToolArg {
    fn tools(&self) -> Vec<ToolKind> {
        match self {
            ToolArg::Claude => vec![ToolKind::Claude],
            ToolArg::Codex => vec![ToolKind::Codex],
            ToolArg::Gemini => vec![ToolKind::Gemini],
            ToolArg::All => ToolKind::all().to_vec(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ToolArg::Claude => "claude",
            ToolArg::Codex => "codex",
            ToolArg::Gemini => "gemini",
            ToolArg::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    All,
    Workflows,
    Mcp,
    Settings,
}

impl ScopeArg {
    fn scope(&self) -> ExportScope {
        match self {
            ScopeArg::All => ExportScope::All,
            ScopeArg::Workflows => ExportScope::Workflows,
            ScopeArg::Mcp => ExportScope::Mcp,
            ScopeArg::Settings => ExportScope::Settings,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export configuration into a package archive
    Export {
        /// Tool whose configuration to export
        #[arg(short, long, value_enum, default_value = "all")]
        tool: ToolArg,

        /// Subset of configuration categories to include
        #[arg(short, long, value_enum, default_value = "all")]
        scope: ScopeArg,

        /// Package credentials as-is instead of redacting them
        #[arg(long)]
        include_sensitive: bool,

        /// Output package path (default: agentpack-<tool>-<timestamp>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Free-text description stored in the manifest
        #[arg(short, long)]
        description: Option<String>,

        /// Configuration root (default: home directory)
        #[arg(long, env = "AGENTPACK_ROOT")]
        root: Option<PathBuf>,
    },

    /// Import a package onto this machine
    Import {
        /// Package archive to import
        package: PathBuf,

        /// Restrict the import to one tool's files
        #[arg(short, long, value_enum)]
        tool: Option<ToolArg>,

        /// How to reconcile incoming configuration with existing
        #[arg(short, long, value_enum, default_value = "merge")]
        strategy: MergeStrategy,

        /// Write credential-bearing content as-is instead of re-redacting it
        #[arg(long)]
        include_sensitive: bool,

        /// Skip the pre-import backup
        #[arg(long)]
        no_backup: bool,

        /// Conflict resolutions as name=choice pairs
        /// (choice: use-existing, use-incoming, merge, rename)
        #[arg(long, value_delimiter = ',')]
        resolve: Vec<String>,

        /// Configuration root (default: home directory)
        #[arg(long, env = "AGENTPACK_ROOT")]
        root: Option<PathBuf>,
    },

    /// Validate a package without importing it
    Validate {
        /// Package archive to check
        package: PathBuf,

        /// Emit the validation outcome as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            tool,
            scope,
            include_sensitive,
            output,
            description,
            root,
        } => {
            print_header();
            println!("{}", "➤ Exporting configuration".cyan().bold());

            let exporter = Exporter::new(config_root(root));
            let options = ExportOptions {
                tools: tool.tools(),
                tool_label: tool.label().to_string(),
                scope: scope.scope(),
                include_sensitive,
                output,
                description,
                tags: Vec::new(),
            };

            let mut show = |pct: u8, stage: &str| {
                println!("  [{:>3}%] {}", pct.to_string().cyan(), stage.dimmed());
            };
            let report = exporter.export(&options, Some(&mut show))?;

            println!("\n{}", "✨ Export complete!".green().bold());
            println!(
                "  Package: {}\n  Files: {}, Redacted: {}",
                report.package_path.display().to_string().cyan(),
                report.file_count.to_string().green(),
                report.redacted_count.to_string().yellow()
            );
            if include_sensitive {
                println!(
                    "  {}",
                    "⚠ Package contains unredacted credentials".yellow()
                );
            }
        }

        Commands::Import {
            package,
            tool,
            strategy,
            include_sensitive,
            no_backup,
            resolve,
            root,
        } => {
            print_header();
            println!("{}", "➤ Importing package".cyan().bold());

            let choices = parse_resolutions(&resolve)?;
            let root = config_root(root);
            let importer = Importer::new(&root);
            let options = ImportOptions {
                strategy,
                backup: !no_backup,
                include_sensitive,
                tool: tool.and_then(|t| ToolKind::from_id(t.label())),
            };

            let report = importer.import(&package, &options)?;

            for warning in &report.warnings {
                let mark = match warning.severity {
                    Severity::High => "✘".red(),
                    Severity::Medium => "⚠".yellow(),
                    Severity::Low => "ℹ".dimmed(),
                };
                println!("  {} {}", mark, warning.message);
            }

            if !report.conflicts.is_empty() {
                println!(
                    "\n  {} conflict(s):",
                    report.conflicts.len().to_string().yellow()
                );
                for conflict in &report.conflicts {
                    println!(
                        "    {} {} ({:?} suggested)",
                        conflict.category.id().dimmed(),
                        conflict.name,
                        conflict.suggestion
                    );
                }
                if !choices.is_empty() {
                    apply_resolutions(&root, &report.conflicts, &choices)?;
                    println!("  Applied {} resolution(s)", choices.len());
                }
            }

            if report.success {
                println!("\n{}", "✨ Import complete!".green().bold());
                println!("  Files: {}", report.files_imported.to_string().green());
                if let Some(backup) = &report.backup_path {
                    println!("  Backup: {}", backup.display().to_string().dimmed());
                }
            } else {
                println!("\n{}", "✘ Import failed".red().bold());
                if let Some(error) = &report.error {
                    println!("  {}", error.red());
                }
                if let Some(backup) = &report.backup_path {
                    println!("  Backup: {}", backup.display().to_string().cyan());
                }
                std::process::exit(1);
            }
        }

        Commands::Validate { package, json } => {
            let outcome = validator::validate_package(&package);

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_header();
                println!("{}", "➤ Validating package".cyan().bold());
                for issue in &outcome.issues {
                    println!("  {} [{:?}] {}", "✘".red(), issue.code, issue.message);
                }
                for warning in &outcome.warnings {
                    println!("  {} [{:?}] {}", "⚠".yellow(), warning.code, warning.message);
                }
                if let Some(manifest) = &outcome.manifest {
                    println!(
                        "  Tool: {}, Platform: {}, Files: {}, Created: {}",
                        manifest.tool.cyan(),
                        manifest.platform.name(),
                        manifest.files.len(),
                        manifest.created_at.dimmed()
                    );
                    println!(
                        "  Current platform: {}",
                        Platform::current().name().dimmed()
                    );
                }
                if outcome.valid {
                    println!("\n{}", "✨ Package is valid".green().bold());
                } else {
                    println!("\n{}", "✘ Package is invalid".red().bold());
                }
            }
            if !outcome.valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn config_root(root: Option<PathBuf>) -> PathBuf {
    root.or_else(dirs::home_dir).unwrap_or_else(|| PathBuf::from("."))
}

/// Parse `name=choice` pairs from the command line.
fn parse_resolutions(pairs: &[String]) -> Result<HashMap<String, Resolution>> {
    let mut choices = HashMap::new();
    for pair in pairs {
        let Some((name, choice)) = pair.split_once('=') else {
            anyhow::bail!("invalid resolution '{}': expected name=choice", pair);
        };
        let resolution = match choice {
            "use-existing" => Resolution::UseExisting,
            "use-incoming" => Resolution::UseIncoming,
            "merge" => Resolution::Merge,
            "rename" => Resolution::Rename,
            _ => anyhow::bail!("unknown resolution choice '{}'", choice),
        };
        choices.insert(name.to_string(), resolution);
    }
    Ok(choices)
}

/// Re-apply user resolutions to the merged files the conflicts came from.
fn apply_resolutions(
    root: &std::path::Path,
    conflicts: &[agentpack::Conflict],
    choices: &HashMap<String, Resolution>,
) -> Result<()> {
    use agentpack::merger::resolve_conflicts;

    // Group conflicts per category target so each file is rewritten once.
    let mut by_category: HashMap<&str, Vec<&agentpack::Conflict>> = HashMap::new();
    for conflict in conflicts {
        by_category
            .entry(conflict.category.id())
            .or_default()
            .push(conflict);
    }

    for tool in ToolKind::all() {
        for location in tool.locations() {
            let Some(group) = by_category.get(location.category.id()) else {
                continue;
            };
            let path = root.join(location.path);
            if !path.is_file() {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            let grouped: Vec<agentpack::Conflict> =
                group.iter().map(|c| (*c).clone()).collect();
            // MCP registries key servers under a wrapper object.
            let resolved = match value.get("mcpServers") {
                Some(servers) => {
                    let inner = resolve_conflicts(servers, &grouped, choices);
                    let mut root_value = value.clone();
                    root_value["mcpServers"] = inner;
                    root_value
                }
                None => resolve_conflicts(&value, &grouped, choices),
            };
            if resolved != value {
                std::fs::write(&path, serde_json::to_string_pretty(&resolved)?)?;
            }
        }
    }
    Ok(())
}

fn print_header() {
    println!(
        "{}",
        r#"
╔═══════════════════════════════════════════════════════════════════╗
║                         AgentPack                                 ║
║            Portable AI Agent Configuration Packages               ║
╚═══════════════════════════════════════════════════════════════════╝
"#
        .cyan()
        .bold()
    );
}
