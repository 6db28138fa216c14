//! End-to-End CLI Tests for AgentPack
//!
//! These tests verify the complete CLI behavior by running the binary
//! and checking outputs and file system changes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn agentpack_cmd() -> Command {
    Command::cargo_bin("agentpack").unwrap()
}

fn seed_claude_config(root: &TempDir) {
    let claude = root.path().join(".claude");
    fs::create_dir_all(claude.join("commands")).unwrap();

    fs::write(
        claude.join("settings.json"),
        r#"{"apiKey":"sk-ant-test-key","theme":"dark"}"#,
    )
    .unwrap();
    fs::write(
        claude.join("mcp.json"),
        r#"{"mcpServers":{"db":{"command":"npx","args":["db-server"]}}}"#,
    )
    .unwrap();
    fs::write(claude.join("commands/review.md"), "# Review checklist").unwrap();
}

// =============================================================================
// EXPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_cli_export_creates_package() {
    let root = TempDir::new().unwrap();
    seed_claude_config(&root);
    let pkg = root.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Export complete"));

    assert!(pkg.exists());
}

#[test]
fn test_cli_export_empty_root_fails() {
    let root = TempDir::new().unwrap();

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--output")
        .arg(root.path().join("pkg.zip"))
        .env("AGENTPACK_ROOT", root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no configuration files"));
}

#[test]
fn test_cli_export_redacts_by_default() {
    let root = TempDir::new().unwrap();
    seed_claude_config(&root);
    let pkg = root.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", root.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Redacted: 1"));
}

// =============================================================================
// VALIDATE COMMAND TESTS
// =============================================================================

#[test]
fn test_cli_validate_accepts_exported_package() {
    let root = TempDir::new().unwrap();
    seed_claude_config(&root);
    let pkg = root.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", root.path())
        .assert()
        .success();

    agentpack_cmd()
        .arg("validate")
        .arg(&pkg)
        .assert()
        .success()
        .stdout(predicate::str::contains("Package is valid"));
}

#[test]
fn test_cli_validate_rejects_garbage() {
    let root = TempDir::new().unwrap();
    let bogus = root.path().join("bogus.zip");
    fs::write(&bogus, "definitely not a zip").unwrap();

    agentpack_cmd()
        .arg("validate")
        .arg(&bogus)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Package is invalid"));
}

#[test]
fn test_cli_validate_json_output() {
    let root = TempDir::new().unwrap();
    seed_claude_config(&root);
    let pkg = root.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", root.path())
        .assert()
        .success();

    agentpack_cmd()
        .arg("validate")
        .arg(&pkg)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

// =============================================================================
// IMPORT COMMAND TESTS
// =============================================================================

#[test]
fn test_cli_import_onto_empty_root() {
    let source = TempDir::new().unwrap();
    seed_claude_config(&source);
    let pkg = source.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--include-sensitive")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", source.path())
        .assert()
        .success();

    let target = TempDir::new().unwrap();
    agentpack_cmd()
        .arg("import")
        .arg(&pkg)
        .arg("--strategy")
        .arg("replace")
        .arg("--include-sensitive")
        .arg("--no-backup")
        .env("AGENTPACK_ROOT", target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Import complete"));

    assert!(target.path().join(".claude/settings.json").exists());
    assert!(target.path().join(".claude/commands/review.md").exists());
}

#[test]
fn test_cli_import_reports_conflicts() {
    let source = TempDir::new().unwrap();
    seed_claude_config(&source);
    let pkg = source.path().join("pkg.zip");

    agentpack_cmd()
        .arg("export")
        .arg("--tool")
        .arg("claude")
        .arg("--include-sensitive")
        .arg("--output")
        .arg(&pkg)
        .env("AGENTPACK_ROOT", source.path())
        .assert()
        .success();

    let target = TempDir::new().unwrap();
    fs::create_dir_all(target.path().join(".claude")).unwrap();
    fs::write(
        target.path().join(".claude/settings.json"),
        r#"{"theme":"light"}"#,
    )
    .unwrap();

    agentpack_cmd()
        .arg("import")
        .arg(&pkg)
        .arg("--strategy")
        .arg("merge")
        .arg("--include-sensitive")
        .arg("--no-backup")
        .env("AGENTPACK_ROOT", target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("conflict"));
}

#[test]
fn test_cli_import_rejects_invalid_package() {
    let target = TempDir::new().unwrap();
    let bogus = target.path().join("bogus.zip");
    fs::write(&bogus, "nope").unwrap();

    agentpack_cmd()
        .arg("import")
        .arg(&bogus)
        .env("AGENTPACK_ROOT", target.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation failed"));
}
