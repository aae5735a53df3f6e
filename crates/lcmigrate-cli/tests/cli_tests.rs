//! CLI integration tests for lcmigrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration and connection errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the lcmigrate binary with a clean environment,
/// running in an empty directory so no stray `.env` is picked up.
fn cmd(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("lcmigrate").unwrap();
    cmd.env_clear().current_dir(dir.path());
    cmd
}

fn workdir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    let dir = workdir();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_migrate_subcommand_help() {
    let dir = workdir();
    cmd(&dir)
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("[default: 10000]"));
}

#[test]
fn test_analyze_subcommand_help() {
    let dir = workdir();
    cmd(&dir)
        .args(["analyze", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--destination"));
}

#[test]
fn test_version_flag() {
    let dir = workdir();
    cmd(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lcmigrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    let dir = workdir();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--no-prompt"))
        .stdout(predicate::str::contains("--env-file"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_log_flags_defaults() {
    let dir = workdir();
    cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: warn]"));
}

#[test]
fn test_no_subcommand_shows_usage() {
    let dir = workdir();
    cmd(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 2)
// =============================================================================

#[test]
fn test_missing_credentials_exit_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "migrate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source connection is missing"));
}

#[test]
fn test_missing_destination_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "migrate", "--dry-run"])
        .env("DB_CONNECTION", "mysql")
        .env("DB_DATABASE", "shop")
        .env("DB_USERNAME", "root")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("destination connection is missing"));
}

#[test]
fn test_unknown_engine_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "analyze"])
        .env("DB_ENGINE", "oracle")
        .env("DB_DATABASE", "shop")
        .env("DB_USER", "root")
        .assert()
        .code(2);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let dir = workdir();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd(&dir)
        .args(["--config", file.path().to_str().unwrap(), "migrate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let dir = workdir();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  engine: mysql").unwrap();

    cmd(&dir)
        .args(["--config", file.path().to_str().unwrap(), "migrate"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = workdir();
    cmd(&dir)
        .args(["--config", "nonexistent_config_file.yaml", "migrate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_missing_env_file_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "--env-file", "missing.env", "analyze"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("env file not found"));
}

#[test]
fn test_zero_batch_size_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "migrate", "--batch-size", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--batch-size"));
}

#[test]
fn test_unknown_output_format_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--output", "yaml", "analyze"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_log_format_exits_with_code_2() {
    let dir = workdir();
    cmd(&dir)
        .args(["--log-format", "xml", "analyze"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown log format"));
}

// =============================================================================
// Environment Resolution Tests
// =============================================================================

#[test]
fn test_env_file_is_loaded() {
    let dir = workdir();
    let mut env = std::fs::File::create(dir.path().join(".env")).unwrap();
    writeln!(env, "DB_CONNECTION=mysql").unwrap();
    writeln!(env, "DB_DATABASE=shop").unwrap();
    writeln!(env, "DB_USERNAME=root").unwrap();

    // Source resolves from the .env file; only the destination is missing.
    cmd(&dir)
        .args(["--no-prompt", "migrate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("destination connection is missing"));
}

// =============================================================================
// Exit Code Tests - Connection Errors (Exit Code 3)
// =============================================================================

#[test]
fn test_unreachable_source_exits_with_code_3() {
    let dir = workdir();
    cmd(&dir)
        .args(["--no-prompt", "analyze"])
        .env("DB_ENGINE", "pgsql")
        .env("DB_HOST", "127.0.0.1")
        .env("DB_PORT", "1")
        .env("DB_DATABASE", "shop")
        .env("DB_USER", "postgres")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Connection to"));
}
