//! CLI integration tests for schemaforge.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for various error conditions.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the schemaforge binary.
fn cmd() -> Command {
    Command::cargo_bin("schemaforge").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("migrations"))
        .stdout(predicate::str::contains("models"))
        .stdout(predicate::str::contains("preview"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn test_migrations_subcommand_help() {
    cmd()
        .args(["migrations", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--tables"))
        .stdout(predicate::str::contains("--diff"))
        .stdout(predicate::str::contains("--fresh"))
        .stdout(predicate::str::contains("--preview"))
        .stdout(predicate::str::contains("--separate-fk"));
}

#[test]
fn test_models_subcommand_help() {
    cmd()
        .args(["models", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--preview"))
        .stdout(predicate::str::contains("--no-relationships"))
        .stdout(predicate::str::contains("--no-scopes"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("schemaforge"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_common_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--connection"))
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_verbosity_flag_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_log_format_flag_default() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: schemaforge.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_io_code() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "preview"])
        .assert()
        .code(7); // IO error - file not found
}

#[test]
fn test_invalid_yaml_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "preview"])
        .assert()
        .code(1); // config error
}

#[test]
fn test_unknown_driver_exits_with_driver_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "connections:").unwrap();
    writeln!(file, "  default:").unwrap();
    writeln!(file, "    driver: oracle").unwrap();
    writeln!(file, "    database: app").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "preview"])
        .assert()
        .code(5); // unsupported driver surfaces at config validation
}

#[test]
fn test_undefined_connection_exits_with_driver_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "connection: reporting").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "preview"])
        .assert()
        .code(5); // connection missing
}

#[test]
fn test_unknown_verbosity_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{{}}").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--verbosity",
            "loud",
            "preview",
        ])
        .assert()
        .code(1);
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_diff_command_exists() {
    cmd()
        .args(["diff", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("migration archive"));
}

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
