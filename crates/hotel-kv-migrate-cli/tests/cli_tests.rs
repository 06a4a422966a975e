//! CLI integration tests for hotel-kv-migrate.
//!
//! These tests verify command-line argument parsing, help output, exit codes,
//! and full runs against the bundled JSON snapshot with an in-memory target.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Get a command for the hotel-kv-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("hotel-kv-migrate").unwrap()
}

fn sample_snapshot() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos/sample_snapshot.json")
}

/// Config reading the sample snapshot into an in-memory store.
fn memory_config(snapshot: &std::path::Path) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  type: snapshot").unwrap();
    writeln!(file, "  path: {}", snapshot.display()).unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  type: memory").unwrap();
    writeln!(file, "migration:").unwrap();
    writeln!(file, "  connect_attempts: 1").unwrap();
    file
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
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("interactive"))
        .stdout(predicate::str::contains("slot"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_query_subcommand_help() {
    cmd()
        .args(["query", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("email"))
        .stdout(predicate::str::contains("bookings"))
        .stdout(predicate::str::contains("city"))
        .stdout(predicate::str::contains("all-bookings"))
        .stdout(predicate::str::contains("key"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hotel-kv-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Slot Command Tests
// =============================================================================

#[test]
fn test_slot_reports_static_owner() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "slot", "user:1", "foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user:1 -> slot 10778 -> 7002"))
        .stdout(predicate::str::contains("foo -> slot 12182 -> 7003"));
}

#[test]
fn test_slot_json_output() {
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yaml",
            "--output-json",
            "slot",
            "user:1:bookings",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"slot\": 700"))
        .stdout(predicate::str::contains("\"primary\": \"7001\""));
}

#[test]
fn test_slot_uses_configured_labels() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "target:\n  type: memory").unwrap();
    writeln!(file, "source:\n  type: snapshot\n  path: x.json").unwrap();
    writeln!(file, "routing:\n  node_labels: [alpha, beta]").unwrap();

    // 10778 falls in the second half of two ranges
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "slot", "user:1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> beta"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // Missing file is an IO error (code 1), not a config error (code 2)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_snapshot_without_path_exits_with_code_2() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  type: snapshot").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "migrate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source.path"));
}

#[test]
fn test_unknown_log_format_exits_with_code_2() {
    cmd()
        .args(["--log-format", "xml", "slot", "user:1"])
        .assert()
        .code(2);
}

#[test]
fn test_health_check_fails_for_missing_snapshot() {
    let config = memory_config(std::path::Path::new("/nonexistent/snapshot.json"));
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("UNHEALTHY"));
}

// =============================================================================
// Migration Runs
// =============================================================================

#[test]
fn test_dry_run_plans_without_writing() {
    let config = memory_config(&sample_snapshot());
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "migrate", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("Users: 3"))
        .stdout(predicate::str::contains("Hotels: 3"))
        .stdout(predicate::str::contains("Bookings: 3"))
        .stdout(predicate::str::contains("Writes: 33"));
}

#[test]
fn test_migrate_into_memory_store() {
    let config = memory_config(&sample_snapshot());
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Migration completed!"))
        .stdout(predicate::str::contains("Users: 3 migrated, 0 failed"))
        .stdout(predicate::str::contains("Bookings: 3 migrated, 0 failed"))
        .stdout(predicate::str::contains("checks passed"));
}

#[test]
fn test_migrate_json_output() {
    let config = memory_config(&sample_snapshot());
    let output = cmd()
        .args([
            "--config",
            config.path().to_str().unwrap(),
            "--output-json",
            "migrate",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["status"], "completed");
    assert_eq!(result["users"]["migrated"], 3);
    assert_eq!(result["bookings"]["failed"], 0);
    assert_eq!(result["writes_applied"], 33);

    let hash = result["config_hash"].as_str().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_health_check_with_memory_target() {
    let config = memory_config(&sample_snapshot());
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "health-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HEALTHY"))
        .stdout(predicate::str::contains("Target (memory): OK"));
}

#[test]
fn test_query_against_empty_store_is_not_found() {
    let config = memory_config(&sample_snapshot());
    cmd()
        .args(["--config", config.path().to_str().unwrap(), "query", "user", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User 1 not found"))
        .stdout(predicate::str::contains("user:1 -> slot 10778 -> 7002"));
}
