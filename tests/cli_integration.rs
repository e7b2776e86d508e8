//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the binary to test.
fn folio() -> Command {
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.env_remove("FOLIO_CONFIG").env_remove("FOLIO_APPROVAL_TOKEN").env_remove("FOLIO_NTFY_TOPIC");
    cmd
}

/// Write a minimal configuration for an article tree under `dir`.
fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let articles = dir.join("articles");
    let site = dir.join("site");
    std::fs::create_dir_all(&articles).unwrap();
    std::fs::create_dir_all(&site).unwrap();

    let path = dir.join("folio.toml");
    std::fs::write(
        &path,
        format!(
            "[storage]\nbase_path = {:?}\nlanguage = \"da\"\n\n[hugo]\nsite_dir = {:?}\n{extra}",
            articles.display().to_string(),
            site.display().to_string()
        ),
    )
    .unwrap();
    path
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    folio()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status-driven publishing pipeline"));
}

#[test]
fn test_short_help_flag() {
    folio().arg("-h").assert().success().stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    folio()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand() {
    folio().arg("frobnicate").assert().failure();
}

// ============================================================================
// Slug Tests
// ============================================================================

#[test]
fn test_slug_command() {
    folio().args(["slug", "Hello, World!"]).assert().success().stdout("hello-world\n");
}

// ============================================================================
// Check Config Tests
// ============================================================================

#[test]
fn test_check_config_shows_layout() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    folio()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("check-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("udgiv"))
        .stdout(predicate::str::contains("afventer-rettelser"));
}

#[test]
fn test_check_config_rejects_incomplete_ntfy() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "\n[ntfy]\nenabled = true\ntopic = \"\"\n");

    folio()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ntfy.topic"));
}

#[test]
fn test_check_config_missing_file() {
    let dir = TempDir::new().unwrap();

    folio()
        .current_dir(dir.path())
        .args(["--config", "does-not-exist.toml", "check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_config_from_current_dir() {
    let dir = TempDir::new().unwrap();
    write_config(dir.path(), "");

    folio().current_dir(dir.path()).arg("check-config").assert().success();
}

// ============================================================================
// Pending & Scan Tests
// ============================================================================

#[test]
fn test_pending_empty() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    folio()
        .arg("--config")
        .arg(&config)
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("No articles waiting for approval"));

    folio()
        .arg("--config")
        .arg(&config)
        .args(["pending", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn test_pending_unknown_format() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    folio().arg("--config").arg(&config).args(["pending", "--format", "xml"]).assert().failure();
}

#[test]
fn test_scan_routes_drafts() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let published = dir.path().join("articles/udgivet");
    std::fs::create_dir_all(&published).unwrap();
    std::fs::write(
        published.join("note.md"),
        "---\nid: '#0A0B0C'\ntitle: Note\nauthor: Jane\nstatus:\n  draft: 1\n---\n\nText\n",
    )
    .unwrap();

    folio()
        .arg("--config")
        .arg(&config)
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed: 1"));

    assert!(dir.path().join("articles/kladde/note.md").exists());
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_run_reports_bind_failure() {
    let dir = TempDir::new().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let config = write_config(dir.path(), &format!("\n[approval]\nhost = \"127.0.0.1\"\nport = {port}\n"));

    folio()
        .current_dir(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("run")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Approval server failed"));

    // The watcher ran before the server gave up.
    assert!(dir.path().join("articles/kladde").is_dir());
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    folio().args(["completions", "bash"]).assert().success().stdout(predicate::str::contains("folio"));
}
