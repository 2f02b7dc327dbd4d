//! CLI integration tests for the Cellar command-line interface.
//!
//! Each test runs the binary inside its own temporary directory with a
//! project-local `cellar.toml`, so no user config or log directory is touched.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SECRET: &str = "cli-integration-secret-key-0123456789";

/// Write a project config pointing the store into `dir`.
fn write_project_config(dir: &Path, extra: &str) {
    let db = dir.join("sessions.sqlite");
    let contents = format!(
        "[session]\nstorage_location = {:?}\n{}\n\n[logging]\nfile = false\n",
        db.display().to_string(),
        extra
    );
    std::fs::write(dir.join("cellar.toml"), contents).unwrap();
}

/// Get a command for the cellar binary, isolated to `dir`.
fn cellar(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cellar").unwrap();
    cmd.current_dir(dir)
        .env("CELLAR_CONFIG_DIR", dir.join("user-config"))
        .env_remove("CELLAR_SECRET_KEY")
        .env_remove("CELLAR_ADMIN_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    cellar(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cellar"))
        .stdout(predicate::str::contains("session"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    cellar(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cellar"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    cellar(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("revoke"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_serve_help_shows_bind() {
    let dir = TempDir::new().unwrap();
    cellar(dir.path())
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"));
}

#[test]
fn test_revoke_requires_id() {
    let dir = TempDir::new().unwrap();
    cellar(dir.path())
        .arg("revoke")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<ID>"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_which_lists_project_file() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), "");

    cellar(dir.path())
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cellar.toml (loaded)"))
        .stdout(predicate::str::contains("config.toml (not found)"));
}

#[test]
fn test_config_show_redacts_plaintext_secret() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), &format!("secret_key = {:?}", SECRET));

    cellar(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains(SECRET).not())
        .stdout(predicate::str::contains("config file (plaintext)"))
        .stderr(predicate::str::contains("plaintext secret_key"));
}

#[test]
fn test_config_show_reports_env_secret() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), "");

    cellar(dir.path())
        .env("CELLAR_SECRET_KEY", SECRET)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("env var CELLAR_SECRET_KEY"))
        .stdout(predicate::str::contains(SECRET).not());
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sweep_without_secret_fails() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), "");

    cellar(dir.path())
        .arg("sweep")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no secret key configured"));
}

#[test]
fn test_sweep_empty_store() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), "");

    cellar(dir.path())
        .env("CELLAR_SECRET_KEY", SECRET)
        .args(["--json", "sweep", "--count"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reclaimed\": 0"))
        .stdout(predicate::str::contains("\"remaining\": 0"));

    assert!(dir.path().join("sessions.sqlite").exists());
}

#[test]
fn test_revoke_unknown_session_fails() {
    let dir = TempDir::new().unwrap();
    write_project_config(dir.path(), "");

    cellar(dir.path())
        .env("CELLAR_SECRET_KEY", SECRET)
        .args(["revoke", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no session with ID does-not-exist"));
}
