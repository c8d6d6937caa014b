//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test, isolated from the caller's environment.
fn quarry() -> Command {
    let mut cmd = Command::cargo_bin("quarry").unwrap();
    cmd.env_remove("QUARRY_DATABASE_URL").env_remove("RUST_LOG");
    cmd
}

/// Write a config file into a temp dir and return both.
fn config_file(content: &str) -> (assert_fs::TempDir, std::path::PathBuf) {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("quarry.toml");
    file.write_str(content).unwrap();
    let path = file.path().to_path_buf();
    (temp, path)
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    quarry()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ask business questions"));
}

#[test]
fn test_version_flag() {
    quarry()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_ask_requires_question() {
    quarry().arg("ask").assert().failure().stderr(predicate::str::contains("<QUESTION>"));
}

#[test]
fn test_ask_help_mentions_json() {
    quarry().args(["ask", "--help"]).assert().success().stdout(predicate::str::contains("--json"));
}

// ============================================================================
// Config Command Tests
// ============================================================================

#[test]
fn test_config_path_prefers_explicit_file() {
    let (_temp, path) = config_file("");
    quarry()
        .args(["config", "--path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("quarry.toml"));
}

#[test]
fn test_config_prints_effective_toml() {
    let (_temp, path) = config_file(
        r#"
[database]
url = "sqlite::memory:"

[repl]
max_display_rows = 25
"#,
    );

    quarry()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("url = \"sqlite::memory:\""))
        .stdout(predicate::str::contains("max_display_rows = 25"))
        .stdout(predicate::str::contains("on_failure = \"propagate\""));
}

#[test]
fn test_config_env_override() {
    let (_temp, path) = config_file("[database]\nurl = \"sqlite::memory:\"\n");

    quarry()
        .env("QUARRY_DATABASE_URL", "postgres://analyst@warehouse/sales")
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("postgres://analyst@warehouse/sales"));
}

#[test]
fn test_config_masks_password() {
    let (_temp, path) =
        config_file("[database]\nhost = \"wh\"\nuser = \"analyst\"\npassword = \"S3cr3t!\"\n");

    quarry()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("password = \"********\""))
        .stdout(predicate::str::contains("user = \"analyst\""))
        .stdout(predicate::str::contains("S3cr3t!").not());
}

#[test]
fn test_config_masks_password_in_env_url() {
    let (_temp, path) = config_file("");

    quarry()
        .env("QUARRY_DATABASE_URL", "postgres://analyst:TopSecret@wh/sales")
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("postgres://analyst:***@wh/sales"))
        .stdout(predicate::str::contains("TopSecret").not());
}

#[test]
fn test_invalid_config_is_reported() {
    let (_temp, path) = config_file("[database\nurl = ");
    quarry()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

// ============================================================================
// Schema Command Tests
// ============================================================================

#[test]
#[cfg(feature = "sqlite")]
fn test_schema_on_empty_database() {
    let (_temp, path) = config_file("[database]\nurl = \"sqlite::memory:\"\n");
    quarry()
        .arg("--config")
        .arg(&path)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("No tables found in the catalog."));
}

#[test]
fn test_schema_unreachable_database_yields_placeholder() {
    let (_temp, path) = config_file(
        "[database]\nurl = \"postgres://nobody@127.0.0.1:1/none\"\nacquire_timeout_secs = 2\n",
    );
    quarry()
        .arg("--config")
        .arg(&path)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error fetching schema."));
}

#[test]
fn test_ask_with_unsupported_database_fails() {
    let (_temp, path) = config_file("[database]\nurl = \"mysql://root:pw@localhost/sales\"\n");
    quarry()
        .arg("--config")
        .arg(&path)
        .args(["ask", "How many accounts?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported database URL"))
        .stderr(predicate::str::contains("root:pw").not());
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    quarry()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("quarry"));
}
