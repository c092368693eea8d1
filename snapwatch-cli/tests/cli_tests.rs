use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn version_prints_semantic_version() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("snapwatch");
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::is_match(r"snapwatch \d+\.\d+\.\d+").unwrap());
}

#[test]
fn help_lists_the_subcommands() {
    let mut cmd = assert_cmd::cargo_bin_cmd!("snapwatch");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn config_show_creates_and_prints_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");

    let mut cmd = assert_cmd::cargo_bin_cmd!("snapwatch");
    cmd.args(["config", "show", "--config"]).arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("webSocketPort"))
        .stdout(predicate::str::contains("built-in defaults"));

    assert!(path.exists(), "show should persist the generated defaults");
}

#[test]
fn config_show_reports_a_user_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"debugMode":true,"logPath":"/tmp/x.log","upworkLogsDir":"/tmp/logs","webSocketPort":49205}"#,
    )
    .expect("write config");

    let mut cmd = assert_cmd::cargo_bin_cmd!("snapwatch");
    cmd.args(["config", "show", "--config"]).arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("user config"))
        .stdout(predicate::str::contains("49205"));
}

#[test]
fn run_refuses_an_unusable_configuration() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("config.json");
    // Valid JSON, but logPath is empty — validation must reject it.
    std::fs::write(
        &path,
        r#"{"logPath":"","upworkLogsDir":"/tmp/logs","webSocketPort":8887}"#,
    )
    .expect("write config");

    let mut cmd = assert_cmd::cargo_bin_cmd!("snapwatch");
    cmd.args(["run", "--config"]).arg(&path);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}
