#![allow(deprecated)] // TODO: move from Command::cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;

const SETTINGS: &str = "\
keys:
  linode: linode-token
  godaddy_key: gd-key
  godaddy_secret: gd-secret
  hashtopolis: 1234abcd
stackscripts:
  server: 123
  agent: 456
settings:
  cluster_prefix: htp_cluster_
  domain: cluster.example.com
  autoclean_when_failed: 0
";

fn htpfleet() -> Command {
    let mut cmd = Command::cargo_bin("htpfleet").unwrap();
    cmd.env_remove("HTPFLEET_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    htpfleet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hashtopolis"))
        .stdout(predicate::str::contains("deploy-server"))
        .stdout(predicate::str::contains("deploy-agents"))
        .stdout(predicate::str::contains("remove-agents"))
        .stdout(predicate::str::contains("configure"));
}

#[test]
fn test_cli_version() {
    htpfleet()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("htpfleet"));
}

#[test]
fn test_deploy_agents_help() {
    htpfleet()
        .args(["deploy-agents", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--region"))
        .stdout(predicate::str::contains("--type"))
        .stdout(predicate::str::contains("--amount"))
        .stdout(predicate::str::contains("--yes"));
}

#[test]
fn test_unknown_command() {
    htpfleet()
        .arg("launch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_amount_out_of_range() {
    htpfleet()
        .args(["deploy-agents", "--amount", "31"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("REASONABLE"));
}

#[test]
fn test_configure_declined_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("htpfleet.yaml");

    htpfleet()
        .arg("--config")
        .arg(&path)
        .arg("configure")
        .write_stdin("n\n")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("# No config file found"))
        .stdout(predicate::str::contains("# Create config file? [y/n]: "));

    assert!(!path.exists());
}

#[test]
fn test_menu_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("htpfleet.yaml");
    std::fs::write(&path, SETTINGS).unwrap();

    htpfleet()
        .env("HTPFLEET_CONFIG", &path)
        .write_stdin("7\n")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("1. Full deploy"))
        .stdout(predicate::str::contains("6. Remove only agents"));
}

#[test]
fn test_closed_stdin_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("htpfleet.yaml");
    std::fs::write(&path, SETTINGS).unwrap();

    htpfleet()
        .arg("--config")
        .arg(&path)
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("standard input closed"));
}

#[test]
fn test_broken_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("htpfleet.yaml");
    std::fs::write(&path, "keys: [not, a, mapping").unwrap();

    htpfleet()
        .arg("--config")
        .arg(&path)
        .arg("remove")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse settings file"));
}
