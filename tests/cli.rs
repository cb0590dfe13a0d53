#![allow(deprecated)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const LOGON: [&str; 8] = ["-u", "DEVELOPER", "-p", "secret", "-t", "10.0.0.5", "-c", "001"];

fn invokerfm() -> Command {
    let mut cmd = Command::new(cargo_bin("invokerfm"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_config(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("sap.cfg");
    fs::write(&path, body).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn missing_function_is_a_usage_error() {
    invokerfm().args(LOGON).assert().code(2);
}

#[test]
fn partial_logon_flags_are_a_usage_error() {
    invokerfm()
        .args(["-u", "DEVELOPER", "-f", "RFC_PING"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--password"));
}

#[test]
fn dest_without_connection_is_a_usage_error() {
    invokerfm()
        .args(["--dest", "DEV", "-f", "RFC_PING"])
        .args(LOGON)
        .assert()
        .code(2);
}

#[test]
fn help_groups_connection_flags() {
    invokerfm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Connection Parameters"))
        .stdout(predicate::str::contains("--connection"));
}

#[test]
fn missing_config_file_fails() {
    invokerfm()
        .args(["--no-banner", "--connection", "/nonexistent/sap.cfg", "-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Configuration file not found"));
}

#[test]
fn unknown_destination_fails() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(
        &dir,
        "[dev]\ndest = DEV\nuser = u\npasswd = p\nashost = h\nclient = 100\n",
    );
    invokerfm()
        .args(["--no-banner", "--connection", &cfg, "--dest", "PRD", "-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Destination 'PRD' not found"));
}

#[test]
fn unknown_config_key_fails() {
    let dir = TempDir::new().unwrap();
    let cfg = write_config(
        &dir,
        "[dev]\nuser = u\npasswd = p\nashost = h\nclient = 100\ncolour = blue\n",
    );
    invokerfm()
        .args(["--no-banner", "--connection", &cfg, "-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid connection section [dev]"));
}

#[test]
fn non_object_import_fails_before_connecting() {
    let dir = TempDir::new().unwrap();
    let import = dir.path().join("import.json");
    fs::write(&import, "[\"not\", \"an\", \"object\"]").unwrap();
    invokerfm()
        .arg("--no-banner")
        .args(LOGON)
        .args(["-f", "RFC_READ_TABLE", "-i", import.to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("expected an object"))
        .stdout(predicate::str::contains("Connecting").not());
}

#[test]
fn missing_export_file_fails() {
    invokerfm()
        .arg("--no-banner")
        .args(LOGON)
        .args(["-f", "RFC_READ_TABLE", "-e", "/nonexistent/export.json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("File not found"));
}

#[test]
fn json_errors_are_machine_readable() {
    let output = invokerfm()
        .args(["--json", "--connection", "/nonexistent/sap.cfg", "-f", "RFC_PING"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["status"], "error");
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("Configuration file not found")
    );
}

#[test]
fn banner_printed_unless_suppressed() {
    invokerfm()
        .args(["--connection", "/nonexistent/sap.cfg", "-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("SAP Remote Function Module Executor"))
        .stdout(predicate::str::contains("┌"))
        .stdout(predicate::str::contains("\x1b[").not());

    invokerfm()
        .args(["-q", "--connection", "/nonexistent/sap.cfg", "-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("SAP Remote Function Module Executor").not());
}

#[cfg(not(feature = "nwrfc"))]
#[test]
fn build_without_sdk_reports_connection_error() {
    invokerfm()
        .arg("--no-banner")
        .args(LOGON)
        .args(["-f", "RFC_PING"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Connecting to SAP system 10.0.0.5 (sys: 00, client: 001)...",
        ))
        .stdout(predicate::str::contains("Connection error"))
        .stdout(predicate::str::contains("--features nwrfc"));
}
