//! Command-line interface integration tests for the `terra-mt` binary.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;

fn write_pts(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn square_pts() -> String {
    "5\n0 0 0\n10 0 0\n10 10 0\n0 10 0\n5 5 1\n".to_string()
}

#[test]
fn refines_a_pts_file_and_writes_output() {
    let input = write_pts("terra-mt-cli-square.pts", &square_pts());
    let output = std::env::temp_dir().join("terra-mt-cli-square.tri");

    let mut cmd = Command::cargo_bin("terra-mt").unwrap();
    cmd.arg("--input").arg(&input);
    cmd.arg("--output").arg(&output);
    cmd.env("RUST_LOG", "info");

    cmd.assert().success().stderr(predicate::str::contains("updates"));
    assert!(output.exists());

    let _ = fs::remove_file(input);
    let _ = fs::remove_file(output);
}

#[test]
fn missing_input_argument_fails() {
    let mut cmd = Command::cargo_bin("terra-mt").unwrap();
    cmd.assert().failure().stderr(predicate::str::contains(
        "error: the following required arguments were not provided:",
    ));
}

#[test]
fn nonexistent_input_file_fails() {
    let mut cmd = Command::cargo_bin("terra-mt").unwrap();
    cmd.arg("--input").arg("/nonexistent/path/does-not-exist.pts");
    cmd.assert().failure();
}

#[test]
fn simultaneous_flag_on_refinement_mode_is_rejected() {
    let input = write_pts("terra-mt-cli-invalid.pts", &square_pts());
    let mut cmd = Command::cargo_bin("terra-mt").unwrap();
    cmd.arg("--input").arg(&input);
    cmd.arg("--simultaneous");
    cmd.assert().failure().stderr(predicate::str::contains("invalid configuration"));
    let _ = fs::remove_file(input);
}
