//! E2E tests for `ordo check` and `ordo graph`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SITE: &str = r#"
[[resource]]
name = "Class[Base]"

[[resource]]
name = "Notify[base]"
container = "Class[Base]"

[[resource]]
name = "Class[Top]"
require = ["Class[Base]"]

[[resource]]
name = "Notify[top]"
container = "Class[Top]"
"#;

const LOOP: &str = r#"
[[resource]]
name = "Notify[a]"
before = ["Notify[b]"]

[[resource]]
name = "Notify[b]"
before = ["Notify[a]"]
"#;

fn ordo_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ordo"));
    cmd.current_dir(dir);
    cmd.env("ORDO_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env_remove("FORMAT");
    cmd.env_remove("ORDO_TIMING");
    cmd
}

fn write_catalog(dir: &TempDir, file: &str, content: &str) -> PathBuf {
    let path = dir.path().join(file);
    std::fs::write(&path, content).expect("write catalog");
    path
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn check_reports_expansion_counts() {
    let dir = TempDir::new().expect("tempdir");
    let site = write_catalog(&dir, "site.toml", SITE);

    let output = ordo_cmd(dir.path())
        .args(["check", "--json"])
        .arg(&site)
        .output()
        .expect("run check");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["resources"], 4);
    assert_eq!(json["containers"], 2);
    assert_eq!(json["expansion"]["declared_edges"], 1);
    assert_eq!(json["expansion"]["derived_edges"], 3);
    assert_eq!(json["cycles"].as_array().map(Vec::len), Some(0));
    assert!(
        json["graph_hash"]
            .as_str()
            .is_some_and(|hash| hash.starts_with("blake3:"))
    );
}

#[test]
fn check_text_mode_is_one_summary_line() {
    let dir = TempDir::new().expect("tempdir");
    let site = write_catalog(&dir, "site.toml", SITE);

    ordo_cmd(dir.path())
        .args(["check", "--format", "text"])
        .arg(&site)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "resources=4 containers=2 declared_edges=1 derived_edges=3 cycles=0",
        ));
}

#[test]
fn check_fails_on_dependency_cycle() {
    let dir = TempDir::new().expect("tempdir");
    let looped = write_catalog(&dir, "loop.toml", LOOP);

    let output = ordo_cmd(dir.path())
        .args(["check", "--json"])
        .arg(&looped)
        .output()
        .expect("run check");
    assert!(!output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["cycles"][0]["members"][0], "Notify[a]");
    assert_eq!(json["cycles"][0]["path"].as_array().map(Vec::len), Some(3));

    let err: Value = serde_json::from_slice(&output.stderr).expect("stderr is JSON");
    assert_eq!(err["error"]["error_code"], "E3001");
    assert!(
        err["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("Notify[a] and Notify[b] depend on each other"))
    );
}

#[test]
fn unknown_reference_is_reported_with_its_code() {
    let dir = TempDir::new().expect("tempdir");
    let broken = write_catalog(
        &dir,
        "broken.toml",
        "[[resource]]\nname = \"Notify[a]\"\nrequire = [\"Notify[ghost]\"]\n",
    );

    ordo_cmd(dir.path())
        .args(["check", "--format", "text"])
        .arg(&broken)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2003]"))
        .stderr(predicate::str::contains("Notify[ghost]"));
}

#[test]
fn duplicate_resources_and_bad_syntax_fail_early() {
    let dir = TempDir::new().expect("tempdir");
    let dup = write_catalog(
        &dir,
        "dup.json",
        r#"{"resource": [{"name": "Notify[a]"}, {"name": "notify[a]"}]}"#,
    );
    let garbled = write_catalog(&dir, "garbled.toml", "[[resource]\nname = 1\n");

    ordo_cmd(dir.path())
        .args(["check", "--format", "text"])
        .arg(&dup)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2002]"));

    ordo_cmd(dir.path())
        .args(["check", "--format", "text"])
        .arg(&garbled)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1002]"))
        .stderr(predicate::str::contains("garbled.toml"));
}

#[test]
fn graph_lists_declared_and_derived_edges() {
    let dir = TempDir::new().expect("tempdir");
    let site = write_catalog(&dir, "site.toml", SITE);

    ordo_cmd(dir.path())
        .args(["graph", "--format", "text"])
        .arg(&site)
        .assert()
        .success()
        .stdout(predicate::str::contains("Class[Base]\tClass[Top]\tordering\tdeclared"))
        .stdout(predicate::str::contains("Notify[base]\tNotify[top]\tordering\tderived"));

    let output = ordo_cmd(dir.path())
        .args(["graph", "--json", "--declared-only"])
        .arg(&site)
        .output()
        .expect("run graph");
    assert!(output.status.success());
    let json = stdout_json(&output);
    let edges = json["edges"].as_array().expect("edges");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], "Class[Base]");
    assert_eq!(edges[0]["origin"], "declared");
}

#[test]
fn graph_dot_output() {
    let dir = TempDir::new().expect("tempdir");
    let site = write_catalog(&dir, "site.toml", SITE);

    ordo_cmd(dir.path())
        .args(["graph", "--dot"])
        .arg(&site)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("digraph relationships {"))
        .stdout(predicate::str::contains("\"Notify[base]\" -> \"Class[Top]\" [color=grey];"));
}

#[test]
fn timing_report_goes_to_stderr() {
    let dir = TempDir::new().expect("tempdir");
    let site = write_catalog(&dir, "site.toml", SITE);

    ordo_cmd(dir.path())
        .args(["--timing", "check", "--format", "text"])
        .arg(&site)
        .assert()
        .success()
        .stderr(predicate::str::contains("timing report:"))
        .stderr(predicate::str::contains("txn.expand"));
}

#[test]
fn completions_are_generated() {
    let dir = TempDir::new().expect("tempdir");
    ordo_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ordo"));
}
