// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 powerforge contributors

//! End-to-end CLI tests against the built binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn powerforge() -> Command {
    Command::cargo_bin("powerforge").expect("binary builds")
}

fn project(dir: &Path) {
    std::fs::write(
        dir.join("powerforge.json"),
        r#"{
            // build then verify
            "steps": [
                {"task": "build", "id": "build", "config": "site.json", "out": "_site"},
                {"task": "verify", "config": "site.json", "dependsOn": "build"},
            ],
        }"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("site.json"),
        r#"{"title": "Docs", "baseUrl": "https://docs.example", "source": "content"}"#,
    )
    .unwrap();
    std::fs::create_dir_all(dir.join("content")).unwrap();
    std::fs::write(dir.join("content/index.html"), "<html></html>").unwrap();
}

#[test]
fn run_succeeds_and_caches_second_run() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    powerforge()
        .args(["run", "-C"])
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("_site/index.html").exists());
    assert!(dir.path().join(".powerforge/pipeline-cache.json").exists());

    powerforge()
        .args(["run", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(cached)"));
}

#[test]
fn run_missing_pipeline_exits_one() {
    let dir = TempDir::new().unwrap();

    powerforge()
        .args(["run", "-C"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[ERROR]"));
}

#[test]
fn run_failure_emits_json_envelope() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("powerforge.json"),
        r#"{"steps": [{"task": "build", "config": "missing.json", "out": "_site"}]}"#,
    )
    .unwrap();

    powerforge()
        .args(["run", "--json", "-C"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains(r#""command":"run""#))
        .stdout(predicate::str::contains(r#""success":false"#))
        .stdout(predicate::str::contains(r#""exitCode":1"#));

    // Profile written on failure by default.
    assert!(dir.path().join(".powerforge/pipeline-profile.json").exists());
}

#[test]
fn forward_dependency_fails_before_any_step() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("powerforge.json"),
        r#"{"steps": [
            {"task": "verify", "id": "v", "dependsOn": "build"},
            {"task": "build", "id": "build"}
        ]}"#,
    )
    .unwrap();

    powerforge()
        .args(["validate", "powerforge.json", "-C"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not precede"));
}

#[test]
fn unknown_subcommand_exits_two() {
    powerforge().arg("conjure").assert().code(2);
}

#[test]
fn validate_and_graph_render() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    powerforge()
        .args(["validate", "powerforge.json", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("2 steps"));

    powerforge()
        .args(["graph", "powerforge.json", "--format", "mermaid", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"))
        .stdout(predicate::str::contains("build --> verify-2"));
}

#[test]
fn cache_stats_and_clear() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    powerforge().args(["run", "-C"]).arg(dir.path()).assert().success();

    powerforge()
        .args(["cache", "stats", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("entries: 2"));

    // Refuses without --yes.
    powerforge()
        .args(["cache", "clear", "-C"])
        .arg(dir.path())
        .assert()
        .failure();

    powerforge()
        .args(["cache", "clear", "--yes", "-C"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(!dir.path().join(".powerforge/pipeline-cache.json").exists());
}

#[test]
fn init_scaffolds_a_runnable_project() {
    let dir = TempDir::new().unwrap();

    powerforge()
        .args(["init", "demo", "-C"])
        .arg(dir.path())
        .assert()
        .success();

    assert!(dir.path().join("powerforge.json").exists());
    assert!(dir.path().join("content/index.html").exists());

    powerforge()
        .args(["validate", "powerforge.json", "-C"])
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn skip_and_only_filters() {
    let dir = TempDir::new().unwrap();
    project(dir.path());

    powerforge()
        .args(["run", "--only", "build", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not selected"));
}
