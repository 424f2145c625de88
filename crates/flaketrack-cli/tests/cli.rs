#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const FAILING_RUN: &str = r#"<?xml version="1.0"?>
<testsuites>
  <testsuite name="pilot" failures="1" tests="2">
    <testcase classname="pilot.Discovery" name="TestPush"><failure>boom</failure></testcase>
    <testcase classname="pilot.Discovery" name="TestWatch"/>
  </testsuite>
</testsuites>"#;

const PASSING_RUN: &str = r#"<testsuite name="pilot" failures="0" tests="2">
  <testcase classname="pilot.Discovery" name="TestPush"/>
  <testcase classname="pilot.Discovery" name="TestWatch"/>
</testsuite>"#;

fn seed(root: &Path, key: &str, body: &str) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// A file-backed store with two master runs and a config pointing at it.
fn workspace() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let store = dir.path().join("store");
    seed(
        &store,
        "istio-prow/logs/unit-master/1/artifacts/junit.xml",
        FAILING_RUN,
    );
    seed(
        &store,
        "istio-prow/logs/unit-master/2/artifacts/junit.xml",
        PASSING_RUN,
    );
    seed(
        &store,
        "istio-prow/logs/unit-master/3/artifacts/junit.xml",
        "<testsuite name=\"broken\"",
    );

    let config = dir.path().join("flaketrack.yaml");
    fs::write(
        &config,
        format!(
            "store: file://{}\nbucket: out\noutput_prefix: reports\npatterns:\n  - istio-prow/logs/*-master/*/artifacts/junit.xml\nwindows: [7]\n",
            store.display()
        ),
    )
    .unwrap();
    (dir, config)
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("parse"));
}

#[test]
fn test_run_writes_report_to_store() {
    let (dir, config) = workspace();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["run", "--date", "2020-01-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reports/15_01_2020_7.xml"))
        .stdout(predicate::str::contains("skipped=1"));

    let report = dir.path().join("store/out/reports/15_01_2020_7.xml");
    let xml = fs::read_to_string(report).unwrap();
    assert!(xml.contains(r#"<branch name="master">"#));
    assert!(xml.contains(r#"method="TestPush" failures="1" total="2""#));
    assert!(xml.contains(r#"method="TestWatch" failures="0" total="2""#));
}

#[test]
fn test_run_json_format_and_window_override() {
    let (dir, config) = workspace();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .env("FLAKETRACK_CONFIG", &config)
        .args([
            "run", "--date", "2020-01-15", "--window", "30", "--format", "json", "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""report_key":"reports/15_01_2020_30.json""#));

    assert!(dir
        .path()
        .join("store/out/reports/15_01_2020_30.json")
        .exists());
}

#[test]
fn test_resolve_prints_artifacts() {
    let (_dir, config) = workspace();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args(["resolve", "--date", "2020-01-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "istio-prow/logs/unit-master/1/artifacts/junit.xml",
        ))
        .stdout(predicate::str::contains("master\t"));
}

#[test]
fn test_parse_local_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("junit.xml");
    fs::write(&file, FAILING_RUN).unwrap();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("parse")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("FAIL\tpilot\tpilot.Discovery\tTestPush"))
        .stdout(predicate::str::contains("PASS\tpilot\tpilot.Discovery\tTestWatch"));
}

#[test]
fn test_parse_malformed_file_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("junit.xml");
    fs::write(&file, "<testsuite name=\"x\" tests=\"1\"/>").unwrap();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("parse")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failures"));
}

#[test]
fn test_invalid_config_exits_with_config_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.yaml");
    fs::write(&config, "windows: []\n").unwrap();

    Command::cargo_bin("flaketrack")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no windows"));
}

#[test]
fn test_unsupported_store_exits_with_config_error() {
    Command::cargo_bin("flaketrack")
        .unwrap()
        .args(["--store", "ftp://example.com", "run"])
        .assert()
        .code(2);
}
