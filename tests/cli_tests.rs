//! CLI integration tests
//!
//! Exercises the check/run commands end to end through the binary,
//! including exit codes and output formats. LLM-free documents keep these
//! hermetic.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn write_doc(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn folio() -> Command {
    Command::cargo_bin("folio").unwrap()
}

#[test]
fn check_reports_valid_document() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "ok.md",
        "---\nname: demo\ninputs:\n  topic: string = cats\n---\nHello {topic}\n<Set name=\"x\" value={1}/>",
    );

    folio()
        .arg("check")
        .arg(&doc)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Inputs: 1"))
        .stdout(predicate::str::contains("Nodes: 2"));
}

#[test]
fn check_parse_error_exits_2() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "broken.md", "<Loop name=\"l\" count={1}>never closed");

    folio()
        .arg("check")
        .arg(&doc)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Parse error at line 1"));
}

#[test]
fn check_validation_error_exits_3() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "invalid.md", "<Generation/>\n<Unknown thing=\"x\"/>");

    folio()
        .arg("check")
        .arg(&doc)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("requires a non-empty name"))
        .stderr(predicate::str::contains("unknown component"));
}

#[test]
fn run_headless_produces_json_outputs() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "flow.md",
        r#"---
inputs:
  n: number = 2
---
<Set name="double" value={n * 2}/>
<Prompt name="who" message="Name?" default="anon"/>
<If condition={n > 1}><Set name="big" value={true}/></If>"#,
    );

    let output = folio()
        .arg("run")
        .arg(&doc)
        .args(["--non-interactive", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let outputs: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(outputs["n"], 2);
    assert_eq!(outputs["double"], 4.0);
    assert_eq!(outputs["who"], "anon");
    assert_eq!(outputs["big"], true);
}

#[test]
fn run_input_flag_overrides_file_and_default() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "flow.md",
        "---\ninputs:\n  topic: string = from_default\n---\n<Set name=\"echo\" value={topic}/>",
    );
    let inputs_file = dir.path().join("inputs.json");
    fs::write(&inputs_file, r#"{"topic": "from_file"}"#).unwrap();

    // File beats default
    let output = folio()
        .arg("run")
        .arg(&doc)
        .arg("--inputs-file")
        .arg(&inputs_file)
        .args(["--non-interactive", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let outputs: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(outputs["echo"], "from_file");

    // Flag beats file
    let output = folio()
        .arg("run")
        .arg(&doc)
        .arg("--inputs-file")
        .arg(&inputs_file)
        .args(["--input", "topic=from_flag", "--non-interactive", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let outputs: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(outputs["echo"], "from_flag");
}

#[test]
fn run_missing_required_input_exits_3() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "flow.md",
        "---\ninputs:\n  topic: string\n---\nHello {topic}",
    );

    folio()
        .arg("run")
        .arg(&doc)
        .args(["--non-interactive"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Missing required input"));
}

#[test]
fn run_ndjson_streams_events() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "flow.md",
        "<Set name=\"x\" value={1}/>\n<Log message=\"done\"/>",
    );

    let output = folio()
        .arg("run")
        .arg(&doc)
        .args(["--non-interactive", "--format", "ndjson"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(lines.len() >= 4);
    assert_eq!(lines[0]["kind"]["type"], "run_started");
    assert_eq!(lines.last().unwrap()["kind"]["type"], "run_completed");
    assert!(lines.iter().any(|l| l["kind"]["type"] == "variable_set"));
    assert!(lines.iter().any(|l| l["kind"]["type"] == "log_message"));
}

#[test]
fn run_yaml_format_prints_yaml() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "flow.md", "<Set name=\"x\" value={\"hi\"}/>");

    folio()
        .arg("run")
        .arg(&doc)
        .args(["--non-interactive", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("x: hi"));
}

#[test]
fn run_sub_flow_relative_to_document() {
    let dir = TempDir::new().unwrap();
    write_doc(&dir, "child.md", "---\ninputs:\n  n: number\n---\n<Set name=\"twice\" value={n * 2}/>");
    let doc = write_doc(
        &dir,
        "parent.md",
        "<Flow name=\"sub\" src=\"child.md\" inputs={{n: 3}}/>",
    );

    let output = folio()
        .arg("run")
        .arg(&doc)
        .args(["--non-interactive", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let outputs: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(outputs["sub"]["twice"], 6.0);
}
