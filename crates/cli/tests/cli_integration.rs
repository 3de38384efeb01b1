use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

const GRAMMAR: &str = r#"{
  "name": "git",
  "description": "The stupid content tracker",
  "options": [
    { "name": "--verbose", "aliases": ["-v"], "action": "count" }
  ],
  "commands": [
    {
      "name": "commit",
      "aliases": ["ci"],
      "description": "Record changes",
      "options": [
        { "name": "--message", "aliases": ["-m"], "type": "string", "required": true }
      ]
    },
    {
      "name": "log",
      "arguments": [{ "name": "revisions", "nargs": "*" }],
      "options": [
        { "name": "--max-count", "aliases": ["-n"], "type": "integer", "default": 10 }
      ]
    }
  ]
}"#;

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("cmdtree-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn write_grammar(prefix: &str, contents: &str) -> (PathBuf, PathBuf) {
    let dir = make_temp_dir(prefix);
    let path = dir.join("grammar.json");
    fs::write(&path, contents).expect("failed to write grammar");
    (dir, path)
}

fn cmdtree() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cmdtree"))
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}):\n{}",
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

#[test]
fn help_works() {
    let out = cmdtree()
        .arg("--help")
        .output()
        .expect("failed to run cmdtree --help");
    assert!(
        out.status.success(),
        "cmdtree --help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("cmdtree") && stdout.contains("parse") && stdout.contains("check"),
        "unexpected help output:\n{stdout}"
    );
}

#[test]
fn parse_prints_bindings_as_json() {
    let (dir, grammar) = write_grammar("parse-ok", GRAMMAR);

    let out = cmdtree()
        .arg("parse")
        .arg("--grammar")
        .arg(&grammar)
        .args(["--", "-v", "-v", "ci", "-m", "hello"])
        .output()
        .expect("failed to run cmdtree parse");
    assert!(
        out.status.success(),
        "cmdtree parse failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );

    let report = stdout_json(&out);
    assert_eq!(report["command"], json!(["git", "ci"]));
    assert_eq!(report["match"], json!("ci"));
    assert_eq!(report["options"]["message"], json!("hello"));
    assert_eq!(report["errors"], json!([]));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parse_errors_exit_with_failure() {
    let (dir, grammar) = write_grammar("parse-errors", GRAMMAR);

    let out = cmdtree()
        .arg("parse")
        .arg("-g")
        .arg(&grammar)
        .args(["--", "commit", "--bogus"])
        .output()
        .expect("failed to run cmdtree parse");
    assert_eq!(
        out.status.code(),
        Some(1),
        "expected exit status 1:\nstderr:\n{}",
        String::from_utf8_lossy(&out.stderr),
    );

    let report = stdout_json(&out);
    let errors = report["errors"].as_array().expect("errors is an array");
    assert_eq!(errors.len(), 2, "unexpected errors: {errors:?}");
    assert!(errors[0].as_str().unwrap().contains("--bogus"));
    assert!(errors[1].as_str().unwrap().contains("--message"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bare_dash_is_rejected() {
    let (dir, grammar) = write_grammar("bare-dash", GRAMMAR);

    let out = cmdtree()
        .arg("parse")
        .arg("-g")
        .arg(&grammar)
        .args(["--", "log", "-"])
        .output()
        .expect("failed to run cmdtree parse");
    assert!(!out.status.success());
    let report = stdout_json(&out);
    assert_eq!(report["errors"].as_array().map(Vec::len), Some(1));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn help_renders_the_command_path() {
    let (dir, grammar) = write_grammar("help-path", GRAMMAR);

    let out = cmdtree()
        .arg("help")
        .arg("-g")
        .arg(&grammar)
        .arg("ci")
        .output()
        .expect("failed to run cmdtree help");
    assert!(
        out.status.success(),
        "cmdtree help failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.starts_with("Usage: git commit [options]"),
        "unexpected help output:\n{stdout}"
    );
    assert!(stdout.contains("Record changes"));
    assert!(stdout.contains("--message"));

    let out = cmdtree()
        .arg("help")
        .arg("-g")
        .arg(&grammar)
        .arg("push")
        .output()
        .expect("failed to run cmdtree help");
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown command 'push'"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_summarizes_commands() {
    let (dir, grammar) = write_grammar("check-ok", GRAMMAR);

    let out = cmdtree()
        .arg("check")
        .arg("-g")
        .arg(&grammar)
        .arg("--json")
        .output()
        .expect("failed to run cmdtree check");
    assert!(
        out.status.success(),
        "cmdtree check failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
    let report = stdout_json(&out);
    let paths: Vec<&str> = report["commands"]
        .as_array()
        .expect("commands is an array")
        .iter()
        .filter_map(|c| c["path"].as_str())
        .collect();
    assert_eq!(paths, vec!["git", "git commit", "git log"]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_rejects_invalid_grammar() {
    let (dir, grammar) = write_grammar(
        "check-invalid",
        r#"{
  "name": "tool",
  "arguments": [{ "name": "a", "nargs": "?" }, { "name": "b" }]
}"#,
    );

    let out = cmdtree()
        .arg("check")
        .arg("-g")
        .arg(&grammar)
        .output()
        .expect("failed to run cmdtree check");
    assert!(!out.status.success(), "invalid grammar was accepted");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("invalid grammar"),
        "unexpected stderr:\n{stderr}"
    );

    let _ = fs::remove_dir_all(&dir);
}
