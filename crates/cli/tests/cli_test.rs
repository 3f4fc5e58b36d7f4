#![cfg(unix)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A workspace with a fake `bazel` that answers every query with `query_output`
///
/// `{ws}` in the output is replaced by the canonical workspace path, the way
/// bazel prints absolute BUILD file locations.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(config: &str, query_output: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();

        let output = query_output.replace("{ws}", root.to_str().unwrap());
        fs::write(root.join("query.out"), output).unwrap();

        let script = root.join("fake-bazel");
        fs::write(&script, format!("#!/bin/sh\ncat '{}'\n", root.join("query.out").display())).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        fs::write(root.join(".projgen.json"), config).unwrap();
        Self { dir }
    }

    fn root(&self) -> PathBuf {
        self.dir.path().canonicalize().unwrap()
    }

    fn projgen(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_projgen"));
        cmd.arg(subcommand)
            .arg("--workspace-root")
            .arg(self.root())
            .arg("--bazel")
            .arg(self.root().join("fake-bazel"));
        cmd
    }
}

const APP_OUTPUT: &str = r#"# {ws}/app/BUILD:1:16
ios_application(
  name = "App",
)
# {ws}/app/BUILD:5:14
ios_unit_test(
  name = "AppTests",
  test_host = "//app:App",
)
# {ws}/app/BUILD:10:11
test_suite(
  name = "AllTests",
  tests = [":AppTests"],
)
"#;

fn read_descriptor(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_generate_includes_test_host() {
    let ws = Workspace::new(
        r#"{"projectName": "Demo", "buildTargets": ["//app:AppTests"], "pathFilters": ["app/..."]}"#,
        APP_OUTPUT,
    );

    ws.projgen("generate")
        .arg("--output-dir")
        .arg(ws.root().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("descriptor.json"));

    let descriptor = read_descriptor(&ws.root().join("out/Demo.projgen/descriptor.json"));
    let labels: Vec<&str> = descriptor["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["//app:App", "//app:AppTests"]);
    assert!(descriptor["guid"].is_string());
}

#[test]
fn test_extract_expands_suites() {
    let ws = Workspace::new(r#"{"buildTargets": ["//app:App"]}"#, APP_OUTPUT);

    ws.projgen("extract")
        .assert()
        .success()
        .stdout(predicate::str::contains("ios_unit_test //app:AppTests -> //app:App"))
        .stdout(predicate::str::contains("AllTests").not());
}

#[test]
fn test_missing_host_exits_17() {
    let ws = Workspace::new(
        r#"{"buildTargets": ["//app:AppTests"]}"#,
        r#"# {ws}/app/BUILD:1:14
ios_unit_test(
  name = "AppTests",
  test_host = "//elsewhere:Host",
)
"#,
    );

    ws.projgen("generate")
        .assert()
        .code(17)
        .stderr(predicate::str::contains("//elsewhere:Host"));
}

#[test]
fn test_recursive_suite_exits_15() {
    let ws = Workspace::new(
        r#"{"buildTargets": ["//app:Loop"]}"#,
        r#"# {ws}/app/BUILD:1:11
test_suite(
  name = "Loop",
  tests = [":Loop"],
)
"#,
    );

    ws.projgen("extract").assert().code(15);
}

#[test]
fn test_garbled_query_output_exits_14() {
    let ws = Workspace::new(r#"{"buildTargets": ["//app:App"]}"#, "ios_application(\n");

    ws.projgen("extract").assert().code(14);
}

#[test]
fn test_unknown_option_exits_13() {
    let ws = Workspace::new(
        r#"{"buildTargets": ["//app:App"], "options": {"NoSuchOption": {"projectValue": "YES"}}}"#,
        APP_OUTPUT,
    );

    ws.projgen("generate")
        .assert()
        .code(13)
        .stderr(predicate::str::contains("NoSuchOption"));
}

#[test]
fn test_malformed_target_exits_12() {
    let ws = Workspace::new(r#"{"buildTargets": ["app:App"]}"#, APP_OUTPUT);

    ws.projgen("generate").assert().code(12);
}

#[test]
fn test_missing_bazel_exits_22() {
    let ws = Workspace::new(r#"{"buildTargets": ["//app:App"]}"#, APP_OUTPUT);

    Command::new(env!("CARGO_BIN_EXE_projgen"))
        .arg("extract")
        .arg("--workspace-root")
        .arg(ws.root())
        .arg("--bazel")
        .arg(ws.root().join("no-bazel-here"))
        .assert()
        .code(22);
}

#[test]
fn test_filters_excluding_everything_exit_16() {
    let ws = Workspace::new(
        r#"{"projectName": "Demo", "buildTargets": ["//app:App"], "pathFilters": ["lib/..."]}"#,
        APP_OUTPUT,
    );

    ws.projgen("generate").assert().code(16);
}

#[test]
fn test_diff_against_golden() {
    let ws = Workspace::new(
        r#"{"projectName": "Demo", "buildTargets": ["//app:App"], "outputDir": "out"}"#,
        APP_OUTPUT,
    );
    ws.projgen("generate").assert().success();

    let generated = ws.root().join("out/Demo.projgen/descriptor.json");
    let golden = ws.root().join("golden.json");
    fs::copy(&generated, &golden).unwrap();

    // Only guids differ between two runs
    ws.projgen("generate").assert().success();
    Command::new(env!("CARGO_BIN_EXE_projgen"))
        .arg("diff")
        .arg(&generated)
        .arg(&golden)
        .assert()
        .success()
        .stdout(predicate::str::contains("No differences"));

    let mut changed = read_descriptor(&golden);
    changed["name"] = serde_json::Value::String("Other".to_string());
    fs::write(&golden, serde_json::to_string_pretty(&changed).unwrap()).unwrap();

    Command::new(env!("CARGO_BIN_EXE_projgen"))
        .arg("diff")
        .arg(&generated)
        .arg(&golden)
        .assert()
        .code(18)
        .stderr(predicate::str::contains("~ name: Other -> Demo"));
}
