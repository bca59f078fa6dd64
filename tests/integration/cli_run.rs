#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("write fixture");
        path
    }

    /// A config path that does not exist, so the user's own config is never read.
    fn no_config(&self) -> PathBuf {
        self.dir.path().join("absent.toml")
    }
}

fn quarry(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("quarry");
    cmd.env_remove("QUARRY_CONFIG")
        .env_remove("QUARRY_PROFILE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

const SCRIPT: &str = r#"
[[steps]]
op = "where"
field = "age"
cmp = "ge"
value = 30

[[steps]]
op = "order_by_descending"
field = "age"

[[steps]]
op = "select"
fields = ["name"]
"#;

const PEOPLE: &str = r#"[
    {"name": "ada", "age": 36},
    {"name": "bob", "age": 25},
    {"name": "cy", "age": 41}
]"#;

#[test]
fn run_reads_input_file() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let input = ws.write("people.json", PEOPLE);
    let output = quarry(&ws.no_config())
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: Value = serde_json::from_slice(&output).expect("json output");
    assert_eq!(value, json!([{"name": "cy"}, {"name": "ada"}]));
}

#[test]
fn run_reads_stdin_and_prints_lines() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let output = quarry(&ws.no_config())
        .args(["--format", "lines", "run", "--script"])
        .arg(&script)
        .write_stdin(PEOPLE)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert_eq!(text, "{\"name\":\"cy\"}\n{\"name\":\"ada\"}\n");
}

#[test]
fn config_selects_csv_input_and_output_format() {
    let ws = Workspace::new();
    let config = ws.write(
        "quarry.toml",
        "[input]\nformat = \"csv\"\n\n[output]\nformat = \"pretty\"\n",
    );
    let script = ws.write(
        "count.json",
        r#"{"steps": [{"op": "where", "field": "age", "cmp": "lt", "value": 30}], "terminal": {"op": "count"}}"#,
    );
    let input = ws.write("people.csv", "name,age\nada,36\nbob,25\ndee,19\n");
    let output = quarry(&config)
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(String::from_utf8(output).expect("utf8"), "2\n");
}

#[test]
fn explain_prints_operator_kinds() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let output = quarry(&ws.no_config())
        .arg("explain")
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    let kinds: Vec<&str> = text.lines().collect();
    assert_eq!(kinds, vec!["where", "order_by_descending", "select"]);
}

#[test]
fn declaration_errors_exit_with_code() {
    let ws = Workspace::new();
    let script = ws.write(
        "bad.json",
        r#"{"steps": [{"op": "where", "field": "a", "value": 1}, {"op": "then_by", "field": "a"}]}"#,
    );
    let output = quarry(&ws.no_config())
        .arg("explain")
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error[UnorderedChain]"), "stderr: {stderr}");
}

#[test]
fn non_array_input_is_rejected() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let output = quarry(&ws.no_config())
        .arg("run")
        .arg("--script")
        .arg(&script)
        .write_stdin(r#"{"name": "ada"}"#)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error[ContractViolation]"), "stderr: {stderr}");
}

#[test]
fn missing_input_file_reports_io_error_with_path() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let missing = ws.dir.path().join("absent-rows.json");
    let output = quarry(&ws.no_config())
        .arg("run")
        .arg("--script")
        .arg(&script)
        .arg("--input")
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error[Io]"), "stderr: {stderr}");
    assert!(stderr.contains("absent-rows.json"), "stderr: {stderr}");
}

#[test]
fn malformed_config_is_reported() {
    let ws = Workspace::new();
    let config = ws.write("quarry.toml", "[output]\nformat = \"yaml\"\n");
    let script = ws.write("adults.toml", SCRIPT);
    let output = quarry(&config)
        .arg("explain")
        .arg("--script")
        .arg(&script)
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("error[Config]"), "stderr: {stderr}");
    assert!(stderr.contains("quarry.toml"), "stderr: {stderr}");
}

#[test]
fn profile_flag_reports_counters() {
    let ws = Workspace::new();
    let script = ws.write("adults.toml", SCRIPT);
    let output = quarry(&ws.no_config())
        .args(["--profile", "run", "--script"])
        .arg(&script)
        .write_stdin(PEOPLE)
        .assert()
        .success()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("profile: traversals="), "stderr: {stderr}");
    assert!(stderr.contains("buffered_elements=2"), "stderr: {stderr}");
}
