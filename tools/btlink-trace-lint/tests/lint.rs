//! Command-level tests for the trace lint tool.

use std::io::Write as _;

use assert_cmd::Command;
use predicates::prelude::*;

const VALID_TRACE: &str = r#"{
    "modules": [
        { "name": "main", "addr": "0x100000000" },
        { "name": "libtest_module", "addr": "0x200000000" }
    ],
    "branches": [
        {
            "before": { "module": "main", "func": "caller",
                        "registers": { "rip": "0x100000180", "rax": "0x100000800" } },
            "after":  { "module": "main", "func": "callee",
                        "registers": { "rip": "0x100000200" } }
        },
        {
            "before": { "module": "main", "func": "caller",
                        "registers": { "rip": "0x100000380" } },
            "after":  { "module": "libtest_module", "func": "external_func1",
                        "registers": { "rip": "0x200000100" } }
        }
    ]
}"#;

fn write_trace(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{contents}").expect("write trace");
    file
}

#[test]
fn test_lint_reports_valid_trace() {
    let file = write_trace(VALID_TRACE);
    Command::cargo_bin("btlink-trace-lint")
        .unwrap()
        .args(["--input", &file.path().to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("modules: 2"))
        .stdout(predicate::str::contains("libtest_module @ 0x200000000"))
        .stdout(predicate::str::contains(
            "branches: 2 (1 same-module, 1 cross-module)",
        ));
}

#[test]
fn test_lint_rejects_malformed_document() {
    let file = write_trace(r#"{ "modules": [] }"#);
    Command::cargo_bin("btlink-trace-lint")
        .unwrap()
        .args(["--input", &file.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse trace document"));
}

#[test]
fn test_lint_rejects_unknown_module_reference() {
    let file = write_trace(
        r#"{
        "modules": [ { "name": "main", "addr": "0x100000000" } ],
        "branches": [
            {
                "before": { "module": "main", "func": "f",
                            "registers": { "rip": "0x100000180" } },
                "after":  { "module": "ghost", "func": "g",
                            "registers": { "rip": "0x200000100" } }
            }
        ]
    }"#,
    );
    Command::cargo_bin("btlink-trace-lint")
        .unwrap()
        .args(["--input", &file.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_lint_rejects_missing_file() {
    Command::cargo_bin("btlink-trace-lint")
        .unwrap()
        .args(["--input", "/nonexistent/trace.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}
