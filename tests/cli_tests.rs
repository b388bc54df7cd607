// tests/cli_tests.rs
#![cfg(feature = "cli")]

use std::{fs, path::Path};

use jsonte::cli::{CliError, CompileOptions, execute_compile, load_scope};
use jsonte::{Value, resolve_expression};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, contents: serde_json::Value) {
    fs::write(dir.join(name), contents.to_string()).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_load_scope_merges_files_in_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.json", json!({"x": 1, "list": [1]}));
    write(dir.path(), "b.json", json!({"x": 2, "y": 2, "list": [2]}));
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let scope = load_scope(&[dir.path().to_path_buf()]).unwrap();
    assert_eq!(resolve_expression("x", &scope).unwrap(), Value::Integer(1));
    assert_eq!(resolve_expression("y", &scope).unwrap(), Value::Integer(2));
    assert_eq!(
        resolve_expression("list", &scope).unwrap(),
        Value::from(json!([1, 2]))
    );
}

#[test]
fn test_load_scope_rejects_non_objects() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "list.json", json!([1, 2]));

    let err = load_scope(&[dir.path().join("list.json")]).unwrap_err();
    assert!(matches!(err, CliError::ScopeNotObject { .. }));
}

#[test]
fn test_compile_writes_outputs() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let scope_dir = TempDir::new().unwrap();

    write(scope_dir.path(), "global.json", json!({"namespace": "demo"}));
    write(
        src.path(),
        "base.modl",
        json!({
            "$module": "base",
            "$scope": {"ns": "{{namespace}}"},
            "$template": {"kind": "block"}
        }),
    );
    write(
        src.path(),
        "blocks.templ",
        json!({
            "$extend": "base",
            "$files": {"array": "{{['stone', 'dirt']}}", "fileName": "{{value}}"},
            "$template": {"id": "{{ns + ':' + value}}"}
        }),
    );

    let options = CompileOptions {
        paths: vec![src.path().to_path_buf()],
        scope: vec![scope_dir.path().to_path_buf()],
        out: Some(out.path().to_path_buf()),
        ..CompileOptions::default()
    };
    let report = execute_compile(&options, &mut Vec::new()).unwrap();

    assert_eq!(report.total, 2);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.written.len(), 2);

    let names: Vec<String> = report
        .written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["stone.json", "dirt.json"]);
    assert!(report.written.iter().all(|p| p.starts_with(out.path())));
    assert_eq!(read_json(&report.written[0]), json!({"id": "demo:stone", "kind": "block"}));
    assert_eq!(read_json(&report.written[1]), json!({"id": "demo:dirt", "kind": "block"}));
}

#[test]
fn test_compile_continues_after_failures() {
    let src = TempDir::new().unwrap();
    write(src.path(), "a_broken.templ", json!({"$template": {"x": "{{missing}}"}}));
    write(src.path(), "b_fine.templ", json!({"$template": {"x": 1}}));

    let options = CompileOptions {
        paths: vec![src.path().to_path_buf()],
        ..CompileOptions::default()
    };
    let mut stdout = Vec::new();
    let report = execute_compile(&options, &mut stdout).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].0.ends_with("a_broken.templ"));
    assert_eq!(String::from_utf8(stdout).unwrap(), "b_fine.json:\n{\"x\":1}\n");
}

#[test]
fn test_compile_removes_compiled_sources() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(src.path(), "ok.templ", json!({"$template": {"x": 1}}));
    write(src.path(), "bad.templ", json!({"$template": {"x": "{{1 / 0}}"}}));

    let options = CompileOptions {
        paths: vec![src.path().to_path_buf()],
        out: Some(out.path().to_path_buf()),
        remove_src: true,
        ..CompileOptions::default()
    };
    let report = execute_compile(&options, &mut Vec::new()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(!src.path().join("ok.templ").exists());
    assert!(src.path().join("bad.templ").exists());
}

#[test]
fn test_compile_pretty_output() {
    let src = TempDir::new().unwrap();
    write(src.path(), "doc.templ", json!({"$template": {"a": [1]}}));

    let options = CompileOptions {
        paths: vec![src.path().join("doc.templ")],
        pretty: true,
        ..CompileOptions::default()
    };
    let mut stdout = Vec::new();
    execute_compile(&options, &mut stdout).unwrap();
    assert_eq!(
        String::from_utf8(stdout).unwrap(),
        "doc.json:\n{\n  \"a\": [\n    1\n  ]\n}\n"
    );
}
