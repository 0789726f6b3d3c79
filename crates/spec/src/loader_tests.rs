// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn write_spec(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn loads_a_minimal_spec() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "hello.yaml", "steps:\n  - name: step1\n    command: echo hello\n");

    let dag = load(&path).unwrap();
    assert_eq!(dag.name, "hello");
    assert_eq!(dag.location, path);
    assert_eq!(dag.steps.len(), 1);
    assert_eq!(dag.steps[0].name, "step1");
    assert_eq!(dag.steps[0].command, "echo");
    assert_eq!(dag.steps[0].args, vec!["hello".to_string()]);
}

#[test]
fn explicit_name_and_params_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(
        &dir,
        "file.yaml",
        "name: nightly build\nparams: x y z\nsteps:\n  - name: one\n    command: \"true\"\n",
    );

    let dag = load(&path).unwrap();
    assert_eq!(dag.name, "nightly build");
    assert_eq!(dag.default_params, "x y z");
}

#[test]
fn rejects_a_spec_with_no_steps() {
    let err = load_data(b"name: empty\n").unwrap_err();
    assert!(matches!(err, LoadError::InvalidSpec(_)), "got {err}");
}

#[test]
fn rejects_a_step_without_a_command() {
    let err = load_data(b"steps:\n  - name: step1\n").unwrap_err();
    assert!(matches!(err, LoadError::InvalidSpec(_)), "got {err}");
}

#[test]
fn rejects_unknown_dependencies() {
    let err = load_data(
        b"steps:\n  - name: a\n    command: \"true\"\n    depends:\n      - missing\n",
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::InvalidSpec(_)), "got {err}");
}

#[test]
fn rejects_non_yaml_bytes() {
    assert!(matches!(load_data(b"{{{{"), Err(LoadError::Parse(_))));
}

#[test]
fn head_load_tolerates_an_incomplete_spec() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_spec(&dir, "broken.yaml", "name: broken\nsteps:\n  - name: step1\n");

    // Full load refuses the commandless step; the catalog head load keeps
    // the entry renderable.
    assert!(load(&path).is_err());
    let dag = load_head(&path).unwrap();
    assert_eq!(dag.name, "broken");
    assert_eq!(dag.steps[0].name, "step1");
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load(std::path::Path::new("/nonexistent/nope.yaml")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn depends_edges_are_kept() {
    let dag = load_data(
        b"steps:\n  - name: a\n    command: \"true\"\n  - name: b\n    command: \"true\"\n    depends:\n      - a\n",
    )
    .unwrap();
    assert_eq!(dag.steps[1].depends, vec!["a".to_string()]);
}
