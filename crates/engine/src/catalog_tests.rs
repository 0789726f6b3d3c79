// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use chrono::Utc;
use dagr_core::{RunStatus, Status};
use dagr_history::HistoryStore;

use super::*;
use crate::{EngineConfig, EngineError, EngineFactory};

fn testbed() -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        dags_dir: dir.path().join("dags"),
        data_dir: dir.path().join("data"),
        log_dir: dir.path().join("logs"),
        runner_bin: PathBuf::from("/bin/false"),
        work_dir: dir.path().to_path_buf(),
    };
    (dir, EngineFactory::new(config).create())
}

fn write_spec(engine: &Engine, name: &str, content: &str) -> PathBuf {
    let dir = &engine.config().dags_dir;
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const VALID_SPEC: &str = "steps:\n  - name: step1\n    command: echo hello\n";

#[test]
fn create_dag_writes_the_minimal_template() {
    let (_dir, engine) = testbed();
    let path = engine.config().dags_dir.join("fresh.yaml");

    engine.create_dag(&path).unwrap();

    let dag = dagr_spec::load(&path).unwrap();
    assert_eq!(dag.name, "fresh");
    assert_eq!(dag.steps.len(), 1);
    assert_eq!(dag.steps[0].name, "step1");
    assert_eq!(dag.steps[0].command, "echo");
    assert_eq!(dag.steps[0].args, vec!["hello".to_string()]);
}

#[test]
fn create_dag_requires_the_yaml_extension() {
    let (_dir, engine) = testbed();
    let err = engine.create_dag(&engine.config().dags_dir.join("fresh")).unwrap_err();
    assert!(matches!(err, EngineError::BadExtension { .. }), "got {err}");

    let err = engine.create_dag(&engine.config().dags_dir.join("fresh.yml")).unwrap_err();
    assert!(matches!(err, EngineError::BadExtension { .. }), "got {err}");
}

#[test]
fn create_dag_refuses_to_clobber() {
    let (_dir, engine) = testbed();
    let path = write_spec(&engine, "taken.yaml", VALID_SPEC);

    let err = engine.create_dag(&path).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists { .. }), "got {err}");
}

#[test]
fn read_all_status_lists_one_row_per_spec_file() {
    let (_dir, engine) = testbed();
    write_spec(&engine, "a.yaml", VALID_SPEC);
    write_spec(&engine, "b.yaml", VALID_SPEC);
    write_spec(&engine, "notes.txt", "not a spec");
    write_spec(&engine, "c.yml", VALID_SPEC);

    let (entries, soft_errors) = engine.read_all_status(&engine.config().dags_dir).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(soft_errors.is_empty());
    // Stable listing order: by file name.
    assert_eq!(entries[0].dag.name, "a");
    assert_eq!(entries[1].dag.name, "b");
}

#[test]
fn read_all_status_keeps_broken_rows_with_their_error() {
    let (_dir, engine) = testbed();
    write_spec(&engine, "ok.yaml", VALID_SPEC);
    write_spec(&engine, "broken.yaml", ": not yaml : [\n");

    let (entries, soft_errors) = engine.read_all_status(&engine.config().dags_dir).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(soft_errors.len(), 1);

    let broken = entries.iter().find(|e| e.dag.name == "broken").unwrap();
    assert!(broken.error.is_some());
    assert_eq!(broken.status.status, RunStatus::None);
    let ok = entries.iter().find(|e| e.dag.name == "ok").unwrap();
    assert!(ok.error.is_none());
}

#[test]
fn read_all_status_creates_a_missing_directory() {
    let (_dir, engine) = testbed();
    let dags_dir = engine.config().dags_dir.clone();
    assert!(!dags_dir.exists());

    let (entries, soft_errors) = engine.read_all_status(&dags_dir).unwrap();
    assert!(entries.is_empty());
    assert!(soft_errors.is_empty());
    assert!(dags_dir.exists());
}

#[test]
fn rows_carry_the_latest_durable_status() {
    let (_dir, engine) = testbed();
    let path = write_spec(&engine, "ran.yaml", VALID_SPEC);

    let store = HistoryStore::new(engine.config().data_dir.clone());
    let mut st = Status::empty("ran");
    st.request_id = "req-cat".into();
    st.status = RunStatus::Success;
    let mut w = store.open(&path, Utc::now(), "req-cat").unwrap();
    w.write(&st).unwrap();
    drop(w);

    let (entries, _) = engine.read_all_status(&engine.config().dags_dir).unwrap();
    assert_eq!(entries[0].status.status, RunStatus::Success);
}

#[test]
fn grep_is_case_insensitive_and_exact_about_hits() {
    let (_dir, engine) = testbed();
    write_spec(&engine, "one.yaml", "steps:\n  - name: step1\n    command: echo AABBCC\n");
    write_spec(&engine, "two.yaml", VALID_SPEC);
    write_spec(&engine, "three.yaml", VALID_SPEC);
    write_spec(&engine, "noise.txt", "aabbcc everywhere");

    let (results, _) = engine.grep_dags(&engine.config().dags_dir, "aabbcc").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "one.yaml");
    assert!(results[0].matched.values().any(|l| l.contains("AABBCC")));

    let (results, _) = engine.grep_dags(&engine.config().dags_dir, "steps").unwrap();
    assert!(results.len() > 1);
}

#[test]
fn grep_reports_a_broken_matching_spec_as_a_soft_error() {
    let (_dir, engine) = testbed();
    write_spec(&engine, "broken.yaml", "steps: [\nmarker-zzz\n");

    let (results, soft_errors) =
        engine.grep_dags(&engine.config().dags_dir, "marker-zzz").unwrap();
    assert!(results.is_empty());
    assert_eq!(soft_errors.len(), 1);
}

#[test]
fn grep_with_a_bad_pattern_is_soft_not_fatal() {
    let (_dir, engine) = testbed();
    write_spec(&engine, "a.yaml", VALID_SPEC);

    let (results, soft_errors) = engine.grep_dags(&engine.config().dags_dir, "st(eps").unwrap();
    assert!(results.is_empty());
    assert_eq!(soft_errors.len(), 1);
}

#[test]
fn move_dag_renames_the_spec_and_its_history() {
    let (_dir, engine) = testbed();
    let old = write_spec(&engine, "before.yaml", VALID_SPEC);
    let new = engine.config().dags_dir.join("after.yaml");

    let store = HistoryStore::new(engine.config().data_dir.clone());
    let mut st = Status::empty("before");
    st.request_id = "req-mv".into();
    st.status = RunStatus::Success;
    let mut w = store.open(&old, Utc::now(), "req-mv").unwrap();
    w.write(&st).unwrap();
    drop(w);

    engine.move_dag(&old, &new).unwrap();

    assert!(!old.exists());
    assert!(new.exists());
    // History previously addressed by the old path follows the spec.
    let moved = store.read_status_today(&new).unwrap();
    assert_eq!(moved.request_id, "req-mv");
}

#[test]
fn move_dag_validates_the_new_extension() {
    let (_dir, engine) = testbed();
    let old = write_spec(&engine, "before.yaml", VALID_SPEC);

    let err = engine
        .move_dag(&old, &engine.config().dags_dir.join("invalid-config-name"))
        .unwrap_err();
    assert!(matches!(err, EngineError::BadExtension { .. }), "got {err}");
    assert!(old.exists());
}

#[test]
fn move_dag_requires_the_source_to_exist() {
    let (_dir, engine) = testbed();
    let err = engine
        .move_dag(
            &engine.config().dags_dir.join("ghost.yaml"),
            &engine.config().dags_dir.join("after.yaml"),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }), "got {err}");
}

#[test]
fn delete_dag_removes_the_spec_but_keeps_history() {
    let (_dir, engine) = testbed();
    let path = write_spec(&engine, "gone.yaml", VALID_SPEC);
    let dag = dagr_spec::load(&path).unwrap();

    let store = HistoryStore::new(engine.config().data_dir.clone());
    let mut st = Status::empty("gone");
    st.request_id = "req-keep".into();
    st.status = RunStatus::Success;
    let mut w = store.open(&path, Utc::now(), "req-keep").unwrap();
    w.write(&st).unwrap();
    drop(w);

    engine.delete_dag(&dag).unwrap();
    assert!(!path.exists());
    assert!(store.read_status_today(&path).is_ok());
}

#[test]
fn toggle_suspend_flips_the_catalog_flag() {
    let (_dir, engine) = testbed();
    let path = write_spec(&engine, "paused.yaml", VALID_SPEC);
    let dag = dagr_spec::load(&path).unwrap();

    assert!(!engine.read_status(&path, true).suspended);
    engine.toggle_suspend(&dag, true).unwrap();
    assert!(engine.read_status(&path, true).suspended);
    engine.toggle_suspend(&dag, false).unwrap();
    assert!(!engine.read_status(&path, true).suspended);
}
