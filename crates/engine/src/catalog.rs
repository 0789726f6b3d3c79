// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DAG spec catalog: enumerate, grep, create, rename and delete spec
//! files in a directory.
//!
//! Per-file load failures are soft: the broken entry still appears in the
//! listing with its error attached, so the operator UI can render the row.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use regex::RegexBuilder;
use tracing::warn;

use dagr_core::Status;
use dagr_history::HistoryError;
use dagr_spec::Dag;

use crate::grep::{grep_lines, GrepResult, GREP_CONTEXT};
use crate::{Engine, EngineError};

/// Contents of a freshly created spec file.
const SPEC_TEMPLATE: &str = "steps:\n  - name: step1\n    command: echo hello\n";

/// One catalog row: the spec file, its (possibly partial) DAG, the latest
/// durable status and the load error if the spec is broken.
///
/// A row is produced even when loading fails — callers must not assume
/// `error` is `None`.
#[derive(Debug, Clone)]
pub struct DagEntry {
    pub file: PathBuf,
    pub dag: Dag,
    pub status: Status,
    pub suspended: bool,
    pub error: Option<String>,
}

impl Engine {
    /// Load one catalog row. A broken spec yields a placeholder DAG with the
    /// load error attached, never a missing row.
    pub fn read_status(&self, path: &Path, head_only: bool) -> DagEntry {
        let loaded = if head_only { dagr_spec::load_head(path) } else { dagr_spec::load(path) };
        let (dag, error) = match loaded {
            Ok(dag) => (dag, None),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to load DAG spec");
                (Dag::placeholder(path), Some(e.to_string()))
            }
        };
        let status = self.latest_status(&dag);
        DagEntry {
            file: path.to_path_buf(),
            suspended: self.is_suspended(&dag),
            dag,
            status,
            error,
        }
    }

    /// List all specs in `dir`, one row per spec file.
    ///
    /// A missing directory is created rather than failed on; an empty
    /// catalog is a valid catalog. Per-file load errors are collected as
    /// soft errors *and* attached to their rows. Rows are ordered by file
    /// name so the listing is stable.
    pub fn read_all_status(
        &self,
        dir: &Path,
    ) -> Result<(Vec<DagEntry>, Vec<String>), EngineError> {
        ensure_dir(dir)?;
        let mut entries = Vec::new();
        let mut soft_errors = Vec::new();
        for path in spec_files(dir)? {
            let entry = self.read_status(&path, true);
            if let Some(error) = &entry.error {
                soft_errors.push(format!("reading {} failed: {error}", display_name(&path)));
            }
            entries.push(entry);
        }
        Ok((entries, soft_errors))
    }

    /// Grep all specs in `dir` with a case-insensitive regex, reporting
    /// matched lines with two lines of context.
    ///
    /// Files with zero matches are omitted. A load failure on a matching
    /// file, or an unreadable file, is a soft error; a bad pattern is too
    /// (with no results), so a single stray input never fails the whole
    /// call.
    pub fn grep_dags(
        &self,
        dir: &Path,
        pattern: &str,
    ) -> Result<(Vec<GrepResult>, Vec<String>), EngineError> {
        ensure_dir(dir)?;
        let mut results = Vec::new();
        let mut soft_errors = Vec::new();

        let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern, error = %e, "invalid grep pattern");
                soft_errors.push(format!("grep failed: {e}"));
                return Ok((results, soft_errors));
            }
        };

        for path in spec_files(dir)? {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unreadable spec");
                    soft_errors.push(format!("grep {} failed: {e}", display_name(&path)));
                    continue;
                }
            };
            let matched = grep_lines(&content, &regex, GREP_CONTEXT);
            if matched.is_empty() {
                continue;
            }
            match dagr_spec::load_head(&path) {
                Ok(dag) => results.push(GrepResult {
                    name: display_name(&path),
                    dag,
                    matched,
                }),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "matching spec failed to load");
                    soft_errors.push(format!("check {} failed: {e}", display_name(&path)));
                }
            }
        }
        Ok((results, soft_errors))
    }

    /// Create a new spec file holding the minimal valid template.
    pub fn create_dag(&self, path: &Path) -> Result<(), EngineError> {
        assert_spec_path(path)?;
        if path.exists() {
            return Err(EngineError::AlreadyExists { path: path.to_path_buf() });
        }
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(path, SPEC_TEMPLATE).map_err(|source| EngineError::Io {
            context: "failed to create",
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rename a spec file and migrate its history to the new address.
    ///
    /// History migration is best-effort: if it fails after the rename, the
    /// error is surfaced but the spec file stays at `new_path` — a later
    /// rename can re-link the orphaned records.
    pub fn move_dag(&self, old_path: &Path, new_path: &Path) -> Result<(), EngineError> {
        assert_spec_path(new_path)?;
        if !old_path.exists() {
            return Err(EngineError::NotFound { path: old_path.to_path_buf() });
        }
        std::fs::rename(old_path, new_path).map_err(|source| EngineError::Io {
            context: "failed to rename",
            path: old_path.to_path_buf(),
            source,
        })?;
        if let Err(e) = self.history.move_data(old_path, new_path) {
            warn!(
                old = %old_path.display(),
                new = %new_path.display(),
                error = %e,
                "history migration failed; records stay addressed by the old path"
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete a spec file. History is retained.
    pub fn delete_dag(&self, dag: &Dag) -> Result<(), EngineError> {
        std::fs::remove_file(&dag.location).map_err(|source| EngineError::Io {
            context: "failed to remove",
            path: dag.location.clone(),
            source,
        })
    }

    /// Flip the suspend flag for a DAG. A suspended DAG is skipped by
    /// schedulers; run history and the spec file are untouched.
    pub fn toggle_suspend(&self, dag: &Dag, suspend: bool) -> Result<(), EngineError> {
        let flag = self.suspend_flag(dag);
        if suspend {
            if let Some(parent) = flag.parent() {
                ensure_dir(parent)?;
            }
            std::fs::write(&flag, b"").map_err(|source| EngineError::Io {
                context: "failed to create",
                path: flag.clone(),
                source,
            })
        } else {
            match std::fs::remove_file(&flag) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(source) => {
                    Err(EngineError::Io { context: "failed to remove", path: flag, source })
                }
            }
        }
    }

    pub(crate) fn is_suspended(&self, dag: &Dag) -> bool {
        self.suspend_flag(dag).exists()
    }

    fn suspend_flag(&self, dag: &Dag) -> PathBuf {
        self.config.data_dir.join("suspend").join(format!("{}.suspend", dag.name))
    }

    /// Latest durable status for a catalog row, synthesized when the DAG has
    /// no usable history. The live socket is deliberately not consulted so
    /// catalog listings stay cheap.
    fn latest_status(&self, dag: &Dag) -> Status {
        match self.history.read_status_today(&dag.location) {
            Ok(status) => status,
            Err(HistoryError::NoStatusData | HistoryError::NoStatusDataToday) => {
                Status::empty(&dag.name)
            }
            Err(e) => {
                warn!(dag = %dag.name, error = %e, "history read failed; showing no status");
                Status::empty(&dag.name)
            }
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Spec files in `dir`, sorted by file name. Non-spec files are ignored.
fn spec_files(dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|source| EngineError::Io {
        context: "failed to read",
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| dagr_spec::has_spec_extension(p))
        .collect();
    files.sort();
    Ok(files)
}

fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .map_err(|source| EngineError::Io {
            context: "failed to create",
            path: dir.to_path_buf(),
            source,
        })
}

fn assert_spec_path(path: &Path) -> Result<(), EngineError> {
    if !dagr_spec::has_spec_extension(path) {
        return Err(EngineError::BadExtension { path: path.to_path_buf() });
    }
    Ok(())
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
