// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable run history.
//!
//! Each run owns one append-only JSONL file keyed by
//! `(dag path, start time, request id)`; every line is a full [`Status`]
//! snapshot and the last line is the record's current value. The store does
//! not interpret statuses — reconciliation happens above it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod writer;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use dagr_core::Status;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

pub use writer::Writer;

/// Errors from the history store.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The DAG has no history at all.
    #[error("no status data")]
    NoStatusData,

    /// The DAG has history, but none for today.
    #[error("no status data today")]
    NoStatusDataToday,

    /// No record holds the requested request id.
    #[error("no history record for request id {request_id:?}")]
    NotFound { request_id: String },

    #[error("history I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt history record {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// A history record: the durable file plus its current status value.
#[derive(Debug, Clone)]
pub struct StatusFile {
    pub file: PathBuf,
    pub status: Status,
}

/// File-backed history store rooted at a data directory.
///
/// Constructed from injected configuration and passed explicitly to callers;
/// there is no process-wide default store.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    data_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Open a new record for a run starting now-ish. Creates the key
    /// directory on first use.
    pub fn open(
        &self,
        dag_path: &Path,
        started_at: DateTime<Utc>,
        request_id: &str,
    ) -> Result<Writer, HistoryError> {
        let dir = self.run_dir(dag_path);
        std::fs::create_dir_all(&dir).map_err(|source| HistoryError::Io {
            path: dir.clone(),
            source,
        })?;
        let file = dir.join(record_file_name(dag_path, started_at, request_id));
        Writer::open(&file)
    }

    /// Locate the record holding `request_id`, newest first.
    pub fn find_by_request_id(
        &self,
        dag_path: &Path,
        request_id: &str,
    ) -> Result<StatusFile, HistoryError> {
        for file in self.record_files(dag_path) {
            match read_record(&file) {
                Ok(status) if status.request_id == request_id => {
                    return Ok(StatusFile { file, status });
                }
                Ok(_) => {}
                Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable history record"),
            }
        }
        Err(HistoryError::NotFound { request_id: request_id.to_string() })
    }

    /// The newest record written today (local time).
    ///
    /// `NoStatusData` when the DAG has no history at all,
    /// `NoStatusDataToday` when it has records but none from today.
    pub fn read_status_today(&self, dag_path: &Path) -> Result<Status, HistoryError> {
        let files = self.record_files(dag_path);
        if files.is_empty() {
            return Err(HistoryError::NoStatusData);
        }
        let today = Local::now().format("%Y%m%d").to_string();
        let newest_today = files
            .into_iter()
            .find(|f| record_date_segment(f).is_some_and(|d| d == today))
            .ok_or(HistoryError::NoStatusDataToday)?;
        read_record(&newest_today)
    }

    /// The newest `n` records, newest first. Unreadable records are logged
    /// and skipped; the listing stays usable.
    pub fn read_recent(&self, dag_path: &Path, n: usize) -> Vec<StatusFile> {
        let mut out = Vec::with_capacity(n);
        for file in self.record_files(dag_path) {
            if out.len() == n {
                break;
            }
            match read_record(&file) {
                Ok(status) => out.push(StatusFile { file, status }),
                Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable history record"),
            }
        }
        out
    }

    /// Re-key history from `old_path` to `new_path` after a spec rename.
    ///
    /// Renames the key directory and re-prefixes contained record files with
    /// the new DAG name. A DAG with no history moves trivially.
    pub fn move_data(&self, old_path: &Path, new_path: &Path) -> Result<(), HistoryError> {
        let old_dir = self.run_dir(old_path);
        if !old_dir.exists() {
            return Ok(());
        }
        let new_dir = self.run_dir(new_path);
        if let Some(parent) = new_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::rename(&old_dir, &new_dir).map_err(|source| HistoryError::Io {
            path: old_dir.clone(),
            source,
        })?;

        let old_prefix = format!("{}.", dag_name(old_path));
        let new_prefix = format!("{}.", dag_name(new_path));
        for entry in list_dir(&new_dir)? {
            let Some(file_name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(rest) = file_name.strip_prefix(&old_prefix) {
                let renamed = new_dir.join(format!("{new_prefix}{rest}"));
                std::fs::rename(&entry, &renamed).map_err(|source| HistoryError::Io {
                    path: entry.clone(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    /// Key directory for a DAG: `<name>-<sha256(path)[..16]>`.
    fn run_dir(&self, dag_path: &Path) -> PathBuf {
        let digest = Sha256::digest(dag_path.to_string_lossy().as_bytes());
        let hash: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        self.data_dir.join(format!("{}-{hash}", dag_name(dag_path)))
    }

    /// Record files for a DAG, newest first. File names sort
    /// chronologically because the date/time segments are fixed-width.
    fn record_files(&self, dag_path: &Path) -> Vec<PathBuf> {
        let dir = self.run_dir(dag_path);
        let mut files = match list_dir(&dir) {
            Ok(files) => files,
            Err(_) => return Vec::new(),
        };
        files.retain(|f| f.extension().and_then(|e| e.to_str()) == Some("jsonl"));
        files.sort();
        files.reverse();
        files
    }
}

fn dag_name(dag_path: &Path) -> String {
    dag_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn record_file_name(dag_path: &Path, started_at: DateTime<Utc>, request_id: &str) -> String {
    let local = started_at.with_timezone(&Local);
    let mut short_id = request_id.to_string();
    short_id.truncate(8);
    format!(
        "{}.{}.{}.{}.jsonl",
        dag_name(dag_path),
        local.format("%Y%m%d"),
        local.format("%H%M%S_%3f"),
        short_id,
    )
}

/// The date segment of a record file name (`<name>.<date>.<time>.<id>.jsonl`).
fn record_date_segment(file: &Path) -> Option<&str> {
    let name = file.file_name()?.to_str()?;
    let mut segments = name.rsplit('.');
    let _ext = segments.next()?;
    let _id = segments.next()?;
    let _time = segments.next()?;
    segments.next()
}

/// Current value of a record: its last well-formed line.
fn read_record(file: &Path) -> Result<Status, HistoryError> {
    let content = std::fs::read_to_string(file).map_err(|source| HistoryError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    let last = content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| HistoryError::Corrupt {
            path: file.to_path_buf(),
            reason: "record holds no status lines".into(),
        })?;
    Status::from_json(last.as_bytes()).map_err(|e| HistoryError::Corrupt {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, HistoryError> {
    let entries = std::fs::read_dir(dir).map_err(|source| HistoryError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries.flatten().map(|e| e.path()).collect())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
