// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run status record and the stale-running repair applied on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Node;

/// Sentinel pid for "no process".
pub const PID_NOT_RUNNING: i32 = -1;

/// Pid of the agent owning a run, or [`PID_NOT_RUNNING`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub i32);

impl Pid {
    pub fn not_running() -> Self {
        Pid(PID_NOT_RUNNING)
    }

    pub fn is_running(&self) -> bool {
        self.0 > 0
    }
}

impl From<u32> for Pid {
    fn from(pid: u32) -> Self {
        Pid(pid as i32)
    }
}

/// Scheduler-level status of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No information — the synthetic value returned when neither a live
    /// agent nor a history record exists. Never written to history.
    None,
    Running,
    Error,
    Cancel,
    Success,
}

impl RunStatus {
    /// Check if this run has reached a state history may hold durably.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Error | RunStatus::Cancel | RunStatus::Success)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunStatus::None => "none",
            RunStatus::Running => "running",
            RunStatus::Error => "error",
            RunStatus::Cancel => "cancel",
            RunStatus::Success => "success",
        })
    }
}

/// Failed to decode a status payload (socket body or history line).
#[derive(Debug, Error)]
#[error("invalid status payload: {0}")]
pub struct StatusDecodeError(#[from] serde_json::Error);

/// One run's canonical state.
///
/// Produced live by the agent over its socket and durably as JSONL history
/// lines; both encodings are this struct's JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Stable identifier for the run, assigned by the agent.
    pub request_id: String,
    /// DAG name the run belongs to.
    pub name: String,
    pub status: RunStatus,
    pub pid: Pid,
    /// Per-step states, in spec order.
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Parameter string the run was launched with.
    #[serde(default)]
    pub params: String,
    /// Path to the agent's own log file, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<std::path::PathBuf>,
}

impl Status {
    /// The synthetic "no information" value for a DAG with no live agent and
    /// no usable history. Never persisted.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            name: name.into(),
            status: RunStatus::None,
            pid: Pid::not_running(),
            nodes: Vec::new(),
            started_at: None,
            finished_at: None,
            params: String::new(),
            log: None,
        }
    }

    /// Repair a stale record on read: a persisted `Running` with no agent
    /// behind it can never be finalized, so the view demotes it to `Error`.
    /// Pure view-level correction; callers must not write the result back.
    pub fn correct_running_status(&mut self) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Error;
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, StatusDecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for the socket body / a history line. Infallible for this
    /// struct's shape; an encode failure is a bug.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            unreachable!("status record failed to serialize: {e}")
        })
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
