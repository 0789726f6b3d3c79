// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step node state within a run.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not started
    None,
    /// Command process is running
    Running,
    /// Command exited non-zero or failed to spawn
    Error,
    /// Run was stopped before or during this step
    Cancel,
    /// Command exited zero
    Success,
    /// Skipped by a precondition
    Skipped,
}

impl NodeStatus {
    /// Check if this node has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeStatus::Error | NodeStatus::Cancel | NodeStatus::Success | NodeStatus::Skipped
        )
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeStatus::None => "none",
            NodeStatus::Running => "running",
            NodeStatus::Error => "error",
            NodeStatus::Cancel => "cancel",
            NodeStatus::Success => "success",
            NodeStatus::Skipped => "skipped",
        })
    }
}

/// State of one step within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Step name from the spec
    pub name: String,
    pub status: NodeStatus,
    /// Path to the step's captured output, once it has started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<PathBuf>,
    /// Times this step has been re-attempted within the run
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Node {
    /// A node that has not started yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: NodeStatus::None,
            log: None,
            retry_count: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
