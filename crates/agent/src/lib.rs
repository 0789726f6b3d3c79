// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent: owner of one DAG run.
//!
//! An agent is a child process spawned by the run supervisor. For its
//! lifetime it owns the DAG's socket (the synchronization point for "is this
//! DAG running?"), executes steps in spec order, and persists a status
//! snapshot to history on every transition. Operators talk to it only
//! through `GET /status` and `POST /stop`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod run;

use std::path::PathBuf;

use thiserror::Error;

pub use run::Agent;

/// Where the agent persists run state.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Root of the history store (same layout the engine reads).
    pub data_dir: PathBuf,
    /// Root for per-step log files.
    pub log_dir: PathBuf,
}

/// Errors that prevent a run from starting or finishing cleanly.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    History(#[from] dagr_history::HistoryError),

    #[error(transparent)]
    Sock(#[from] dagr_sock::SockError),

    #[error("failed to bind agent socket {addr}: {source}")]
    Bind {
        addr: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("a previous agent is still holding the DAG socket")]
    StillRunning,

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
