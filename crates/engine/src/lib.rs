// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The DAG execution control plane.
//!
//! [`Engine`] sits between operators (CLI handlers) and the agent processes
//! that own individual runs. Reads fan out to the live agent socket and the
//! durable history, merged into one canonical [`Status`](dagr_core::Status);
//! mutations go through the run supervisor and the history store. The
//! catalog side enumerates, greps and renames DAG spec files.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod catalog;
mod engine;
mod grep;
mod supervisor;

pub use catalog::DagEntry;
pub use engine::{Engine, EngineConfig, EngineFactory};
pub use grep::GrepResult;
pub use supervisor::{SpawnError, Supervisor};

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to operators.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a DAG spec must be a yaml file with the .{} extension", dagr_spec::SPEC_EXTENSION)]
    BadExtension { path: PathBuf },

    #[error("the spec file {path} already exists")]
    AlreadyExists { path: PathBuf },

    #[error("the spec file {path} does not exist")]
    NotFound { path: PathBuf },

    /// The targeted run is live; retroactive edits apply to finalized runs
    /// only.
    #[error("the DAG is running (request id {request_id:?})")]
    RunIsActive { request_id: String },

    #[error(transparent)]
    InvalidSpec(#[from] dagr_spec::LoadError),

    #[error(transparent)]
    History(#[from] dagr_history::HistoryError),

    #[error(transparent)]
    Sock(#[from] dagr_sock::SockError),

    #[error("invalid status payload from agent: {0}")]
    Status(#[from] dagr_core::StatusDecodeError),

    #[error("runner process failed: {0}")]
    Spawn(#[from] SpawnError),

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// True when the error only says "no agent is listening" — the CLI
    /// renders that as "already stopped" for `stop`.
    pub fn is_no_listener(&self) -> bool {
        matches!(self, EngineError::Sock(e) if e.is_no_listener())
    }
}
