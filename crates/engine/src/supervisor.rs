// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning and joining DAG agent processes.
//!
//! Every child goes into its own process group so that stopping the control
//! plane never cascades into running agents, and so a stop can target the
//! whole group. Children inherit the parent environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info};

use dagr_spec::Dag;

/// How long `retry` waits for the fresh agent to bind its socket before
/// returning, so an immediately following status read observes it.
/// Best-effort warmup, not a correctness guarantee.
const RETRY_WARMUP: Duration = Duration::from_millis(500);

/// Errors from running the agent binary.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to spawn {bin}: {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("runner exited with {0}")]
    Exit(std::process::ExitStatus),
}

/// Spawns the runner binary for one DAG's lifecycle verbs.
#[derive(Debug, Clone)]
pub struct Supervisor {
    bin: PathBuf,
    work_dir: PathBuf,
}

impl Supervisor {
    pub fn new(bin: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into(), work_dir: work_dir.into() }
    }

    /// Run the DAG synchronously: spawn `start` and wait for the child, so
    /// the caller sees the run's exit error. Callers needing fire-and-forget
    /// semantics use [`start_async`](Supervisor::start_async).
    pub async fn start(&self, dag: &Dag, params: &str) -> Result<(), SpawnError> {
        let mut args: Vec<String> = vec!["start".into()];
        if !params.is_empty() {
            args.push(format!("--params={params}"));
        }
        self.run_to_exit(&args, &dag.location).await
    }

    /// Fire-and-forget `start`: the child is owned by a background task and
    /// failures are logged, never returned.
    pub fn start_async(&self, dag: &Dag, params: &str) {
        let this = self.clone();
        let dag = dag.clone();
        let params = params.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.start(&dag, &params).await {
                error!(dag = %dag.name, error = %e, "starting a DAG failed");
            }
        });
    }

    /// Spawn a fresh agent re-running the referenced request, then give it a
    /// moment to come up. The new run gets its own request id and record.
    pub async fn retry(&self, dag: &Dag, request_id: &str) -> Result<(), SpawnError> {
        let args: Vec<String> = vec!["retry".into(), format!("--req={request_id}")];
        let this = self.clone();
        let location = dag.location.clone();
        let name = dag.name.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_to_exit(&args, &location).await {
                error!(dag = %name, error = %e, "retrying a DAG failed");
            }
        });
        tokio::time::sleep(RETRY_WARMUP).await;
        Ok(())
    }

    /// Synchronous `restart`: stop-and-rerun handled by the agent verb.
    pub async fn restart(&self, dag: &Dag) -> Result<(), SpawnError> {
        self.run_to_exit(&["restart".to_string()], &dag.location).await
    }

    async fn run_to_exit(&self, args: &[String], dag_path: &Path) -> Result<(), SpawnError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .arg(dag_path)
            .current_dir(&self.work_dir)
            .process_group(0);

        info!(bin = %self.bin.display(), ?args, dag = %dag_path.display(), "spawning runner");
        let status = cmd
            .status()
            .await
            .map_err(|source| SpawnError::Spawn { bin: self.bin.clone(), source })?;
        if !status.success() {
            return Err(SpawnError::Exit(status));
        }
        Ok(())
    }
}
