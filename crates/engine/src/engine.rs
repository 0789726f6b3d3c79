// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine facade and status reconciliation.
//!
//! The system has two sources of truth for a run — the live agent socket and
//! the durable history — with a one-way hazard: a crashed agent leaves a
//! persisted `Running` record nobody will finalize. The read paths here
//! localize that hazard: they repair the view without mutating storage, and
//! writes happen only through explicit operator intent.

use std::path::{Path, PathBuf};

use tracing::info;

use dagr_core::{RunStatus, Status};
use dagr_history::{HistoryError, HistoryStore, StatusFile, Writer};
use dagr_sock::SockClient;
use dagr_spec::Dag;

use crate::{EngineError, Supervisor};

/// Configuration injected at construction. The engine consults no
/// environment variables and keeps no process-wide state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding DAG spec files.
    pub dags_dir: PathBuf,
    /// Root of the history store.
    pub data_dir: PathBuf,
    /// Root for per-step agent logs.
    pub log_dir: PathBuf,
    /// The runner binary spawned for each run.
    pub runner_bin: PathBuf,
    /// Working directory for spawned runners.
    pub work_dir: PathBuf,
}

/// Factory for [`Engine`] instances.
pub struct EngineFactory {
    config: EngineConfig,
}

impl EngineFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn create(&self) -> Engine {
        Engine {
            history: HistoryStore::new(&self.config.data_dir),
            supervisor: Supervisor::new(&self.config.runner_bin, &self.config.work_dir),
            config: self.config.clone(),
        }
    }
}

/// The operator-facing control plane: status reconciliation, run lifecycle
/// and the spec catalog, behind one object.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) history: HistoryStore,
    supervisor: Supervisor,
}

impl Engine {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn client(&self, dag: &Dag) -> SockClient {
        SockClient::new(dag.sock_addr())
    }

    // === Reconciled reads ===

    /// What is happening right now.
    ///
    /// A live agent's answer is authoritative. No listener means no run, so
    /// the synthetic `None` status comes back without error. A timeout is
    /// *not* "no agent": the agent is alive but wedged, and the error
    /// propagates rather than lying with a synthetic value.
    pub async fn get_status(&self, dag: &Dag) -> Result<Status, EngineError> {
        match self.client(dag).request("GET", "/status").await {
            Ok(body) => Ok(Status::from_json(body.as_bytes())?),
            Err(e) if e.is_timeout() => Err(e.into()),
            Err(_) => Ok(Status::empty(&dag.name)),
        }
    }

    /// Best-known state, live or historical.
    ///
    /// Falls back to today's durable record when no agent is listening,
    /// demoting a stale `Running` on the way out (the record itself is not
    /// touched). No history at all yields the synthetic `None`.
    pub async fn get_last_status(&self, dag: &Dag) -> Result<Status, EngineError> {
        match self.client(dag).request("GET", "/status").await {
            Ok(body) => Ok(Status::from_json(body.as_bytes())?),
            Err(e) if e.is_timeout() => Err(e.into()),
            Err(_) => match self.history.read_status_today(&dag.location) {
                Ok(mut status) => {
                    status.correct_running_status();
                    Ok(status)
                }
                Err(HistoryError::NoStatusData | HistoryError::NoStatusDataToday) => {
                    Ok(Status::empty(&dag.name))
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Durable record for one run, cross-checked against the live agent.
    ///
    /// If an agent is live but owns a *different* request id, the requested
    /// run cannot be the active one, so its record is demoted on the way
    /// out.
    pub async fn get_status_by_request_id(
        &self,
        dag: &Dag,
        request_id: &str,
    ) -> Result<Status, EngineError> {
        let record = self.history.find_by_request_id(&dag.location, request_id)?;
        let mut status = record.status;
        if let Ok(live) = self.get_status(dag).await {
            if live.request_id != request_id {
                status.correct_running_status();
            }
        }
        Ok(status)
    }

    /// The newest `n` durable records, newest first.
    pub fn get_recent_statuses(&self, dag: &Dag, n: usize) -> Vec<StatusFile> {
        self.history.read_recent(&dag.location, n)
    }

    // === Run lifecycle ===

    /// Run the DAG and wait for the agent to exit; the child's exit error is
    /// the caller's.
    pub async fn start(&self, dag: &Dag, params: &str) -> Result<(), EngineError> {
        Ok(self.supervisor.start(dag, params).await?)
    }

    /// Fire-and-forget start; spawn failures are logged, never returned.
    pub fn start_async(&self, dag: &Dag, params: &str) {
        self.supervisor.start_async(dag, params);
    }

    /// Re-run a prior request under a fresh agent and request id.
    pub async fn retry(&self, dag: &Dag, request_id: &str) -> Result<(), EngineError> {
        Ok(self.supervisor.retry(dag, request_id).await?)
    }

    /// Stop-and-rerun, joined like [`start`](Engine::start).
    pub async fn restart(&self, dag: &Dag) -> Result<(), EngineError> {
        Ok(self.supervisor.restart(dag).await?)
    }

    /// Ask the live agent to shut down gracefully. Idempotent: with no agent
    /// listening this returns a `NoListener` error, which callers render as
    /// "already stopped".
    pub async fn stop(&self, dag: &Dag) -> Result<(), EngineError> {
        self.client(dag).request("POST", "/stop").await?;
        Ok(())
    }

    // === Retroactive edits ===

    /// Overwrite a finalized run's history record.
    ///
    /// Guarded: editing the *live* run is rejected, and a timeout from the
    /// agent also rejects, since liveness cannot be disproved.
    pub async fn update_status(&self, dag: &Dag, status: &Status) -> Result<(), EngineError> {
        match self.client(dag).request("GET", "/status").await {
            Err(e) if e.is_timeout() => return Err(e.into()),
            Err(_) => {}
            Ok(body) => {
                if let Ok(live) = Status::from_json(body.as_bytes()) {
                    if live.request_id == status.request_id && live.status == RunStatus::Running {
                        return Err(EngineError::RunIsActive {
                            request_id: status.request_id.clone(),
                        });
                    }
                }
            }
        }

        let record = self.history.find_by_request_id(&dag.location, &status.request_id)?;
        let mut writer = Writer::open(&record.file)?;
        writer.write(status)?;
        writer.close()?;
        info!(dag = %dag.name, request_id = %status.request_id, "history record updated");
        Ok(())
    }

    /// Replace a spec file's contents after validating them.
    ///
    /// The target must already exist (`create_dag` makes new ones); the
    /// write is atomic. No live agent is consulted; agents load their spec
    /// at spawn time and are unaffected mid-run.
    pub fn update_dag_spec(&self, dag: &Dag, spec: &[u8]) -> Result<(), EngineError> {
        dagr_spec::load_data(spec)?;
        if !dag.location.exists() {
            return Err(EngineError::NotFound { path: dag.location.clone() });
        }
        atomic_write(&dag.location, spec)
    }
}

/// Write via a sibling temp file + rename so readers never see a torn spec.
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, bytes).map_err(|source| EngineError::Io {
        context: "failed to write",
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| EngineError::Io {
        context: "failed to replace",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
