// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run loop: step execution, live status and persistence.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use dagr_core::{Node, NodeStatus, Pid, RunStatus, Status};
use dagr_history::{HistoryStore, Writer};
use dagr_sock::{Response, SockClient, SockServer};
use dagr_spec::{Dag, Step};

use crate::{AgentConfig, AgentError};

/// How long `restart` waits for the previous agent to release the socket.
const RESTART_DRAIN: Duration = Duration::from_secs(10);
const RESTART_POLL: Duration = Duration::from_millis(100);

/// One run of one DAG.
pub struct Agent {
    dag: Dag,
    config: AgentConfig,
    params: String,
}

impl Agent {
    /// Prepare a run. Without explicit params the spec's default params
    /// apply.
    pub fn new(dag: Dag, config: AgentConfig, params: Option<String>) -> Self {
        let params = params.unwrap_or_else(|| dag.default_params.clone());
        Self { dag, config, params }
    }

    /// Re-run a prior request with its params under a new request id.
    pub async fn retry(
        dag: Dag,
        config: AgentConfig,
        request_id: &str,
    ) -> Result<RunStatus, AgentError> {
        let store = HistoryStore::new(&config.data_dir);
        let prior = store.find_by_request_id(&dag.location, request_id)?;
        info!(dag = %dag.name, request_id, params = %prior.status.params, "retrying run");
        Self::new(dag, config, Some(prior.status.params)).run().await
    }

    /// Stop a live agent if one answers, wait for it to release the socket,
    /// then run again with the previous run's params.
    pub async fn restart(dag: Dag, config: AgentConfig) -> Result<RunStatus, AgentError> {
        let client = SockClient::new(dag.sock_addr());
        match client.request("POST", "/stop").await {
            Ok(_) => drain_socket(&client).await?,
            Err(e) if e.is_no_listener() => {}
            Err(e) => return Err(e.into()),
        }
        let store = HistoryStore::new(&config.data_dir);
        let params = store
            .read_recent(&dag.location, 1)
            .into_iter()
            .next()
            .map(|record| record.status.params);
        Self::new(dag, config, params).run().await
    }

    /// Execute the run to a terminal status. The returned status is also the
    /// last snapshot persisted to history.
    pub async fn run(self) -> Result<RunStatus, AgentError> {
        let addr = self.dag.sock_addr();

        // The socket is the mutual-exclusion point: binding over a live
        // agent would steal its address, so probe before replacing what may
        // be a stale file. A timeout still means something is attached.
        match SockClient::new(&addr).request("GET", "/status").await {
            Ok(_) => return Err(AgentError::StillRunning),
            Err(e) if e.is_timeout() => return Err(AgentError::StillRunning),
            Err(_) => {}
        }

        let request_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let store = HistoryStore::new(&self.config.data_dir);
        let mut writer = store.open(&self.dag.location, started_at, &request_id)?;

        let mut status = Status::empty(&self.dag.name);
        status.request_id = request_id.clone();
        status.status = RunStatus::Running;
        status.pid = Pid::from(std::process::id());
        status.started_at = Some(started_at);
        status.params = self.params.clone();
        status.nodes = self.dag.steps.iter().map(|s| Node::pending(&s.name)).collect();
        let shared = Arc::new(Mutex::new(status));

        let cancel = CancellationToken::new();
        let server = {
            let shared = Arc::clone(&shared);
            let cancel = cancel.clone();
            SockServer::bind(&addr, move |req| {
                match (req.method.as_str(), req.path.as_str()) {
                    ("GET", "/status") => Response::ok(shared.lock().to_json()),
                    ("POST", "/stop") => {
                        cancel.cancel();
                        Response::ok("")
                    }
                    _ => Response::not_found(),
                }
            })
            .map_err(|source| AgentError::Bind { addr: addr.clone(), source })?
        };
        let server_cancel = server.cancel_token();
        let server_task = tokio::spawn(server.serve());

        info!(dag = %self.dag.name, %request_id, params = %self.params, "run started");
        persist(&mut writer, &shared)?;

        let final_status = match self.run_steps(&shared, &mut writer, &cancel).await {
            Ok(status) => status,
            Err(e) => {
                // Release the socket before surfacing the failure so the DAG
                // does not look alive afterwards.
                server_cancel.cancel();
                let _ = server_task.await;
                return Err(e);
            }
        };

        {
            let mut st = shared.lock();
            st.status = final_status;
            st.finished_at = Some(Utc::now());
            st.pid = Pid::not_running();
        }
        persist(&mut writer, &shared)?;
        writer.close()?;

        server_cancel.cancel();
        let _ = server_task.await;

        info!(dag = %self.dag.name, %request_id, status = %final_status, "run finished");
        Ok(final_status)
    }

    /// Walk the steps in spec order. Returns the run's terminal status.
    async fn run_steps(
        &self,
        shared: &Arc<Mutex<Status>>,
        writer: &mut Writer,
        cancel: &CancellationToken,
    ) -> Result<RunStatus, AgentError> {
        for (idx, step) in self.dag.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                self.mark_cancelled_from(shared, idx);
                persist(writer, shared)?;
                return Ok(RunStatus::Cancel);
            }

            let log_path = self.step_log_path(step)?;
            {
                let mut st = shared.lock();
                st.nodes[idx].status = NodeStatus::Running;
                st.nodes[idx].started_at = Some(Utc::now());
                st.nodes[idx].log = Some(log_path.clone());
            }
            persist(writer, shared)?;

            let outcome = execute_step(step, &log_path, cancel).await;
            {
                let mut st = shared.lock();
                let node = &mut st.nodes[idx];
                node.finished_at = Some(Utc::now());
                match &outcome {
                    StepOutcome::Success => node.status = NodeStatus::Success,
                    StepOutcome::Failed(reason) => {
                        node.status = NodeStatus::Error;
                        node.error = Some(reason.clone());
                    }
                    StepOutcome::Cancelled => node.status = NodeStatus::Cancel,
                }
            }
            persist(writer, shared)?;

            match outcome {
                StepOutcome::Success => {}
                StepOutcome::Failed(reason) => {
                    warn!(dag = %self.dag.name, step = %step.name, %reason, "step failed");
                    return Ok(RunStatus::Error);
                }
                StepOutcome::Cancelled => {
                    self.mark_cancelled_from(shared, idx + 1);
                    persist(writer, shared)?;
                    return Ok(RunStatus::Cancel);
                }
            }
        }
        Ok(RunStatus::Success)
    }

    /// Mark every node from `from` onwards as cancelled.
    fn mark_cancelled_from(&self, shared: &Arc<Mutex<Status>>, from: usize) {
        let mut st = shared.lock();
        for node in st.nodes.iter_mut().skip(from) {
            if !node.status.is_terminal() {
                node.status = NodeStatus::Cancel;
            }
        }
    }

    fn step_log_path(&self, step: &Step) -> Result<PathBuf, AgentError> {
        let dir = self.config.log_dir.join(&self.dag.name);
        std::fs::create_dir_all(&dir).map_err(|source| AgentError::Io {
            context: "failed to create",
            path: dir.clone(),
            source,
        })?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        Ok(dir.join(format!("{}.{stamp}.log", step.name)))
    }
}

enum StepOutcome {
    Success,
    Failed(String),
    Cancelled,
}

/// Run one step's command to completion, capturing output to `log_path`.
///
/// The child gets its own process group; on cancellation the whole group is
/// killed so grandchildren do not linger.
async fn execute_step(
    step: &Step,
    log_path: &std::path::Path,
    cancel: &CancellationToken,
) -> StepOutcome {
    let log = match std::fs::File::create(log_path) {
        Ok(log) => log,
        Err(e) => return StepOutcome::Failed(format!("failed to create step log: {e}")),
    };
    let stderr = match log.try_clone() {
        Ok(clone) => clone,
        Err(e) => return StepOutcome::Failed(format!("failed to clone step log: {e}")),
    };

    let mut cmd = Command::new(&step.command);
    cmd.args(&step.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr))
        .process_group(0)
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return StepOutcome::Failed(format!("failed to spawn {:?}: {e}", step.command)),
    };

    tokio::select! {
        waited = child.wait() => match waited {
            Ok(exit) if exit.success() => StepOutcome::Success,
            Ok(exit) => StepOutcome::Failed(format!("command exited with {exit}")),
            Err(e) => StepOutcome::Failed(format!("failed to wait on {:?}: {e}", step.command)),
        },
        _ = cancel.cancelled() => {
            if let Some(pid) = child.id() {
                // SAFETY: `pid` is the live id of a child this task owns
                // exclusively, spawned with process_group(0), so the negated
                // value names a process group we are allowed to signal.
                // kill(2) only sends a signal, no memory is touched.
                unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
            }
            let _ = child.wait().await;
            StepOutcome::Cancelled
        }
    }
}

/// Append the current snapshot to the run's history record.
fn persist(writer: &mut Writer, shared: &Arc<Mutex<Status>>) -> Result<(), AgentError> {
    let snapshot = shared.lock().clone();
    writer.write(&snapshot)?;
    Ok(())
}

/// Poll until the previous agent's socket stops answering.
async fn drain_socket(client: &SockClient) -> Result<(), AgentError> {
    let deadline = tokio::time::Instant::now() + RESTART_DRAIN;
    loop {
        match client.request("GET", "/status").await {
            Err(e) if e.is_no_listener() => return Ok(()),
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }
        if tokio::time::Instant::now() >= deadline {
            error!("previous agent did not release its socket");
            return Err(AgentError::StillRunning);
        }
        tokio::time::sleep(RESTART_POLL).await;
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
