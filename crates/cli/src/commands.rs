// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin translators from CLI verbs into agent and engine operations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use dagr_agent::{Agent, AgentConfig};
use dagr_core::RunStatus;
use dagr_engine::{Engine, EngineConfig, EngineFactory};
use dagr_spec::Dag;

use crate::{Command, Home};

pub(crate) async fn dispatch(command: Command, home: &Home) -> anyhow::Result<()> {
    match command {
        Command::Start { params, dag } => {
            let status = Agent::new(load_dag(&dag)?, agent_config(home), params).run().await?;
            finish(status)
        }
        Command::Retry { req, dag } => {
            let status = Agent::retry(load_dag(&dag)?, agent_config(home), &req).await?;
            finish(status)
        }
        Command::Restart { dag } => {
            let status = Agent::restart(load_dag(&dag)?, agent_config(home)).await?;
            finish(status)
        }
        Command::Stop { dag } => stop(&engine(home)?, &load_dag(&dag)?).await,
        Command::Status { dag, recent } => status(&engine(home)?, &load_dag(&dag)?, recent).await,
        Command::List => list(&engine(home)?, &home.dags_dir()),
        Command::Grep { pattern } => grep(&engine(home)?, &home.dags_dir(), &pattern),
        Command::Create { path } => {
            let path = in_dags_dir(home, &path);
            engine(home)?.create_dag(&path)?;
            println!("created {}", path.display());
            Ok(())
        }
        Command::Rename { old, new } => {
            let (old, new) = (in_dags_dir(home, &old), in_dags_dir(home, &new));
            engine(home)?.move_dag(&old, &new)?;
            println!("renamed {} -> {}", old.display(), new.display());
            Ok(())
        }
        Command::Remove { dag } => {
            // A broken spec must still be removable; fall back to a
            // placeholder when it no longer parses.
            let path = std::fs::canonicalize(&dag)
                .with_context(|| format!("no spec file at {}", dag.display()))?;
            let dag = dagr_spec::load(&path).unwrap_or_else(|_| Dag::placeholder(&path));
            engine(home)?.delete_dag(&dag)?;
            println!("removed {}", dag.location.display());
            Ok(())
        }
        Command::Suspend { dag, off } => {
            let dag = load_dag(&dag)?;
            engine(home)?.toggle_suspend(&dag, !off)?;
            println!("{} {}", if off { "resumed" } else { "suspended" }, dag.name);
            Ok(())
        }
    }
}

fn engine(home: &Home) -> anyhow::Result<Engine> {
    let config = EngineConfig {
        dags_dir: home.dags_dir(),
        data_dir: home.data_dir(),
        log_dir: home.log_dir(),
        runner_bin: std::env::current_exe().context("failed to locate the runner binary")?,
        work_dir: std::env::current_dir().context("failed to resolve the working directory")?,
    };
    Ok(EngineFactory::new(config).create())
}

fn agent_config(home: &Home) -> AgentConfig {
    AgentConfig { data_dir: home.data_dir(), log_dir: home.log_dir() }
}

/// Load a spec by path, resolving it to a stable absolute location so the
/// socket address and history key match what other invocations compute.
fn load_dag(path: &Path) -> anyhow::Result<Dag> {
    let canonical = std::fs::canonicalize(path)
        .with_context(|| format!("no spec file at {}", path.display()))?;
    Ok(dagr_spec::load(&canonical)?)
}

/// Bare names are a convenience for specs living in the catalog directory.
fn in_dags_dir(home: &Home, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        home.dags_dir().join(path)
    }
}

/// Exit non-zero unless the run succeeded, so supervisors joining this
/// process observe the run's outcome.
fn finish(status: RunStatus) -> anyhow::Result<()> {
    match status {
        RunStatus::Success => Ok(()),
        other => bail!("run finished with status {other}"),
    }
}

async fn stop(engine: &Engine, dag: &Dag) -> anyhow::Result<()> {
    match engine.stop(dag).await {
        Ok(()) => {
            println!("stop requested for {}", dag.name);
            Ok(())
        }
        Err(e) if e.is_no_listener() => {
            println!("{} is already stopped", dag.name);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn status(engine: &Engine, dag: &Dag, recent: usize) -> anyhow::Result<()> {
    if recent > 0 {
        for record in engine.get_recent_statuses(dag, recent) {
            let st = record.status;
            println!(
                "{}  {}  started={}  params={:?}",
                st.request_id,
                st.status,
                st.started_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".into()),
                st.params,
            );
        }
        return Ok(());
    }

    let st = engine.get_last_status(dag).await?;
    println!("name:       {}", st.name);
    println!("status:     {}", st.status);
    if !st.request_id.is_empty() {
        println!("request id: {}", st.request_id);
    }
    if st.pid.is_running() {
        println!("pid:        {}", st.pid.0);
    }
    if !st.params.is_empty() {
        println!("params:     {}", st.params);
    }
    for node in &st.nodes {
        println!("  step {:<20} {}", node.name, node.status);
    }
    Ok(())
}

fn list(engine: &Engine, dags_dir: &Path) -> anyhow::Result<()> {
    let (entries, soft_errors) = engine.read_all_status(dags_dir)?;
    for entry in entries {
        let marker = if entry.suspended { " [suspended]" } else { "" };
        match &entry.error {
            Some(error) => println!("{:<24} broken: {error}", entry.dag.name),
            None => println!("{:<24} {}{marker}", entry.dag.name, entry.status.status),
        }
    }
    for error in soft_errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}

fn grep(engine: &Engine, dags_dir: &Path, pattern: &str) -> anyhow::Result<()> {
    let (results, soft_errors) = engine.grep_dags(dags_dir, pattern)?;
    for result in results {
        println!("{}:", result.name);
        for (line_no, line) in &result.matched {
            println!("  {line_no:>4}: {line}");
        }
    }
    for error in soft_errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}
