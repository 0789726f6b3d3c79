// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dagr` — operator CLI and runner binary.
//!
//! The same binary serves both roles: operators use it to inspect and manage
//! runs, and the run supervisor spawns it with the runner verbs (`start`,
//! `retry`, `restart`) to own a run as an agent process.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dagr", about = "DAG batch workflow runner", version)]
struct Cli {
    /// Root directory for specs, history and logs.
    /// Defaults to $DAGR_HOME, then ~/.dagr.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a DAG and wait for it to finish (runner verb).
    Start {
        /// Parameter string recorded with the run.
        #[arg(long)]
        params: Option<String>,
        dag: PathBuf,
    },

    /// Re-run a prior request with its params (runner verb).
    Retry {
        /// Request id of the run to repeat.
        #[arg(long)]
        req: String,
        dag: PathBuf,
    },

    /// Stop a live run if any, then run again (runner verb).
    Restart { dag: PathBuf },

    /// Ask a live run to shut down gracefully.
    Stop { dag: PathBuf },

    /// Show the best-known status of a DAG, live or historical.
    Status {
        dag: PathBuf,
        /// Show recent run history instead of the latest status.
        #[arg(long, default_value_t = 0)]
        recent: usize,
    },

    /// List all DAGs in the catalog.
    List,

    /// Search spec files with a case-insensitive regex.
    Grep { pattern: String },

    /// Create a new spec file from the minimal template.
    Create { path: PathBuf },

    /// Rename a spec file and migrate its run history.
    Rename { old: PathBuf, new: PathBuf },

    /// Delete a spec file. History is retained.
    Remove { dag: PathBuf },

    /// Suspend or resume a DAG in the catalog.
    Suspend {
        dag: PathBuf,
        /// Clear the suspend flag instead of setting it.
        #[arg(long)]
        off: bool,
    },
}

/// Resolved filesystem layout under the home directory.
struct Home {
    root: PathBuf,
}

impl Home {
    fn resolve(flag: Option<PathBuf>) -> anyhow::Result<Self> {
        let root = match flag {
            Some(root) => root,
            None => match std::env::var_os("DAGR_HOME") {
                Some(root) => PathBuf::from(root),
                None => {
                    let home = std::env::var_os("HOME")
                        .context("neither --home, $DAGR_HOME nor $HOME is set")?;
                    PathBuf::from(home).join(".dagr")
                }
            },
        };
        Ok(Self { root })
    }

    fn dags_dir(&self) -> PathBuf {
        self.root.join("dags")
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let home = Home::resolve(cli.home)?;
    commands::dispatch(cli.command, &home).await
}
