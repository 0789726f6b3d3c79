// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML spec parsing and validation.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{name_from_path, Dag, Step};

/// Errors from loading a DAG spec.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid spec: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid spec: {0}")]
    InvalidSpec(String),
}

/// Raw YAML shape, permissive on extra keys.
#[derive(Debug, Deserialize)]
struct RawDag {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    params: Option<String>,
    #[serde(default)]
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    depends: Option<Vec<String>>,
}

/// Load and fully validate a spec file.
pub fn load(path: &Path) -> Result<Dag, LoadError> {
    let content = read(path)?;
    parse(&content, path, false)
}

/// Cheap catalog load: headers and step names, no command validation.
pub fn load_head(path: &Path) -> Result<Dag, LoadError> {
    let content = read(path)?;
    parse(&content, path, true)
}

/// Validate raw spec bytes with no backing file.
pub fn load_data(bytes: &[u8]) -> Result<Dag, LoadError> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| LoadError::InvalidSpec(format!("spec is not UTF-8: {e}")))?;
    parse(content, Path::new(""), false)
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse(content: &str, location: &Path, head_only: bool) -> Result<Dag, LoadError> {
    let raw: RawDag = serde_yaml::from_str(content)?;

    let name = match raw.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => name_from_path(location),
    };

    let raw_steps = raw.steps.unwrap_or_default();
    if !head_only && raw_steps.is_empty() {
        return Err(LoadError::InvalidSpec("spec has no steps".into()));
    }

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (idx, raw_step) in raw_steps.into_iter().enumerate() {
        let step_name = match raw_step.name {
            Some(name) if !name.trim().is_empty() => name,
            _ if head_only => format!("step{}", idx + 1),
            _ => {
                return Err(LoadError::InvalidSpec(format!("step {} has no name", idx + 1)));
            }
        };

        let (command, args) = match raw_step.command.as_deref() {
            Some(command) if !command.trim().is_empty() => split_command(command),
            _ if head_only => (String::new(), Vec::new()),
            _ => {
                return Err(LoadError::InvalidSpec(format!(
                    "step {step_name:?} has no command"
                )));
            }
        };

        steps.push(Step {
            name: step_name,
            command,
            args,
            depends: raw_step.depends.unwrap_or_default(),
        });
    }

    if !head_only {
        for step in &steps {
            for dep in &step.depends {
                if !steps.iter().any(|s| &s.name == dep) {
                    return Err(LoadError::InvalidSpec(format!(
                        "step {:?} depends on unknown step {dep:?}",
                        step.name
                    )));
                }
            }
        }
    }

    Ok(Dag {
        location: location.to_path_buf(),
        name,
        steps,
        default_params: raw.params.unwrap_or_default(),
    })
}

/// Split a spec `command:` string into executable + args on whitespace.
fn split_command(command: &str) -> (String, Vec<String>) {
    let mut tokens = command.split_whitespace().map(str::to_string);
    let head = tokens.next().unwrap_or_default();
    (head, tokens.collect())
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
