// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DAG spec files and their loader.
//!
//! A DAG is a YAML file naming a sequence of steps with command invocations
//! and precedence edges. [`load`] parses and validates the whole spec,
//! [`load_head`] is the cheap catalog variant (headers and step names only),
//! [`load_data`] validates raw bytes with no backing file.

mod loader;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub use loader::{load, load_data, load_head, LoadError};

/// File extension DAG specs must carry.
pub const SPEC_EXTENSION: &str = "yaml";

/// One step of a DAG: a command invocation plus precedence edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    /// Executable, split from the spec's `command:` string.
    pub command: String,
    /// Remaining whitespace-separated tokens of `command:`.
    pub args: Vec<String>,
    /// Names of steps that must finish before this one starts.
    pub depends: Vec<String>,
}

/// A parsed DAG spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dag {
    /// Absolute path of the spec file. Empty for specs parsed from raw bytes.
    pub location: PathBuf,
    /// Human name, defaulting to the file stem.
    pub name: String,
    pub steps: Vec<Step>,
    /// Parameter string applied when a run is started without explicit params.
    pub default_params: String,
}

impl Dag {
    /// A name-only placeholder for a spec that failed to load, so catalog
    /// rows can still render the broken entry.
    pub fn placeholder(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        Self {
            name: name_from_path(&location),
            location,
            steps: Vec::new(),
            default_params: String::new(),
        }
    }

    /// The local socket address a live agent for this DAG listens on.
    pub fn sock_addr(&self) -> PathBuf {
        sock_addr(&self.location)
    }
}

/// Derive the per-DAG agent socket path from the spec file location.
///
/// Deterministic in the location: two DAGs at the same path share the
/// address, two DAGs at different paths never collide. The name segment is
/// capped and the path hashed so the result stays under `SUN_LEN`.
pub fn sock_addr(location: &Path) -> PathBuf {
    let name: String = name_from_path(location).chars().take(32).collect();
    let digest = Sha256::digest(location.to_string_lossy().as_bytes());
    let hash: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    std::env::temp_dir().join(format!("@dagr-{name}-{hash}.sock"))
}

/// DAG name for a spec path: the file stem.
pub fn name_from_path(location: &Path) -> String {
    location
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check a path against the spec extension invariant.
pub fn has_spec_extension(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(SPEC_EXTENSION)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
