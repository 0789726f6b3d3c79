// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Regex grep over spec files, with context lines.

use std::collections::BTreeMap;

use regex::Regex;

use dagr_spec::Dag;

/// Lines of context reported around each match.
pub(crate) const GREP_CONTEXT: usize = 2;

/// A spec file with at least one match.
#[derive(Debug, Clone)]
pub struct GrepResult {
    /// Spec file name (basename).
    pub name: String,
    /// Head-only load of the matching spec.
    pub dag: Dag,
    /// Matched and context lines, keyed by 1-based line number.
    pub matched: BTreeMap<usize, String>,
}

/// Collect matching lines plus `context` lines around each, keyed by 1-based
/// line number. Overlapping context windows merge via the map.
pub(crate) fn grep_lines(
    content: &str,
    pattern: &Regex,
    context: usize,
) -> BTreeMap<usize, String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut matched = BTreeMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if !pattern.is_match(line) {
            continue;
        }
        let from = idx.saturating_sub(context);
        let to = (idx + context).min(lines.len().saturating_sub(1));
        for ctx_idx in from..=to {
            matched.insert(ctx_idx + 1, lines[ctx_idx].to_string());
        }
    }
    matched
}

#[cfg(test)]
#[path = "grep_tests.rs"]
mod tests;
