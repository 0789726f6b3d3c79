// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn pending_node_has_no_state() {
    let node = Node::pending("build");
    assert_eq!(node.name, "build");
    assert_eq!(node.status, NodeStatus::None);
    assert!(node.started_at.is_none());
    assert!(node.log.is_none());
}

#[test]
fn terminal_statuses() {
    assert!(!NodeStatus::None.is_terminal());
    assert!(!NodeStatus::Running.is_terminal());
    assert!(NodeStatus::Error.is_terminal());
    assert!(NodeStatus::Cancel.is_terminal());
    assert!(NodeStatus::Success.is_terminal());
    assert!(NodeStatus::Skipped.is_terminal());
}

#[test]
fn node_json_omits_unset_fields() {
    let json = serde_json::to_string(&Node::pending("step1")).unwrap();
    assert!(!json.contains("started_at"));
    assert!(!json.contains("error"));
}
