// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::NodeStatus;

#[test]
fn empty_status_is_the_synthetic_none_value() {
    let st = Status::empty("demo");
    assert_eq!(st.status, RunStatus::None);
    assert_eq!(st.pid, Pid::not_running());
    assert!(st.request_id.is_empty());
    assert!(st.nodes.is_empty());
}

#[test]
fn correct_running_status_demotes_only_running() {
    let mut st = Status::empty("demo");
    st.status = RunStatus::Running;
    st.correct_running_status();
    assert_eq!(st.status, RunStatus::Error);

    for status in [RunStatus::None, RunStatus::Cancel, RunStatus::Success, RunStatus::Error] {
        let mut st = Status::empty("demo");
        st.status = status;
        st.correct_running_status();
        assert_eq!(st.status, status, "{status} must not be rewritten");
    }
}

#[test]
fn decodes_a_live_agent_payload() {
    let mut st = Status::empty("demo");
    st.request_id = "req-1".into();
    st.status = RunStatus::Running;
    st.pid = Pid(4242);
    st.params = "x y z".into();
    st.nodes.push(Node::pending("step1"));

    let decoded = Status::from_json(st.to_json().as_bytes()).unwrap();
    assert_eq!(decoded, st);
    assert_eq!(decoded.nodes[0].status, NodeStatus::None);
}

#[test]
fn rejects_garbage_payloads() {
    assert!(Status::from_json(b"not json").is_err());
    assert!(Status::from_json(b"{\"status\": \"running\"}").is_err());
}

#[test]
fn pid_sentinel_is_not_running() {
    assert!(!Pid::not_running().is_running());
    assert!(Pid(1).is_running());
    assert!(!Pid(0).is_running());
}
