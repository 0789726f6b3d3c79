// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

fn sock_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("agent.sock")
}

#[tokio::test]
async fn request_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let addr = sock_path(&dir);

    let server = SockServer::bind(&addr, |req| match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/status") => Response::ok("{\"live\":true}"),
        _ => Response::not_found(),
    })
    .unwrap();
    let cancel = server.cancel_token();
    let task = tokio::spawn(server.serve());

    let body = SockClient::new(&addr).request("GET", "/status").await.unwrap();
    assert_eq!(body, "{\"live\":true}");

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn unknown_path_collapses_to_no_listener() {
    let dir = tempfile::tempdir().unwrap();
    let addr = sock_path(&dir);

    let server = SockServer::bind(&addr, |_| Response::not_found()).unwrap();
    let cancel = server.cancel_token();
    let task = tokio::spawn(server.serve());

    let err = SockClient::new(&addr).request("GET", "/nope").await.unwrap_err();
    assert!(err.is_no_listener());

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn missing_socket_is_no_listener() {
    let dir = tempfile::tempdir().unwrap();
    let err = SockClient::new(sock_path(&dir)).request("GET", "/status").await.unwrap_err();
    assert!(err.is_no_listener());
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn wedged_agent_is_a_timeout_not_no_listener() {
    let dir = tempfile::tempdir().unwrap();
    let addr = sock_path(&dir);

    // Accepts connections but never answers.
    let listener = tokio::net::UnixListener::bind(&addr).unwrap();
    let task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { break };
            // Hold the connection open without reading or writing.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        }
    });

    let client = SockClient::new(&addr).with_timeout(Duration::from_millis(100));
    let err = client.request("GET", "/status").await.unwrap_err();
    assert!(err.is_timeout(), "got {err}");

    task.abort();
}

#[tokio::test]
async fn shutdown_removes_the_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let addr = sock_path(&dir);

    let server = SockServer::bind(&addr, |_| Response::ok("")).unwrap();
    let cancel = server.cancel_token();
    let task = tokio::spawn(server.serve());
    assert!(addr.exists());

    cancel.cancel();
    task.await.unwrap();
    assert!(!addr.exists());

    // A client probing after shutdown sees "no agent".
    let err = SockClient::new(&addr).request("GET", "/status").await.unwrap_err();
    assert!(err.is_no_listener());
}

#[tokio::test]
async fn bind_replaces_a_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let addr = sock_path(&dir);

    // A dead agent's socket file.
    let first = SockServer::bind(&addr, |_| Response::ok("")).unwrap();
    drop(first);
    // No serve() ran, so the path may linger; binding again must work.
    let server = SockServer::bind(&addr, |_| Response::ok("second")).unwrap();
    let cancel = server.cancel_token();
    let task = tokio::spawn(server.serve());

    let body = SockClient::new(&addr).request("GET", "/status").await.unwrap();
    assert_eq!(body, "second");

    cancel.cancel();
    task.await.unwrap();
}

#[test]
fn response_status_classes() {
    assert!(Response::ok("x").is_success());
    assert!(!Response::not_found().is_success());
}
