// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC between the control plane and live agents.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. Each
//! connection carries exactly one request and one response; there is no
//! pooling and no session state.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod server;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use client::SockClient;
pub use server::SockServer;

/// Default bound on a full request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on a frame body. Status payloads are small; anything larger
/// is a corrupt or hostile frame.
const MAX_FRAME_LEN: u32 = 1 << 20;

/// A request to a live agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub path: String,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into() }
    }
}

/// An agent's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }

    pub fn not_found() -> Self {
        Self { status: 404, body: String::new() }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

/// Errors from talking to an agent socket.
///
/// Exactly two kinds matter to reconciliation: [`NoListener`] means no agent
/// is live, [`Timeout`] means an agent is live but wedged. Every other I/O
/// failure collapses to `NoListener` (after being logged by the client).
///
/// [`NoListener`]: SockError::NoListener
/// [`Timeout`]: SockError::Timeout
#[derive(Debug, Error)]
pub enum SockError {
    #[error("no agent listening on {addr}")]
    NoListener { addr: PathBuf },

    #[error("agent on {addr} did not respond within {timeout:?}")]
    Timeout { addr: PathBuf, timeout: Duration },
}

impl SockError {
    pub fn is_no_listener(&self) -> bool {
        matches!(self, SockError::NoListener { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SockError::Timeout { .. })
    }
}

/// Protocol-level failures inside a connection (server side and client
/// internals). The client folds these into [`SockError::NoListener`].
#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame exceeds {MAX_FRAME_LEN} bytes: {0}")]
    Oversized(u32),

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversized(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "sock_tests.rs"]
mod tests;
