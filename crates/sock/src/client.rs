// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stateless request/response client for a single agent socket.

use std::path::PathBuf;
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::{read_frame, write_frame, Request, Response, SockError, DEFAULT_TIMEOUT};

/// Client for one DAG's agent socket. Each [`request`](SockClient::request)
/// opens a fresh connection; the client itself holds no state.
#[derive(Debug, Clone)]
pub struct SockClient {
    addr: PathBuf,
    timeout: Duration,
}

impl SockClient {
    pub fn new(addr: impl Into<PathBuf>) -> Self {
        Self { addr: addr.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one request and await the response body.
    ///
    /// Error classification drives reconciliation:
    /// - connect failure (missing socket path, refused) → `NoListener`
    /// - connected but no response within the timeout → `Timeout`
    /// - any other I/O or decode failure → logged, then `NoListener`
    pub async fn request(&self, method: &str, path: &str) -> Result<String, SockError> {
        let mut stream = match UnixStream::connect(&self.addr).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(addr = %self.addr.display(), error = %e, "agent socket not reachable");
                return Err(self.no_listener());
            }
        };

        let request = Request::new(method, path);
        let exchange = async {
            let payload = serde_json::to_vec(&request)?;
            write_frame(&mut stream, &payload).await?;
            let frame = read_frame(&mut stream).await?;
            let response: Response = serde_json::from_slice(&frame)?;
            Ok::<Response, crate::FrameError>(response)
        };

        let response = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_elapsed) => {
                return Err(SockError::Timeout { addr: self.addr.clone(), timeout: self.timeout });
            }
            Ok(Err(e)) => {
                warn!(addr = %self.addr.display(), error = %e, "agent exchange failed");
                return Err(self.no_listener());
            }
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            warn!(
                addr = %self.addr.display(),
                status = response.status,
                method = %request.method,
                path = %request.path,
                "agent rejected request"
            );
            return Err(self.no_listener());
        }
        Ok(response.body)
    }

    fn no_listener(&self) -> SockError {
        SockError::NoListener { addr: self.addr.clone() }
    }
}
