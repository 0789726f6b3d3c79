// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent socket server.
//!
//! Bound by the agent for the lifetime of one run (and by tests as a stub).
//! Each accepted connection is served on its own task; shutdown goes through
//! a cancellation token, which also removes the socket file so later clients
//! see `NoListener` rather than a dead path.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{read_frame, write_frame, Request, Response};

type Handler = dyn Fn(&Request) -> Response + Send + Sync;

pub struct SockServer {
    addr: PathBuf,
    listener: UnixListener,
    handler: Arc<Handler>,
    cancel: CancellationToken,
}

impl SockServer {
    /// Bind the socket, replacing a stale file left by a dead agent.
    pub fn bind(
        addr: impl Into<PathBuf>,
        handler: impl Fn(&Request) -> Response + Send + Sync + 'static,
    ) -> std::io::Result<Self> {
        let addr = addr.into();
        if addr.exists() {
            let _ = std::fs::remove_file(&addr);
        }
        let listener = UnixListener::bind(&addr)?;
        Ok(Self {
            addr,
            listener,
            handler: Arc::new(handler),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops [`serve`](SockServer::serve) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Accept loop. Runs until the cancellation token fires, then unlinks
    /// the socket file.
    pub async fn serve(self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            let (mut reader, mut writer) = stream.into_split();
                            let frame = match read_frame(&mut reader).await {
                                Ok(frame) => frame,
                                Err(e) => {
                                    debug!(error = %e, "dropping connection");
                                    return;
                                }
                            };
                            let response = match serde_json::from_slice::<Request>(&frame) {
                                Ok(request) => handler(&request),
                                Err(e) => {
                                    debug!(error = %e, "malformed request frame");
                                    Response::not_found()
                                }
                            };
                            let payload = match serde_json::to_vec(&response) {
                                Ok(payload) => payload,
                                Err(e) => {
                                    error!(error = %e, "response failed to serialize");
                                    return;
                                }
                            };
                            if let Err(e) = write_frame(&mut writer, &payload).await {
                                debug!(error = %e, "client went away before response");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
            }
        }
        let _ = std::fs::remove_file(&self.addr);
    }
}
