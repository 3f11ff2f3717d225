// SPDX-License-Identifier: MIT

//! Thin client over the framed wire protocol: connects fresh for every
//! request, matching the daemon's one-request-per-connection model, and
//! rejects any response shape the caller didn't ask for.

use std::path::PathBuf;

use sched_wire::{ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to daemon at {0}: {1} (is `sched-daemon` running?)")]
    Connect(PathBuf, std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("daemon returned an unexpected response for this request")]
    UnexpectedResponse,
    #[error("{0}")]
    Daemon(String),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ClientError::Connect(self.socket_path.clone(), e))?;
        sched_wire::write_message(&mut stream, request).await?;
        let response: Response = sched_wire::read_message(&mut stream).await?;
        if let Response::Error { message } = response {
            return Err(ClientError::Daemon(message));
        }
        Ok(response)
    }

    /// Used by command handlers in an exhaustive match's fallback arm, when
    /// the daemon answered with a response shape the request didn't expect.
    pub fn reject<T>(response: Response) -> anyhow::Result<T> {
        let _ = response;
        Err(ClientError::UnexpectedResponse.into())
    }
}
