//! TCP transport
//!
//! Opens one connection per message: connect, write a single frame, shut the
//! write half down, close. Nothing is pooled and nothing is retried.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use meshwave_core::{Transport, TransportError, WireMessage};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace};

use crate::codec::{self, FramingError};

/// Fire-and-forget TCP delivery
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    connect_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Create a transport with no connect timeout
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on a connect attempt after `timeout`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    async fn connect(&self, target: SocketAddr) -> Result<TcpStream, TransportError> {
        let connect = TcpStream::connect(target);
        let result = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| TransportError::ConnectionFailed {
                    addr: target,
                    reason: format!("timed out after {:?}", timeout),
                })?,
            None => connect.await,
        };

        result.map_err(|e| TransportError::ConnectionFailed {
            addr: target,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, target: SocketAddr, message: WireMessage) -> Result<(), TransportError> {
        let kind = message.kind();
        let mut stream = self.connect(target).await?;

        codec::write_message(&mut stream, &message)
            .await
            .map_err(|e| match e {
                FramingError::Io(reason) => TransportError::WriteFailed {
                    addr: target,
                    reason,
                },
                other => TransportError::Encode(other.to_string()),
            })?;

        if let Err(e) = stream.shutdown().await {
            // The frame is already written; a failed FIN does not undo it
            debug!(%target, error = %e, "shutdown after write failed");
        }

        trace!(%target, %kind, "message written");
        Ok(())
    }
}

/// Accept one connection and read its single frame
///
/// Convenience for tests and tools that want exactly one inbound message.
pub async fn receive_one(listener: &TcpListener) -> Result<(SocketAddr, WireMessage), FramingError> {
    let (mut stream, peer) = listener
        .accept()
        .await
        .map_err(|e| FramingError::Io(e.to_string()))?;
    let message = codec::read_message(&mut stream).await?;
    Ok((peer, message))
}
