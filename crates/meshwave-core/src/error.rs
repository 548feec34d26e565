//! Error types for Meshwave

use std::net::SocketAddr;

use thiserror::Error;

use crate::identity::NodeId;
use crate::message::MessageKind;

/// Top-level error type for Meshwave
#[derive(Debug, Error)]
pub enum MeshwaveError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
}

/// Errors raised while delivering a message to another node
///
/// A transport error only ever abandons the one send that produced it.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection to {addr} failed: {reason}")]
    ConnectionFailed { addr: SocketAddr, reason: String },

    #[error("Write to {addr} failed: {reason}")]
    WriteFailed { addr: SocketAddr, reason: String },

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("No endpoint registered at {0}")]
    UnknownAddress(SocketAddr),

    #[error("Endpoint at {0} is closed")]
    EndpointClosed(SocketAddr),
}

impl TransportError {
    /// The address the failed send was aimed at, if known
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::ConnectionFailed { addr, .. } | Self::WriteFailed { addr, .. } => Some(*addr),
            Self::UnknownAddress(addr) | Self::EndpointClosed(addr) => Some(*addr),
            Self::Encode(_) => None,
        }
    }
}

/// Startup-time configuration errors
///
/// These are the only errors that stop a node: without its address and
/// neighbor list it cannot serve.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Topology not found: {0}")]
    MissingTopology(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Failed to bind listener on {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("Inventory unavailable: {0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A message that contradicts what the protocol allows at this point
///
/// Violations are logged and ignored; they never mutate node state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("{kind} from {sender}, which is not a neighbor")]
    UnknownSender { kind: MessageKind, sender: NodeId },

    #[error("{kind} from {sender}, which was never sent a wave")]
    UnsolicitedReply { kind: MessageKind, sender: NodeId },

    #[error("{kind} from {sender} contradicts its earlier reply")]
    ConflictingReply { kind: MessageKind, sender: NodeId },
}

/// Result type alias for Meshwave operations
pub type MeshwaveResult<T> = Result<T, MeshwaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::ConnectionFailed {
            addr: addr(30001),
            reason: "refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("127.0.0.1:30001"));
        assert!(msg.contains("refused"));

        let err = TransportError::UnknownAddress(addr(30002));
        assert!(format!("{}", err).contains("30002"));
    }

    #[test]
    fn test_transport_error_target() {
        let err = TransportError::WriteFailed {
            addr: addr(4000),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.target(), Some(addr(4000)));
        assert_eq!(TransportError::Encode("bad".into()).target(), None);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Bind {
            addr: addr(30000),
            reason: "address in use".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("30000"));
        assert!(msg.contains("address in use"));

        let err = ConfigError::MissingTopology("node-9.toml".to_string());
        assert!(format!("{}", err).contains("node-9.toml"));
    }

    #[test]
    fn test_protocol_violation_display() {
        let err = ProtocolViolation::UnsolicitedReply {
            kind: MessageKind::ParentAck,
            sender: NodeId(3),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ParentAck"));
        assert!(msg.contains("node-3"));
    }

    #[test]
    fn test_error_conversions() {
        let err: MeshwaveError = TransportError::EndpointClosed(addr(1)).into();
        assert!(matches!(err, MeshwaveError::Transport(_)));

        let err: MeshwaveError = ConfigError::InvalidTopology("dup".into()).into();
        assert!(matches!(err, MeshwaveError::Config(_)));

        let err: MeshwaveError = ProtocolViolation::UnknownSender {
            kind: MessageKind::Wave,
            sender: NodeId(7),
        }
        .into();
        assert!(matches!(err, MeshwaveError::Protocol(_)));
        assert!(format!("{}", err).contains("Protocol violation"));
    }
}
