//! General RTMP error type.

use crate::chunk::error::{ChunkReadError, ChunkWriteError};
use crate::command_messages::error::CommandError;
use crate::handshake::complex::error::ComplexHandshakeError;
use crate::session::client::ClientSessionError;
use crate::session::server::ServerSessionError;
use crate::url::UrlError;

/// Handshake failure.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The peer requested an RTMP version other than 3.
    #[error("unsupported rtmp version: {0}")]
    UnsupportedVersion(u8),
    /// Complex handshake digest failure.
    #[error("complex handshake: {0}")]
    Complex(#[from] ComplexHandshakeError),
}

/// RTMP error.
#[derive(Debug, thiserror::Error)]
pub enum RtmpError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Handshake error; fatal, the session never reaches connected.
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),
    /// Chunk read error; fatal protocol violation.
    #[error("chunk read error: {0}")]
    ChunkRead(#[from] ChunkReadError),
    /// Chunk write error.
    #[error("chunk write error: {0}")]
    ChunkWrite(#[from] ChunkWriteError),
    /// AMF error in a message payload; fatal protocol violation.
    #[error("amf error: {0}")]
    Amf(#[from] freshet_amf::AmfError),
    /// Command error.
    #[error("command error: {0}")]
    Command(#[from] CommandError),
    /// Invalid RTMP URL; raised at construction, before any I/O.
    #[error("url error: {0}")]
    Url(#[from] UrlError),
    /// Server session error.
    #[error("session error: {0}")]
    Session(#[from] ServerSessionError),
    /// Client session error.
    #[error("client session error: {0}")]
    ClientSession(#[from] ClientSessionError),
}

impl From<ComplexHandshakeError> for RtmpError {
    fn from(value: ComplexHandshakeError) -> Self {
        Self::Handshake(HandshakeError::Complex(value))
    }
}

impl RtmpError {
    /// Returns true if the error indicates that the peer has closed the
    /// connection.
    pub fn is_client_closed(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Self::Session(ServerSessionError::Timeout(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::future;
    use std::io::ErrorKind;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn is_client_closed() {
        assert!(RtmpError::Io(std::io::Error::new(ErrorKind::ConnectionAborted, "test")).is_client_closed());
        assert!(RtmpError::Io(std::io::Error::new(ErrorKind::ConnectionReset, "test")).is_client_closed());
        assert!(RtmpError::Io(std::io::Error::new(ErrorKind::UnexpectedEof, "test")).is_client_closed());

        let elapsed = tokio::time::timeout(Duration::ZERO, future::pending::<()>())
            .await
            .unwrap_err();

        assert!(RtmpError::Session(ServerSessionError::Timeout(elapsed)).is_client_closed());

        assert!(!RtmpError::Io(std::io::Error::other("test")).is_client_closed());
    }
}
