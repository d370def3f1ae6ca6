//! Server session error type.

/// Errors terminating a server session.
#[derive(Debug, thiserror::Error)]
pub enum ServerSessionError {
    /// A read or write took longer than the session allows.
    #[error("timeout: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    /// The peer announced a chunk size outside the accepted bounds.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),
    /// The peer tried to publish before connecting.
    #[error("publish before connect")]
    PublishBeforeConnect,
    /// The peer tried to play before connecting.
    #[error("play before connect")]
    PlayBeforeConnect,
}
