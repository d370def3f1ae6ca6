//! Client session error type.

/// Errors raised by a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientSessionError {
    /// A command did not receive its response within the configured
    /// timeout; the transaction fails, the session stays usable.
    #[error("command timeout: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
    /// The configured chunk size is outside the accepted bounds.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),
    /// An operation was attempted in the wrong session state.
    #[error("operation requires the {expected} state")]
    UnexpectedState {
        /// The state the operation requires.
        expected: &'static str,
    },
    /// The server rejected a command with an `_error` response.
    #[error("rejected: {code}: {description}")]
    Rejected {
        /// The status code the server answered with.
        code: String,
        /// The server's description, empty when it sent none.
        description: String,
    },
    /// The server answered with an error-level onStatus.
    #[error("status error: {code}: {description}")]
    Status {
        /// The status code the server answered with.
        code: String,
        /// The server's description, empty when it sent none.
        description: String,
    },
    /// The session was closed while the operation was in flight.
    #[error("session closed")]
    Closed,
}
