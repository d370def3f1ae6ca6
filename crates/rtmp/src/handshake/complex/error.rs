//! Complex handshake error type.

/// Errors raised while locating or generating handshake digests.
#[derive(Debug, thiserror::Error)]
pub enum ComplexHandshakeError {
    /// The packet is too short to hold a digest block.
    #[error("not enough data")]
    NotEnoughData,
    /// The located digest does not have the expected length.
    #[error("digest length not correct")]
    DigestLengthNotCorrect,
    /// Neither schema produced a matching digest.
    #[error("unknown schema")]
    UnknownSchema,
}
