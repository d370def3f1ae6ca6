//! Chunk stream error types.

use std::io;

/// Errors raised while assembling inbound chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkReadError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A type 1, 2 or 3 chunk arrived on a chunk stream that never saw a
    /// type 0 header.
    #[error("missing previous chunk header: {0}")]
    MissingPreviousChunkHeader(u32),
    /// A type 0, 1 or 2 header arrived while a message on the same chunk
    /// stream was still incomplete.
    #[error("interleaved message on chunk stream {0}")]
    InterleavedMessage(u32),
    /// Too many chunk streams carry partial messages.
    #[error("too many partial chunks")]
    TooManyPartialChunks,
    /// Too many chunk streams are tracked.
    #[error("too many previous chunk headers")]
    TooManyPreviousChunkHeaders,
    /// The peer announced a chunk size outside the accepted bounds.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),
}

/// Errors raised while writing outbound chunks.
#[derive(Debug, thiserror::Error)]
pub enum ChunkWriteError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The message payload exceeds the 24-bit length field.
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}
