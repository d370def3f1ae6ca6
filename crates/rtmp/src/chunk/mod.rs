//! RTMP chunk stream framing.
//!
//! Messages are split into chunks no larger than the negotiated chunk size
//! and interleaved over chunk streams. Each chunk carries one of four header
//! forms (type 0 full, down to type 3 empty) chosen against the per
//! chunk-stream compression history.

use bytes::Bytes;

use crate::messages::MessageType;

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{ChunkReadError, ChunkWriteError};
pub use reader::ChunkReader;
pub use writer::ChunkWriter;

/// The default chunk size both peers start with.
pub const CHUNK_SIZE_DEFAULT: usize = 128;
/// The smallest chunk size this implementation accepts.
pub const CHUNK_SIZE_MIN: usize = 128;
/// The largest chunk size: no chunk is larger than one message, and no
/// message is larger than its 24-bit length field.
pub const CHUNK_SIZE_MAX: usize = 0xFF_FFFF;

/// The chunk stream reserved for protocol control messages.
pub const CHUNK_STREAM_ID_PROTOCOL_CONTROL: u32 = 2;
/// The chunk stream this library sends command messages on.
pub const CHUNK_STREAM_ID_COMMAND: u32 = 3;
/// The chunk stream this library sends audio messages on.
pub const CHUNK_STREAM_ID_AUDIO: u32 = 4;
/// The chunk stream this library sends data (metadata) messages on.
pub const CHUNK_STREAM_ID_DATA: u32 = 5;
/// The chunk stream this library sends video messages on.
pub const CHUNK_STREAM_ID_VIDEO: u32 = 6;

/// The timestamp field value announcing a 4-byte extended timestamp.
pub(crate) const EXTENDED_TIMESTAMP_SENTINEL: u32 = 0xFF_FFFF;

/// The four chunk header forms.
///
/// Defined by:
/// - Legacy RTMP spec, 5.3.1.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// 11-byte header: absolute timestamp, length, type, stream id.
    Type0 = 0,
    /// 7-byte header: timestamp delta, length, type.
    Type1 = 1,
    /// 3-byte header: timestamp delta only.
    Type2 = 2,
    /// 0-byte header: everything from the previous chunk on this stream.
    Type3 = 3,
}

/// The basic header of a chunk: its header form and chunk stream id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBasicHeader {
    /// The chunk stream id this chunk belongs to.
    pub chunk_stream_id: u32,
}

/// The message header of a chunk, fully resolved: the timestamp is always
/// absolute, regardless of the header form it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageHeader {
    /// The absolute timestamp of the message in milliseconds.
    pub timestamp: u32,
    /// The total message length in bytes.
    pub msg_length: u32,
    /// The message type id.
    pub msg_type_id: MessageType,
    /// The message stream id.
    pub msg_stream_id: u32,
    /// Whether the wire header carried a 4-byte extended timestamp.
    pub was_extended_timestamp: bool,
}

impl ChunkMessageHeader {
    /// Returns true if this header needs the extended timestamp encoding.
    #[inline]
    pub fn is_extended_timestamp(&self) -> bool {
        self.timestamp >= EXTENDED_TIMESTAMP_SENTINEL
    }
}

/// A fully assembled message as it travels through the chunk layer.
///
/// On the read side the payload is the complete reassembled message body;
/// on the write side it is the body about to be split into chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The basic header.
    pub basic_header: ChunkBasicHeader,
    /// The resolved message header.
    pub message_header: ChunkMessageHeader,
    /// The message payload.
    pub payload: Bytes,
}

impl Chunk {
    /// Creates a chunk with the given header fields and payload.
    pub fn new(chunk_stream_id: u32, timestamp: u32, msg_type_id: MessageType, msg_stream_id: u32, payload: Bytes) -> Self {
        Self {
            basic_header: ChunkBasicHeader { chunk_stream_id },
            message_header: ChunkMessageHeader {
                timestamp,
                msg_length: payload.len() as u32,
                msg_type_id,
                msg_stream_id,
                was_extended_timestamp: false,
            },
            payload,
        }
    }
}
