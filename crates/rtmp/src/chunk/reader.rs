//! Reading chunks.

use std::collections::HashMap;
use std::io::{self, Read};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::{Buf, BytesMut};

use super::{
    CHUNK_SIZE_DEFAULT, CHUNK_SIZE_MAX, CHUNK_SIZE_MIN, Chunk, ChunkBasicHeader, ChunkMessageHeader, ChunkReadError,
    EXTENDED_TIMESTAMP_SENTINEL,
};
use crate::messages::MessageType;

/// The per chunk-stream state carried from the most recent type 0/1/2
/// header.
#[derive(Debug, Clone)]
struct InboundChunkState {
    timestamp: u32,
    timestamp_delta: u32,
    msg_length: u32,
    msg_type_id: MessageType,
    msg_stream_id: u32,
    /// The most recent header used the 0xFFFFFF sentinel; type 3 chunks on
    /// this stream carry the 4 extended bytes too.
    extended_timestamp: bool,
}

/// Guards against a peer opening unbounded numbers of chunk streams.
const MAX_CHUNK_STREAMS: usize = 128;

/// A chunk reader.
///
/// Assembles chunks back into messages, tracking the decompression state
/// per chunk stream. At most one message per chunk stream can be in flight.
pub struct ChunkReader {
    max_chunk_size: usize,
    history: HashMap<u32, InboundChunkState>,
    partial: HashMap<u32, BytesMut>,
}

impl Default for ChunkReader {
    fn default() -> Self {
        Self {
            max_chunk_size: CHUNK_SIZE_DEFAULT,
            history: HashMap::new(),
            partial: HashMap::new(),
        }
    }
}

impl ChunkReader {
    /// Applies a received SetChunkSize for subsequent inbound reads.
    ///
    /// Returns false when the size is outside the accepted bounds, in which
    /// case nothing changes.
    pub fn update_max_chunk_size(&mut self, chunk_size: usize) -> bool {
        if !(CHUNK_SIZE_MIN..=CHUNK_SIZE_MAX).contains(&chunk_size) {
            return false;
        }

        self.max_chunk_size = chunk_size;
        true
    }

    /// Drops the partial message on the given chunk stream, the effect of a
    /// received Abort message.
    pub fn abort(&mut self, chunk_stream_id: u32) {
        self.partial.remove(&chunk_stream_id);
    }

    /// Reads one chunk out of the buffer, returning a complete message once
    /// its last chunk arrived.
    ///
    /// Returns `Ok(None)` when the buffer does not hold a full chunk yet; in
    /// that case nothing is consumed and the caller reads more bytes from
    /// the transport. Call in a loop until it returns `None` to drain the
    /// buffer.
    pub fn read_chunk(&mut self, buffer: &mut BytesMut) -> Result<Option<Chunk>, ChunkReadError> {
        loop {
            let mut cursor = io::Cursor::new(&buffer[..]);

            match self.parse_chunk(&mut cursor)? {
                Some(completed) => {
                    let consumed = cursor.position() as usize;
                    buffer.advance(consumed);

                    if let Some(chunk) = completed {
                        return Ok(Some(chunk));
                    }
                    // A partial chunk was consumed, keep parsing: the buffer
                    // may already hold the rest of the message.
                }
                // Not enough data for a full chunk, nothing consumed.
                None => return Ok(None),
            }
        }
    }

    /// Parses one chunk from the cursor.
    ///
    /// Returns `None` when the cursor ran out of data, `Some(None)` when a
    /// chunk was consumed without completing a message, and `Some(Some(..))`
    /// with the assembled message otherwise.
    #[allow(clippy::type_complexity)]
    fn parse_chunk(&mut self, cursor: &mut io::Cursor<&[u8]>) -> Result<Option<Option<Chunk>>, ChunkReadError> {
        let Some((fmt, csid)) = read_basic_header(cursor)? else {
            return Ok(None);
        };

        let message_in_flight = self.partial.contains_key(&csid);

        // A new header while a message is still being assembled would tear
        // that message; only type 3 continuations are legal here.
        if fmt != 3 && message_in_flight {
            return Err(ChunkReadError::InterleavedMessage(csid));
        }

        let state = match fmt {
            0 => {
                let Some(header) = read_type0_header(cursor)? else {
                    return Ok(None);
                };
                header
            }
            1 | 2 => {
                let Some(previous) = self.history.get(&csid) else {
                    return Err(ChunkReadError::MissingPreviousChunkHeader(csid));
                };

                let mut timestamp_delta = match try_read_u24(cursor) {
                    Some(value) => value,
                    None => return Ok(None),
                };

                let (msg_length, msg_type_id) = if fmt == 1 {
                    let Some(msg_length) = try_read_u24(cursor) else {
                        return Ok(None);
                    };
                    let Some(msg_type_id) = try_read_u8(cursor) else {
                        return Ok(None);
                    };
                    (msg_length, MessageType(msg_type_id))
                } else {
                    (previous.msg_length, previous.msg_type_id)
                };

                let extended_timestamp = timestamp_delta == EXTENDED_TIMESTAMP_SENTINEL;
                if extended_timestamp {
                    let Some(extended) = try_read_u32(cursor) else {
                        return Ok(None);
                    };
                    timestamp_delta = extended;
                }

                InboundChunkState {
                    timestamp: previous.timestamp.wrapping_add(timestamp_delta),
                    timestamp_delta,
                    msg_length,
                    msg_type_id,
                    msg_stream_id: previous.msg_stream_id,
                    extended_timestamp,
                }
            }
            _ => {
                let Some(previous) = self.history.get(&csid) else {
                    return Err(ChunkReadError::MissingPreviousChunkHeader(csid));
                };

                let mut state = previous.clone();

                // The owning header used the sentinel: the 4 extended bytes
                // are repeated on every type 3 chunk of that message.
                if state.extended_timestamp {
                    let Some(extended) = try_read_u32(cursor) else {
                        return Ok(None);
                    };

                    if !message_in_flight {
                        // A fresh type 3 message advances by its delta.
                        state.timestamp = state.timestamp.wrapping_add(extended);
                        state.timestamp_delta = extended;
                    }
                } else if !message_in_flight {
                    state.timestamp = state.timestamp.wrapping_add(state.timestamp_delta);
                }

                state
            }
        };

        // How much of the message is still missing.
        let assembled = self.partial.get(&csid).map(|b| b.len()).unwrap_or(0);
        let remaining = (state.msg_length as usize).saturating_sub(assembled);
        let chunk_payload_size = remaining.min(self.max_chunk_size);

        if cursor.remaining() < chunk_payload_size {
            return Ok(None);
        }

        let mut payload_piece = vec![0u8; chunk_payload_size];
        cursor.read_exact(&mut payload_piece)?;

        if !message_in_flight {
            if self.partial.len() >= MAX_CHUNK_STREAMS {
                return Err(ChunkReadError::TooManyPartialChunks);
            }
            if self.history.len() >= MAX_CHUNK_STREAMS && !self.history.contains_key(&csid) {
                return Err(ChunkReadError::TooManyPreviousChunkHeaders);
            }
        }

        self.history.insert(csid, state.clone());

        let partial = self.partial.entry(csid).or_default();
        partial.extend_from_slice(&payload_piece);

        if partial.len() < state.msg_length as usize {
            return Ok(Some(None));
        }

        let payload = self.partial.remove(&csid).expect("partial exists").freeze();

        Ok(Some(Some(Chunk {
            basic_header: ChunkBasicHeader { chunk_stream_id: csid },
            message_header: ChunkMessageHeader {
                timestamp: state.timestamp,
                msg_length: state.msg_length,
                msg_type_id: state.msg_type_id,
                msg_stream_id: state.msg_stream_id,
                was_extended_timestamp: state.extended_timestamp,
            },
            payload,
        })))
    }
}

fn read_basic_header(cursor: &mut io::Cursor<&[u8]>) -> Result<Option<(u8, u32)>, ChunkReadError> {
    let Some(byte) = try_read_u8(cursor) else {
        return Ok(None);
    };

    let fmt = byte >> 6;

    let csid = match byte & 0b0011_1111 {
        0 => {
            let Some(second) = try_read_u8(cursor) else {
                return Ok(None);
            };
            64 + second as u32
        }
        1 => {
            let Some(second) = try_read_u8(cursor) else {
                return Ok(None);
            };
            let Some(third) = try_read_u8(cursor) else {
                return Ok(None);
            };
            64 + second as u32 + third as u32 * 256
        }
        direct => direct as u32,
    };

    Ok(Some((fmt, csid)))
}

fn read_type0_header(cursor: &mut io::Cursor<&[u8]>) -> Result<Option<InboundChunkState>, ChunkReadError> {
    let Some(mut timestamp) = try_read_u24(cursor) else {
        return Ok(None);
    };
    let Some(msg_length) = try_read_u24(cursor) else {
        return Ok(None);
    };
    let Some(msg_type_id) = try_read_u8(cursor) else {
        return Ok(None);
    };
    let Some(msg_stream_id) = try_read_u32_le(cursor) else {
        return Ok(None);
    };

    let extended_timestamp = timestamp == EXTENDED_TIMESTAMP_SENTINEL;
    if extended_timestamp {
        let Some(extended) = try_read_u32(cursor) else {
            return Ok(None);
        };
        timestamp = extended;
    }

    Ok(Some(InboundChunkState {
        timestamp,
        timestamp_delta: 0,
        msg_length,
        msg_type_id: MessageType(msg_type_id),
        msg_stream_id,
        extended_timestamp,
    }))
}

fn try_read_u8(cursor: &mut io::Cursor<&[u8]>) -> Option<u8> {
    cursor.read_u8().ok()
}

fn try_read_u24(cursor: &mut io::Cursor<&[u8]>) -> Option<u32> {
    cursor.read_u24::<BigEndian>().ok()
}

fn try_read_u32(cursor: &mut io::Cursor<&[u8]>) -> Option<u32> {
    cursor.read_u32::<BigEndian>().ok()
}

fn try_read_u32_le(cursor: &mut io::Cursor<&[u8]>) -> Option<u32> {
    cursor.read_u32::<LittleEndian>().ok()
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::chunk::ChunkWriter;

    fn feed(reader: &mut ChunkReader, bytes: &[u8]) -> Vec<Chunk> {
        let mut buffer = BytesMut::from(bytes);
        let mut chunks = Vec::new();

        while let Some(chunk) = reader.read_chunk(&mut buffer).unwrap() {
            chunks.push(chunk);
        }

        assert!(buffer.is_empty());
        chunks
    }

    #[test]
    fn reader_mirrors_writer_history() {
        let mut writer = ChunkWriter::default();
        let mut wire = Vec::new();

        let messages = [
            (0u32, vec![1u8; 10]),
            (0, vec![2u8; 10]),
            (20, vec![3u8; 10]),
            (40, vec![4u8; 10]),
            (60, vec![5u8; 300]),
            (90, vec![6u8; 300]),
        ];

        for (timestamp, payload) in &messages {
            writer
                .write_chunk(
                    &mut wire,
                    Chunk::new(4, *timestamp, MessageType::Audio, 1, Bytes::from(payload.clone())),
                )
                .unwrap();
        }

        let mut reader = ChunkReader::default();
        let chunks = feed(&mut reader, &wire);

        assert_eq!(chunks.len(), messages.len());
        for (chunk, (timestamp, payload)) in chunks.iter().zip(&messages) {
            assert_eq!(chunk.message_header.timestamp, *timestamp);
            assert_eq!(chunk.message_header.msg_type_id, MessageType::Audio);
            assert_eq!(chunk.message_header.msg_stream_id, 1);
            assert_eq!(&chunk.payload[..], &payload[..]);
        }
    }

    #[test]
    fn partial_chunks_wait_for_more_data() {
        let mut writer = ChunkWriter::default();
        let mut wire = Vec::new();

        writer
            .write_chunk(&mut wire, Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![7u8; 200])))
            .unwrap();

        let mut reader = ChunkReader::default();

        // Feed all but the last byte: no message may surface.
        let mut buffer = BytesMut::from(&wire[..wire.len() - 1]);
        assert!(reader.read_chunk(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&wire[wire.len() - 1..]);
        let chunk = reader.read_chunk(&mut buffer).unwrap().expect("message completes");
        assert_eq!(chunk.payload.len(), 200);
    }

    #[test]
    fn type3_without_header_is_an_error() {
        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&[0xC4u8][..]); // fmt 3, csid 4

        assert!(matches!(
            reader.read_chunk(&mut buffer),
            Err(ChunkReadError::MissingPreviousChunkHeader(4))
        ));
    }

    #[test]
    fn interleaved_header_is_an_error() {
        let mut writer = ChunkWriter::default();
        let mut wire = Vec::new();

        // 200-byte message: two chunks on csid 4
        writer
            .write_chunk(&mut wire, Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![1u8; 200])))
            .unwrap();

        // Cut after the first chunk (12-byte header + 128 payload) and
        // splice in a fresh type 0 header on the same stream.
        let mut spliced = wire[..140].to_vec();
        let mut second = Vec::new();
        let mut other_writer = ChunkWriter::default();
        other_writer
            .write_chunk(&mut second, Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![2u8; 10])))
            .unwrap();
        spliced.extend_from_slice(&second);

        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&spliced[..]);

        assert!(matches!(
            reader.read_chunk(&mut buffer),
            Err(ChunkReadError::InterleavedMessage(4))
        ));
    }

    #[test]
    fn inbound_chunk_size_update() {
        let mut writer = ChunkWriter::default();
        writer.set_chunk_size(4096);

        let mut wire = Vec::new();
        writer
            .write_chunk(&mut wire, Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![9u8; 2000])))
            .unwrap();

        let mut reader = ChunkReader::default();
        assert!(reader.update_max_chunk_size(4096));

        let chunks = feed(&mut reader, &wire);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].payload.len(), 2000);
    }

    #[test]
    fn chunk_size_bounds() {
        let mut reader = ChunkReader::default();

        assert!(!reader.update_max_chunk_size(127));
        assert!(reader.update_max_chunk_size(128));
        assert!(reader.update_max_chunk_size(16_777_215));
        assert!(!reader.update_max_chunk_size(16_777_216));
    }

    #[test]
    fn extended_timestamp_round_trip() {
        let mut writer = ChunkWriter::default();
        let mut wire = Vec::new();

        // Crossing the sentinel: 0xFFFFFE fits, 0xFFFFFF and above extend.
        for timestamp in [0xFF_FFFEu32, 0xFF_FFFF, 0x0100_0000, 0x0200_0000] {
            let mut w = ChunkWriter::default();
            wire.clear();
            w.write_chunk(
                &mut wire,
                Chunk::new(4, timestamp, MessageType::Audio, 1, Bytes::from(vec![0u8; 140])),
            )
            .unwrap();

            let mut reader = ChunkReader::default();
            let chunks = feed(&mut reader, &wire);
            assert_eq!(chunks.len(), 1, "timestamp {timestamp:#x}");
            assert_eq!(chunks[0].message_header.timestamp, timestamp);
        }

        let _ = writer;
    }

    #[test]
    fn abort_drops_partial_message() {
        let mut writer = ChunkWriter::default();
        let mut wire = Vec::new();

        writer
            .write_chunk(&mut wire, Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![1u8; 200])))
            .unwrap();

        let mut reader = ChunkReader::default();

        // Only the first chunk arrives, then the message is aborted.
        let mut buffer = BytesMut::from(&wire[..140]);
        assert!(reader.read_chunk(&mut buffer).unwrap().is_none());
        reader.abort(4);

        // A new message on the same stream parses cleanly.
        let mut fresh = Vec::new();
        writer
            .write_chunk(&mut fresh, Chunk::new(4, 40, MessageType::Video, 1, Bytes::from(vec![2u8; 10])))
            .unwrap();

        let mut buffer = BytesMut::from(&fresh[..]);
        let chunk = reader.read_chunk(&mut buffer).unwrap().expect("fresh message");
        assert_eq!(chunk.payload.len(), 10);
    }
}
