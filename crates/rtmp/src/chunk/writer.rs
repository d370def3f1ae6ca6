//! Writing chunks.

use std::collections::HashMap;
use std::io;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use super::{CHUNK_SIZE_DEFAULT, Chunk, ChunkType, ChunkWriteError, EXTENDED_TIMESTAMP_SENTINEL};
use crate::messages::MessageType;

/// The compression state kept per outbound chunk stream.
#[derive(Debug, Clone)]
struct OutboundChunkState {
    timestamp: u32,
    timestamp_delta: u32,
    msg_length: u32,
    msg_type_id: MessageType,
    msg_stream_id: u32,
}

/// A chunk writer.
///
/// Splits messages into chunks of at most the negotiated chunk size and
/// compresses headers against the per chunk-stream history: the smallest of
/// the four header forms that still conveys the changed fields is chosen.
pub struct ChunkWriter {
    chunk_size: usize,
    history: HashMap<u32, OutboundChunkState>,
}

impl Default for ChunkWriter {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE_DEFAULT,
            history: HashMap::new(),
        }
    }
}

impl ChunkWriter {
    /// Sets the chunk size used for subsequent messages.
    ///
    /// The caller announces the new size to the peer with a SetChunkSize
    /// message before writing with it.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = chunk_size;
    }

    /// Internal function to write the basic header.
    #[inline]
    fn write_basic_header(io: &mut impl io::Write, fmt: ChunkType, csid: u32) -> Result<(), ChunkWriteError> {
        let fmt = fmt as u8;

        if csid >= 64 + 255 {
            io.write_u8((fmt << 6) | 1)?;
            let csid = csid - 64;

            let div = csid / 256;
            let rem = csid % 256;

            io.write_u8(rem as u8)?;
            io.write_u8(div as u8)?;
        } else if csid >= 64 {
            io.write_u8(fmt << 6)?;
            io.write_u8((csid - 64) as u8)?;
        } else {
            io.write_u8((fmt << 6) | csid as u8)?;
        }

        Ok(())
    }

    #[inline]
    fn write_extended_timestamp(io: &mut impl io::Write, timestamp: u32) -> Result<(), ChunkWriteError> {
        io.write_u32::<BigEndian>(timestamp)?;

        Ok(())
    }

    /// Picks the header form for this message against the chunk stream
    /// history, and resolves the timestamp field value and delta to store.
    ///
    /// | form | when |
    /// | --- | --- |
    /// | type 0 | first message on this stream, new message stream id, or the timestamp went backwards |
    /// | type 1 | new message length or type id |
    /// | type 2 | only the timestamp delta changed |
    /// | type 3 | everything matches, the stored delta is reused |
    fn select_format(&self, chunk: &Chunk) -> (ChunkType, u32, u32) {
        let header = &chunk.message_header;

        let previous = match self.history.get(&chunk.basic_header.chunk_stream_id) {
            Some(previous) if header.msg_stream_id == previous.msg_stream_id && header.timestamp >= previous.timestamp => {
                previous
            }
            _ => return (ChunkType::Type0, header.timestamp, 0),
        };

        let delta = header.timestamp - previous.timestamp;

        if header.msg_length != previous.msg_length || header.msg_type_id != previous.msg_type_id {
            (ChunkType::Type1, delta, delta)
        } else if delta != previous.timestamp_delta {
            (ChunkType::Type2, delta, delta)
        } else {
            (ChunkType::Type3, previous.timestamp_delta, previous.timestamp_delta)
        }
    }

    /// Writes one message as a chunk sequence into some writer.
    ///
    /// All chunks of the message are emitted back to back; callers that
    /// interleave writers across tasks must treat this call as one critical
    /// section so type 3 continuations stay attached to their header.
    pub fn write_chunk(&mut self, io: &mut impl io::Write, chunk_info: Chunk) -> Result<(), ChunkWriteError> {
        if chunk_info.payload.len() > super::CHUNK_SIZE_MAX {
            return Err(ChunkWriteError::PayloadTooLarge(chunk_info.payload.len()));
        }

        let csid = chunk_info.basic_header.chunk_stream_id;
        let header = &chunk_info.message_header;

        // The header form, the timestamp field value that goes with it, and
        // the delta to store; the value spills into the 4-byte extension
        // when it does not fit the 24-bit field.
        let (fmt, field_value, delta) = self.select_format(&chunk_info);

        Self::write_basic_header(io, fmt, csid)?;

        let extended = field_value >= EXTENDED_TIMESTAMP_SENTINEL;

        match fmt {
            ChunkType::Type0 => {
                let field = if extended { EXTENDED_TIMESTAMP_SENTINEL } else { field_value };
                io.write_u24::<BigEndian>(field)?;
                io.write_u24::<BigEndian>(header.msg_length)?;
                io.write_u8(header.msg_type_id.0)?;
                io.write_u32::<LittleEndian>(header.msg_stream_id)?;
            }
            ChunkType::Type1 => {
                let field = if extended { EXTENDED_TIMESTAMP_SENTINEL } else { field_value };
                io.write_u24::<BigEndian>(field)?;
                io.write_u24::<BigEndian>(header.msg_length)?;
                io.write_u8(header.msg_type_id.0)?;
            }
            ChunkType::Type2 => {
                let field = if extended { EXTENDED_TIMESTAMP_SENTINEL } else { field_value };
                io.write_u24::<BigEndian>(field)?;
            }
            ChunkType::Type3 => {}
        }

        if extended {
            Self::write_extended_timestamp(io, field_value)?;
        }

        // Payload split into chunk-size pieces with type 3 continuations.
        // A continuation of a message whose header used the extended
        // timestamp repeats the 4 bytes; Adobe and FFmpeg expect them.
        let mut payload = chunk_info.payload.clone();
        loop {
            let cur_payload_size = payload.len().min(self.chunk_size);
            let payload_bytes = payload.split_to(cur_payload_size);
            io.write_all(&payload_bytes[..])?;

            if payload.is_empty() {
                break;
            }

            Self::write_basic_header(io, ChunkType::Type3, csid)?;

            if extended {
                Self::write_extended_timestamp(io, field_value)?;
            }
        }

        self.history.insert(
            csid,
            OutboundChunkState {
                timestamp: header.timestamp,
                timestamp_delta: delta,
                msg_length: header.msg_length,
                msg_type_id: header.msg_type_id,
                msg_stream_id: header.msg_stream_id,
            },
        );

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn write_small_chunk() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        let chunk = Chunk::new(
            0,
            0,
            MessageType::Abort,
            0,
            Bytes::from(vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07]),
        );

        writer.write_chunk(&mut buf, chunk).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                (0x00 << 6), // chunk basic header - fmt: 0, csid: 0
                0x00, 0x00, 0x00, // timestamp (0)
                0x00, 0x00, 0x08, // message length (8 bytes)
                0x02, // message type id (abort)
                0x00, 0x00, 0x00, 0x00, // message stream id (0)
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, // message payload
            ]
        );
    }

    #[test]
    fn write_large_chunk() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        let mut payload = Vec::new();
        for i in 0..129 {
            payload.push(i);
        }

        let chunk = Chunk::new(10, 100, MessageType::Audio, 13, Bytes::from(payload));

        writer.write_chunk(&mut buf, chunk).unwrap();

        #[rustfmt::skip]
        let mut expected = vec![
            0x0A, // chunk basic header - fmt: 0, csid: 10
            0x00, 0x00, 0x64, // timestamp (100)
            0x00, 0x00, 0x81, // message length (129 bytes)
            0x08, // message type id (audio)
            0x0D, 0x00, 0x00, 0x00, // message stream id (13)
        ];

        for i in 0..128 {
            expected.push(i);
        }

        expected.push((0x03 << 6) | 0x0A); // chunk basic header - fmt: 3, csid: 10
        expected.push(128); // the rest of the payload

        assert_eq!(buf, expected);
    }

    #[test]
    fn extended_timestamp_repeats_on_continuations() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        let mut payload = Vec::new();
        for i in 0..129 {
            payload.push(i);
        }

        let chunk = Chunk::new(0, 0xFFFFFFFF, MessageType::Abort, 0, Bytes::from(payload));

        writer.write_chunk(&mut buf, chunk).unwrap();

        #[rustfmt::skip]
        let mut expected = vec![
            (0x00 << 6), // chunk basic header - fmt: 0, csid: 0
            0xFF, 0xFF, 0xFF, // timestamp sentinel
            0x00, 0x00, 0x81, // message length (129 bytes)
            0x02, // message type id (abort)
            0x00, 0x00, 0x00, 0x00, // message stream id (0)
            0xFF, 0xFF, 0xFF, 0xFF, // extended timestamp
        ];

        for i in 0..128 {
            expected.push(i);
        }

        expected.push(0x03 << 6); // chunk basic header - fmt: 3, csid: 0
        expected.extend(vec![0xFF, 0xFF, 0xFF, 0xFF]); // extended timestamp repeated
        expected.push(128);

        assert_eq!(buf, expected);
    }

    #[test]
    fn extended_csid_two_byte_form() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        let chunk = Chunk::new(64, 0, MessageType::Abort, 0, Bytes::from(vec![0x00]));
        writer.write_chunk(&mut buf, chunk).unwrap();

        assert_eq!(buf[0], 0x00 << 6);
        assert_eq!(buf[1], 0x00); // csid 64 + 0
    }

    #[test]
    fn extended_csid_three_byte_form() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        let chunk = Chunk::new(320, 0, MessageType::Abort, 0, Bytes::from(vec![0x00]));
        writer.write_chunk(&mut buf, chunk).unwrap();

        assert_eq!(buf[0], 0x01);
        assert_eq!(buf[1], 0x00); // (320 - 64) % 256
        assert_eq!(buf[2], 0x01); // (320 - 64) / 256
    }

    #[test]
    fn header_compression_sequence() {
        let mut writer = ChunkWriter::default();

        // first message: type 0
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 0, MessageType::Audio, 1, Bytes::from(vec![0; 4])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 0);

        // same everything at the same timestamp: type 3 (stored delta 0)
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 0, MessageType::Audio, 1, Bytes::from(vec![0; 4])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 3);
        assert_eq!(buf.len(), 1 + 4);

        // new delta, same length and type: type 2
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 20, MessageType::Audio, 1, Bytes::from(vec![0; 4])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 2);
        assert_eq!(&buf[1..4], &[0x00, 0x00, 0x14]);

        // same delta again: type 3
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 40, MessageType::Audio, 1, Bytes::from(vec![0; 4])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 3);

        // new length: type 1
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 60, MessageType::Audio, 1, Bytes::from(vec![0; 8])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 1);

        // timestamp goes backwards: type 0
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 10, MessageType::Audio, 1, Bytes::from(vec![0; 8])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 0);

        // new message stream id: type 0
        let mut buf = Vec::new();
        writer
            .write_chunk(&mut buf, Chunk::new(4, 10, MessageType::Audio, 2, Bytes::from(vec![0; 8])))
            .unwrap();
        assert_eq!(buf[0] >> 6, 0);
    }

    #[test]
    fn payload_too_large() {
        let mut writer = ChunkWriter::default();
        let chunk = Chunk::new(4, 0, MessageType::Video, 1, Bytes::from(vec![0; 0x100_0000]));

        assert!(matches!(
            writer.write_chunk(&mut Vec::new(), chunk),
            Err(ChunkWriteError::PayloadTooLarge(0x100_0000))
        ));
    }

    #[test]
    fn chunk_size_boundaries() {
        for (payload_len, expected_chunks) in [(128usize, 1usize), (129, 2), (256, 2), (257, 3)] {
            let mut writer = ChunkWriter::default();
            let mut buf = Vec::new();

            writer
                .write_chunk(
                    &mut buf,
                    Chunk::new(9, 0, MessageType::Video, 1, Bytes::from(vec![0xAB; payload_len])),
                )
                .unwrap();

            // one 12-byte type 0 header plus a 1-byte type 3 header per extra chunk
            assert_eq!(buf.len(), 12 + payload_len + (expected_chunks - 1));
        }
    }
}
