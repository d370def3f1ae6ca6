//! Writing user control messages.

use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use super::{EventMessage, EventType};
use crate::chunk::{CHUNK_STREAM_ID_PROTOCOL_CONTROL, Chunk, ChunkWriter};
use crate::error::RtmpError;
use crate::messages::MessageType;

impl EventMessage {
    fn event_type(&self) -> EventType {
        match self {
            Self::StreamBegin { .. } => EventType::StreamBegin,
            Self::StreamEof { .. } => EventType::StreamEOF,
            Self::StreamDry { .. } => EventType::StreamDry,
            Self::SetBufferLength { .. } => EventType::SetBufferLength,
            Self::StreamIsRecorded { .. } => EventType::StreamIsRecorded,
            Self::PingRequest { .. } => EventType::PingRequest,
            Self::PingResponse { .. } => EventType::PingResponse,
            Self::Unknown { event_type, .. } => *event_type,
        }
    }

    /// Writes the event as a user control message.
    pub fn write(&self, io: &mut impl io::Write, writer: &mut ChunkWriter) -> Result<(), RtmpError> {
        let mut data = Vec::new();

        data.write_u16::<BigEndian>(self.event_type().0).expect("write u16");

        match self {
            Self::StreamBegin { stream_id }
            | Self::StreamEof { stream_id }
            | Self::StreamDry { stream_id }
            | Self::StreamIsRecorded { stream_id } => {
                data.write_u32::<BigEndian>(*stream_id).expect("write u32");
            }
            Self::SetBufferLength {
                stream_id,
                buffer_length_ms,
            } => {
                data.write_u32::<BigEndian>(*stream_id).expect("write u32");
                data.write_u32::<BigEndian>(*buffer_length_ms).expect("write u32");
            }
            Self::PingRequest { timestamp } | Self::PingResponse { timestamp } => {
                data.write_u32::<BigEndian>(*timestamp).expect("write u32");
            }
            Self::Unknown { data: raw, .. } => {
                data.extend_from_slice(raw);
            }
        }

        writer.write_chunk(
            io,
            Chunk::new(
                CHUNK_STREAM_ID_PROTOCOL_CONTROL,
                0,
                MessageType::UserControlEvent,
                0,
                data.into(),
            ),
        )?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::{Bytes, BytesMut};

    use super::*;
    use crate::chunk::ChunkReader;

    fn round_trip(event: EventMessage) {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();
        event.write(&mut buf, &mut writer).unwrap();

        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&buf[..]);
        let chunk = reader.read_chunk(&mut buffer).expect("read chunk").expect("chunk");

        assert_eq!(chunk.basic_header.chunk_stream_id, 0x02);
        assert_eq!(chunk.message_header.msg_type_id, MessageType::UserControlEvent);
        assert_eq!(EventMessage::read(&chunk.payload).unwrap(), event);
    }

    #[test]
    fn write_stream_begin() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        EventMessage::StreamBegin { stream_id: 1 }.write(&mut buf, &mut writer).unwrap();

        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&buf[..]);
        let chunk = reader.read_chunk(&mut buffer).expect("read chunk").expect("chunk");
        assert_eq!(chunk.payload, Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]));
    }

    #[test]
    fn event_round_trips() {
        round_trip(EventMessage::StreamBegin { stream_id: 1 });
        round_trip(EventMessage::StreamEof { stream_id: 2 });
        round_trip(EventMessage::StreamDry { stream_id: 3 });
        round_trip(EventMessage::SetBufferLength {
            stream_id: 1,
            buffer_length_ms: 3000,
        });
        round_trip(EventMessage::StreamIsRecorded { stream_id: 1 });
        round_trip(EventMessage::PingRequest { timestamp: 42 });
        round_trip(EventMessage::PingResponse { timestamp: 42 });
    }
}
