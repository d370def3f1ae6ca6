//! Reading user control messages.

use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;

use super::{EventMessage, EventType};

impl EventMessage {
    /// Reads an [`EventMessage`] from a user control message payload.
    pub fn read(data: &Bytes) -> io::Result<Self> {
        let mut cursor = io::Cursor::new(data.clone());
        let event_type = EventType(cursor.read_u16::<BigEndian>()?);

        let event = match event_type {
            EventType::StreamBegin => Self::StreamBegin {
                stream_id: cursor.read_u32::<BigEndian>()?,
            },
            EventType::StreamEOF => Self::StreamEof {
                stream_id: cursor.read_u32::<BigEndian>()?,
            },
            EventType::StreamDry => Self::StreamDry {
                stream_id: cursor.read_u32::<BigEndian>()?,
            },
            EventType::SetBufferLength => Self::SetBufferLength {
                stream_id: cursor.read_u32::<BigEndian>()?,
                buffer_length_ms: cursor.read_u32::<BigEndian>()?,
            },
            EventType::StreamIsRecorded => Self::StreamIsRecorded {
                stream_id: cursor.read_u32::<BigEndian>()?,
            },
            EventType::PingRequest => Self::PingRequest {
                timestamp: cursor.read_u32::<BigEndian>()?,
            },
            EventType::PingResponse => Self::PingResponse {
                timestamp: cursor.read_u32::<BigEndian>()?,
            },
            _ => Self::Unknown {
                event_type,
                data: cursor.extract_remaining(),
            },
        };

        Ok(event)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn read_stream_begin() {
        let data = Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(EventMessage::read(&data).unwrap(), EventMessage::StreamBegin { stream_id: 1 });
    }

    #[test]
    fn read_set_buffer_length() {
        let data = Bytes::from_static(&[0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x03, 0xE8]);
        assert_eq!(
            EventMessage::read(&data).unwrap(),
            EventMessage::SetBufferLength {
                stream_id: 1,
                buffer_length_ms: 1000,
            }
        );
    }

    #[test]
    fn read_ping_request() {
        let data = Bytes::from_static(&[0x00, 0x06, 0x00, 0x00, 0x12, 0x34]);
        assert_eq!(
            EventMessage::read(&data).unwrap(),
            EventMessage::PingRequest { timestamp: 0x1234 }
        );
    }

    #[test]
    fn read_unknown_event() {
        let data = Bytes::from_static(&[0x00, 0x20, 0xAA]);
        assert_eq!(
            EventMessage::read(&data).unwrap(),
            EventMessage::Unknown {
                event_type: EventType(0x20),
                data: Bytes::from_static(&[0xAA]),
            }
        );
    }
}
