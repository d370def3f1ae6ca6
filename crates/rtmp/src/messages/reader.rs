//! Reading [`MessageData`].

use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;

use super::{AggregateSubMessage, MessageData, MessageType, UnknownMessage};
use crate::chunk::Chunk;
use crate::command_messages::Command;
use crate::error::RtmpError;
use crate::protocol_control_messages::{
    ProtocolControlMessageAbort, ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize,
    ProtocolControlMessageSetPeerBandwidth, ProtocolControlMessageWindowAcknowledgementSize,
};
use crate::user_control_messages::EventMessage;

impl MessageData {
    /// Reads [`MessageData`] from the given chunk.
    pub fn read(chunk: &Chunk) -> Result<Self, RtmpError> {
        match chunk.message_header.msg_type_id {
            // Protocol Control Messages
            MessageType::SetChunkSize => {
                let data = ProtocolControlMessageSetChunkSize::read(&chunk.payload)?;
                Ok(Self::SetChunkSize(data))
            }
            MessageType::Abort => {
                let data = ProtocolControlMessageAbort::read(&chunk.payload)?;
                Ok(Self::Abort(data))
            }
            MessageType::Acknowledgement => {
                let data = ProtocolControlMessageAcknowledgement::read(&chunk.payload)?;
                Ok(Self::Acknowledgement(data))
            }
            MessageType::UserControlEvent => {
                let data = EventMessage::read(&chunk.payload)?;
                Ok(Self::UserControlEvent(data))
            }
            MessageType::WindowAcknowledgementSize => {
                let data = ProtocolControlMessageWindowAcknowledgementSize::read(&chunk.payload)?;
                Ok(Self::SetAcknowledgementWindowSize(data))
            }
            MessageType::SetPeerBandwidth => {
                let data = ProtocolControlMessageSetPeerBandwidth::read(&chunk.payload)?;
                Ok(Self::SetPeerBandwidth(data))
            }
            // RTMP Command Messages
            MessageType::Audio => Ok(Self::AudioData {
                data: chunk.payload.clone(),
            }),
            MessageType::Video => Ok(Self::VideoData {
                data: chunk.payload.clone(),
            }),
            MessageType::CommandAMF0 => Ok(Self::Command(Command::read_amf0(chunk.payload.clone())?)),
            MessageType::CommandAMF3 => Ok(Self::Command(Command::read_amf3(chunk.payload.clone())?)),
            // Metadata
            MessageType::DataAMF0 => Ok(Self::DataAmf0 {
                data: chunk.payload.clone(),
            }),
            MessageType::Aggregate => Ok(Self::Aggregate {
                messages: read_aggregate(chunk.payload.clone(), chunk.message_header.timestamp)?,
            }),
            msg_type_id => Ok(Self::Unknown(UnknownMessage {
                msg_type_id,
                data: chunk.payload.clone(),
            })),
        }
    }
}

/// Splits an aggregate message body into its sub-messages.
///
/// Each sub-message is a full FLV-style tag header (type, u24 size, split
/// timestamp, u24 stream id), the body, and a 4-byte back pointer. The first
/// sub-message's timestamp is rebased so that it matches the aggregate's,
/// and the same offset shifts every following sub-message.
fn read_aggregate(payload: Bytes, aggregate_timestamp: u32) -> Result<Vec<AggregateSubMessage>, RtmpError> {
    let mut reader = io::Cursor::new(payload);
    let mut messages = Vec::new();
    let mut timestamp_offset: Option<i64> = None;

    while (reader.position() as usize) < reader.get_ref().len() {
        let msg_type_id = MessageType(reader.read_u8()?);
        let size = reader.read_u24::<BigEndian>()?;
        let timestamp = reader.read_u24::<BigEndian>()? | ((reader.read_u8()? as u32) << 24);
        // stream id, unused: sub-messages inherit the aggregate's stream
        reader.read_u24::<BigEndian>()?;

        let data = reader.extract_bytes(size as usize)?;

        // back pointer: the size of the previous message including header
        reader.read_u32::<BigEndian>()?;

        let offset = *timestamp_offset.get_or_insert(aggregate_timestamp as i64 - timestamp as i64);

        messages.push(AggregateSubMessage {
            msg_type_id,
            timestamp: (timestamp as i64 + offset) as u32,
            data,
        });
    }

    Ok(messages)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use byteorder::WriteBytesExt;
    use bytes::Bytes;

    use super::*;
    use crate::command_messages::CommandType;
    use crate::command_messages::netconnection::NetConnectionCommand;

    #[test]
    fn read_command() {
        let mut buf = Vec::new();
        let mut encoder = freshet_amf::Amf0Encoder::new(&mut buf);
        encoder.encode_string("connect").unwrap();
        encoder.encode_number(1.0).unwrap();
        let object: freshet_amf::AmfObject = [("app", freshet_amf::AmfValue::String("testapp".to_string()))]
            .into_iter()
            .collect();
        encoder.encode_object(&object).unwrap();

        let chunk = Chunk::new(3, 0, MessageType::CommandAMF0, 0, Bytes::from(buf));

        let message = MessageData::read(&chunk).expect("no errors");
        let MessageData::Command(command) = message else {
            panic!("wrong message type");
        };

        assert_eq!(command.transaction_id, 1.0);
        let CommandType::NetConnection(NetConnectionCommand::Connect(connect)) = command.command_type else {
            panic!("wrong command");
        };
        assert_eq!(connect.app, "testapp");
    }

    #[test]
    fn read_audio_packet() {
        let chunk = Chunk::new(4, 0, MessageType::Audio, 1, Bytes::from_static(&[0xAF, 0x01, 0x00]));

        let message = MessageData::read(&chunk).expect("no errors");
        let MessageData::AudioData { data } = message else {
            panic!("wrong message type");
        };
        assert_eq!(data, Bytes::from_static(&[0xAF, 0x01, 0x00]));
    }

    #[test]
    fn read_set_chunk_size() {
        let chunk = Chunk::new(2, 0, MessageType::SetChunkSize, 0, Bytes::from_static(&[0x00, 0xFF, 0xFF, 0xFF]));

        let message = MessageData::read(&chunk).expect("no errors");
        let MessageData::SetChunkSize(data) = message else {
            panic!("wrong message type");
        };
        assert_eq!(data.chunk_size, 0x00FF_FFFF);
    }

    #[test]
    fn read_aggregate_message() {
        let mut body = Vec::new();

        for (i, payload) in [&[0xAAu8][..], &[0xBB, 0xCC][..]].iter().enumerate() {
            body.write_u8(8).unwrap(); // audio
            body.write_u24::<BigEndian>(payload.len() as u32).unwrap();
            body.write_u24::<BigEndian>(100 + i as u32 * 20).unwrap();
            body.write_u8(0).unwrap(); // timestamp extension
            body.write_u24::<BigEndian>(1).unwrap(); // stream id
            body.extend_from_slice(payload);
            body.write_u32::<BigEndian>(11 + payload.len() as u32).unwrap();
        }

        let chunk = Chunk::new(4, 500, MessageType::Aggregate, 1, Bytes::from(body));

        let message = MessageData::read(&chunk).expect("no errors");
        let MessageData::Aggregate { messages } = message else {
            panic!("wrong message type");
        };

        assert_eq!(messages.len(), 2);
        // rebased onto the aggregate timestamp
        assert_eq!(messages[0].timestamp, 500);
        assert_eq!(messages[1].timestamp, 520);
        assert_eq!(messages[0].data, Bytes::from_static(&[0xAA]));
        assert_eq!(messages[1].data, Bytes::from_static(&[0xBB, 0xCC]));
    }

    #[test]
    fn unknown_message_type() {
        let chunk = Chunk::new(2, 0, MessageType(42), 0, Bytes::from_static(&[0x00]));

        assert!(matches!(
            MessageData::read(&chunk).expect("no errors"),
            MessageData::Unknown(UnknownMessage {
                msg_type_id: MessageType(42),
                ..
            })
        ));
    }
}
