//! Writing [`Command`].

use std::fmt::Display;
use std::io;

use bytes::Bytes;
use freshet_amf::Amf0Encoder;

use super::error::CommandError;
use super::{AmfVersion, Command, CommandResultLevel, CommandType};
use crate::chunk::{CHUNK_STREAM_ID_COMMAND, Chunk, ChunkWriter};
use crate::error::RtmpError;
use crate::messages::MessageType;

impl AsRef<str> for CommandResultLevel {
    fn as_ref(&self) -> &str {
        match self {
            CommandResultLevel::Warning => "warning",
            CommandResultLevel::Status => "status",
            CommandResultLevel::Error => "error",
            CommandResultLevel::Unknown(s) => s,
        }
    }
}

impl Display for CommandResultLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl Command {
    /// Writes a [`Command`] to the given writer as one command message on
    /// the given message stream.
    ///
    /// The command travels as message type 20 (AMF0) or 17 (AMF3, with the
    /// format prefix). Unknown commands are skipped.
    pub fn write(
        &self,
        io: &mut impl io::Write,
        writer: &mut ChunkWriter,
        stream_id: u32,
        version: AmfVersion,
    ) -> Result<(), RtmpError> {
        let mut buf = Vec::new();

        if version == AmfVersion::Amf3 {
            // the AMF3 command format prefix
            buf.push(0);
        }

        match &self.command_type {
            CommandType::NetConnection(command) => {
                command.write(&mut buf, self.transaction_id, version)?;
            }
            CommandType::NetStream(command) => {
                command.write(&mut buf, self.transaction_id)?;
            }
            CommandType::OnStatus(command) => {
                command.write(&mut buf, self.transaction_id)?;
            }
            CommandType::Result { values } => {
                let mut encoder = Amf0Encoder::new(&mut buf);
                encoder.encode_string("_result").map_err(CommandError::Amf)?;
                encoder.encode_number(self.transaction_id).map_err(CommandError::Amf)?;
                for value in values {
                    encoder.encode_value(value).map_err(CommandError::Amf)?;
                }
            }
            CommandType::Error { values } => {
                let mut encoder = Amf0Encoder::new(&mut buf);
                encoder.encode_string("_error").map_err(CommandError::Amf)?;
                encoder.encode_number(self.transaction_id).map_err(CommandError::Amf)?;
                for value in values {
                    encoder.encode_value(value).map_err(CommandError::Amf)?;
                }
            }
            // don't write unknown commands
            CommandType::Unknown { .. } => return Ok(()),
        }

        let msg_type_id = match version {
            AmfVersion::Amf0 => MessageType::CommandAMF0,
            AmfVersion::Amf3 => MessageType::CommandAMF3,
        };

        writer.write_chunk(
            io,
            Chunk::new(CHUNK_STREAM_ID_COMMAND, 0, msg_type_id, stream_id, Bytes::from(buf)),
        )?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::chunk::ChunkReader;
    use crate::command_messages::netconnection::NetConnectionCommand;
    use crate::messages::MessageData;

    #[test]
    fn command_result_level_to_str() {
        assert_eq!(CommandResultLevel::Warning.as_ref(), "warning");
        assert_eq!(CommandResultLevel::Status.as_ref(), "status");
        assert_eq!(CommandResultLevel::Error.as_ref(), "error");
        assert_eq!(CommandResultLevel::Unknown("custom".to_string()).as_ref(), "custom");
        assert_eq!(CommandResultLevel::Status.to_string(), "status");
    }

    #[test]
    fn write_create_stream_amf0() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        Command {
            transaction_id: 4.0,
            command_type: CommandType::NetConnection(NetConnectionCommand::CreateStream),
        }
        .write(&mut buf, &mut writer, 0, AmfVersion::Amf0)
        .unwrap();

        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&buf[..]);
        let chunk = reader.read_chunk(&mut buffer).unwrap().expect("chunk");

        assert_eq!(chunk.basic_header.chunk_stream_id, CHUNK_STREAM_ID_COMMAND);
        assert_eq!(chunk.message_header.msg_type_id, MessageType::CommandAMF0);

        let MessageData::Command(command) = MessageData::read(&chunk).unwrap() else {
            panic!("expected command");
        };
        assert_eq!(command.transaction_id, 4.0);
        assert!(matches!(
            command.command_type,
            CommandType::NetConnection(NetConnectionCommand::CreateStream)
        ));
    }

    #[test]
    fn write_result_amf3_round_trip() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        Command {
            transaction_id: 1.0,
            command_type: CommandType::Result {
                values: vec![freshet_amf::AmfValue::Null, freshet_amf::AmfValue::Number(3.0)],
            },
        }
        .write(&mut buf, &mut writer, 0, AmfVersion::Amf3)
        .unwrap();

        let mut reader = ChunkReader::default();
        let mut buffer = BytesMut::from(&buf[..]);
        let chunk = reader.read_chunk(&mut buffer).unwrap().expect("chunk");

        assert_eq!(chunk.message_header.msg_type_id, MessageType::CommandAMF3);

        let MessageData::Command(command) = MessageData::read(&chunk).unwrap() else {
            panic!("expected command");
        };
        let CommandType::Result { values } = command.command_type else {
            panic!("expected result");
        };
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn unknown_commands_are_skipped() {
        let mut writer = ChunkWriter::default();
        let mut buf = Vec::new();

        Command {
            transaction_id: 0.0,
            command_type: CommandType::Unknown(crate::command_messages::UnknownCommand {
                command_name: "mystery".to_string(),
                values: Vec::new(),
            }),
        }
        .write(&mut buf, &mut writer, 0, AmfVersion::Amf0)
        .unwrap();

        assert!(buf.is_empty());
    }
}
