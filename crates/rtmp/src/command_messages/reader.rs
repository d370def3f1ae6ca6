//! Reading [`Command`].

use std::convert::Infallible;
use std::str::FromStr;

use bytes::Bytes;
use freshet_amf::Amf0Decoder;

use super::error::CommandError;
use super::netconnection::NetConnectionCommand;
use super::netstream::NetStreamCommand;
use super::on_status::OnStatus;
use super::{Command, CommandResultLevel, CommandType, UnknownCommand};

impl Command {
    /// Reads a [`Command`] from an AMF0 command message payload (type 20).
    pub fn read_amf0(payload: Bytes) -> Result<Self, CommandError> {
        Self::read_inner(payload)
    }

    /// Reads a [`Command`] from an AMF3 command message payload (type 17).
    ///
    /// The payload carries a one-byte format prefix ahead of a stream that
    /// may switch to AMF3 through the avmplus marker; some producers omit
    /// the prefix, so it is skipped only when present.
    pub fn read_amf3(payload: Bytes) -> Result<Self, CommandError> {
        // a command always starts with a string name, so a leading zero byte
        // can only be the format prefix
        let payload = if payload.first() == Some(&0) {
            payload.slice(1..)
        } else {
            payload
        };

        Self::read_inner(payload)
    }

    fn read_inner(payload: Bytes) -> Result<Self, CommandError> {
        let mut decoder = Amf0Decoder::new(payload);

        let command_name = decoder.decode_string()?;
        let transaction_id = decoder.decode_number()?;

        let command_type = CommandType::read(command_name, &mut decoder)?;

        // tolerated, but worth a trace: real-world producers disagree about
        // the advisory ECMA array count
        if decoder.take_count_mismatch() {
            tracing::warn!(transaction_id = %transaction_id, "ecma array count mismatch in command");
        }

        Ok(Self {
            transaction_id,
            command_type,
        })
    }
}

impl CommandType {
    fn read(command_name: String, decoder: &mut Amf0Decoder) -> Result<Self, CommandError> {
        match command_name.as_str() {
            "_result" => {
                return Ok(Self::Result {
                    values: decoder.decode_all()?,
                });
            }
            "_error" => {
                return Ok(Self::Error {
                    values: decoder.decode_all()?,
                });
            }
            "onStatus" => return Ok(Self::OnStatus(OnStatus::read(decoder)?)),
            _ => {}
        }

        if let Some(command) = NetConnectionCommand::read(&command_name, decoder)? {
            return Ok(Self::NetConnection(command));
        }

        if let Some(command) = NetStreamCommand::read(&command_name, decoder)? {
            return Ok(Self::NetStream(command));
        }

        let values = decoder.decode_all()?;
        Ok(Self::Unknown(UnknownCommand { command_name, values }))
    }
}

impl FromStr for CommandResultLevel {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(Self::Warning),
            "status" => Ok(Self::Status),
            "error" => Ok(Self::Error),
            _ => Ok(Self::Unknown(s.to_string())),
        }
    }
}
