//! Writing [`NetConnectionCommand`].

use std::io;

use freshet_amf::{Amf0Encoder, AmfObject, AmfValue};

use super::{NetConnectionCommand, NetConnectionCommandConnectResult};
use crate::command_messages::AmfVersion;
use crate::command_messages::error::CommandError;

impl NetConnectionCommand {
    /// Writes the name, transaction id and body of a [`NetConnectionCommand`].
    pub fn write(
        &self,
        buf: &mut impl io::Write,
        transaction_id: f64,
        version: AmfVersion,
    ) -> Result<(), CommandError> {
        let mut encoder = Amf0Encoder::new(buf);

        // In AMF3 sessions the command name and transaction id stay AMF0;
        // only the object arguments switch to AMF3 through the avmplus
        // marker.
        let encode_object = |encoder: &mut Amf0Encoder<_>, value: &AmfValue| match version {
            AmfVersion::Amf0 => encoder.encode_value(value),
            AmfVersion::Amf3 => encoder.encode_avmplus(value),
        };

        match self {
            Self::Connect(connect) => {
                encoder.encode_string("connect")?;
                encoder.encode_number(transaction_id)?;

                match version {
                    AmfVersion::Amf0 => encoder.serialize(connect.as_ref())?,
                    AmfVersion::Amf3 => {
                        // Serialize to a value first, the avmplus switch needs
                        // the whole object.
                        let mut object = Vec::new();
                        Amf0Encoder::new(&mut object).serialize(connect.as_ref())?;
                        let value = freshet_amf::Amf0Decoder::new(bytes::Bytes::from(object)).decode_value()?;
                        encoder.encode_avmplus(&value)?;
                    }
                }
            }
            Self::Call {
                command_object,
                arguments,
            } => {
                encoder.encode_string("call")?;
                encoder.encode_number(transaction_id)?;
                encode_object(&mut encoder, command_object)?;
                for argument in arguments {
                    encode_object(&mut encoder, argument)?;
                }
            }
            Self::Close => {
                encoder.encode_string("close")?;
                encoder.encode_number(transaction_id)?;
            }
            Self::CreateStream => {
                encoder.encode_string("createStream")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
            }
            Self::ReleaseStream { stream_name } => {
                encoder.encode_string("releaseStream")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_string(stream_name)?;
            }
            Self::FCPublish { stream_name } => {
                encoder.encode_string("FCPublish")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_string(stream_name)?;
            }
            Self::FCUnpublish { stream_name } => {
                encoder.encode_string("FCUnpublish")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_string(stream_name)?;
            }
            Self::ConnectResult(NetConnectionCommandConnectResult {
                fmsver,
                capabilities,
                level,
                code,
                description,
                encoding,
            }) => {
                encoder.encode_string("_result")?;
                encoder.encode_number(transaction_id)?;

                let properties: AmfObject = [
                    ("fmsVer", AmfValue::String(fmsver.clone())),
                    ("capabilities", AmfValue::Number(*capabilities)),
                ]
                .into_iter()
                .collect();
                encoder.encode_object(&properties)?;

                let information: AmfObject = [
                    ("level", AmfValue::String(level.to_string())),
                    ("code", AmfValue::String(code.clone())),
                    ("description", AmfValue::String(description.clone())),
                    ("objectEncoding", AmfValue::Number(*encoding)),
                ]
                .into_iter()
                .collect();
                encoder.encode_object(&information)?;
            }
            Self::CreateStreamResult { stream_id } => {
                encoder.encode_string("_result")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_number(*stream_id)?;
            }
        }

        Ok(())
    }
}
