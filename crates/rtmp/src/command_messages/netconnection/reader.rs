//! Reading [`NetConnectionCommand`].

use freshet_amf::Amf0Decoder;

use super::NetConnectionCommand;
use crate::command_messages::error::CommandError;

impl NetConnectionCommand {
    /// Reads a [`NetConnectionCommand`] from the given decoder.
    ///
    /// Returns `Ok(None)` if the `command_name` is not recognized.
    pub fn read(command_name: &str, decoder: &mut Amf0Decoder) -> Result<Option<Self>, CommandError> {
        match command_name {
            "connect" => {
                let command_object = decoder.deserialize()?;
                Ok(Some(Self::Connect(Box::new(command_object))))
            }
            "call" => {
                let command_object = decoder.decode_value()?;
                let arguments = decoder.decode_all()?;
                Ok(Some(Self::Call {
                    command_object,
                    arguments,
                }))
            }
            "close" => Ok(Some(Self::Close)),
            "createStream" => {
                // skip the unused command object
                if decoder.has_remaining() {
                    decoder.decode_value()?;
                }
                Ok(Some(Self::CreateStream))
            }
            "releaseStream" => {
                decoder.decode_null()?;
                let stream_name = decoder.decode_string()?;
                Ok(Some(Self::ReleaseStream { stream_name }))
            }
            "FCPublish" => {
                decoder.decode_null()?;
                let stream_name = decoder.decode_string()?;
                Ok(Some(Self::FCPublish { stream_name }))
            }
            "FCUnpublish" => {
                decoder.decode_null()?;
                let stream_name = decoder.decode_string()?;
                Ok(Some(Self::FCUnpublish { stream_name }))
            }
            _ => Ok(None),
        }
    }
}
