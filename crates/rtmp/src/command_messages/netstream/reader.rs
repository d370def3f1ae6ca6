//! Reading [`NetStreamCommand`].

use freshet_amf::{Amf0Decoder, Amf0Marker};

use super::NetStreamCommand;
use crate::command_messages::error::CommandError;

impl NetStreamCommand {
    /// Reads a [`NetStreamCommand`] from the given decoder.
    ///
    /// Returns `Ok(None)` if the `command_name` is not recognized.
    pub fn read(command_name: &str, decoder: &mut Amf0Decoder) -> Result<Option<Self>, CommandError> {
        match command_name {
            "play" => {
                // skip command object
                decoder.decode_null()?;

                let stream_name = decoder.decode_string()?;

                let mut start = None;
                let mut duration = None;
                let mut reset = None;

                if decoder.has_remaining() {
                    start = Some(decoder.decode_number()?);
                }
                if decoder.has_remaining() {
                    duration = Some(decoder.decode_number()?);
                }
                if decoder.has_remaining() {
                    reset = Some(match decoder.peek_marker()? {
                        // some peers send the reset flag as a number
                        Amf0Marker::Number => decoder.decode_number()? != 0.0,
                        _ => decoder.decode_boolean()?,
                    });
                }

                Ok(Some(Self::Play {
                    stream_name,
                    start,
                    duration,
                    reset,
                }))
            }
            "play2" => {
                // skip command object
                decoder.decode_null()?;

                let parameters = decoder.decode_object()?;
                Ok(Some(Self::Play2 { parameters }))
            }
            "deleteStream" => {
                // skip command object
                decoder.decode_null()?;

                let stream_id = decoder.decode_number()?;
                Ok(Some(Self::DeleteStream { stream_id }))
            }
            "closeStream" => Ok(Some(Self::CloseStream)),
            "receiveAudio" => {
                // skip command object
                decoder.decode_null()?;

                let receive_audio = decoder.decode_boolean()?;
                Ok(Some(Self::ReceiveAudio { receive_audio }))
            }
            "receiveVideo" => {
                // skip command object
                decoder.decode_null()?;

                let receive_video = decoder.decode_boolean()?;
                Ok(Some(Self::ReceiveVideo { receive_video }))
            }
            "publish" => {
                // skip command object
                decoder.decode_null()?;

                let publishing_name = decoder.decode_string()?;
                let publishing_type = decoder.deserialize()?;

                Ok(Some(Self::Publish {
                    publishing_name,
                    publishing_type,
                }))
            }
            "seek" => {
                // skip command object
                decoder.decode_null()?;

                let milliseconds = decoder.decode_number()?;
                Ok(Some(Self::Seek { milliseconds }))
            }
            "pause" => {
                // skip command object
                decoder.decode_null()?;

                let pause = decoder.decode_boolean()?;
                let milliseconds = decoder.decode_number()?;
                Ok(Some(Self::Pause { pause, milliseconds }))
            }
            _ => Ok(None),
        }
    }
}
