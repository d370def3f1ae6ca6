//! Writing [`NetStreamCommand`].

use std::io;

use freshet_amf::Amf0Encoder;

use super::NetStreamCommand;
use crate::command_messages::error::CommandError;

impl NetStreamCommand {
    /// Writes the name, transaction id and body of a [`NetStreamCommand`].
    pub fn write(&self, buf: &mut impl io::Write, transaction_id: f64) -> Result<(), CommandError> {
        let mut encoder = Amf0Encoder::new(buf);

        match self {
            Self::Play {
                stream_name,
                start,
                duration,
                reset,
            } => {
                encoder.encode_string("play")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_string(stream_name)?;

                // the optional arguments are positional, a later one forces
                // the earlier ones
                if start.is_some() || duration.is_some() || reset.is_some() {
                    encoder.encode_number(start.unwrap_or(-2.0))?;
                }
                if duration.is_some() || reset.is_some() {
                    encoder.encode_number(duration.unwrap_or(-1.0))?;
                }
                if let Some(reset) = reset {
                    encoder.encode_boolean(*reset)?;
                }
            }
            Self::Play2 { parameters } => {
                encoder.encode_string("play2")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_object(parameters)?;
            }
            Self::DeleteStream { stream_id } => {
                encoder.encode_string("deleteStream")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_number(*stream_id)?;
            }
            Self::CloseStream => {
                encoder.encode_string("closeStream")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
            }
            Self::ReceiveAudio { receive_audio } => {
                encoder.encode_string("receiveAudio")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_boolean(*receive_audio)?;
            }
            Self::ReceiveVideo { receive_video } => {
                encoder.encode_string("receiveVideo")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_boolean(*receive_video)?;
            }
            Self::Publish {
                publishing_name,
                publishing_type,
            } => {
                encoder.encode_string("publish")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_string(publishing_name)?;
                encoder.encode_string(publishing_type.as_str())?;
            }
            Self::Seek { milliseconds } => {
                encoder.encode_string("seek")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_number(*milliseconds)?;
            }
            Self::Pause { pause, milliseconds } => {
                encoder.encode_string("pause")?;
                encoder.encode_number(transaction_id)?;
                encoder.encode_null()?;
                encoder.encode_boolean(*pause)?;
                encoder.encode_number(*milliseconds)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;
    use freshet_amf::Amf0Decoder;

    use super::*;
    use crate::command_messages::netstream::NetStreamCommandPublishPublishingType;

    fn write_and_read_back(command: NetStreamCommand) -> NetStreamCommand {
        let mut buf = Vec::new();
        command.write(&mut buf, 0.0).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        let name = decoder.decode_string().unwrap();
        decoder.decode_number().unwrap(); // transaction id

        NetStreamCommand::read(&name, &mut decoder).unwrap().expect("known command")
    }

    #[test]
    fn publish_round_trip() {
        let command = NetStreamCommand::Publish {
            publishing_name: "key".to_string(),
            publishing_type: NetStreamCommandPublishPublishingType::Live,
        };

        assert_eq!(write_and_read_back(command.clone()), command);
    }

    #[test]
    fn play_round_trip() {
        let command = NetStreamCommand::Play {
            stream_name: "key".to_string(),
            start: Some(-2.0),
            duration: None,
            reset: None,
        };

        assert_eq!(write_and_read_back(command.clone()), command);
    }

    #[test]
    fn play_reset_forces_positional_arguments() {
        let command = NetStreamCommand::Play {
            stream_name: "key".to_string(),
            start: None,
            duration: None,
            reset: Some(false),
        };

        assert_eq!(
            write_and_read_back(command),
            NetStreamCommand::Play {
                stream_name: "key".to_string(),
                start: Some(-2.0),
                duration: Some(-1.0),
                reset: Some(false),
            }
        );
    }

    #[test]
    fn control_commands_round_trip() {
        for command in [
            NetStreamCommand::DeleteStream { stream_id: 4.0 },
            NetStreamCommand::CloseStream,
            NetStreamCommand::ReceiveAudio { receive_audio: true },
            NetStreamCommand::ReceiveVideo { receive_video: false },
            NetStreamCommand::Seek { milliseconds: 5000.0 },
            NetStreamCommand::Pause {
                pause: true,
                milliseconds: 100.0,
            },
        ] {
            assert_eq!(write_and_read_back(command.clone()), command);
        }
    }
}
