//! FLV audio tag bodies.

use std::io;

use byteorder::{ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_aac::AudioSpecificConfig;
use freshet_bytes_util::BytesCursorExt;
use nutype_enum::nutype_enum;

use crate::audio::header::{AudioTagHeader, SoundFormat};
use crate::error::FlvError;

nutype_enum! {
    /// FLV `AACPacketType`
    ///
    /// Indicates the type of the AAC data following the audio tag header.
    ///
    /// Defined by:
    /// - Legacy FLV spec, Annex E.4.2.2 - AACAUDIODATA
    pub enum AacPacketType(u8) {
        /// Sequence Header: the `AudioSpecificConfig`
        SequenceHeader = 0,
        /// Raw AAC frame data
        Raw = 1,
    }
}

/// FLV `AACAUDIODATA`
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.2.2 - AACAUDIODATA
#[derive(Debug, Clone, PartialEq)]
pub enum AacAudioData {
    /// The `AudioSpecificConfig` bytes.
    SequenceHeader(Bytes),
    /// Raw AAC frame data.
    Raw(Bytes),
    /// Data with an unknown packet type.
    Unknown {
        /// The AAC packet type.
        aac_packet_type: AacPacketType,
        /// The raw data.
        data: Bytes,
    },
}

impl AacAudioData {
    /// Parses the carried `AudioSpecificConfig`, if this is a sequence header.
    pub fn audio_specific_config(&self) -> Option<Result<AudioSpecificConfig, FlvError>> {
        match self {
            AacAudioData::SequenceHeader(data) => Some(AudioSpecificConfig::parse(data.clone()).map_err(Into::into)),
            _ => None,
        }
    }
}

/// The body of an FLV audio tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioTagBody {
    /// AAC data, preceded by its packet type byte.
    Aac(AacAudioData),
    /// Data of any other sound format, opaque.
    Other {
        /// The raw body.
        sound_data: Bytes,
    },
}

impl AudioTagBody {
    /// Demuxes the audio tag body from the given reader, dispatching on the
    /// already demuxed header.
    pub fn demux(header: &AudioTagHeader, reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        if header.sound_format != SoundFormat::Aac {
            return Ok(Self::Other {
                sound_data: reader.extract_remaining(),
            });
        }

        let aac_packet_type = AacPacketType::from(reader.read_u8()?);
        let data = reader.extract_remaining();

        let body = match aac_packet_type {
            AacPacketType::SequenceHeader => AacAudioData::SequenceHeader(data),
            AacPacketType::Raw => AacAudioData::Raw(data),
            _ => AacAudioData::Unknown { aac_packet_type, data },
        };

        Ok(Self::Aac(body))
    }

    /// Muxes the audio tag body into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            AudioTagBody::Aac(aac) => {
                let (packet_type, data) = match aac {
                    AacAudioData::SequenceHeader(data) => (AacPacketType::SequenceHeader, data),
                    AacAudioData::Raw(data) => (AacPacketType::Raw, data),
                    AacAudioData::Unknown { aac_packet_type, data } => (*aac_packet_type, data),
                };

                writer.write_u8(packet_type.0)?;
                writer.write_all(data)?;
            }
            AudioTagBody::Other { sound_data } => {
                writer.write_all(sound_data)?;
            }
        }

        Ok(())
    }
}
