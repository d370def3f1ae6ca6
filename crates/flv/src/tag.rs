//! FLV tag envelope processing.

use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;
use nutype_enum::nutype_enum;

use crate::audio::AudioData;
use crate::error::FlvError;
use crate::script::ScriptData;
use crate::video::VideoData;

nutype_enum! {
    /// The type of an FLV tag, the low 5 bits of the tag's first byte.
    ///
    /// Defined by:
    /// - Legacy FLV spec, Annex E.4.1
    pub enum FlvTagType(u8) {
        /// `AUDIODATA`
        Audio = 8,
        /// `VIDEODATA`
        Video = 9,
        /// `SCRIPTDATA`
        ScriptData = 18,
    }
}

/// An FLV tag: the envelope around one audio, video or script payload.
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.1
#[derive(Debug, Clone, PartialEq)]
pub struct FlvTag {
    /// The timestamp of this tag in milliseconds, the 24-bit field combined
    /// with the 8-bit extension.
    pub timestamp_ms: u32,
    /// The stream id of the tag, always 0.
    pub stream_id: u32,
    /// The actual data of the tag.
    pub data: FlvTagData,
}

/// The payload of an FLV tag.
#[derive(Debug, Clone, PartialEq)]
pub enum FlvTagData {
    /// `AUDIODATA` when the tag type is 8.
    Audio(AudioData),
    /// `VIDEODATA` when the tag type is 9.
    Video(VideoData),
    /// `SCRIPTDATA` when the tag type is 18.
    ScriptData(ScriptData),
    /// Any tag type this crate does not interpret.
    Unknown {
        /// The tag type.
        tag_type: FlvTagType,
        /// The raw body.
        data: Bytes,
    },
}

impl FlvTag {
    /// Demuxes one tag from the given reader, envelope and body.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let first_byte = reader.read_u8()?;

        // encrypted tags would need a filter body we cannot interpret
        if first_byte & 0b0010_0000 != 0 {
            return Err(FlvError::UnsupportedTagEncryption);
        }

        let tag_type = FlvTagType::from(first_byte & 0b0001_1111);

        let data_size = reader.read_u24::<BigEndian>()?;
        // the 24-bit timestamp is extended by a fourth, most significant byte
        let timestamp_ms = reader.read_u24::<BigEndian>()? | ((reader.read_u8()? as u32) << 24);
        let stream_id = reader.read_u24::<BigEndian>()?;

        let body = reader.extract_bytes(data_size as usize)?;
        let data = FlvTagData::demux(tag_type, body)?;

        Ok(FlvTag {
            timestamp_ms,
            stream_id,
            data,
        })
    }

    /// Muxes the tag, envelope and body, into the given writer.
    ///
    /// Returns the number of bytes written, which the caller records as the
    /// following previous-tag-size field.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<u32, FlvError> {
        let mut body = Vec::new();
        self.data.mux(&mut body)?;

        if body.len() > 0xFF_FFFF {
            return Err(FlvError::BodyTooLarge(body.len()));
        }

        writer.write_u8(self.data.tag_type().0)?;
        writer.write_u24::<BigEndian>(body.len() as u32)?;
        writer.write_u24::<BigEndian>(self.timestamp_ms & 0xFF_FFFF)?;
        writer.write_u8((self.timestamp_ms >> 24) as u8)?;
        writer.write_u24::<BigEndian>(self.stream_id)?;
        writer.write_all(&body)?;

        Ok(body.len() as u32 + 11)
    }
}

impl FlvTagData {
    /// Demuxes the tag data from the given body.
    pub fn demux(tag_type: FlvTagType, body: Bytes) -> Result<Self, FlvError> {
        let mut reader = io::Cursor::new(body);

        match tag_type {
            FlvTagType::Audio => Ok(FlvTagData::Audio(AudioData::demux(&mut reader)?)),
            FlvTagType::Video => Ok(FlvTagData::Video(VideoData::demux(&mut reader)?)),
            FlvTagType::ScriptData => Ok(FlvTagData::ScriptData(ScriptData::demux(&mut reader)?)),
            _ => Ok(FlvTagData::Unknown {
                tag_type,
                data: reader.extract_remaining(),
            }),
        }
    }

    /// Muxes the tag body into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            FlvTagData::Audio(audio) => audio.mux(writer),
            FlvTagData::Video(video) => video.mux(writer),
            FlvTagData::ScriptData(script) => script.mux(writer),
            FlvTagData::Unknown { data, .. } => {
                writer.write_all(data)?;
                Ok(())
            }
        }
    }

    /// The tag type byte for this payload.
    pub fn tag_type(&self) -> FlvTagType {
        match self {
            FlvTagData::Audio(_) => FlvTagType::Audio,
            FlvTagData::Video(_) => FlvTagType::Video,
            FlvTagData::ScriptData(_) => FlvTagType::ScriptData,
            FlvTagData::Unknown { tag_type, .. } => *tag_type,
        }
    }
}
