//! FLV audio processing
//!
//! Use [`AudioData`] to demux the body of an FLV audio tag or RTMP audio
//! message; its `mux` counterpart produces the same bytes.

use std::io;

use body::AudioTagBody;
use bytes::Bytes;
use header::AudioTagHeader;

use crate::error::FlvError;

pub mod body;
pub mod header;

/// FLV `AUDIODATA` tag
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.2.1
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// The header of the audio data.
    pub header: AudioTagHeader,
    /// The body of the audio data.
    pub body: AudioTagBody,
}

impl AudioData {
    /// Demuxes audio data from a given reader.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let header = AudioTagHeader::demux(reader)?;
        let body = AudioTagBody::demux(&header, reader)?;

        Ok(AudioData { header, body })
    }

    /// Muxes the audio data into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        self.header.mux(writer)?;
        self.body.mux(writer)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::body::{AacAudioData, AudioTagBody};
    use super::header::{AudioTagHeader, SoundFormat, SoundRate, SoundSize, SoundType};
    use super::*;

    #[test]
    fn demux_aac_sequence_header() {
        // AAC, 44kHz, 16-bit, stereo, packet type 0, AudioSpecificConfig
        let data = Bytes::from_static(&[0xAF, 0x00, 0x12, 0x10]);

        let audio = AudioData::demux(&mut io::Cursor::new(data)).unwrap();

        assert_eq!(
            audio.header,
            AudioTagHeader {
                sound_format: SoundFormat::Aac,
                sound_rate: SoundRate::Hz44000,
                sound_size: SoundSize::Bit16,
                sound_type: SoundType::Stereo,
            }
        );
        assert_eq!(
            audio.body,
            AudioTagBody::Aac(AacAudioData::SequenceHeader(Bytes::from_static(&[0x12, 0x10])))
        );
    }

    #[test]
    fn mux_round_trip_aac_raw() {
        let audio = AudioData {
            header: AudioTagHeader {
                sound_format: SoundFormat::Aac,
                sound_rate: SoundRate::Hz44000,
                sound_size: SoundSize::Bit16,
                sound_type: SoundType::Stereo,
            },
            body: AudioTagBody::Aac(AacAudioData::Raw(Bytes::from_static(&[1, 2, 3]))),
        };

        let mut buf = Vec::new();
        audio.mux(&mut buf).unwrap();
        assert_eq!(buf, vec![0xAF, 0x01, 1, 2, 3]);

        let demuxed = AudioData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(demuxed, audio);
    }

    #[test]
    fn mux_round_trip_other_format() {
        let audio = AudioData {
            header: AudioTagHeader {
                sound_format: SoundFormat::Mp3,
                sound_rate: SoundRate::Hz22000,
                sound_size: SoundSize::Bit16,
                sound_type: SoundType::Mono,
            },
            body: AudioTagBody::Other {
                sound_data: Bytes::from_static(&[9, 9]),
            },
        };

        let mut buf = Vec::new();
        audio.mux(&mut buf).unwrap();
        assert_eq!(buf[0], 0x2A);

        let demuxed = AudioData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(demuxed, audio);
    }
}
