use std::io;

use bytes::Bytes;
use freshet_bytes_util::BitReader;

use crate::config::SAMPLE_FREQUENCIES;
use crate::{AacError, AudioSpecificConfig};

/// An ADTS frame header: 7 bytes, or 9 when a CRC is present.
///
/// ISO/IEC 13818-7:2006(E) - 6.2 (adts_frame)
#[derive(Debug, Clone, PartialEq)]
pub struct AdtsHeader {
    /// MPEG version: false = MPEG-4, true = MPEG-2. (1 bit)
    pub mpeg_version: bool,
    /// True when no CRC follows the fixed header. (1 bit)
    pub protection_absent: bool,
    /// The audio object type, one more than the 2-bit profile field.
    pub object_type: u8,
    /// The sample frequency index. (4 bits)
    pub sampling_frequency_index: u8,
    /// The channel configuration. (3 bits)
    pub channel_configuration: u8,
    /// Total frame length including this header. (13 bits)
    pub frame_length: u16,
}

impl AdtsHeader {
    /// Parses an ADTS header from the start of `data`.
    ///
    /// The CRC, when present, is skipped without verification.
    pub fn parse(data: &Bytes) -> Result<Self, AacError> {
        let mut bit_reader = BitReader::new(io::Cursor::new(data.clone()));

        let sync_word = bit_reader.read_bits(12)? as u16;
        if sync_word != 0xFFF {
            return Err(AacError::InvalidSyncWord(sync_word));
        }

        let mpeg_version = bit_reader.read_bit()?;
        // layer, always 0
        bit_reader.read_bits(2)?;
        let protection_absent = bit_reader.read_bit()?;

        // profile is the object type minus one
        let object_type = bit_reader.read_bits(2)? as u8 + 1;
        let sampling_frequency_index = bit_reader.read_bits(4)? as u8;
        // private bit
        bit_reader.read_bit()?;
        let channel_configuration = bit_reader.read_bits(3)? as u8;
        // original/copy, home, copyright id bit, copyright id start
        bit_reader.read_bits(4)?;

        let frame_length = bit_reader.read_bits(13)? as u16;
        // buffer fullness, raw data block count
        bit_reader.read_bits(11)?;
        bit_reader.read_bits(2)?;

        let header = Self {
            mpeg_version,
            protection_absent,
            object_type,
            sampling_frequency_index,
            channel_configuration,
            frame_length,
        };

        if frame_length < header.header_size() {
            return Err(AacError::FrameLengthTooSmall(frame_length));
        }

        Ok(header)
    }

    /// The header size in bytes: 7, or 9 with a CRC.
    pub fn header_size(&self) -> u16 {
        if self.protection_absent { 7 } else { 9 }
    }

    /// The payload length in bytes, after the header and CRC.
    pub fn payload_length(&self) -> u16 {
        self.frame_length - self.header_size()
    }

    /// The sample frequency in Hz.
    pub fn sampling_frequency(&self) -> Result<u32, AacError> {
        SAMPLE_FREQUENCIES
            .get(self.sampling_frequency_index as usize)
            .copied()
            .ok_or(AacError::NoFrequencyIndex(u32::from(self.sampling_frequency_index)))
    }

    /// Synthesizes the [`AudioSpecificConfig`] describing this stream, for
    /// producers that hand out raw ADTS without a separate config.
    pub fn audio_specific_config(&self) -> Result<AudioSpecificConfig, AacError> {
        Ok(AudioSpecificConfig::new(
            self.object_type,
            self.sampling_frequency()?,
            self.channel_configuration,
        ))
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::*;

    // AAC-LC, 44100 Hz, stereo, frame length 511
    fn header_bytes(protection_absent: bool, frame_length: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xF0 | u8::from(protection_absent)];
        bytes.push((1 << 6) | (4 << 2) | 0); // profile 1 (LC), freq index 4
        bytes.push((2 << 6) | ((frame_length >> 11) & 0b11) as u8);
        bytes.push((frame_length >> 3) as u8);
        bytes.push(((frame_length as u8) << 5) | 0x1F);
        bytes.push(0xFC);
        if !protection_absent {
            bytes.extend_from_slice(&[0xAB, 0xCD]);
        }
        bytes
    }

    #[test]
    fn parse_without_crc() {
        let header = AdtsHeader::parse(&Bytes::from(header_bytes(true, 511))).unwrap();

        assert!(header.protection_absent);
        assert_eq!(header.header_size(), 7);
        assert_eq!(header.object_type, 2);
        assert_eq!(header.sampling_frequency_index, 4);
        assert_eq!(header.sampling_frequency().unwrap(), 44100);
        assert_eq!(header.channel_configuration, 2);
        assert_eq!(header.frame_length, 511);
        assert_eq!(header.payload_length(), 504);
    }

    #[test]
    fn parse_with_crc() {
        let header = AdtsHeader::parse(&Bytes::from(header_bytes(false, 511))).unwrap();

        assert!(!header.protection_absent);
        assert_eq!(header.header_size(), 9);
        assert_eq!(header.payload_length(), 502);
    }

    #[test]
    fn synthesized_config() {
        let header = AdtsHeader::parse(&Bytes::from(header_bytes(true, 511))).unwrap();
        let config = header.audio_specific_config().unwrap();

        let mut buf = Vec::new();
        config.mux(&mut buf).unwrap();
        assert_eq!(buf, vec![0x12, 0x10]);
    }

    #[test]
    fn bad_sync_word() {
        let err = AdtsHeader::parse(&Bytes::from_static(&[0xFF, 0x00, 0, 0, 0, 0, 0])).unwrap_err();
        assert!(matches!(err, AacError::InvalidSyncWord(_)));
    }

    #[test]
    fn frame_length_smaller_than_header() {
        let err = AdtsHeader::parse(&Bytes::from(header_bytes(true, 3))).unwrap_err();
        assert!(matches!(err, AacError::FrameLengthTooSmall(3)));
    }
}
