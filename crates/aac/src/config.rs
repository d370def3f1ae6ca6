use std::io;

use bytes::Bytes;
use freshet_bytes_util::{BitReader, BitWriter};
use num_traits::FromPrimitive;

use crate::AacError;

/// Sample frequencies addressable by the 4-bit frequency index.
///
/// ISO/IEC 14496-3:2019(E) - 1.6.3.4 (samplingFrequencyIndex)
pub const SAMPLE_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// MPEG-4 audio object types this crate can name.
///
/// ISO/IEC 14496-3:2019(E) - 1.5.1.1 (Table 1.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum AudioObjectType {
    /// AAC main
    AacMain = 1,
    /// AAC LC
    AacLc = 2,
    /// AAC SSR
    AacSsr = 3,
    /// AAC LTP
    AacLtp = 4,
    /// SBR (HE-AAC)
    Sbr = 5,
    /// AAC scalable
    AacScalable = 6,
    /// ER AAC LD
    ErAacLd = 23,
    /// PS (HE-AAC v2)
    Ps = 29,
}

/// The decoder configuration carried by an AAC sequence header.
///
/// Only the always-present prefix is modeled; the codec-specific tail
/// (GASpecificConfig and friends) rides along opaque in `extra`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSpecificConfig {
    /// The audio object type, after escape resolution. (5 or 11 bits)
    pub object_type: u8,
    /// The sample frequency in Hz, from the index or the explicit field.
    pub sampling_frequency: u32,
    /// The channel configuration. (4 bits)
    pub channel_configuration: u8,
    /// Everything after the prefix, unparsed.
    pub extra: Bytes,
}

impl AudioSpecificConfig {
    /// Parses an `AudioSpecificConfig` from its byte form.
    ///
    /// ISO/IEC 14496-3:2019(E) - 1.6.2.1 (AudioSpecificConfig)
    pub fn parse(data: Bytes) -> Result<Self, AacError> {
        let mut bit_reader = BitReader::new(io::Cursor::new(data));

        let object_type = Self::read_object_type(&mut bit_reader)?;

        let sampling_frequency_index = bit_reader.read_bits(4)? as usize;
        let sampling_frequency = if sampling_frequency_index == 0xF {
            // escape value, the frequency follows explicitly
            bit_reader.read_bits(24)? as u32
        } else {
            *SAMPLE_FREQUENCIES
                .get(sampling_frequency_index)
                .ok_or(AacError::NoFrequencyIndex(sampling_frequency_index as u32))?
        };

        let channel_configuration = bit_reader.read_bits(4)? as u8;

        bit_reader.align();
        let mut cursor = bit_reader.into_inner();
        let position = cursor.position() as usize;
        let extra = cursor.get_ref().slice(position..);

        Ok(Self {
            object_type,
            sampling_frequency,
            channel_configuration,
            extra,
        })
    }

    /// GetAudioObjectType(): 5 bits, with the escape value 31 extending
    /// the range by another 6 bits.
    fn read_object_type<R: io::Read>(bit_reader: &mut BitReader<R>) -> Result<u8, AacError> {
        let object_type = bit_reader.read_bits(5)? as u8;

        if object_type == 31 {
            Ok(32 + bit_reader.read_bits(6)? as u8)
        } else {
            Ok(object_type)
        }
    }

    /// Synthesizes a config from the fields an ADTS header carries.
    pub fn new(object_type: u8, sampling_frequency: u32, channel_configuration: u8) -> Self {
        Self {
            object_type,
            sampling_frequency,
            channel_configuration,
            extra: Bytes::new(),
        }
    }

    /// Returns the named object type, if this crate knows it.
    pub fn audio_object_type(&self) -> Option<AudioObjectType> {
        AudioObjectType::from_u8(self.object_type)
    }

    /// Returns the 4-bit index for the sampling frequency.
    pub fn sampling_frequency_index(&self) -> Result<u8, AacError> {
        SAMPLE_FREQUENCIES
            .iter()
            .position(|f| *f == self.sampling_frequency)
            .map(|i| i as u8)
            .ok_or(AacError::NoFrequencyIndex(self.sampling_frequency))
    }

    /// Muxes the config into its byte form.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), AacError> {
        let mut bit_writer = BitWriter::new(writer);

        if self.object_type >= 31 {
            bit_writer.write_bits(31, 5)?;
            bit_writer.write_bits(u64::from(self.object_type - 32), 6)?;
        } else {
            bit_writer.write_bits(u64::from(self.object_type), 5)?;
        }

        bit_writer.write_bits(u64::from(self.sampling_frequency_index()?), 4)?;
        bit_writer.write_bits(u64::from(self.channel_configuration), 4)?;

        let writer = bit_writer.finish()?;
        writer.write_all(&self.extra)?;

        Ok(())
    }
}
