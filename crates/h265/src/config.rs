use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;

use crate::H265Error;

/// HEVC Decoder Configuration Record.
///
/// ISO/IEC 14496-15:2022(E) - 8.3.2.1
#[derive(Debug, Clone, PartialEq)]
pub struct HEVCDecoderConfigurationRecord {
    /// Always 1.
    pub configuration_version: u8,
    /// `general_profile_space`. (2 bits)
    pub general_profile_space: u8,
    /// `general_tier_flag`. (1 bit)
    pub general_tier_flag: bool,
    /// `general_profile_idc`. (5 bits)
    pub general_profile_idc: u8,
    /// `general_profile_compatibility_flags`.
    pub general_profile_compatibility_flags: u32,
    /// `general_constraint_indicator_flags`. (48 bits)
    pub general_constraint_indicator_flags: u64,
    /// `general_level_idc`.
    pub general_level_idc: u8,
    /// `min_spatial_segmentation_idc`. (12 bits)
    pub min_spatial_segmentation_idc: u16,
    /// `parallelism_type`. (2 bits)
    pub parallelism_type: u8,
    /// `chroma_format_idc`. (2 bits)
    pub chroma_format_idc: u8,
    /// `bit_depth_luma_minus8`. (3 bits)
    pub bit_depth_luma_minus8: u8,
    /// `bit_depth_chroma_minus8`. (3 bits)
    pub bit_depth_chroma_minus8: u8,
    /// `avg_frame_rate` in units of frames/(256 seconds), 0 when unspecified.
    pub avg_frame_rate: u16,
    /// `constant_frame_rate`. (2 bits)
    pub constant_frame_rate: u8,
    /// `num_temporal_layers`. (3 bits)
    pub num_temporal_layers: u8,
    /// `temporal_id_nested`. (1 bit)
    pub temporal_id_nested: bool,
    /// NAL unit length field size minus one; 3 for 4-byte lengths.
    pub length_size_minus_one: u8,
    /// The parameter-set arrays, ordered VPS, SPS, PPS, prefix SEI, suffix SEI.
    pub arrays: Vec<NaluArray>,
}

/// One NAL unit array of the configuration record.
///
/// ISO/IEC 14496-15:2022(E) - 8.3.2.1
#[derive(Debug, Clone, PartialEq)]
pub struct NaluArray {
    /// True when all NAL units of this type are in the array and none are
    /// in the stream.
    pub array_completeness: bool,
    /// The type of the NAL units in this array.
    pub nal_unit_type: NaluType,
    /// The NAL units, without start codes.
    pub nalus: Vec<Bytes>,
}

/// The NAL unit types a configuration record carries.
///
/// ISO/IEC 23008-2:2020(E) - 7.4.2.2 (Table 7-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluType {
    /// Video parameter set. (32)
    Vps,
    /// Sequence parameter set. (33)
    Sps,
    /// Picture parameter set. (34)
    Pps,
    /// Prefix supplemental enhancement information. (39)
    SeiPrefix,
    /// Suffix supplemental enhancement information. (40)
    SeiSuffix,
    /// Any other type.
    Unknown(u8),
}

impl From<u8> for NaluType {
    fn from(value: u8) -> Self {
        match value {
            32 => NaluType::Vps,
            33 => NaluType::Sps,
            34 => NaluType::Pps,
            39 => NaluType::SeiPrefix,
            40 => NaluType::SeiSuffix,
            other => NaluType::Unknown(other),
        }
    }
}

impl From<NaluType> for u8 {
    fn from(value: NaluType) -> Self {
        match value {
            NaluType::Vps => 32,
            NaluType::Sps => 33,
            NaluType::Pps => 34,
            NaluType::SeiPrefix => 39,
            NaluType::SeiSuffix => 40,
            NaluType::Unknown(other) => other,
        }
    }
}

fn strip_start_code(nal: Bytes) -> Bytes {
    if nal.len() >= 4 && nal[..4] == [0, 0, 0, 1] {
        nal.slice(4..)
    } else if nal.len() >= 3 && nal[..3] == [0, 0, 1] {
        nal.slice(3..)
    } else {
        nal
    }
}

impl HEVCDecoderConfigurationRecord {
    /// Builds a configuration record from raw VPS, SPS and PPS NAL units,
    /// ordered VPS, SPS, PPS as the record requires.
    ///
    /// Start codes are stripped. Profile, level and chroma fields default to
    /// Main-profile 4:2:0 values; callers with better knowledge of the
    /// stream set the public fields directly.
    pub fn from_parameter_sets(vps: Vec<Bytes>, sps: Vec<Bytes>, pps: Vec<Bytes>) -> Result<Self, H265Error> {
        let vps: Vec<Bytes> = vps.into_iter().map(strip_start_code).collect();
        let sps: Vec<Bytes> = sps.into_iter().map(strip_start_code).collect();
        let pps: Vec<Bytes> = pps.into_iter().map(strip_start_code).collect();

        if vps.is_empty() {
            return Err(H265Error::MissingVps);
        }
        if sps.is_empty() {
            return Err(H265Error::MissingSps);
        }
        if pps.is_empty() {
            return Err(H265Error::MissingPps);
        }

        let arrays = vec![
            NaluArray {
                array_completeness: true,
                nal_unit_type: NaluType::Vps,
                nalus: vps,
            },
            NaluArray {
                array_completeness: true,
                nal_unit_type: NaluType::Sps,
                nalus: sps,
            },
            NaluArray {
                array_completeness: true,
                nal_unit_type: NaluType::Pps,
                nalus: pps,
            },
        ];

        Ok(Self {
            configuration_version: 1,
            general_profile_space: 0,
            general_tier_flag: false,
            // Main profile
            general_profile_idc: 1,
            general_profile_compatibility_flags: 0x6000_0000,
            // progressive source, no interlacing, non-packed, frame-only
            general_constraint_indicator_flags: 0x9000_0000_0000,
            // level 4.0
            general_level_idc: 120,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: true,
            length_size_minus_one: 3,
            arrays,
        })
    }

    /// Demuxes a `HEVCDecoderConfigurationRecord` from a byte stream.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, H265Error> {
        let configuration_version = reader.read_u8()?;

        let byte = reader.read_u8()?;
        let general_profile_space = byte >> 6;
        let general_tier_flag = byte & 0b0010_0000 != 0;
        let general_profile_idc = byte & 0b0001_1111;

        let general_profile_compatibility_flags = reader.read_u32::<BigEndian>()?;
        let general_constraint_indicator_flags = reader.read_u48::<BigEndian>()?;
        let general_level_idc = reader.read_u8()?;
        let min_spatial_segmentation_idc = reader.read_u16::<BigEndian>()? & 0x0FFF;
        let parallelism_type = reader.read_u8()? & 0b0000_0011;
        let chroma_format_idc = reader.read_u8()? & 0b0000_0011;
        let bit_depth_luma_minus8 = reader.read_u8()? & 0b0000_0111;
        let bit_depth_chroma_minus8 = reader.read_u8()? & 0b0000_0111;
        let avg_frame_rate = reader.read_u16::<BigEndian>()?;

        let byte = reader.read_u8()?;
        let constant_frame_rate = byte >> 6;
        let num_temporal_layers = (byte & 0b0011_1000) >> 3;
        let temporal_id_nested = byte & 0b0000_0100 != 0;
        let length_size_minus_one = byte & 0b0000_0011;

        let num_of_arrays = reader.read_u8()?;
        let mut arrays = Vec::with_capacity(num_of_arrays as usize);
        for _ in 0..num_of_arrays {
            let byte = reader.read_u8()?;
            let array_completeness = byte & 0b1000_0000 != 0;
            let nal_unit_type = NaluType::from(byte & 0b0011_1111);

            let num_nalus = reader.read_u16::<BigEndian>()?;
            let mut nalus = Vec::with_capacity(num_nalus as usize);
            for _ in 0..num_nalus {
                let len = reader.read_u16::<BigEndian>()?;
                nalus.push(reader.extract_bytes(len as usize)?);
            }

            arrays.push(NaluArray {
                array_completeness,
                nal_unit_type,
                nalus,
            });
        }

        Ok(Self {
            configuration_version,
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format_idc,
            bit_depth_luma_minus8,
            bit_depth_chroma_minus8,
            avg_frame_rate,
            constant_frame_rate,
            num_temporal_layers,
            temporal_id_nested,
            length_size_minus_one,
            arrays,
        })
    }

    /// Returns the total byte size of the configuration record.
    pub fn size(&self) -> u64 {
        23 + self
            .arrays
            .iter()
            .map(|array| 3 + array.nalus.iter().map(|nalu| 2 + nalu.len() as u64).sum::<u64>())
            .sum::<u64>()
    }

    /// Muxes the configuration record into a byte stream.
    pub fn mux<T: io::Write>(&self, writer: &mut T) -> Result<(), H265Error> {
        writer.write_u8(self.configuration_version)?;
        writer.write_u8(
            (self.general_profile_space << 6) | (u8::from(self.general_tier_flag) << 5) | self.general_profile_idc,
        )?;
        writer.write_u32::<BigEndian>(self.general_profile_compatibility_flags)?;
        writer.write_u48::<BigEndian>(self.general_constraint_indicator_flags)?;
        writer.write_u8(self.general_level_idc)?;
        writer.write_u16::<BigEndian>(0xF000 | self.min_spatial_segmentation_idc)?;
        writer.write_u8(0b1111_1100 | self.parallelism_type)?;
        writer.write_u8(0b1111_1100 | self.chroma_format_idc)?;
        writer.write_u8(0b1111_1000 | self.bit_depth_luma_minus8)?;
        writer.write_u8(0b1111_1000 | self.bit_depth_chroma_minus8)?;
        writer.write_u16::<BigEndian>(self.avg_frame_rate)?;
        writer.write_u8(
            (self.constant_frame_rate << 6)
                | (self.num_temporal_layers << 3)
                | (u8::from(self.temporal_id_nested) << 2)
                | self.length_size_minus_one,
        )?;

        writer.write_u8(self.arrays.len() as u8)?;
        for array in &self.arrays {
            writer.write_u8((u8::from(array.array_completeness) << 7) | u8::from(array.nal_unit_type))?;
            writer.write_u16::<BigEndian>(array.nalus.len() as u16)?;
            for nalu in &array.nalus {
                writer.write_u16::<BigEndian>(nalu.len() as u16)?;
                writer.write_all(nalu)?;
            }
        }

        Ok(())
    }
}
