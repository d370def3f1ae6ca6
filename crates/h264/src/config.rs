use std::io::{self, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::{Buf, Bytes};
use freshet_bytes_util::{BitWriter, BytesCursorExt};

use crate::nal::strip_start_code;
use crate::H264Error;

/// The AVC (H.264) Decoder Configuration Record.
///
/// ISO/IEC 14496-15:2022(E) - 5.3.2.1.2
#[derive(Debug, Clone, PartialEq)]
pub struct AVCDecoderConfigurationRecord {
    /// Always 1.
    pub configuration_version: u8,
    /// `profile_idc` copied from the SPS.
    pub profile_indication: u8,
    /// The constraint-set flags byte copied from the SPS.
    pub profile_compatibility: u8,
    /// `level_idc` copied from the SPS.
    pub level_indication: u8,
    /// NAL unit length field size minus one; 3 for 4-byte lengths.
    pub length_size_minus_one: u8,
    /// Sequence parameter sets, without start codes.
    pub sps: Vec<Bytes>,
    /// Picture parameter sets, without start codes, ascending PPS id.
    pub pps: Vec<Bytes>,
    /// The chroma/bit-depth trailer present for the high profiles.
    pub extended_config: Option<AvccExtendedConfig>,
}

/// The chroma format and bit depth trailer of the configuration record.
///
/// ISO/IEC 14496-15:2022(E) - 5.3.2.1.2
#[derive(Debug, Clone, PartialEq)]
pub struct AvccExtendedConfig {
    /// `chroma_format_idc`. (2 bits)
    pub chroma_format_idc: u8,
    /// `bit_depth_luma_minus8`. (3 bits)
    pub bit_depth_luma_minus8: u8,
    /// `bit_depth_chroma_minus8`. (3 bits)
    pub bit_depth_chroma_minus8: u8,
    /// Sequence parameter set extensions.
    pub sequence_parameter_set_ext: Vec<Bytes>,
}

impl Default for AvccExtendedConfig {
    fn default() -> Self {
        Self {
            // 4:2:0, 8-bit, the baseline for FLV-carried streams
            chroma_format_idc: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            sequence_parameter_set_ext: Vec::new(),
        }
    }
}

/// Profiles whose configuration record carries the extended config trailer.
const EXTENDED_PROFILES: [u8; 4] = [100, 110, 122, 144];

impl AVCDecoderConfigurationRecord {
    /// Builds a configuration record from raw SPS and PPS NAL units.
    ///
    /// Start codes (3- or 4-byte) are stripped; profile, compatibility and
    /// level are copied out of the first SPS. The extended config trailer is
    /// attached for the profiles that require it.
    pub fn from_parameter_sets(sps: Vec<Bytes>, pps: Vec<Bytes>) -> Result<Self, H264Error> {
        let sps: Vec<Bytes> = sps.into_iter().map(strip_start_code).collect();
        let pps: Vec<Bytes> = pps.into_iter().map(strip_start_code).collect();

        let first_sps = sps.first().ok_or(H264Error::MissingSps)?;
        if pps.is_empty() {
            return Err(H264Error::MissingPps);
        }

        // nal header, profile_idc, constraint flags, level_idc
        if first_sps.len() < 4 {
            return Err(H264Error::SpsTooShort(first_sps.len()));
        }

        let profile_indication = first_sps[1];
        let profile_compatibility = first_sps[2];
        let level_indication = first_sps[3];

        let extended_config = EXTENDED_PROFILES
            .contains(&profile_indication)
            .then(AvccExtendedConfig::default);

        Ok(Self {
            configuration_version: 1,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one: 3,
            sps,
            pps,
            extended_config,
        })
    }

    /// Demuxes an `AVCDecoderConfigurationRecord` from a byte stream.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, H264Error> {
        let configuration_version = reader.read_u8()?;
        let profile_indication = reader.read_u8()?;
        let profile_compatibility = reader.read_u8()?;
        let level_indication = reader.read_u8()?;
        let length_size_minus_one = reader.read_u8()? & 0b00000011;
        let num_of_sequence_parameter_sets = reader.read_u8()? & 0b00011111;

        let mut sps = Vec::with_capacity(num_of_sequence_parameter_sets as usize);
        for _ in 0..num_of_sequence_parameter_sets {
            let sps_length = reader.read_u16::<BigEndian>()?;
            sps.push(reader.extract_bytes(sps_length as usize)?);
        }

        let num_of_picture_parameter_sets = reader.read_u8()?;
        let mut pps = Vec::with_capacity(num_of_picture_parameter_sets as usize);
        for _ in 0..num_of_picture_parameter_sets {
            let pps_length = reader.read_u16::<BigEndian>()?;
            pps.push(reader.extract_bytes(pps_length as usize)?);
        }

        // Some producers omit the extended config even for high profiles,
        // decoding is lenient about its absence.
        let extended_config = if EXTENDED_PROFILES.contains(&profile_indication) && reader.has_remaining() {
            let chroma_format_idc = reader.read_u8()? & 0b00000011;
            let bit_depth_luma_minus8 = reader.read_u8()? & 0b00000111;
            let bit_depth_chroma_minus8 = reader.read_u8()? & 0b00000111;
            let number_of_sequence_parameter_set_ext = reader.read_u8()?;

            let mut sequence_parameter_set_ext = Vec::with_capacity(number_of_sequence_parameter_set_ext as usize);
            for _ in 0..number_of_sequence_parameter_set_ext {
                let sps_ext_length = reader.read_u16::<BigEndian>()?;
                sequence_parameter_set_ext.push(reader.extract_bytes(sps_ext_length as usize)?);
            }

            Some(AvccExtendedConfig {
                chroma_format_idc,
                bit_depth_luma_minus8,
                bit_depth_chroma_minus8,
                sequence_parameter_set_ext,
            })
        } else {
            None
        };

        Ok(Self {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one,
            sps,
            pps,
            extended_config,
        })
    }

    /// Returns the total byte size of the configuration record.
    pub fn size(&self) -> u64 {
        1 // configuration_version
        + 1 // profile_indication
        + 1 // profile_compatibility
        + 1 // level_indication
        + 1 // length_size_minus_one
        + 1 // num_of_sequence_parameter_sets
        + self.sps.iter().map(|sps| 2 + sps.len() as u64).sum::<u64>()
        + 1 // num_of_picture_parameter_sets
        + self.pps.iter().map(|pps| 2 + pps.len() as u64).sum::<u64>()
        + match &self.extended_config {
            Some(config) => {
                4 + config
                    .sequence_parameter_set_ext
                    .iter()
                    .map(|ext| 2 + ext.len() as u64)
                    .sum::<u64>()
            }
            None => 0,
        }
    }

    /// Muxes the configuration record into a byte stream.
    pub fn mux<T: io::Write>(&self, writer: &mut T) -> Result<(), H264Error> {
        let mut bit_writer = BitWriter::new(writer);

        bit_writer.write_bits(u64::from(self.configuration_version), 8)?;
        bit_writer.write_bits(u64::from(self.profile_indication), 8)?;
        bit_writer.write_bits(u64::from(self.profile_compatibility), 8)?;
        bit_writer.write_bits(u64::from(self.level_indication), 8)?;
        bit_writer.write_bits(0b111111, 6)?;
        bit_writer.write_bits(u64::from(self.length_size_minus_one), 2)?;
        bit_writer.write_bits(0b111, 3)?;

        bit_writer.write_bits(self.sps.len() as u64, 5)?;
        for sps in &self.sps {
            bit_writer.write_u16::<BigEndian>(sps.len() as u16)?;
            bit_writer.write_all(sps)?;
        }

        bit_writer.write_bits(self.pps.len() as u64, 8)?;
        for pps in &self.pps {
            bit_writer.write_u16::<BigEndian>(pps.len() as u16)?;
            bit_writer.write_all(pps)?;
        }

        if let Some(config) = &self.extended_config {
            bit_writer.write_bits(0b111111, 6)?;
            bit_writer.write_bits(u64::from(config.chroma_format_idc), 2)?;
            bit_writer.write_bits(0b11111, 5)?;
            bit_writer.write_bits(u64::from(config.bit_depth_luma_minus8), 3)?;
            bit_writer.write_bits(0b11111, 5)?;
            bit_writer.write_bits(u64::from(config.bit_depth_chroma_minus8), 3)?;

            bit_writer.write_bits(config.sequence_parameter_set_ext.len() as u64, 8)?;
            for sps_ext in &config.sequence_parameter_set_ext {
                bit_writer.write_u16::<BigEndian>(sps_ext.len() as u16)?;
                bit_writer.write_all(sps_ext)?;
            }
        }

        bit_writer.finish()?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;

    const SPS: &[u8] = &[
        0x67, 0x64, 0x00, 0x1f, 0xac, 0xd9, 0x41, 0xe0, 0x6d, 0xf9, 0xe6, 0xa0, 0x20, 0x20, 0x28, 0x00, 0x00, 0x03, 0x00,
        0x08, 0x00, 0x00, 0x03, 0x01, 0xe0, 0x78, 0xc1, 0x8c, 0xb0,
    ];
    const PPS: &[u8] = &[0x68, 0xeb, 0xe3, 0xcb, 0x22, 0xc0];

    #[test]
    fn config_demux() {
        let data = Bytes::from(
            b"\x01d\0\x1f\xff\xe1\0\x1dgd\0\x1f\xac\xd9A\xe0m\xf9\xe6\xa0  (\0\0\x03\0\x08\0\0\x03\x01\xe0x\xc1\x8c\xb0\x01\0\x06h\xeb\xe3\xcb\"\xc0\xfd\xf8\xf8\0"
                .to_vec(),
        );

        let config = AVCDecoderConfigurationRecord::demux(&mut io::Cursor::new(data)).unwrap();

        assert_eq!(config.configuration_version, 1);
        assert_eq!(config.profile_indication, 100);
        assert_eq!(config.profile_compatibility, 0);
        assert_eq!(config.level_indication, 31);
        assert_eq!(config.length_size_minus_one, 3);
        assert_eq!(config.sps.len(), 1);
        assert_eq!(config.pps.len(), 1);
        assert_eq!(
            config.extended_config,
            Some(AvccExtendedConfig {
                chroma_format_idc: 1,
                bit_depth_luma_minus8: 0,
                bit_depth_chroma_minus8: 0,
                sequence_parameter_set_ext: vec![],
            })
        );
    }

    #[test]
    fn config_mux_round_trip() {
        let data = Bytes::from(
            b"\x01d\0\x1f\xff\xe1\0\x1dgd\0\x1f\xac\xd9A\xe0m\xf9\xe6\xa0  (\0\0\x03\0\x08\0\0\x03\x01\xe0x\xc1\x8c\xb0\x01\0\x06h\xeb\xe3\xcb\"\xc0\xfd\xf8\xf8\0"
                .to_vec(),
        );

        let config = AVCDecoderConfigurationRecord::demux(&mut io::Cursor::new(data.clone())).unwrap();
        assert_eq!(config.size(), data.len() as u64);

        let mut muxed = Vec::new();
        config.mux(&mut muxed).unwrap();
        assert_eq!(muxed, data);
    }

    #[test]
    fn from_parameter_sets_bare() {
        let config = AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![Bytes::from_static(SPS)],
            vec![Bytes::from_static(PPS)],
        )
        .unwrap();

        assert_eq!(config.configuration_version, 1);
        assert_eq!(config.profile_indication, 100);
        assert_eq!(config.profile_compatibility, 0);
        assert_eq!(config.level_indication, 31);
        assert_eq!(config.length_size_minus_one, 3);
        assert!(config.extended_config.is_some());
        assert_eq!(config.sps[0], Bytes::from_static(SPS));
        assert_eq!(config.pps[0], Bytes::from_static(PPS));
    }

    #[test]
    fn from_parameter_sets_with_start_codes() {
        let mut sps = vec![0, 0, 0, 1];
        sps.extend_from_slice(SPS);
        let mut pps = vec![0, 0, 1];
        pps.extend_from_slice(PPS);

        let config =
            AVCDecoderConfigurationRecord::from_parameter_sets(vec![Bytes::from(sps)], vec![Bytes::from(pps)]).unwrap();

        assert_eq!(config.sps[0], Bytes::from_static(SPS));
        assert_eq!(config.pps[0], Bytes::from_static(PPS));

        let bare = AVCDecoderConfigurationRecord::from_parameter_sets(
            vec![Bytes::from_static(SPS)],
            vec![Bytes::from_static(PPS)],
        )
        .unwrap();

        let mut muxed = Vec::new();
        config.mux(&mut muxed).unwrap();
        let mut expected = Vec::new();
        bare.mux(&mut expected).unwrap();
        assert_eq!(muxed, expected);
    }

    #[test]
    fn baseline_profile_has_no_extended_config() {
        // profile_idc 66 (baseline)
        let sps = Bytes::from_static(&[0x67, 66, 0xc0, 0x1e, 0x00]);
        let config =
            AVCDecoderConfigurationRecord::from_parameter_sets(vec![sps], vec![Bytes::from_static(PPS)]).unwrap();

        assert_eq!(config.extended_config, None);
    }

    #[test]
    fn missing_parameter_sets() {
        assert!(matches!(
            AVCDecoderConfigurationRecord::from_parameter_sets(vec![], vec![Bytes::from_static(PPS)]),
            Err(H264Error::MissingSps)
        ));
        assert!(matches!(
            AVCDecoderConfigurationRecord::from_parameter_sets(vec![Bytes::from_static(SPS)], vec![]),
            Err(H264Error::MissingPps)
        ));
    }
}
