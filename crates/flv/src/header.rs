use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;

use crate::error::FlvError;

/// The FLV header: the first 9 bytes of every FLV file.
///
/// Defined by:
/// - Legacy FLV spec, Annex E.2
#[derive(Debug, Clone, PartialEq)]
pub struct FlvHeader {
    /// The version of the FLV file, 1 in practice.
    pub version: u8,
    /// Whether the FLV file contains audio tags.
    pub is_audio_present: bool,
    /// Whether the FLV file contains video tags.
    pub is_video_present: bool,
    /// The remaining bytes between the DataOffset field and the end of the
    /// header, empty in practice.
    pub extra: Bytes,
}

impl FlvHeader {
    /// Creates a version-1 header with the given track flags.
    pub fn new(is_audio_present: bool, is_video_present: bool) -> Self {
        Self {
            version: 1,
            is_audio_present,
            is_video_present,
            extra: Bytes::new(),
        }
    }

    /// Demuxes the FLV header from the given reader.
    ///
    /// The reader is left at the start of the first previous-tag-size field.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let start = reader.position() as usize;

        let signature = reader.read_u24::<BigEndian>()?;

        // 0 byte at the beginning because we are only reading 3 bytes not 4.
        if signature != u32::from_be_bytes([0, b'F', b'L', b'V']) {
            return Err(FlvError::InvalidSignature(signature));
        }

        let version = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let is_audio_present = (flags & 0b00000100) != 0;
        let is_video_present = (flags & 0b00000001) != 0;

        let data_offset = reader.read_u32::<BigEndian>()?;
        let end = reader.position() as usize;
        let size = end - start;

        let remaining = (data_offset as usize)
            .checked_sub(size)
            .ok_or(FlvError::InvalidDataOffset(data_offset))?;

        let extra = reader.extract_bytes(remaining)?;

        Ok(FlvHeader {
            version,
            is_audio_present,
            is_video_present,
            extra,
        })
    }

    /// Muxes the FLV header into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        writer.write_all(b"FLV")?;
        writer.write_u8(self.version)?;
        writer.write_u8((u8::from(self.is_audio_present) << 2) | u8::from(self.is_video_present))?;
        writer.write_u32::<BigEndian>(9 + self.extra.len() as u32)?;
        writer.write_all(&self.extra)?;

        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;

    #[test]
    fn mux_demux_round_trip() {
        let header = FlvHeader::new(true, true);

        let mut buf = Vec::new();
        header.mux(&mut buf).unwrap();
        assert_eq!(buf, vec![b'F', b'L', b'V', 1, 0b101, 0, 0, 0, 9]);

        let demuxed = FlvHeader::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(demuxed, header);
    }

    #[test]
    fn audio_only_flags() {
        let mut buf = Vec::new();
        FlvHeader::new(true, false).mux(&mut buf).unwrap();
        assert_eq!(buf[4], 0b100);
    }

    #[test]
    fn invalid_signature() {
        let data = Bytes::from_static(&[b'F', b'L', b'X', 1, 0, 0, 0, 0, 9]);
        assert!(matches!(
            FlvHeader::demux(&mut io::Cursor::new(data)),
            Err(FlvError::InvalidSignature(_))
        ));
    }

    #[test]
    fn invalid_data_offset() {
        let data = Bytes::from_static(&[b'F', b'L', b'V', 1, 0, 0, 0, 0, 3]);
        assert!(matches!(
            FlvHeader::demux(&mut io::Cursor::new(data)),
            Err(FlvError::InvalidDataOffset(3))
        ));
    }
}
