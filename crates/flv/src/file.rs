//! FLV file processing

use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::{Buf, Bytes};

use crate::error::FlvError;
use crate::header::FlvHeader;
use crate::tag::FlvTag;

/// An FLV file: a [`FlvHeader`] followed by the FLV file body, a series of
/// [`FlvTag`]s each followed by its previous-tag-size field.
///
/// Defined by:
/// - Legacy FLV spec, Annex E.3
#[derive(Debug, Clone, PartialEq)]
pub struct FlvFile {
    /// The header of the FLV file.
    pub header: FlvHeader,
    /// The tags in the FLV file.
    pub tags: Vec<FlvTag>,
}

impl FlvFile {
    /// Demuxes an FLV file from a reader.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let header = FlvHeader::demux(reader)?;

        let mut tags = Vec::new();
        let mut previous_tag_size = 0u32;
        while reader.has_remaining() {
            let declared = reader.read_u32::<BigEndian>()?;
            if declared != previous_tag_size {
                return Err(FlvError::PreviousTagSizeMismatch {
                    expected: previous_tag_size,
                    got: declared,
                });
            }

            // If there is no more data, we can stop reading.
            if !reader.has_remaining() {
                break;
            }

            let start = reader.position();
            let tag = FlvTag::demux(reader)?;
            previous_tag_size = (reader.position() - start) as u32;
            tags.push(tag);
        }

        Ok(FlvFile { header, tags })
    }
}

/// A streaming FLV muxer: writes the header up front and tags as they come,
/// maintaining the previous-tag-size chain.
#[derive(Debug)]
pub struct FlvWriter<W> {
    writer: W,
    previous_tag_size: u32,
}

impl<W: io::Write> FlvWriter<W> {
    /// Writes the FLV header and returns the muxer.
    pub fn new(mut writer: W, header: &FlvHeader) -> Result<Self, FlvError> {
        header.mux(&mut writer)?;

        Ok(Self {
            writer,
            previous_tag_size: 0,
        })
    }

    /// Writes one tag, preceded by the previous tag's size field.
    pub fn write_tag(&mut self, tag: &FlvTag) -> Result<(), FlvError> {
        self.writer.write_u32::<BigEndian>(self.previous_tag_size)?;
        self.previous_tag_size = tag.mux(&mut self.writer)?;

        Ok(())
    }

    /// Writes the final previous-tag-size field and returns the writer.
    pub fn finish(mut self) -> Result<W, FlvError> {
        self.writer.write_u32::<BigEndian>(self.previous_tag_size)?;
        Ok(self.writer)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;
    use crate::script::{OnMetaData, ScriptData};
    use crate::tag::FlvTagData;

    fn script_tag(timestamp_ms: u32) -> FlvTag {
        FlvTag {
            timestamp_ms,
            stream_id: 0,
            data: FlvTagData::ScriptData(ScriptData::OnMetaData(Box::new(OnMetaData {
                duration: Some(0.0),
                ..Default::default()
            }))),
        }
    }

    #[test]
    fn write_read_round_trip() {
        let mut writer = FlvWriter::new(Vec::new(), &FlvHeader::new(true, true)).unwrap();
        writer.write_tag(&script_tag(0)).unwrap();
        writer.write_tag(&script_tag(40)).unwrap();
        let buf = writer.finish().unwrap();

        let file = FlvFile::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(file.tags.len(), 2);
        assert_eq!(file.tags[0].timestamp_ms, 0);
        assert_eq!(file.tags[1].timestamp_ms, 40);
    }

    #[test]
    fn previous_tag_size_accounting() {
        let mut writer = FlvWriter::new(Vec::new(), &FlvHeader::new(false, true)).unwrap();
        writer.write_tag(&script_tag(0)).unwrap();
        let buf = writer.finish().unwrap();

        // header, zero previous-tag-size, tag, final previous-tag-size
        let tag_size = (buf.len() - 9 - 4 - 4) as u32;
        let declared = u32::from_be_bytes(buf[buf.len() - 4..].try_into().unwrap());
        assert_eq!(declared, tag_size);

        // body size + 11 byte envelope
        let body_size = u32::from_be_bytes([0, buf[14], buf[15], buf[16]]);
        assert_eq!(tag_size, body_size + 11);
    }

    #[test]
    fn mismatched_previous_tag_size_is_rejected() {
        let mut writer = FlvWriter::new(Vec::new(), &FlvHeader::new(true, true)).unwrap();
        writer.write_tag(&script_tag(0)).unwrap();
        let mut buf = writer.finish().unwrap();

        // corrupt the final previous-tag-size field
        let len = buf.len();
        buf[len - 1] ^= 0xFF;

        assert!(matches!(
            FlvFile::demux(&mut io::Cursor::new(Bytes::from(buf))),
            Err(FlvError::PreviousTagSizeMismatch { .. })
        ));
    }
}
