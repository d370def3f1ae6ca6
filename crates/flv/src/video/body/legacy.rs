//! Legacy video body types and functions.

use std::io;

use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;
use freshet_h264::AVCDecoderConfigurationRecord;

use crate::error::FlvError;
use crate::video::header::legacy::{LegacyVideoTagHeader, LegacyVideoTagHeaderAvcPacket};

/// The body of a legacy FLV video tag.
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.3.1
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyVideoTagBody {
    /// An empty body, used by video command and AVC end-of-sequence tags.
    Empty,
    /// An AVC sequence header: the decoder configuration record.
    AvcVideoPacketSeqHdr(AVCDecoderConfigurationRecord),
    /// Any other body, including AVC NAL units.
    Other {
        /// The raw body.
        data: Bytes,
    },
}

impl LegacyVideoTagBody {
    /// Demuxes the video tag body from the given reader, dispatching on the
    /// already demuxed header.
    pub fn demux(header: &LegacyVideoTagHeader, reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        match header {
            LegacyVideoTagHeader::VideoCommand(_) => Ok(Self::Empty),
            LegacyVideoTagHeader::AvcPacket(LegacyVideoTagHeaderAvcPacket::SequenceHeader) => {
                let record = AVCDecoderConfigurationRecord::demux(reader)?;
                Ok(Self::AvcVideoPacketSeqHdr(record))
            }
            LegacyVideoTagHeader::AvcPacket(LegacyVideoTagHeaderAvcPacket::EndOfSequence) => Ok(Self::Empty),
            _ => Ok(Self::Other {
                data: reader.extract_remaining(),
            }),
        }
    }

    /// Muxes the video tag body into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            Self::Empty => Ok(()),
            Self::AvcVideoPacketSeqHdr(record) => {
                record.mux(writer)?;
                Ok(())
            }
            Self::Other { data } => {
                writer.write_all(data)?;
                Ok(())
            }
        }
    }
}
