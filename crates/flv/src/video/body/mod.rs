//! FLV video tag bodies.

use std::io;

use bytes::Bytes;

use crate::error::FlvError;
use crate::video::header::{VideoTagHeader, VideoTagHeaderData};

pub mod enhanced;
pub mod legacy;

/// The body of an FLV video tag.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoTagBody {
    /// The body of a legacy video tag.
    Legacy(legacy::LegacyVideoTagBody),
    /// The body of an enhanced video tag.
    Enhanced(enhanced::ExVideoTagBody),
}

impl VideoTagBody {
    /// Demuxes the video tag body from the given reader, dispatching on the
    /// already demuxed header.
    pub fn demux(header: &VideoTagHeader, reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        match &header.data {
            VideoTagHeaderData::Legacy(header) => Ok(Self::Legacy(legacy::LegacyVideoTagBody::demux(header, reader)?)),
            VideoTagHeaderData::Enhanced(header) => {
                Ok(Self::Enhanced(enhanced::ExVideoTagBody::demux(header, reader)?))
            }
        }
    }

    /// Muxes the video tag body into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            Self::Legacy(body) => body.mux(writer),
            Self::Enhanced(body) => body.mux(writer),
        }
    }
}
