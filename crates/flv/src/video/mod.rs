//! FLV video processing
//!
//! Use [`VideoData`] to demux the body of an FLV video tag or RTMP video
//! message; its `mux` counterpart produces the same bytes. Both the legacy
//! and the enhanced (FourCC) pipelines are covered.

use std::io;

use body::VideoTagBody;
use bytes::Bytes;
use header::VideoTagHeader;

use crate::error::FlvError;

pub mod body;
pub mod header;

/// FLV `VIDEODATA` tag
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.3.1
/// - Enhanced RTMP spec, Enhanced Video section
#[derive(Debug, Clone, PartialEq)]
pub struct VideoData {
    /// The header of the video data.
    pub header: VideoTagHeader,
    /// The body of the video data.
    pub body: VideoTagBody,
}

impl VideoData {
    /// Demuxes video data from a given reader.
    ///
    /// Whether the data is legacy or enhanced is determined by the first
    /// byte, and header and body are demuxed accordingly.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let header = VideoTagHeader::demux(reader)?;
        let body = VideoTagBody::demux(&header, reader)?;

        Ok(VideoData { header, body })
    }

    /// Muxes the video data into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        self.header.mux(writer)?;
        self.body.mux(writer)
    }
}
