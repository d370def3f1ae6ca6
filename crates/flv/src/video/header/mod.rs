//! FLV video tag headers.

use std::io::{self, Seek};

use byteorder::ReadBytesExt;
use bytes::Bytes;
use nutype_enum::nutype_enum;

use crate::error::FlvError;

pub mod enhanced;
pub mod legacy;

nutype_enum! {
    /// FLV Frame Type
    ///
    /// Defined by:
    /// - Legacy FLV spec, Annex E.4.3.1
    pub enum VideoFrameType(u8) {
        /// A keyframe is a frame that is a complete representation of the video content.
        KeyFrame = 1,
        /// An interframe is a frame that is a partial representation of the video content.
        InterFrame = 2,
        /// A disposable interframe is a frame that is a partial representation of the video content, but is not required to be displayed. (h263 only)
        DisposableInterFrame = 3,
        /// A generated keyframe is a frame that is a complete representation of the video content, but is not a keyframe. (reserved for server use only)
        GeneratedKeyFrame = 4,
        /// A video info or command frame is a frame that contains video information or commands.
        Command = 5,
    }
}

nutype_enum! {
    /// FLV Video Command
    ///
    /// Defined by:
    /// - Legacy FLV spec, Annex E.4.3.1, VideoTagBody
    /// - Enhanced RTMP spec, Enhanced Video section
    pub enum VideoCommand(u8) {
        /// Start of client-side seeking video frame sequence
        StartSeek = 0,
        /// End of client-side seeking video frame sequence
        EndSeek = 1,
    }
}

/// A wrapper for the different types of video tag header data.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoTagHeaderData {
    /// Legacy video tag header.
    Legacy(legacy::LegacyVideoTagHeader),
    /// Enhanced video tag header.
    Enhanced(enhanced::ExVideoTagHeader),
}

/// FLV `VideoTagHeader`
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.3.1
/// - Enhanced RTMP spec, Enhanced Video section
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTagHeader {
    /// The frame type of the video data.
    pub frame_type: VideoFrameType,
    /// The data of the video tag header.
    pub data: VideoTagHeaderData,
}

impl VideoTagHeader {
    /// Demuxes the video tag header from the given reader.
    ///
    /// Whether the header is legacy or enhanced is decided by the top bit of
    /// the first byte.
    #[allow(clippy::unusual_byte_groupings)]
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let byte = reader.read_u8()?;
        // seek back one byte so that the byte can be read again
        reader.seek_relative(-1)?;

        let is_ex_video_header = (byte & 0b1_000_0000) != 0;

        let data = if !is_ex_video_header {
            VideoTagHeaderData::Legacy(legacy::LegacyVideoTagHeader::demux(reader)?)
        } else {
            VideoTagHeaderData::Enhanced(enhanced::ExVideoTagHeader::demux(reader)?)
        };

        Ok(VideoTagHeader {
            frame_type: VideoFrameType::from((byte & 0b0_111_0000) >> 4),
            data,
        })
    }

    /// Muxes the video tag header into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match &self.data {
            VideoTagHeaderData::Legacy(legacy) => legacy.mux(self.frame_type, writer),
            VideoTagHeaderData::Enhanced(enhanced) => enhanced.mux(self.frame_type, writer),
        }
    }
}
