//! Enhanced video body types and functions.

use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;
use freshet_h264::AVCDecoderConfigurationRecord;
use freshet_h265::HEVCDecoderConfigurationRecord;

use crate::error::FlvError;
use crate::video::header::VideoCommand;
use crate::video::header::enhanced::{ExVideoTagHeader, ExVideoTagHeaderContent, VideoFourCc, VideoPacketType};

/// The decoder configuration carried by a sequence-start packet.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPacketSequenceStart {
    /// An AVC decoder configuration record (`avc1`).
    Avc(AVCDecoderConfigurationRecord),
    /// An HEVC decoder configuration record (`hvc1`).
    Hevc(HEVCDecoderConfigurationRecord),
    /// Any other codec's configuration, carried opaque (`av01`, `vp09`, ...).
    Other(Bytes),
}

/// A single enhanced video packet.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoPacket {
    /// The codec's decoder configuration.
    SequenceStart(VideoPacketSequenceStart),
    /// Coded frames; for `avc1` and `hvc1` preceded by a 3-byte
    /// composition time offset.
    CodedFrames {
        /// The signed composition time offset, present for `avc1`/`hvc1`.
        composition_time_offset: Option<i32>,
        /// The frame data.
        data: Bytes,
    },
    /// Coded frames without a composition time offset (implicitly 0).
    CodedFramesX {
        /// The frame data.
        data: Bytes,
    },
    /// End of the coded sequence.
    SequenceEnd,
    /// Codec-specific metadata, an AMF payload carried opaque.
    Metadata {
        /// The raw metadata payload.
        data: Bytes,
    },
    /// Start of an MPEG-2 TS wrapped sequence.
    Mpeg2TsSequenceStart {
        /// The raw payload.
        data: Bytes,
    },
    /// Any other packet type.
    Unknown {
        /// The packet type.
        video_packet_type: VideoPacketType,
        /// The raw payload.
        data: Bytes,
    },
}

impl VideoPacket {
    fn demux(
        packet_type: VideoPacketType,
        four_cc: VideoFourCc,
        reader: &mut io::Cursor<Bytes>,
    ) -> Result<Self, FlvError> {
        match packet_type {
            VideoPacketType::SequenceStart => {
                let start = match four_cc {
                    VideoFourCc::Avc => {
                        let mut body = io::Cursor::new(reader.extract_remaining());
                        VideoPacketSequenceStart::Avc(AVCDecoderConfigurationRecord::demux(&mut body)?)
                    }
                    VideoFourCc::Hevc => {
                        let mut body = io::Cursor::new(reader.extract_remaining());
                        VideoPacketSequenceStart::Hevc(HEVCDecoderConfigurationRecord::demux(&mut body)?)
                    }
                    _ => VideoPacketSequenceStart::Other(reader.extract_remaining()),
                };
                Ok(Self::SequenceStart(start))
            }
            VideoPacketType::CodedFrames => {
                let composition_time_offset = match four_cc {
                    // the composition time offset only precedes AVC and HEVC frames
                    VideoFourCc::Avc | VideoFourCc::Hevc => Some(read_i24(reader)?),
                    _ => None,
                };

                Ok(Self::CodedFrames {
                    composition_time_offset,
                    data: reader.extract_remaining(),
                })
            }
            VideoPacketType::CodedFramesX => Ok(Self::CodedFramesX {
                data: reader.extract_remaining(),
            }),
            VideoPacketType::SequenceEnd => Ok(Self::SequenceEnd),
            VideoPacketType::Metadata => Ok(Self::Metadata {
                data: reader.extract_remaining(),
            }),
            VideoPacketType::Mpeg2TsSequenceStart => Ok(Self::Mpeg2TsSequenceStart {
                data: reader.extract_remaining(),
            }),
            _ => Ok(Self::Unknown {
                video_packet_type: packet_type,
                data: reader.extract_remaining(),
            }),
        }
    }

    fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            Self::SequenceStart(VideoPacketSequenceStart::Avc(record)) => {
                record.mux(writer)?;
            }
            Self::SequenceStart(VideoPacketSequenceStart::Hevc(record)) => {
                record.mux(writer)?;
            }
            Self::SequenceStart(VideoPacketSequenceStart::Other(data)) => {
                writer.write_all(data)?;
            }
            Self::CodedFrames {
                composition_time_offset,
                data,
            } => {
                if let Some(cts) = composition_time_offset {
                    write_i24(writer, *cts)?;
                }
                writer.write_all(data)?;
            }
            Self::CodedFramesX { data }
            | Self::Metadata { data }
            | Self::Mpeg2TsSequenceStart { data }
            | Self::Unknown { data, .. } => {
                writer.write_all(data)?;
            }
            Self::SequenceEnd => {}
        }

        Ok(())
    }
}

/// A single video track of a multitrack body.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrack {
    /// The track id.
    pub track_id: u8,
    /// The packet carried for this track.
    pub packet: VideoPacket,
}

/// The body of an enhanced FLV video tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ExVideoTagBody {
    /// An empty body following a video command.
    Command(VideoCommand),
    /// A single packet without multitrack framing.
    NoMultitrack {
        /// The codec FOURCC.
        video_four_cc: VideoFourCc,
        /// The packet.
        packet: VideoPacket,
    },
    /// One or more tracks, each prefixed by its track id.
    ManyTracks {
        /// The codec FOURCC shared by all tracks.
        video_four_cc: VideoFourCc,
        /// The tracks.
        tracks: Vec<VideoTrack>,
    },
}

impl ExVideoTagBody {
    /// Demuxes the enhanced video tag body, dispatching on the already
    /// demuxed header.
    pub fn demux(header: &ExVideoTagHeader, reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        match &header.content {
            ExVideoTagHeaderContent::VideoCommand(command) => Ok(Self::Command(*command)),
            ExVideoTagHeaderContent::NoMultiTrack(four_cc) => Ok(Self::NoMultitrack {
                video_four_cc: *four_cc,
                packet: VideoPacket::demux(header.video_packet_type, *four_cc, reader)?,
            }),
            ExVideoTagHeaderContent::OneTrack(four_cc) => {
                let track_id = reader.read_u8()?;
                let packet = VideoPacket::demux(header.video_packet_type, *four_cc, reader)?;

                Ok(Self::ManyTracks {
                    video_four_cc: *four_cc,
                    tracks: vec![VideoTrack { track_id, packet }],
                })
            }
            ExVideoTagHeaderContent::ManyTracks(four_cc) => {
                let mut tracks = Vec::new();

                while reader.position() < reader.get_ref().len() as u64 {
                    let track_id = reader.read_u8()?;
                    let size = reader.read_u24::<BigEndian>()? as usize;
                    let body = reader.extract_bytes(size)?;

                    let packet = VideoPacket::demux(header.video_packet_type, *four_cc, &mut io::Cursor::new(body))?;
                    tracks.push(VideoTrack { track_id, packet });
                }

                Ok(Self::ManyTracks {
                    video_four_cc: *four_cc,
                    tracks,
                })
            }
            // tracks with per-track codecs are not produced by any known
            // peer, carry the remainder as a single opaque packet
            ExVideoTagHeaderContent::ManyTracksManyCodecs | ExVideoTagHeaderContent::Unknown { .. } => {
                Ok(Self::NoMultitrack {
                    video_four_cc: VideoFourCc(*b"\0\0\0\0"),
                    packet: VideoPacket::Unknown {
                        video_packet_type: header.video_packet_type,
                        data: reader.extract_remaining(),
                    },
                })
            }
        }
    }

    /// Muxes the enhanced video tag body into the given writer.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        match self {
            // the command byte lives in the header
            Self::Command(_) => Ok(()),
            Self::NoMultitrack { packet, .. } => packet.mux(writer),
            Self::ManyTracks { tracks, .. } => {
                if let [track] = tracks.as_slice() {
                    // one-track mode carries no per-track size
                    writer.write_u8(track.track_id)?;
                    return track.packet.mux(writer);
                }

                for track in tracks {
                    let mut body = Vec::new();
                    track.packet.mux(&mut body)?;

                    writer.write_u8(track.track_id)?;
                    writer.write_u24::<BigEndian>(body.len() as u32)?;
                    writer.write_all(&body)?;
                }

                Ok(())
            }
        }
    }
}

fn read_i24(reader: &mut io::Cursor<Bytes>) -> Result<i32, FlvError> {
    let unsigned = reader.read_u24::<BigEndian>()? as i32;

    // sign extension of the 24-bit two's complement value
    if unsigned & 0x80_0000 != 0 {
        Ok(unsigned | !0xFF_FFFF)
    } else {
        Ok(unsigned)
    }
}

fn write_i24<W: io::Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_u24::<BigEndian>((value as u32) & 0xFF_FFFF)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;

    fn no_multitrack_header(packet_type: VideoPacketType, four_cc: VideoFourCc) -> ExVideoTagHeader {
        ExVideoTagHeader {
            video_packet_mod_exs: Vec::new(),
            video_packet_type: packet_type,
            content: ExVideoTagHeaderContent::NoMultiTrack(four_cc),
        }
    }

    #[test]
    fn hevc_coded_frames_carry_cts() {
        let header = no_multitrack_header(VideoPacketType::CodedFrames, VideoFourCc::Hevc);
        // cts -2 in 24-bit two's complement, then payload
        let data = Bytes::from_static(&[0xFF, 0xFF, 0xFE, 0xAB]);

        let body = ExVideoTagBody::demux(&header, &mut io::Cursor::new(data.clone())).unwrap();
        assert_eq!(
            body,
            ExVideoTagBody::NoMultitrack {
                video_four_cc: VideoFourCc::Hevc,
                packet: VideoPacket::CodedFrames {
                    composition_time_offset: Some(-2),
                    data: Bytes::from_static(&[0xAB]),
                },
            }
        );

        let mut buf = Vec::new();
        body.mux(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn av1_coded_frames_have_no_cts() {
        let header = no_multitrack_header(VideoPacketType::CodedFrames, VideoFourCc::Av1);
        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);

        let body = ExVideoTagBody::demux(&header, &mut io::Cursor::new(data)).unwrap();
        assert_eq!(
            body,
            ExVideoTagBody::NoMultitrack {
                video_four_cc: VideoFourCc::Av1,
                packet: VideoPacket::CodedFrames {
                    composition_time_offset: None,
                    data: Bytes::from_static(&[0x01, 0x02, 0x03]),
                },
            }
        );
    }

    #[test]
    fn sequence_end_is_empty() {
        let header = no_multitrack_header(VideoPacketType::SequenceEnd, VideoFourCc::Vp9);
        let body = ExVideoTagBody::demux(&header, &mut io::Cursor::new(Bytes::new())).unwrap();

        assert_eq!(
            body,
            ExVideoTagBody::NoMultitrack {
                video_four_cc: VideoFourCc::Vp9,
                packet: VideoPacket::SequenceEnd,
            }
        );

        let mut buf = Vec::new();
        body.mux(&mut buf).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn one_track_round_trip() {
        let header = ExVideoTagHeader {
            video_packet_mod_exs: Vec::new(),
            video_packet_type: VideoPacketType::CodedFramesX,
            content: ExVideoTagHeaderContent::OneTrack(VideoFourCc::Av1),
        };
        let data = Bytes::from_static(&[0x04, 0xAA, 0xBB]);

        let body = ExVideoTagBody::demux(&header, &mut io::Cursor::new(data.clone())).unwrap();
        assert_eq!(
            body,
            ExVideoTagBody::ManyTracks {
                video_four_cc: VideoFourCc::Av1,
                tracks: vec![VideoTrack {
                    track_id: 4,
                    packet: VideoPacket::CodedFramesX {
                        data: Bytes::from_static(&[0xAA, 0xBB]),
                    },
                }],
            }
        );

        let mut buf = Vec::new();
        body.mux(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn many_tracks_round_trip() {
        let header = ExVideoTagHeader {
            video_packet_mod_exs: Vec::new(),
            video_packet_type: VideoPacketType::CodedFramesX,
            content: ExVideoTagHeaderContent::ManyTracks(VideoFourCc::Vp9),
        };

        let body = ExVideoTagBody::ManyTracks {
            video_four_cc: VideoFourCc::Vp9,
            tracks: vec![
                VideoTrack {
                    track_id: 0,
                    packet: VideoPacket::CodedFramesX {
                        data: Bytes::from_static(&[0x01]),
                    },
                },
                VideoTrack {
                    track_id: 1,
                    packet: VideoPacket::CodedFramesX {
                        data: Bytes::from_static(&[0x02, 0x03]),
                    },
                },
            ],
        };

        let mut buf = Vec::new();
        body.mux(&mut buf).unwrap();

        let demuxed = ExVideoTagBody::demux(&header, &mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(demuxed, body);
    }
}
