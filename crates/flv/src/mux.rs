//! Media-frame to FLV-tag muxing.
//!
//! [`FlvMuxer`] turns codec frames into correctly ordered FLV tags: a
//! sequence header whenever the decoder configuration first appears or
//! changes, then the coded frames, and a sequence end for the FourCC
//! codecs when the stream finishes. The produced [`FlvTag`]s can be fed to
//! an [`FlvWriter`](crate::file::FlvWriter) or carried as RTMP audio/video
//! message payloads.

use std::io;

use bytes::Bytes;
use freshet_aac::AdtsHeader;

use crate::audio::AudioData;
use crate::audio::body::{AacAudioData, AudioTagBody};
use crate::audio::header::{AudioTagHeader, SoundFormat, SoundRate, SoundSize, SoundType};
use crate::error::FlvError;
use crate::tag::{FlvTag, FlvTagData};
use crate::video::VideoData;
use crate::video::body::VideoTagBody;
use crate::video::body::enhanced::{ExVideoTagBody, VideoPacket, VideoPacketSequenceStart};
use crate::video::body::legacy::LegacyVideoTagBody;
use crate::video::header::enhanced::{ExVideoTagHeader, ExVideoTagHeaderContent, VideoFourCc, VideoPacketType};
use crate::video::header::legacy::{LegacyVideoTagHeader, LegacyVideoTagHeaderAvcPacket};
use crate::video::header::{VideoFrameType, VideoTagHeader, VideoTagHeaderData};

/// The codecs the muxer can package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCodec {
    /// H.264, packaged in the legacy AVC tag shape.
    Avc,
    /// H.265, packaged in the enhanced `hvc1` shape.
    Hevc,
    /// VP9, packaged in the enhanced `vp09` shape.
    Vp9,
    /// AV1, packaged in the enhanced `av01` shape.
    Av1,
    /// AAC audio.
    Aac,
}

impl MediaCodec {
    /// Maps a MIME type onto a codec.
    pub fn from_mime_type(mime_type: &str) -> Result<Self, FlvError> {
        match mime_type {
            "video/avc" => Ok(Self::Avc),
            "video/hevc" => Ok(Self::Hevc),
            "video/x-vnd.on2.vp9" => Ok(Self::Vp9),
            "video/av01" => Ok(Self::Av1),
            "audio/mp4a-latm" => Ok(Self::Aac),
            other => Err(FlvError::UnsupportedMimeType(other.to_string())),
        }
    }

    /// Returns true for the video codecs.
    pub fn is_video(&self) -> bool {
        !matches!(self, Self::Aac)
    }

    fn four_cc(&self) -> Option<VideoFourCc> {
        match self {
            Self::Hevc => Some(VideoFourCc::Hevc),
            Self::Vp9 => Some(VideoFourCc::Vp9),
            Self::Av1 => Some(VideoFourCc::Av1),
            _ => None,
        }
    }
}

/// One frame handed to the muxer.
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// The codec of the payload.
    pub codec: MediaCodec,
    /// The presentation timestamp in milliseconds.
    pub timestamp_ms: u32,
    /// True for sync frames; ignored for audio.
    pub keyframe: bool,
    /// The composition time offset for AVC/HEVC, 0 otherwise.
    pub composition_time_offset: i32,
    /// The frame payload. For AVC/HEVC this is length-prefixed (AVCC) NAL
    /// data; for AAC either a raw frame or a full ADTS frame.
    pub payload: Bytes,
    /// The decoder configuration: an `AVCDecoderConfigurationRecord`,
    /// `HEVCDecoderConfigurationRecord`, codec-specific config, or AAC
    /// `AudioSpecificConfig`. Only needed until the first coded frame, and
    /// whenever the configuration changes.
    pub descriptor: Option<Bytes>,
}

/// Packages [`MediaFrame`]s into FLV tags.
///
/// The muxer tracks the last seen decoder configuration per track and
/// emits a new sequence header tag whenever it changes.
#[derive(Debug, Default)]
pub struct FlvMuxer {
    video_descriptor: Option<Bytes>,
    audio_descriptor: Option<Bytes>,
    video_codec: Option<MediaCodec>,
}

impl FlvMuxer {
    /// Creates a muxer with no configured tracks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages one frame, returning the tags to write in order.
    pub fn write_frame(&mut self, frame: MediaFrame) -> Result<Vec<FlvTag>, FlvError> {
        match frame.codec {
            MediaCodec::Aac => self.write_audio_frame(frame),
            MediaCodec::Avc => self.write_avc_frame(frame),
            MediaCodec::Hevc | MediaCodec::Vp9 | MediaCodec::Av1 => self.write_enhanced_frame(frame),
        }
    }

    /// Finishes the stream: emits a sequence-end tag for an enhanced video
    /// track and resets the muxer.
    pub fn finish(&mut self, timestamp_ms: u32) -> Result<Vec<FlvTag>, FlvError> {
        let mut tags = Vec::new();

        if let Some(four_cc) = self.video_codec.take().and_then(|codec| codec.four_cc()) {
            tags.push(enhanced_video_tag(
                timestamp_ms,
                VideoFrameType::KeyFrame,
                VideoPacketType::SequenceEnd,
                four_cc,
                VideoPacket::SequenceEnd,
            ));
        }

        self.video_descriptor = None;
        self.audio_descriptor = None;

        Ok(tags)
    }

    fn write_audio_frame(&mut self, frame: MediaFrame) -> Result<Vec<FlvTag>, FlvError> {
        let mut tags = Vec::new();

        let (descriptor, payload) = match frame.descriptor {
            Some(descriptor) => (descriptor, frame.payload),
            // raw ADTS carries everything needed to synthesize the config
            None if frame.payload.len() >= 7 && frame.payload[0] == 0xFF && frame.payload[1] & 0xF0 == 0xF0 => {
                let adts = AdtsHeader::parse(&frame.payload)?;

                let mut config = Vec::new();
                adts.audio_specific_config()?.mux(&mut config)?;

                let payload = frame
                    .payload
                    .slice(adts.header_size() as usize..adts.frame_length as usize);

                (Bytes::from(config), payload)
            }
            None => (
                self.audio_descriptor
                    .clone()
                    .ok_or(FlvError::MissingSequenceHeader("aac"))?,
                frame.payload,
            ),
        };

        if self.audio_descriptor.as_ref() != Some(&descriptor) {
            tags.push(audio_tag(
                frame.timestamp_ms,
                AacAudioData::SequenceHeader(descriptor.clone()),
            ));
            self.audio_descriptor = Some(descriptor);
        }

        tags.push(audio_tag(frame.timestamp_ms, AacAudioData::Raw(payload)));

        Ok(tags)
    }

    fn write_avc_frame(&mut self, frame: MediaFrame) -> Result<Vec<FlvTag>, FlvError> {
        let mut tags = Vec::new();
        self.video_codec = Some(MediaCodec::Avc);

        if let Some(descriptor) = &frame.descriptor {
            if self.video_descriptor.as_ref() != Some(descriptor) {
                let record = freshet_h264::AVCDecoderConfigurationRecord::demux(&mut io::Cursor::new(
                    descriptor.clone(),
                ))?;

                tags.push(FlvTag {
                    timestamp_ms: frame.timestamp_ms,
                    stream_id: 0,
                    data: FlvTagData::Video(VideoData {
                        header: VideoTagHeader {
                            frame_type: VideoFrameType::KeyFrame,
                            data: VideoTagHeaderData::Legacy(LegacyVideoTagHeader::AvcPacket(
                                LegacyVideoTagHeaderAvcPacket::SequenceHeader,
                            )),
                        },
                        body: VideoTagBody::Legacy(LegacyVideoTagBody::AvcVideoPacketSeqHdr(record)),
                    }),
                });
                self.video_descriptor = Some(descriptor.clone());
            }
        }

        if self.video_descriptor.is_none() {
            return Err(FlvError::MissingSequenceHeader("avc"));
        }

        let frame_type = if frame.keyframe {
            VideoFrameType::KeyFrame
        } else {
            VideoFrameType::InterFrame
        };

        tags.push(FlvTag {
            timestamp_ms: frame.timestamp_ms,
            stream_id: 0,
            data: FlvTagData::Video(VideoData {
                header: VideoTagHeader {
                    frame_type,
                    data: VideoTagHeaderData::Legacy(LegacyVideoTagHeader::AvcPacket(
                        LegacyVideoTagHeaderAvcPacket::Nalu {
                            composition_time_offset: frame.composition_time_offset as u32,
                        },
                    )),
                },
                body: VideoTagBody::Legacy(LegacyVideoTagBody::Other { data: frame.payload }),
            }),
        });

        Ok(tags)
    }

    fn write_enhanced_frame(&mut self, frame: MediaFrame) -> Result<Vec<FlvTag>, FlvError> {
        let mut tags = Vec::new();
        self.video_codec = Some(frame.codec);

        let four_cc = frame.codec.four_cc().expect("enhanced codecs have a four cc");

        if let Some(descriptor) = &frame.descriptor {
            if self.video_descriptor.as_ref() != Some(descriptor) {
                let start = match four_cc {
                    VideoFourCc::Hevc => VideoPacketSequenceStart::Hevc(
                        freshet_h265::HEVCDecoderConfigurationRecord::demux(&mut io::Cursor::new(descriptor.clone()))?,
                    ),
                    _ => VideoPacketSequenceStart::Other(descriptor.clone()),
                };

                tags.push(enhanced_video_tag(
                    frame.timestamp_ms,
                    VideoFrameType::KeyFrame,
                    VideoPacketType::SequenceStart,
                    four_cc,
                    VideoPacket::SequenceStart(start),
                ));
                self.video_descriptor = Some(descriptor.clone());
            }
        }

        if self.video_descriptor.is_none() {
            return Err(FlvError::MissingSequenceHeader("enhanced video"));
        }

        let frame_type = if frame.keyframe {
            VideoFrameType::KeyFrame
        } else {
            VideoFrameType::InterFrame
        };

        // HEVC with a composition offset needs the CodedFrames shape, the
        // rest gets the offset-free CodedFramesX
        let (packet_type, packet) = if four_cc == VideoFourCc::Hevc && frame.composition_time_offset != 0 {
            (
                VideoPacketType::CodedFrames,
                VideoPacket::CodedFrames {
                    composition_time_offset: Some(frame.composition_time_offset),
                    data: frame.payload,
                },
            )
        } else {
            (VideoPacketType::CodedFramesX, VideoPacket::CodedFramesX { data: frame.payload })
        };

        tags.push(enhanced_video_tag(
            frame.timestamp_ms,
            frame_type,
            packet_type,
            four_cc,
            packet,
        ));

        Ok(tags)
    }
}

fn audio_tag(timestamp_ms: u32, body: AacAudioData) -> FlvTag {
    FlvTag {
        timestamp_ms,
        stream_id: 0,
        data: FlvTagData::Audio(AudioData {
            header: AudioTagHeader {
                sound_format: SoundFormat::Aac,
                // AAC tags always signal 44 kHz stereo 16-bit, the real
                // parameters live in the AudioSpecificConfig
                sound_rate: SoundRate::Hz44000,
                sound_size: SoundSize::Bit16,
                sound_type: SoundType::Stereo,
            },
            body: AudioTagBody::Aac(body),
        }),
    }
}

fn enhanced_video_tag(
    timestamp_ms: u32,
    frame_type: VideoFrameType,
    packet_type: VideoPacketType,
    four_cc: VideoFourCc,
    packet: VideoPacket,
) -> FlvTag {
    FlvTag {
        timestamp_ms,
        stream_id: 0,
        data: FlvTagData::Video(VideoData {
            header: VideoTagHeader {
                frame_type,
                data: VideoTagHeaderData::Enhanced(ExVideoTagHeader {
                    video_packet_mod_exs: Vec::new(),
                    video_packet_type: packet_type,
                    content: ExVideoTagHeaderContent::NoMultiTrack(four_cc),
                }),
            },
            body: VideoTagBody::Enhanced(ExVideoTagBody::NoMultitrack {
                video_four_cc: four_cc,
                packet,
            }),
        }),
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::*;

    const AVC_CONFIG: &[u8] =
        b"\x01d\0\x1f\xff\xe1\0\x1dgd\0\x1f\xac\xd9A\xe0m\xf9\xe6\xa0  (\0\0\x03\0\x08\0\0\x03\x01\xe0x\xc1\x8c\xb0\x01\0\x06h\xeb\xe3\xcb\"\xc0\xfd\xf8\xf8\0";

    fn avc_frame(timestamp_ms: u32, keyframe: bool, descriptor: Option<Bytes>) -> MediaFrame {
        MediaFrame {
            codec: MediaCodec::Avc,
            timestamp_ms,
            keyframe,
            composition_time_offset: 0,
            payload: Bytes::from_static(&[0x00, 0x00, 0x00, 0x01, 0x65]),
            descriptor,
        }
    }

    #[test]
    fn mime_type_mapping() {
        assert_eq!(MediaCodec::from_mime_type("video/avc").unwrap(), MediaCodec::Avc);
        assert_eq!(MediaCodec::from_mime_type("video/hevc").unwrap(), MediaCodec::Hevc);
        assert_eq!(MediaCodec::from_mime_type("audio/mp4a-latm").unwrap(), MediaCodec::Aac);
        assert!(matches!(
            MediaCodec::from_mime_type("video/mystery"),
            Err(FlvError::UnsupportedMimeType(_))
        ));
    }

    #[test]
    fn avc_descriptor_emitted_once() {
        let mut muxer = FlvMuxer::new();

        let tags = muxer
            .write_frame(avc_frame(0, true, Some(Bytes::from_static(AVC_CONFIG))))
            .unwrap();
        assert_eq!(tags.len(), 2);
        assert!(matches!(
            tags[0].data,
            FlvTagData::Video(VideoData {
                body: VideoTagBody::Legacy(LegacyVideoTagBody::AvcVideoPacketSeqHdr(_)),
                ..
            })
        ));

        // same descriptor again, no new sequence header
        let tags = muxer
            .write_frame(avc_frame(40, false, Some(Bytes::from_static(AVC_CONFIG))))
            .unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn coded_frame_without_descriptor_fails() {
        let mut muxer = FlvMuxer::new();
        assert!(matches!(
            muxer.write_frame(avc_frame(0, true, None)),
            Err(FlvError::MissingSequenceHeader("avc"))
        ));
    }

    #[test]
    fn aac_adts_is_unwrapped() {
        let mut muxer = FlvMuxer::new();

        // ADTS header: AAC-LC 44.1kHz stereo, frame length 9 (7 header + 2 payload)
        let mut adts = vec![0xFF, 0xF1, 0x50, 0x80, 0x01, 0x3F, 0xFC];
        adts.extend_from_slice(&[0xAA, 0xBB]);

        let tags = muxer
            .write_frame(MediaFrame {
                codec: MediaCodec::Aac,
                timestamp_ms: 0,
                keyframe: false,
                composition_time_offset: 0,
                payload: Bytes::from(adts),
                descriptor: None,
            })
            .unwrap();

        assert_eq!(tags.len(), 2);
        let FlvTagData::Audio(AudioData {
            body: AudioTagBody::Aac(AacAudioData::SequenceHeader(config)),
            ..
        }) = &tags[0].data
        else {
            panic!("expected sequence header first");
        };
        assert_eq!(config.as_ref(), &[0x12, 0x10]);

        let FlvTagData::Audio(AudioData {
            body: AudioTagBody::Aac(AacAudioData::Raw(payload)),
            ..
        }) = &tags[1].data
        else {
            panic!("expected raw frame second");
        };
        assert_eq!(payload.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn hevc_uses_coded_frames_for_cts() {
        let mut muxer = FlvMuxer::new();

        let config = {
            let record = freshet_h265::HEVCDecoderConfigurationRecord::from_parameter_sets(
                vec![Bytes::from_static(&[0x40, 0x01])],
                vec![Bytes::from_static(&[0x42, 0x01])],
                vec![Bytes::from_static(&[0x44, 0x01])],
            )
            .unwrap();
            let mut buf = Vec::new();
            record.mux(&mut buf).unwrap();
            Bytes::from(buf)
        };

        let tags = muxer
            .write_frame(MediaFrame {
                codec: MediaCodec::Hevc,
                timestamp_ms: 0,
                keyframe: true,
                composition_time_offset: 2,
                payload: Bytes::from_static(&[0x01]),
                descriptor: Some(config),
            })
            .unwrap();

        assert_eq!(tags.len(), 2);
        assert!(matches!(
            &tags[1].data,
            FlvTagData::Video(VideoData {
                body: VideoTagBody::Enhanced(ExVideoTagBody::NoMultitrack {
                    packet: VideoPacket::CodedFrames {
                        composition_time_offset: Some(2),
                        ..
                    },
                    ..
                }),
                ..
            })
        ));

        // finishing an enhanced track emits the sequence end
        let tags = muxer.finish(40).unwrap();
        assert_eq!(tags.len(), 1);
        assert!(matches!(
            &tags[0].data,
            FlvTagData::Video(VideoData {
                body: VideoTagBody::Enhanced(ExVideoTagBody::NoMultitrack {
                    packet: VideoPacket::SequenceEnd,
                    ..
                }),
                ..
            })
        ));
    }

    #[test]
    fn finish_without_video_is_empty() {
        let mut muxer = FlvMuxer::new();
        assert!(muxer.finish(0).unwrap().is_empty());
    }
}
