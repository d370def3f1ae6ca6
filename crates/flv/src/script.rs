//! Script data structures

use std::io;

use bytes::Bytes;
use freshet_amf::{Amf0Decoder, Amf0Encoder, AmfObject, AmfValue, de::Deserializer};
use freshet_bytes_util::BytesCursorExt;
use serde::Deserialize as _;
use serde_derive::Deserialize;

use crate::audio::header::SoundFormat;
use crate::error::FlvError;
use crate::video::header::enhanced::VideoFourCc;
use crate::video::header::legacy::VideoCodecId;

/// FLV `onMetaData` audio codec ID.
///
/// Either a legacy [`SoundFormat`] or an enhanced FourCC, written as its
/// big-endian numeric value. Appears as `audiocodecid` in [`OnMetaData`].
#[derive(Debug, Clone, PartialEq)]
pub enum OnMetaDataAudioCodecId {
    /// Legacy audio codec ID.
    Legacy(SoundFormat),
    /// Enhanced audio codec FourCC.
    Enhanced([u8; 4]),
}

impl<'de> serde::Deserialize<'de> for OnMetaDataAudioCodecId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // codec ids are AMF numbers (doubles) on the wire
        let n: f64 = serde::Deserialize::deserialize(deserializer)?;
        let n = n as u32;

        // A legacy sound format fits a nibble; every FourCC (four printable
        // characters) is far larger, so the magnitude decides the variant.
        if n > u8::MAX as u32 {
            Ok(Self::Enhanced(n.to_be_bytes()))
        } else {
            Ok(Self::Legacy(SoundFormat::from(n as u8)))
        }
    }
}

impl OnMetaDataAudioCodecId {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Legacy(format) => format.0 as f64,
            Self::Enhanced(four_cc) => u32::from_be_bytes(*four_cc) as f64,
        }
    }
}

/// FLV `onMetaData` video codec ID.
///
/// Either a legacy [`VideoCodecId`] or an enhanced [`VideoFourCc`], written
/// as its big-endian numeric value. Appears as `videocodecid` in
/// [`OnMetaData`].
#[derive(Debug, Clone, PartialEq)]
pub enum OnMetaDataVideoCodecId {
    /// Legacy video codec ID.
    Legacy(VideoCodecId),
    /// Enhanced video codec FourCC.
    Enhanced(VideoFourCc),
}

impl<'de> serde::Deserialize<'de> for OnMetaDataVideoCodecId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let n: f64 = serde::Deserialize::deserialize(deserializer)?;
        let n = n as u32;

        if n > u8::MAX as u32 {
            Ok(Self::Enhanced(VideoFourCc::from(n.to_be_bytes())))
        } else {
            Ok(Self::Legacy(VideoCodecId::from(n as u8)))
        }
    }
}

impl OnMetaDataVideoCodecId {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Legacy(id) => id.0 as f64,
            Self::Enhanced(four_cc) => u32::from_be_bytes(four_cc.0) as f64,
        }
    }
}

/// FLV `onMetaData` script data
///
/// Defined by:
/// - Legacy FLV spec, Annex E.5
/// - Enhanced RTMP spec, Enhancing onMetaData section
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnMetaData {
    /// Audio codec ID used in the stream.
    #[serde(default)]
    pub audiocodecid: Option<OnMetaDataAudioCodecId>,
    /// Audio bitrate, in kilobits per second.
    #[serde(default)]
    pub audiodatarate: Option<f64>,
    /// Frequency at which the audio stream is replayed.
    #[serde(default)]
    pub audiosamplerate: Option<f64>,
    /// Resolution of a single audio sample.
    #[serde(default)]
    pub audiosamplesize: Option<f64>,
    /// Indicates stereo audio.
    #[serde(default)]
    pub stereo: Option<bool>,
    /// Total duration of the stream, in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Number of frames per second.
    #[serde(default)]
    pub framerate: Option<f64>,
    /// Height of the video, in pixels.
    #[serde(default)]
    pub height: Option<f64>,
    /// Video codec ID used in the stream.
    #[serde(default)]
    pub videocodecid: Option<OnMetaDataVideoCodecId>,
    /// Video bitrate, in kilobits per second.
    #[serde(default)]
    pub videodatarate: Option<f64>,
    /// Width of the video, in pixels.
    #[serde(default)]
    pub width: Option<f64>,
    /// Per-track metadata for multitrack audio, keyed by track id.
    #[serde(default)]
    pub audio_track_id_info_map: Option<AmfObject>,
    /// Per-track metadata for multitrack video, keyed by track id.
    #[serde(default)]
    pub video_track_id_info_map: Option<AmfObject>,
    /// Any other metadata contained in the script data.
    #[serde(flatten)]
    pub other: AmfObject,
}

impl OnMetaData {
    /// Converts the metadata into the ECMA array written on the wire.
    pub fn to_amf(&self) -> AmfObject {
        let mut object = AmfObject::new();

        if let Some(duration) = self.duration {
            object.insert("duration", duration);
        }
        if let Some(id) = &self.audiocodecid {
            object.insert("audiocodecid", id.as_f64());
        }
        if let Some(rate) = self.audiodatarate {
            object.insert("audiodatarate", rate);
        }
        if let Some(rate) = self.audiosamplerate {
            object.insert("audiosamplerate", rate);
        }
        if let Some(size) = self.audiosamplesize {
            object.insert("audiosamplesize", size);
        }
        if let Some(stereo) = self.stereo {
            object.insert("stereo", stereo);
        }
        if let Some(id) = &self.videocodecid {
            object.insert("videocodecid", id.as_f64());
        }
        if let Some(rate) = self.videodatarate {
            object.insert("videodatarate", rate);
        }
        if let Some(width) = self.width {
            object.insert("width", width);
        }
        if let Some(height) = self.height {
            object.insert("height", height);
        }
        if let Some(framerate) = self.framerate {
            object.insert("framerate", framerate);
        }
        if let Some(map) = &self.audio_track_id_info_map {
            object.insert("audioTrackIdInfoMap", AmfValue::Object(map.clone()));
        }
        if let Some(map) = &self.video_track_id_info_map {
            object.insert("videoTrackIdInfoMap", AmfValue::Object(map.clone()));
        }
        for (key, value) in self.other.iter() {
            object.insert(key, value.clone());
        }

        object
    }
}

/// FLV `SCRIPTDATA` tag
///
/// Defined by:
/// - Legacy FLV spec, Annex E.4.4.1
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptData {
    /// `onMetaData` script data.
    OnMetaData(Box<OnMetaData>),
    /// Any other script data.
    Unknown {
        /// The name of the script data.
        name: String,
        /// The payload values.
        data: Vec<AmfValue>,
    },
}

impl ScriptData {
    /// Demuxes the script data from the given reader.
    pub fn demux(reader: &mut io::Cursor<Bytes>) -> Result<Self, FlvError> {
        let buf = reader.extract_remaining();
        let mut decoder = Amf0Decoder::new(buf);

        let name = decoder.decode_string()?;

        match name.as_str() {
            "onMetaData" => {
                let on_meta_data = OnMetaData::deserialize(&mut Deserializer::from_decoder(&mut decoder))?;
                Ok(Self::OnMetaData(Box::new(on_meta_data)))
            }
            _ => Ok(Self::Unknown {
                name,
                data: decoder.decode_all()?,
            }),
        }
    }

    /// Muxes the script data into the given writer.
    ///
    /// `onMetaData` payloads are written as an ECMA array, the shape peers
    /// expect from encoders.
    pub fn mux<W: io::Write>(&self, writer: &mut W) -> Result<(), FlvError> {
        let mut encoder = Amf0Encoder::new(writer);

        match self {
            Self::OnMetaData(on_meta_data) => {
                encoder.encode_string("onMetaData")?;
                encoder.encode_ecma_array(&on_meta_data.to_amf())?;
            }
            Self::Unknown { name, data } => {
                encoder.encode_string(name)?;
                for value in data {
                    encoder.encode_value(value)?;
                }
            }
        }

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
    fn on_meta_data_round_trip() {
        let meta = OnMetaData {
            duration: Some(1.088),
            audiocodecid: Some(OnMetaDataAudioCodecId::Legacy(SoundFormat::Aac)),
            audiosamplerate: Some(48000.0),
            audiosamplesize: Some(16.0),
            stereo: Some(true),
            videocodecid: Some(OnMetaDataVideoCodecId::Legacy(VideoCodecId::Avc)),
            width: Some(3840.0),
            height: Some(2160.0),
            framerate: Some(60.0),
            ..Default::default()
        };

        let mut buf = Vec::new();
        ScriptData::OnMetaData(Box::new(meta.clone())).mux(&mut buf).unwrap();

        let script = ScriptData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        let ScriptData::OnMetaData(demuxed) = script else {
            panic!("expected onMetaData");
        };

        assert_eq!(*demuxed, meta);
    }

    #[test]
    fn enhanced_video_codec_id() {
        let meta = OnMetaData {
            videocodecid: Some(OnMetaDataVideoCodecId::Enhanced(VideoFourCc::Hevc)),
            ..Default::default()
        };

        let mut buf = Vec::new();
        ScriptData::OnMetaData(Box::new(meta.clone())).mux(&mut buf).unwrap();

        let script = ScriptData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        let ScriptData::OnMetaData(demuxed) = script else {
            panic!("expected onMetaData");
        };
        assert_eq!(demuxed.videocodecid, meta.videocodecid);
    }

    #[test]
    fn unknown_script_data() {
        let mut buf = Vec::new();
        let mut encoder = Amf0Encoder::new(&mut buf);
        encoder.encode_string("onCuePoint").unwrap();
        encoder.encode_number(1.0).unwrap();

        let script = ScriptData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        assert_eq!(
            script,
            ScriptData::Unknown {
                name: "onCuePoint".to_string(),
                data: vec![AmfValue::Number(1.0)],
            }
        );
    }

    #[test]
    fn extra_keys_survive() {
        let meta = OnMetaData {
            duration: Some(0.0),
            other: [("encoder", AmfValue::String("freshet".to_string()))].into_iter().collect(),
            ..Default::default()
        };

        let mut buf = Vec::new();
        ScriptData::OnMetaData(Box::new(meta)).mux(&mut buf).unwrap();

        let script = ScriptData::demux(&mut io::Cursor::new(Bytes::from(buf))).unwrap();
        let ScriptData::OnMetaData(demuxed) = script else {
            panic!("expected onMetaData");
        };
        assert_eq!(demuxed.other.get("encoder"), Some(&AmfValue::String("freshet".to_string())));
    }
}
