//! NetConnection command messages.

use freshet_amf::{AmfObject, AmfValue};
use serde_derive::{Deserialize, Serialize};

use super::on_status::codes::NET_CONNECTION_CONNECT_SUCCESS;
use crate::command_messages::CommandResultLevel;

pub mod reader;
pub mod writer;

/// The audio codec support flags of the `audioCodecs` connect field.
///
/// Defined by:
/// - Legacy RTMP spec, page 31-32
#[bitmask_enum::bitmask(u16)]
pub enum AudioCodecs {
    /// Raw PCM samples.
    None = 0x0001,
    /// ADPCM compression.
    Adpcm = 0x0002,
    /// MP3 compression.
    Mp3 = 0x0004,
    /// Not used.
    Intel = 0x0008,
    /// Not used.
    Unused = 0x0010,
    /// NellyMoser at 8 kHz compression.
    Nelly8 = 0x0020,
    /// NellyMoser at 5, 11, 22 and 44 kHz.
    Nelly = 0x0040,
    /// G711A sound compression.
    G711A = 0x0080,
    /// G711U sound compression.
    G711U = 0x0100,
    /// NellyMoser at 16 kHz.
    Nelly16 = 0x0200,
    /// Advanced audio coding.
    Aac = 0x0400,
    /// Speex audio.
    Speex = 0x0800,
}

/// The video codec support flags of the `videoCodecs` connect field.
///
/// Defined by:
/// - Legacy RTMP spec, page 32
#[bitmask_enum::bitmask(u16)]
pub enum VideoCodecs {
    /// Obsolete value.
    Unused = 0x0001,
    /// Obsolete value.
    Jpeg = 0x0002,
    /// Sorenson Flash video.
    SorensonH263 = 0x0004,
    /// V1 screen sharing.
    Homebrew = 0x0008,
    /// On2 video (Flash 8+).
    Vp6 = 0x0010,
    /// On2 video with alpha channel.
    Vp6Alpha = 0x0020,
    /// Screen sharing version 2.
    HomebrewV = 0x0040,
    /// H.264 video.
    Avc = 0x0080,
    /// H.265 video; an extension signaled by enhanced peers.
    Hevc = 0x0100,
}

/// Extended capabilities mask of the enhanced `capsEx` connect field.
///
/// Defined by:
/// - Enhanced RTMP spec, Enhancing NetConnection connect Command
#[bitmask_enum::bitmask(u8)]
pub enum CapsExMask {
    /// Support for reconnection
    Reconnect = 0x01,
    /// Support for multitrack
    Multitrack = 0x02,
    /// Can parse ModEx signal
    ModEx = 0x04,
    /// Support for nano offset
    TimestampNanoOffset = 0x08,
}

/// NetConnection command `connect`.
///
/// Defined by:
/// - Legacy RTMP spec, 7.2.1.1
/// - Enhanced RTMP spec, Enhancing NetConnection connect Command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConnectionCommandConnect {
    /// Tells the server application name the client is connected to.
    pub app: String,
    /// The Flash Player / encoder version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_ver: Option<String>,
    /// URL of the source SWF file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swf_url: Option<String>,
    /// URL of the server up to the application: `rtmp://host[:port]/app`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tc_url: Option<String>,
    /// True if proxy is being used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fpad: Option<bool>,
    /// Capability flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<f64>,
    /// The audio codecs the client supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codecs: Option<AudioCodecs>,
    /// The video codecs the client supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codecs: Option<VideoCodecs>,
    /// The special video functions the client supports (seek = 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_function: Option<f64>,
    /// URL of the web page the SWF was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    /// The AMF encoding the client wants: 0 or 3.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_encoding: Option<f64>,
    /// The extended capability flags of enhanced peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caps_ex: Option<CapsExMask>,
    /// All other connect object entries.
    #[serde(flatten)]
    pub others: AmfObject,
}

impl NetConnectionCommandConnect {
    /// A connect object for the given app with the fields encoders
    /// commonly send.
    pub fn new(app: impl Into<String>, tc_url: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            flash_ver: Some("FMLE/3.0 (compatible; freshet)".to_string()),
            swf_url: None,
            tc_url: Some(tc_url.into()),
            fpad: Some(false),
            capabilities: Some(239.0),
            audio_codecs: Some(AudioCodecs::Aac | AudioCodecs::G711A | AudioCodecs::G711U),
            video_codecs: Some(VideoCodecs::Avc | VideoCodecs::SorensonH263),
            video_function: Some(0.0),
            page_url: None,
            object_encoding: Some(0.0),
            caps_ex: None,
            others: AmfObject::new(),
        }
    }
}

/// NetConnection command `connect` result.
///
/// Defined by:
/// - Legacy RTMP spec, 7.2.1.1
#[derive(Debug, Clone, PartialEq)]
pub struct NetConnectionCommandConnectResult {
    /// Flash Media Server version.
    ///
    /// Usually set to "FMS/3,0,1,123".
    pub fmsver: String,
    /// Capability flags, usually 31.0.
    pub capabilities: f64,
    /// Result level.
    pub level: CommandResultLevel,
    /// Result code.
    pub code: String,
    /// Result description.
    pub description: String,
    /// The object encoding of the accepted connection.
    pub encoding: f64,
}

impl Default for NetConnectionCommandConnectResult {
    fn default() -> Self {
        Self {
            fmsver: "FMS/3,0,1,123".to_string(),
            capabilities: 31.0,
            level: CommandResultLevel::Status,
            code: NET_CONNECTION_CONNECT_SUCCESS.to_string(),
            description: "Connection Succeeded.".to_string(),
            encoding: 0.0,
        }
    }
}

/// NetConnection commands as defined in 7.2.1.
#[derive(Debug, Clone, PartialEq)]
pub enum NetConnectionCommand {
    /// Connect command.
    Connect(Box<NetConnectionCommandConnect>),
    /// Connect result.
    ///
    /// Sent from server to client in response to [`NetConnectionCommand::Connect`].
    ConnectResult(NetConnectionCommandConnectResult),
    /// Call command.
    Call {
        /// The command object, null when unused.
        command_object: AmfValue,
        /// The optional call arguments.
        arguments: Vec<AmfValue>,
    },
    /// Close command.
    Close,
    /// Create stream command.
    CreateStream,
    /// Create stream result.
    ///
    /// Sent from server to client in response to [`NetConnectionCommand::CreateStream`].
    CreateStreamResult {
        /// ID of the created stream.
        stream_id: f64,
    },
    /// Release stream command, sent before re-publishing a stream key.
    ReleaseStream {
        /// The stream key to release.
        stream_name: String,
    },
    /// FCPublish command, announcing an upcoming publish.
    FCPublish {
        /// The stream key about to be published.
        stream_name: String,
    },
    /// FCUnpublish command, announcing the end of a publish.
    FCUnpublish {
        /// The stream key being unpublished.
        stream_name: String,
    },
}

macro_rules! codec_mask_serde {
    ($ty:ident) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_f64(self.bits() as f64)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let bits: f64 = serde::Deserialize::deserialize(deserializer)?;
                Ok(Self::from(bits as u16))
            }
        }
    };
}

codec_mask_serde!(AudioCodecs);
codec_mask_serde!(VideoCodecs);

impl serde::Serialize for CapsExMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.bits() as f64)
    }
}

impl<'de> serde::Deserialize<'de> for CapsExMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits: f64 = serde::Deserialize::deserialize(deserializer)?;
        Ok(Self::from(bits as u8))
    }
}
