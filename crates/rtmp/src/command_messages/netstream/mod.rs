//! NetStream command messages.

use freshet_amf::AmfObject;
use serde_derive::{Deserialize, Serialize};

pub mod reader;
pub mod writer;

/// NetStream commands as defined in 7.2.2.
#[derive(Debug, Clone, PartialEq)]
pub enum NetStreamCommand {
    /// Play command.
    Play {
        /// Name of the stream to play.
        stream_name: String,
        /// Start position: -2 live-then-recorded (default), -1 live only,
        /// >= 0 seconds into a recording.
        start: Option<f64>,
        /// Playback duration in seconds, -1 to play to the end.
        duration: Option<f64>,
        /// Whether to flush any previous playlist.
        reset: Option<bool>,
    },
    /// Play2 command.
    Play2 {
        /// The playback parameters.
        ///
        /// See the legacy RTMP spec for details.
        parameters: AmfObject,
    },
    /// Delete stream command.
    DeleteStream {
        /// ID of the stream to delete.
        stream_id: f64,
    },
    /// Close stream command.
    CloseStream,
    /// Receive audio command.
    ReceiveAudio {
        /// true or false to indicate whether to receive audio or not.
        receive_audio: bool,
    },
    /// Receive video command.
    ReceiveVideo {
        /// true or false to indicate whether to receive video or not.
        receive_video: bool,
    },
    /// Publish command.
    Publish {
        /// Name with which the stream is published.
        publishing_name: String,
        /// Type of publishing.
        publishing_type: NetStreamCommandPublishPublishingType,
    },
    /// Seek command.
    Seek {
        /// Number of milliseconds to seek into the playlist.
        milliseconds: f64,
    },
    /// Pause command.
    Pause {
        /// true or false, to indicate pausing or resuming play.
        pause: bool,
        /// The current stream time at which the stream is paused or play is
        /// resumed.
        milliseconds: f64,
    },
}

/// Type of publishing.
///
/// Appears as part of the [`NetStreamCommand::Publish`] command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NetStreamCommandPublishPublishingType {
    /// Live data is published without recording it in a file.
    Live,
    /// > The stream is published and the
    /// > data is recorded to a new file. The file
    /// > is stored on the server in a
    /// > subdirectory within the directory that
    /// > contains the server application. If the
    /// > file already exists, it is overwritten.
    Record,
    /// The stream is published and the data is appended to a file. If no
    /// file is found, it is created.
    Append,
    /// Any other value.
    #[serde(untagged)]
    Unknown(String),
}

impl NetStreamCommandPublishPublishingType {
    /// The string written on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Live => "live",
            Self::Record => "record",
            Self::Append => "append",
            Self::Unknown(other) => other,
        }
    }
}
