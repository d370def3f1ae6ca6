//! The application callbacks a server session dispatches into.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::command_messages::UnknownCommand;
use crate::error::RtmpError;
use crate::messages::UnknownMessage;

/// Media or metadata received from or destined for a stream.
#[derive(Debug, Clone)]
pub enum SessionData {
    /// A video message, usually FLV `VIDEODATA`.
    Video {
        /// The message timestamp in milliseconds.
        timestamp: u32,
        /// The payload.
        data: Bytes,
    },
    /// An audio message, usually FLV `AUDIODATA`.
    Audio {
        /// The message timestamp in milliseconds.
        timestamp: u32,
        /// The payload.
        data: Bytes,
    },
    /// An AMF0 data message, usually `@setDataFrame` metadata.
    Amf0 {
        /// The message timestamp in milliseconds.
        timestamp: u32,
        /// The payload.
        data: Bytes,
    },
}

/// The answer to a connect request.
#[derive(Debug, Clone)]
pub enum ConnectDecision {
    /// Accept the connection.
    Accept {
        /// The server version string sent back, e.g. "FMS/3,0,1,123".
        fmsver: String,
        /// The capability flags sent back, usually 31.
        capabilities: f64,
    },
    /// Reject the connection with an `_error` response.
    Reject {
        /// The status code, e.g. `NetConnection.Connect.Rejected`.
        code: String,
        /// The description handed to the client.
        description: String,
    },
}

impl Default for ConnectDecision {
    fn default() -> Self {
        Self::Accept {
            fmsver: "FMS/3,0,1,123".to_string(),
            capabilities: 31.0,
        }
    }
}

/// Media handed to a playing stream: written to the client by the session
/// as audio/video/data messages.
#[derive(Debug)]
pub struct PlayMedia {
    /// The message stream the media belongs to.
    pub stream_id: u32,
    /// The media payload.
    pub data: SessionData,
}

/// The sending side handed to [`SessionHandler::on_play`]; the application
/// pumps published media into it.
pub type PlaySender = mpsc::Sender<PlayMedia>;

/// Callbacks a [`ServerSession`](super::ServerSession) dispatches into.
pub trait SessionHandler: Send {
    /// Called when a client sends a connect command.
    fn on_connect(&self, app: &str) -> impl Future<Output = Result<ConnectDecision, RtmpError>> + Send;

    /// Called when a client wants to publish a stream.
    ///
    /// Returning an error rejects the publish and ends the session.
    fn on_publish(&self, stream_id: u32, app: &str, stream_name: &str)
    -> impl Future<Output = Result<(), RtmpError>> + Send;

    /// Called when a client wants to play a stream.
    ///
    /// The application keeps the [`PlaySender`] and feeds it the media for
    /// this stream; dropping it ends the playback silently. Returning an
    /// error rejects the play and ends the session.
    fn on_play(
        &self,
        stream_id: u32,
        app: &str,
        stream_name: &str,
        media: PlaySender,
    ) -> impl Future<Output = Result<(), RtmpError>> + Send;

    /// Called when a publishing stream is deleted or the session ends.
    fn on_unpublish(&self, stream_id: u32) -> impl Future<Output = Result<(), RtmpError>> + Send;

    /// Called for every media or metadata message of a publishing stream.
    fn on_data(&self, stream_id: u32, data: SessionData) -> impl Future<Output = Result<(), RtmpError>> + Send;

    /// Called for messages with an unknown type id.
    fn on_unknown_message(&self, stream_id: u32, message: UnknownMessage) -> impl Future<Output = Result<(), RtmpError>> + Send {
        async move {
            tracing::debug!(stream_id = %stream_id, msg_type_id = message.msg_type_id.0, "ignoring unknown message");
            Ok(())
        }
    }

    /// Called for commands no spec names.
    fn on_unknown_command(&self, stream_id: u32, command: UnknownCommand) -> impl Future<Output = Result<(), RtmpError>> + Send {
        async move {
            tracing::debug!(stream_id = %stream_id, command_name = %command.command_name, "ignoring unknown command");
            Ok(())
        }
    }
}
