//! The onStatus command message.
//!
//! It is not very clear if the onStatus message should be part of the
//! NetConnection or NetStream commands. The legacy RTMP spec makes it look
//! like a NetStream command while the enhanced spec assigns it to
//! NetConnection. In reality it answers both, which is why it lives in its
//! own module.

use freshet_amf::AmfObject;

use super::CommandResultLevel;

pub mod reader;
pub mod writer;

/// The onStatus command: a status notification for the stream the message
/// was received on.
#[derive(Debug, Clone, PartialEq)]
pub struct OnStatus {
    /// The status code, one of [`codes`] or any server-defined string.
    pub code: String,
    /// A human readable description of the status.
    pub description: Option<String>,
    /// The status level.
    pub level: CommandResultLevel,
    /// Any other entries of the info object.
    ///
    /// A `NetConnection.Connect.ReconnectRequest` carries the new `tcUrl`
    /// here, when the server supplies one.
    pub others: Option<AmfObject>,
}

impl OnStatus {
    /// The `tcUrl` of a reconnect request, when present.
    pub fn tc_url(&self) -> Option<&str> {
        self.others.as_ref()?.get("tcUrl")?.as_str()
    }
}

/// Well-known status codes.
#[allow(unused)]
pub mod codes {
    pub const NET_CONNECTION_CALL_FAILED: &str = "NetConnection.Call.Failed";
    pub const NET_CONNECTION_CONNECT_APP_SHUTDOWN: &str = "NetConnection.Connect.AppShutdown";
    pub const NET_CONNECTION_CONNECT_CLOSED: &str = "NetConnection.Connect.Closed";
    pub const NET_CONNECTION_CONNECT_FAILED: &str = "NetConnection.Connect.Failed";
    pub const NET_CONNECTION_CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";
    pub const NET_CONNECTION_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
    pub const NET_CONNECTION_CONNECT_RECONNECT_REQUEST: &str = "NetConnection.Connect.ReconnectRequest";
    pub const NET_CONNECTION_PROXY_NOT_RESPONDING: &str = "NetConnection.Proxy.NotResponding";

    pub const NET_STREAM_PUBLISH_START: &str = "NetStream.Publish.Start";
    pub const NET_STREAM_PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
    pub const NET_STREAM_UNPUBLISH_SUCCESS: &str = "NetStream.Unpublish.Success";
    pub const NET_STREAM_PLAY_START: &str = "NetStream.Play.Start";
    pub const NET_STREAM_PLAY_RESET: &str = "NetStream.Play.Reset";
    pub const NET_STREAM_PLAY_STOP: &str = "NetStream.Play.Stop";
    pub const NET_STREAM_PLAY_STREAM_NOT_FOUND: &str = "NetStream.Play.StreamNotFound";
    pub const NET_STREAM_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
    pub const NET_STREAM_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";
    pub const NET_STREAM_SEEK_NOTIFY: &str = "NetStream.Seek.Notify";
    pub const NET_STREAM_DELETE_STREAM_SUCCESS: &str = "NetStream.DeleteStream.Suceess";
}
