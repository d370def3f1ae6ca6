//! User control messages.
//!
//! Defined by:
//! - Legacy RTMP spec, 6.2

use nutype_enum::nutype_enum;

pub mod reader;
pub mod writer;

nutype_enum! {
    /// The type of user control message event.
    pub enum EventType(u16) {
        /// > The server sends this event to notify the client
        /// > that a stream has become functional and can be
        /// > used for communication.
        StreamBegin = 0,
        /// > The server sends this event to notify the client
        /// > that the playback of data is over as requested
        /// > on this stream.
        StreamEOF = 1,
        /// > The server sends this event to notify the client
        /// > that there is no more data on the stream.
        StreamDry = 2,
        /// > The client sends this event to inform the server
        /// > of the buffer size (in milliseconds) that is
        /// > used to buffer any data coming over a stream.
        SetBufferLength = 3,
        /// > The server sends this event to notify the client
        /// > that the stream is a recorded stream.
        StreamIsRecorded = 4,
        /// > The server sends this event to test whether the
        /// > client is reachable.
        PingRequest = 6,
        /// > The client sends this event to the server in
        /// > response to the ping request.
        PingResponse = 7,
    }
}

/// A user control event with its payload decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMessage {
    /// A stream has become functional.
    StreamBegin {
        /// The stream that became functional.
        stream_id: u32,
    },
    /// Playback on a stream has ended.
    StreamEof {
        /// The stream on which playback ended.
        stream_id: u32,
    },
    /// There is no more data on a stream.
    StreamDry {
        /// The dry stream.
        stream_id: u32,
    },
    /// The client's buffer length for a stream.
    SetBufferLength {
        /// The buffered stream.
        stream_id: u32,
        /// The buffer length in milliseconds.
        buffer_length_ms: u32,
    },
    /// A stream is a recorded stream.
    StreamIsRecorded {
        /// The recorded stream.
        stream_id: u32,
    },
    /// A reachability probe; answered with [`EventMessage::PingResponse`].
    PingRequest {
        /// The sender's local time when the probe was dispatched.
        timestamp: u32,
    },
    /// The answer to a [`EventMessage::PingRequest`].
    PingResponse {
        /// The timestamp received with the request.
        timestamp: u32,
    },
    /// Any other event.
    Unknown {
        /// The event type.
        event_type: EventType,
        /// The raw event data.
        data: bytes::Bytes,
    },
}
