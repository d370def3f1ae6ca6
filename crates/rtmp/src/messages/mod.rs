//! Message types and definitions.

use bytes::Bytes;

use crate::command_messages::Command;
use crate::protocol_control_messages::{
    ProtocolControlMessageAbort, ProtocolControlMessageAcknowledgement, ProtocolControlMessageSetChunkSize,
    ProtocolControlMessageSetPeerBandwidth, ProtocolControlMessageWindowAcknowledgementSize,
};
use crate::user_control_messages::EventMessage;
use nutype_enum::nutype_enum;

pub mod reader;

nutype_enum! {
    /// One byte field to represent the message type.
    ///
    /// A range of type IDs (1-6) are reserved for protocol control messages.
    ///
    /// Defined by:
    /// - Legacy RTMP spec, 5.4
    pub enum MessageType(u8) {
        // Protocol Control Messages
        /// Set Chunk Size
        SetChunkSize = 1,
        /// Abort
        Abort = 2,
        /// Acknowledgement
        Acknowledgement = 3,
        /// User Control Messages
        UserControlEvent = 4,
        /// Window Acknowledgement Size
        WindowAcknowledgementSize = 5,
        /// Set Peer Bandwidth
        SetPeerBandwidth = 6,
        // RTMP Command Messages
        /// Audio Data
        Audio = 8,
        /// Video Data
        Video = 9,
        /// Amf3-encoded Metadata
        DataAMF3 = 15,
        /// Amf3-encoded Shared Object
        SharedObjAMF3 = 16,
        /// Amf3-encoded Command
        CommandAMF3 = 17,
        /// Amf0-encoded Metadata
        DataAMF0 = 18,
        /// Amf0-encoded Shared Object
        SharedObjAMF0 = 19,
        /// Amf0-encoded Command
        CommandAMF0 = 20,
        /// Aggregate Message
        Aggregate = 22,
    }
}

/// A message whose type id this library does not interpret.
#[derive(Debug, Clone)]
pub struct UnknownMessage {
    /// The message type ID.
    pub msg_type_id: MessageType,
    /// The raw message payload.
    pub data: Bytes,
}

/// One sub-message of an aggregate message, with the timestamp already
/// rebased onto the aggregate's.
#[derive(Debug, Clone)]
pub struct AggregateSubMessage {
    /// The message type id of the sub-message.
    pub msg_type_id: MessageType,
    /// The absolute timestamp of the sub-message.
    pub timestamp: u32,
    /// The sub-message payload.
    pub data: Bytes,
}

/// Different types of messages that can be sent or received.
///
/// Defined by:
/// - Legacy RTMP spec, 5.4
#[derive(Debug)]
pub enum MessageData {
    // Protocol Control Messages
    /// Set Chunk Size message
    SetChunkSize(ProtocolControlMessageSetChunkSize),
    /// Abort message
    Abort(ProtocolControlMessageAbort),
    /// Acknowledgement message
    Acknowledgement(ProtocolControlMessageAcknowledgement),
    /// User control event
    UserControlEvent(EventMessage),
    /// Set Acknowledgement Window Size message
    SetAcknowledgementWindowSize(ProtocolControlMessageWindowAcknowledgementSize),
    /// Set Peer Bandwidth message
    SetPeerBandwidth(ProtocolControlMessageSetPeerBandwidth),
    /// Command message, AMF0- or AMF3-encoded
    ///
    /// > Command messages carry the AMF-encoded commands between the client and the server.
    Command(Command),
    /// Metadata message
    ///
    /// > The client or the server sends this message to send Metadata or any
    /// > user data to the peer.
    DataAmf0 {
        /// The metadata.
        data: Bytes,
    },
    /// Audio message
    ///
    /// Usually contains FLV `AUDIODATA`.
    AudioData {
        /// The audio data.
        data: Bytes,
    },
    /// Video message
    ///
    /// Usually contains FLV `VIDEODATA`.
    VideoData {
        /// The video data.
        data: Bytes,
    },
    /// Aggregate message, demuxed into its sub-messages.
    Aggregate {
        /// The contained sub-messages, in order.
        messages: Vec<AggregateSubMessage>,
    },
    /// Any other message that is not implemented.
    Unknown(UnknownMessage),
}
