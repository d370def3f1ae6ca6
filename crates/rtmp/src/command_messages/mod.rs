//! Command messages.

use freshet_amf::AmfValue;
use netconnection::NetConnectionCommand;
use netstream::NetStreamCommand;
use on_status::OnStatus;
use serde_derive::Serialize;

pub mod error;
pub mod netconnection;
pub mod netstream;
pub mod on_status;
pub mod reader;
pub mod writer;

/// The AMF version commands are encoded with.
///
/// AMF0 commands travel as message type 20; AMF3 commands as message type
/// 17 with a one-byte format prefix and objects emitted through the
/// avmplus switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmfVersion {
    /// AMF0, the default and the widely interoperable choice.
    #[default]
    Amf0,
    /// AMF3.
    Amf3,
}

/// Command message.
///
/// > The client and the server exchange commands which are AMF encoded.
/// > The sender sends a command message that consists of command name,
/// > transaction ID, and command object that contains related parameters.
///
/// Defined by:
/// - Legacy RTMP spec, section 7.1.1
/// - Legacy RTMP spec, section 7.2
#[derive(Debug, Clone)]
pub struct Command {
    /// Transaction ID.
    ///
    /// > The receiver processes the command and sends back the response with the
    /// > same transaction ID.
    pub transaction_id: f64,
    /// Command type.
    pub command_type: CommandType,
}

/// This enum wraps the [`NetConnectionCommand`], [`NetStreamCommand`] and [`OnStatus`] enums.
#[derive(Debug, Clone)]
pub enum CommandType {
    /// NetConnection command
    NetConnection(NetConnectionCommand),
    /// NetStream command
    NetStream(NetStreamCommand),
    /// onStatus command
    OnStatus(OnStatus),
    /// `_result` response to the request with the same transaction id.
    Result {
        /// The response values: the command object followed by the
        /// request-specific results.
        values: Vec<AmfValue>,
    },
    /// `_error` response to the request with the same transaction id.
    Error {
        /// The response values: the command object followed by the
        /// request-specific error information.
        values: Vec<AmfValue>,
    },
    /// Any unknown command
    ///
    /// e.g. FFmpeg sends some commands that don't appear in any spec, so we need to handle them.
    Unknown(UnknownCommand),
}

/// Any unknown command
#[derive(Debug, Clone)]
pub struct UnknownCommand {
    /// Name of the unknown command.
    pub command_name: String,
    /// All other values of the command including the command object.
    pub values: Vec<AmfValue>,
}

/// NetStream onStatus level (7.2.2.) and NetConnection connect result level (7.2.1.1.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandResultLevel {
    /// Warning level.
    ///
    /// Not further explained in any spec.
    Warning,
    /// Status level.
    ///
    /// Used by [`OnStatus`] commands.
    Status,
    /// Error level.
    Error,
    /// Any other level.
    #[serde(untagged)]
    Unknown(String),
}
