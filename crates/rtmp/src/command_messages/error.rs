//! Command message error type.

/// Errors raised while reading or writing command messages.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// AMF error.
    #[error("amf: {0}")]
    Amf(#[from] freshet_amf::AmfError),
    /// The onStatus info object is missing required fields.
    #[error("invalid onStatus info object")]
    InvalidOnStatusInfoObject,
    /// The command can only be sent by the other role.
    #[error("{0} is not sent by this role")]
    WrongDirection(&'static str),
}
