//! FLV error type.

/// FLV error.
#[derive(Debug, thiserror::Error)]
pub enum FlvError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// AMF error in a script tag.
    #[error("amf: {0}")]
    Amf(#[from] freshet_amf::AmfError),
    /// AAC configuration error.
    #[error("aac: {0}")]
    Aac(#[from] freshet_aac::AacError),
    /// AVC configuration error.
    #[error("h264: {0}")]
    H264(#[from] freshet_h264::H264Error),
    /// HEVC configuration error.
    #[error("h265: {0}")]
    H265(#[from] freshet_h265::H265Error),
    /// Invalid FLV signature.
    #[error("invalid signature in header: 0x{0:x}")]
    InvalidSignature(u32),
    /// The header data offset points before the end of the header.
    #[error("invalid data offset: {0}")]
    InvalidDataOffset(u32),
    /// Encrypted tags cannot be processed.
    #[error("tag encryption is not supported")]
    UnsupportedTagEncryption,
    /// Multitrack headers must not nest.
    #[error("nested multitracks are not allowed")]
    NestedMultitracks,
    /// A modifier extension carried fewer bytes than its type requires.
    #[error("invalid modExData, expected at least {expected_bytes} bytes")]
    InvalidModExData {
        /// The number of bytes the modifier extension type requires.
        expected_bytes: usize,
    },
    /// A tag body larger than the u24 size field can carry.
    #[error("tag body too large: {0} bytes")]
    BodyTooLarge(usize),
    /// No muxer mapping exists for the given MIME type.
    #[error("unsupported mime type: {0}")]
    UnsupportedMimeType(String),
    /// Coded frames arrived before any decoder configuration.
    #[error("missing sequence header for {0}")]
    MissingSequenceHeader(&'static str),
    /// The previous-tag-size field did not match the preceding tag.
    #[error("previous tag size mismatch: expected {expected}, got {got}")]
    PreviousTagSizeMismatch {
        /// The size the preceding tag occupied.
        expected: u32,
        /// The size the stream declared.
        got: u32,
    },
}
