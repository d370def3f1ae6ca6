use std::io;

/// AVC configuration record error.
#[derive(Debug, thiserror::Error)]
pub enum H264Error {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// A sequence parameter set shorter than the bytes the record copies
    /// out of it.
    #[error("sps too short: {0} bytes")]
    SpsTooShort(usize),
    /// No sequence parameter set was supplied.
    #[error("at least one sps is required")]
    MissingSps,
    /// No picture parameter set was supplied.
    #[error("at least one pps is required")]
    MissingPps,
}
