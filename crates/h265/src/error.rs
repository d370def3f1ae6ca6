use std::io;

/// HEVC configuration record error.
#[derive(Debug, thiserror::Error)]
pub enum H265Error {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// No video parameter set was supplied.
    #[error("at least one vps is required")]
    MissingVps,
    /// No sequence parameter set was supplied.
    #[error("at least one sps is required")]
    MissingSps,
    /// No picture parameter set was supplied.
    #[error("at least one pps is required")]
    MissingPps,
}
