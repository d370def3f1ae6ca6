use std::io;

/// AAC header error.
#[derive(Debug, thiserror::Error)]
pub enum AacError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The ADTS sync word was not found.
    #[error("invalid adts sync word: 0x{0:03x}")]
    InvalidSyncWord(u16),
    /// The frame length field is smaller than the header itself.
    #[error("adts frame length too small: {0}")]
    FrameLengthTooSmall(u16),
    /// The forbidden sample frequency index 15 carries an explicit frequency
    /// that cannot be mapped back to an index.
    #[error("no sample frequency index for {0} hz")]
    NoFrequencyIndex(u32),
}
