//! AMF error type.

use std::io;
use std::num::TryFromIntError;
use std::string::FromUtf8Error;

use crate::{Amf0Marker, amf3::Amf3Marker};

/// Result type.
pub type Result<T> = std::result::Result<T, AmfError>;

/// AMF error.
#[derive(thiserror::Error, Debug)]
pub enum AmfError {
    /// IO error.
    ///
    /// Truncated input surfaces here as [`io::ErrorKind::UnexpectedEof`].
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Unsupported type.
    #[error("this type is not supported: {0}")]
    UnsupportedType(&'static str),
    /// Element (string or sequence) is too long.
    #[error("element is too long: {0}")]
    TooLong(#[from] TryFromIntError),
    /// Unknown AMF0 marker.
    #[error("unknown marker: {0}")]
    UnknownMarker(u8),
    /// This AMF0 marker cannot be decoded.
    #[error("this marker cannot be decoded: {0:?}")]
    UnsupportedMarker(Amf0Marker),
    /// This AMF3 marker cannot be decoded.
    #[error("this amf3 marker cannot be decoded: {0:?}")]
    UnsupportedAmf3Marker(Amf3Marker),
    /// Unknown AMF3 marker.
    #[error("unknown amf3 marker: {0}")]
    UnknownAmf3Marker(u8),
    /// String parse error.
    #[error("string parse error: {0}")]
    StringParse(#[from] FromUtf8Error),
    /// Unexpected type.
    #[error("unexpected type: expected one of {expected:?}, got {got:?}")]
    UnexpectedType {
        /// The expected types.
        expected: &'static [Amf0Marker],
        /// The actual type.
        got: Amf0Marker,
    },
    /// A back-reference pointed past the values decoded so far.
    #[error("reference out of range: {index} (table size {table_size})")]
    ReferenceOutOfRange {
        /// The reference index.
        index: usize,
        /// The number of referenceable values decoded so far.
        table_size: usize,
    },
    /// An AMF3 integer did not fit into 29 bits.
    #[error("integer out of the 29-bit range: {0}")]
    IntegerOutOfRange(i64),
    /// Externalizable objects carry opaque custom encodings.
    #[error("externalizable objects are not supported: {0}")]
    Externalizable(String),
    /// Custom error message.
    #[error("{0}")]
    Custom(String),
}

#[cfg(feature = "serde")]
impl serde::ser::Error for AmfError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        AmfError::Custom(msg.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::de::Error for AmfError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        AmfError::Custom(msg.to_string())
    }
}
