//! A pure-rust implementation of AMF0 and AMF3 encoders and decoders.
//!
//! AMF0 is the tagged value format carried by RTMP command and data messages
//! and by FLV script tags. AMF3 is its successor; an AMF0 stream switches to
//! AMF3 through the avmplus (`0x11`) marker, and the message types 15/17
//! carry AMF3-encoded payloads directly.
//!
//! # Examples
//!
//! ```rust
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use bytes::Bytes;
//! use freshet_amf::{Amf0Decoder, Amf0Encoder, AmfValue};
//!
//! let mut buf = Vec::new();
//! let mut encoder = Amf0Encoder::new(&mut buf);
//! encoder.encode_string("onMetaData")?;
//!
//! let mut decoder = Amf0Decoder::new(Bytes::from(buf));
//! let value = decoder.decode_value()?;
//! assert_eq!(value, AmfValue::String("onMetaData".to_string()));
//! # Ok(())
//! # }
//! # test().expect("test failed");
//! ```
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(unsafe_code)]
#![deny(unreachable_pub)]

pub mod amf3;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod value;

#[cfg(feature = "serde")]
pub mod de;
#[cfg(feature = "serde")]
pub mod ser;

pub use amf3::{Amf3Decoder, Amf3Encoder, Amf3Marker};
#[cfg(feature = "serde")]
pub use de::{Deserializer, from_buf};
pub use decoder::Amf0Decoder;
pub use encoder::Amf0Encoder;
pub use error::{AmfError, Result};
#[cfg(feature = "serde")]
pub use ser::{Serializer, to_writer};
pub use value::{AmfObject, AmfValue};

/// AMF0 marker types.
///
/// Defined by:
/// - AMF 0 spec, 2.1.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf0Marker {
    /// number-marker
    Number = 0x00,
    /// boolean-marker
    Boolean = 0x01,
    /// string-marker
    String = 0x02,
    /// object-marker
    Object = 0x03,
    /// movieclip-marker
    ///
    /// reserved, not supported
    MovieClipMarker = 0x04,
    /// null-marker
    Null = 0x05,
    /// undefined-marker
    Undefined = 0x06,
    /// reference-marker
    Reference = 0x07,
    /// ecma-array-marker
    EcmaArray = 0x08,
    /// object-end-marker
    ObjectEnd = 0x09,
    /// strict-array-marker
    StrictArray = 0x0a,
    /// date-marker
    Date = 0x0b,
    /// long-string-marker
    LongString = 0x0c,
    /// unsupported-marker
    Unsupported = 0x0d,
    /// recordset-marker
    ///
    /// reserved, not supported
    Recordset = 0x0e,
    /// xml-document-marker
    XmlDocument = 0x0f,
    /// typed-object-marker
    TypedObject = 0x10,
    /// avmplus-object-marker
    ///
    /// Switches the stream to AMF3.
    AVMPlusObject = 0x11,
}
