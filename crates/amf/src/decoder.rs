//! AMF0 decoder.

use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{Buf, Bytes};
use freshet_bytes_util::BytesCursorExt;
use num_traits::FromPrimitive;

use crate::amf3::Amf3Decoder;
use crate::{Amf0Marker, AmfError, AmfObject, AmfValue};

/// AMF0 decoder over a [`Bytes`] buffer.
///
/// Decodes the canonical AMF0 wire forms, switching to AMF3 when the
/// avmplus (`0x11`) marker is encountered; once switched, all following
/// values are decoded as AMF3 with a shared set of reference tables.
#[derive(Debug)]
pub struct Amf0Decoder {
    buf: io::Cursor<Bytes>,
    next_marker: Option<Amf0Marker>,
    /// Complex values decoded so far, for resolving `0x07` back-references.
    reference_table: Vec<AmfValue>,
    /// Set once an avmplus marker switched the stream to AMF3.
    amf3: Option<Amf3Decoder>,
    count_mismatch: bool,
}

impl Amf0Decoder {
    /// Creates a new decoder from a [`Bytes`] buffer.
    pub fn new(buf: Bytes) -> Self {
        Self {
            buf: io::Cursor::new(buf),
            next_marker: None,
            reference_table: Vec::new(),
            amf3: None,
            count_mismatch: false,
        }
    }

    /// Creates a new decoder from a byte slice, copying it.
    pub fn from_slice(buf: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(buf))
    }

    /// Checks if there are remaining bytes to read.
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.buf.has_remaining() || self.next_marker.is_some()
    }

    /// Returns and clears the ECMA-array count-mismatch flag.
    ///
    /// Real-world producers disagree about the advisory count; a mismatch is
    /// tolerated and surfaced here so callers can log it.
    pub fn take_count_mismatch(&mut self) -> bool {
        std::mem::take(&mut self.count_mismatch)
    }

    /// Decodes a single [`AmfValue`] from the buffer.
    pub fn decode_value(&mut self) -> Result<AmfValue, AmfError> {
        if let Some(amf3) = &mut self.amf3 {
            return amf3.decode_value(&mut self.buf);
        }

        let marker = self.peek_marker()?;

        match marker {
            Amf0Marker::Boolean => self.decode_boolean().map(Into::into),
            Amf0Marker::Number => self.decode_number().map(Into::into),
            Amf0Marker::Date => self.decode_date(),
            Amf0Marker::String | Amf0Marker::LongString => self.decode_string().map(Into::into),
            Amf0Marker::XmlDocument => {
                self.next_marker = Some(Amf0Marker::LongString);
                self.decode_string().map(AmfValue::XmlDocument)
            }
            Amf0Marker::Null => self.decode_null().map(|()| AmfValue::Null),
            Amf0Marker::Undefined => {
                self.read_marker()?;
                Ok(AmfValue::Undefined)
            }
            Amf0Marker::Object | Amf0Marker::TypedObject | Amf0Marker::EcmaArray => self.decode_complex(),
            Amf0Marker::StrictArray => {
                // reference indexes are assigned in pre-order
                let slot = self.reserve_reference();
                let array = self.decode_strict_array()?;
                Ok(self.commit_reference(slot, AmfValue::StrictArray(array)))
            }
            Amf0Marker::Reference => {
                self.read_marker()?;
                let index = self.buf.read_u16::<BigEndian>()? as usize;
                self.reference_table
                    .get(index)
                    .cloned()
                    .ok_or(AmfError::ReferenceOutOfRange {
                        index,
                        table_size: self.reference_table.len(),
                    })
            }
            Amf0Marker::AVMPlusObject => {
                self.read_marker()?;
                let mut amf3 = Amf3Decoder::new();
                let value = amf3.decode_value(&mut self.buf)?;
                self.amf3 = Some(amf3);
                Ok(value)
            }
            _ => Err(AmfError::UnsupportedMarker(marker)),
        }
    }

    /// Decodes all values from the buffer until the end.
    pub fn decode_all(&mut self) -> Result<Vec<AmfValue>, AmfError> {
        let mut values = Vec::new();

        while self.has_remaining() {
            values.push(self.decode_value()?);
        }

        Ok(values)
    }

    /// Peeks the next marker in the buffer without consuming it.
    pub fn peek_marker(&mut self) -> Result<Amf0Marker, AmfError> {
        let marker = self.read_marker()?;
        // Buffer the marker for the next read
        self.next_marker = Some(marker);

        Ok(marker)
    }

    fn read_marker(&mut self) -> Result<Amf0Marker, AmfError> {
        if let Some(marker) = self.next_marker.take() {
            return Ok(marker);
        }

        let marker = self.buf.read_u8()?;
        Amf0Marker::from_u8(marker).ok_or(AmfError::UnknownMarker(marker))
    }

    fn expect_marker(&mut self, expect: &'static [Amf0Marker]) -> Result<Amf0Marker, AmfError> {
        let marker = self.read_marker()?;

        if !expect.contains(&marker) {
            Err(AmfError::UnexpectedType { expected: expect, got: marker })
        } else {
            Ok(marker)
        }
    }

    /// Decodes a number from the buffer.
    pub fn decode_number(&mut self) -> Result<f64, AmfError> {
        self.expect_marker(&[Amf0Marker::Number])?;
        Ok(self.buf.read_f64::<BigEndian>()?)
    }

    fn decode_date(&mut self) -> Result<AmfValue, AmfError> {
        self.expect_marker(&[Amf0Marker::Date])?;
        let unix_ms = self.buf.read_f64::<BigEndian>()?;
        let timezone = self.buf.read_i16::<BigEndian>()?;
        Ok(AmfValue::Date { unix_ms, timezone })
    }

    /// Decodes a boolean from the buffer.
    pub fn decode_boolean(&mut self) -> Result<bool, AmfError> {
        self.expect_marker(&[Amf0Marker::Boolean])?;
        Ok(self.buf.read_u8()? != 0)
    }

    fn decode_normal_string(&mut self) -> Result<String, AmfError> {
        let len = self.buf.read_u16::<BigEndian>()? as usize;
        self.read_utf8(len)
    }

    fn read_utf8(&mut self, len: usize) -> Result<String, AmfError> {
        let bytes = self.buf.extract_bytes(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Decodes a string from the buffer.
    ///
    /// This function can decode both normal strings and long strings.
    pub fn decode_string(&mut self) -> Result<String, AmfError> {
        let marker = self.expect_marker(&[Amf0Marker::String, Amf0Marker::LongString])?;

        let len = if marker == Amf0Marker::String {
            self.buf.read_u16::<BigEndian>()? as usize
        } else {
            self.buf.read_u32::<BigEndian>()? as usize
        };

        self.read_utf8(len)
    }

    /// Decodes a null (or undefined) value from the buffer.
    pub fn decode_null(&mut self) -> Result<(), AmfError> {
        self.expect_marker(&[Amf0Marker::Null, Amf0Marker::Undefined])?;
        Ok(())
    }

    /// Reserves a reference-table slot before decoding children, so nested
    /// complex values receive the pre-order indexes peers emit.
    fn reserve_reference(&mut self) -> usize {
        self.reference_table.push(AmfValue::Null);
        self.reference_table.len() - 1
    }

    fn commit_reference(&mut self, slot: usize, value: AmfValue) -> AmfValue {
        self.reference_table[slot] = value.clone();
        value
    }

    fn decode_complex(&mut self) -> Result<AmfValue, AmfError> {
        let marker = self.expect_marker(&[Amf0Marker::Object, Amf0Marker::TypedObject, Amf0Marker::EcmaArray])?;

        let slot = self.reserve_reference();
        let value = match marker {
            Amf0Marker::Object => AmfValue::Object(self.decode_object_body()?),
            Amf0Marker::TypedObject => {
                let class_name = self.decode_normal_string()?;
                AmfValue::TypedObject {
                    class_name,
                    object: self.decode_object_body()?,
                }
            }
            _ => {
                let declared = self.buf.read_u32::<BigEndian>()?;
                AmfValue::EcmaArray(self.decode_ecma_array_body(declared)?)
            }
        };

        Ok(self.commit_reference(slot, value))
    }

    /// Decodes an object from the buffer.
    pub fn decode_object(&mut self) -> Result<AmfObject, AmfError> {
        match self.decode_complex()? {
            AmfValue::Object(object)
            | AmfValue::EcmaArray(object)
            | AmfValue::TypedObject { object, .. } => Ok(object),
            _ => unreachable!("decode_complex returns object shapes"),
        }
    }

    fn decode_object_key(&mut self) -> Result<Option<String>, AmfError> {
        // Object keys are not preceded with a marker and are always normal strings
        let key = self.decode_normal_string()?;

        // The object end marker is preceded by an empty string
        if key.is_empty() && self.peek_marker()? == Amf0Marker::ObjectEnd {
            // Clear the next marker buffer
            self.next_marker = None;
            return Ok(None);
        }

        Ok(Some(key))
    }

    fn decode_object_body(&mut self) -> Result<AmfObject, AmfError> {
        let mut object = AmfObject::new();

        while let Some(key) = self.decode_object_key()? {
            let value = self.decode_value()?;
            object.insert(key, value);
        }

        Ok(object)
    }

    /// The declared entry count is advisory only: decoding finishes on the
    /// `0x00 0x00 0x09` terminator (or on end of input once the declared
    /// count was read, for producers that omit the terminator).
    fn decode_ecma_array_body(&mut self, declared: u32) -> Result<AmfObject, AmfError> {
        let mut object = AmfObject::with_capacity(declared as usize);

        loop {
            if object.len() >= declared as usize && !self.has_remaining() {
                break;
            }

            match self.decode_object_key()? {
                Some(key) => {
                    let value = self.decode_value()?;
                    object.insert(key, value);
                }
                None => break,
            }
        }

        if object.len() != declared as usize {
            self.count_mismatch = true;
        }

        Ok(object)
    }

    /// Decodes a strict array from the buffer.
    pub fn decode_strict_array(&mut self) -> Result<Vec<AmfValue>, AmfError> {
        self.expect_marker(&[Amf0Marker::StrictArray])?;
        let size = self.buf.read_u32::<BigEndian>()? as usize;

        let mut array = Vec::with_capacity(size.min(1024));

        for _ in 0..size {
            array.push(self.decode_value()?);
        }

        Ok(array)
    }

    /// Deserializes a value from the buffer using [serde].
    #[cfg(feature = "serde")]
    pub fn deserialize<'de, T>(&mut self) -> Result<T, AmfError>
    where
        T: serde::de::Deserialize<'de>,
    {
        T::deserialize(&mut crate::de::Deserializer::from_decoder(self))
    }
}
