//! AMF3 decoder and encoder.
//!
//! AMF3 values reach an RTMP stream either through the avmplus (`0x11`)
//! switch inside an AMF0 stream or directly in message types 15/17.
//! Strings, complex values and trait records may be emitted by
//! back-reference; each codec instance owns the three reference tables,
//! scoped to a single top-level encode/decode call chain.

use std::collections::HashMap;
use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use freshet_bytes_util::BytesCursorExt;
use num_traits::FromPrimitive;

use crate::{AmfError, AmfObject, AmfValue};

/// AMF3 marker types.
///
/// Defined by:
/// - AMF 3 spec, 3.
#[derive(Debug, PartialEq, Eq, Clone, Copy, num_derive::FromPrimitive)]
#[repr(u8)]
pub enum Amf3Marker {
    /// undefined-marker
    Undefined = 0x00,
    /// null-marker
    Null = 0x01,
    /// false-marker
    False = 0x02,
    /// true-marker
    True = 0x03,
    /// integer-marker
    Integer = 0x04,
    /// double-marker
    Double = 0x05,
    /// string-marker
    String = 0x06,
    /// xml-doc-marker
    XmlDocument = 0x07,
    /// date-marker
    Date = 0x08,
    /// array-marker
    Array = 0x09,
    /// object-marker
    Object = 0x0a,
    /// xml-marker
    Xml = 0x0b,
    /// byte-array-marker
    ByteArray = 0x0c,
    /// vector-int-marker
    VectorInt = 0x0d,
    /// vector-uint-marker
    VectorUInt = 0x0e,
    /// vector-double-marker
    VectorDouble = 0x0f,
    /// vector-object-marker
    VectorObject = 0x10,
    /// dictionary-marker
    ///
    /// not supported
    Dictionary = 0x11,
}

/// The smallest value representable by the AMF3 integer type.
pub const INTEGER_MIN: i32 = -(1 << 28);
/// The largest value representable by the AMF3 integer type.
pub const INTEGER_MAX: i32 = (1 << 28) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
struct TraitRecord {
    class_name: String,
    dynamic: bool,
    sealed: Vec<String>,
}

/// AMF3 decoder state: the three per-session reference tables.
///
/// The byte source is passed into each call so the same cursor can be
/// shared with an enclosing [`Amf0Decoder`](crate::Amf0Decoder).
#[derive(Debug, Default)]
pub struct Amf3Decoder {
    strings: Vec<String>,
    complex: Vec<AmfValue>,
    traits: Vec<TraitRecord>,
}

impl Amf3Decoder {
    /// Creates a decoder with empty reference tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a single [`AmfValue`] from the cursor.
    pub fn decode_value(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let marker = buf.read_u8()?;
        let marker = Amf3Marker::from_u8(marker).ok_or(AmfError::UnknownAmf3Marker(marker))?;

        match marker {
            Amf3Marker::Undefined => Ok(AmfValue::Undefined),
            Amf3Marker::Null => Ok(AmfValue::Null),
            Amf3Marker::False => Ok(AmfValue::Boolean(false)),
            Amf3Marker::True => Ok(AmfValue::Boolean(true)),
            Amf3Marker::Integer => {
                let value = read_u29(buf)?;
                // sign extension of the 29-bit two's complement value
                let value = if value & 0x1000_0000 != 0 {
                    (value | 0xE000_0000) as i32
                } else {
                    value as i32
                };
                Ok(AmfValue::Integer(value))
            }
            Amf3Marker::Double => Ok(AmfValue::Number(buf.read_f64::<BigEndian>()?)),
            Amf3Marker::String => self.read_string(buf).map(AmfValue::String),
            Amf3Marker::XmlDocument | Amf3Marker::Xml => self.decode_xml(buf),
            Amf3Marker::Date => self.decode_date(buf),
            Amf3Marker::Array => self.decode_array(buf),
            Amf3Marker::Object => self.decode_object(buf),
            Amf3Marker::ByteArray => self.decode_byte_array(buf),
            Amf3Marker::VectorInt | Amf3Marker::VectorUInt | Amf3Marker::VectorDouble | Amf3Marker::VectorObject => {
                self.decode_vector(marker, buf)
            }
            Amf3Marker::Dictionary => Err(AmfError::UnsupportedAmf3Marker(marker)),
        }
    }

    fn lookup_complex(&self, index: usize) -> Result<AmfValue, AmfError> {
        self.complex.get(index).cloned().ok_or(AmfError::ReferenceOutOfRange {
            index,
            table_size: self.complex.len(),
        })
    }

    /// Reserves a slot in the complex-value table before decoding children,
    /// so nested values receive the pre-order reference indexes peers emit.
    fn reserve_complex(&mut self) -> usize {
        self.complex.push(AmfValue::Null);
        self.complex.len() - 1
    }

    fn commit_complex(&mut self, slot: usize, value: AmfValue) -> AmfValue {
        self.complex[slot] = value.clone();
        value
    }

    fn read_string(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<String, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            let index = (header >> 1) as usize;
            return self.strings.get(index).cloned().ok_or(AmfError::ReferenceOutOfRange {
                index,
                table_size: self.strings.len(),
            });
        }

        let len = (header >> 1) as usize;
        let bytes = buf.extract_bytes(len)?;
        let string = String::from_utf8(bytes.to_vec())?;

        // The empty string is never sent by reference
        if !string.is_empty() {
            self.strings.push(string.clone());
        }

        Ok(string)
    }

    fn decode_xml(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let len = (header >> 1) as usize;
        let bytes = buf.extract_bytes(len)?;
        let value = AmfValue::XmlDocument(String::from_utf8(bytes.to_vec())?);

        self.complex.push(value.clone());
        Ok(value)
    }

    fn decode_date(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let unix_ms = buf.read_f64::<BigEndian>()?;
        let value = AmfValue::Date { unix_ms, timezone: 0 };

        self.complex.push(value.clone());
        Ok(value)
    }

    fn decode_array(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let dense_count = (header >> 1) as usize;
        let slot = self.reserve_complex();

        let mut assoc = AmfObject::new();
        loop {
            let key = self.read_string(buf)?;
            if key.is_empty() {
                break;
            }

            let value = self.decode_value(buf)?;
            assoc.insert(key, value);
        }

        let mut dense = Vec::with_capacity(dense_count.min(1024));
        for _ in 0..dense_count {
            dense.push(self.decode_value(buf)?);
        }

        // A purely dense array is a strict array; anything with an
        // associative part maps onto the ECMA array hybrid.
        let value = if assoc.is_empty() {
            AmfValue::StrictArray(dense)
        } else {
            for (i, item) in dense.into_iter().enumerate() {
                assoc.insert(i.to_string(), item);
            }
            AmfValue::EcmaArray(assoc)
        };

        Ok(self.commit_complex(slot, value))
    }

    fn decode_object(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let record = if header & 0b10 == 0 {
            // traits reference
            let index = (header >> 2) as usize;
            self.traits.get(index).cloned().ok_or(AmfError::ReferenceOutOfRange {
                index,
                table_size: self.traits.len(),
            })?
        } else {
            let externalizable = header & 0b100 != 0;
            let dynamic = header & 0b1000 != 0;
            let sealed_count = (header >> 4) as usize;
            let class_name = self.read_string(buf)?;

            if externalizable {
                return Err(AmfError::Externalizable(class_name));
            }

            let mut sealed = Vec::with_capacity(sealed_count.min(1024));
            for _ in 0..sealed_count {
                sealed.push(self.read_string(buf)?);
            }

            let record = TraitRecord {
                class_name,
                dynamic,
                sealed,
            };
            self.traits.push(record.clone());
            record
        };

        let slot = self.reserve_complex();
        let mut object = AmfObject::with_capacity(record.sealed.len());

        for name in &record.sealed {
            let value = self.decode_value(buf)?;
            object.insert(name.clone(), value);
        }

        if record.dynamic {
            loop {
                let key = self.read_string(buf)?;
                if key.is_empty() {
                    break;
                }

                let value = self.decode_value(buf)?;
                object.insert(key, value);
            }
        }

        let value = if record.class_name.is_empty() {
            AmfValue::Object(object)
        } else {
            AmfValue::TypedObject {
                class_name: record.class_name.clone(),
                object,
            }
        };

        Ok(self.commit_complex(slot, value))
    }

    fn decode_byte_array(&mut self, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let len = (header >> 1) as usize;
        let value = AmfValue::ByteArray(buf.extract_bytes(len)?);

        self.complex.push(value.clone());
        Ok(value)
    }

    fn decode_vector(&mut self, marker: Amf3Marker, buf: &mut io::Cursor<Bytes>) -> Result<AmfValue, AmfError> {
        let header = read_u29(buf)?;

        if header & 1 == 0 {
            return self.lookup_complex((header >> 1) as usize);
        }

        let len = (header >> 1) as usize;
        // fixed-vector flag, irrelevant for the value model
        buf.read_u8()?;

        let value = match marker {
            Amf3Marker::VectorInt => {
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(buf.read_i32::<BigEndian>()?);
                }
                AmfValue::VectorInt(items)
            }
            Amf3Marker::VectorUInt => {
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(buf.read_u32::<BigEndian>()?);
                }
                AmfValue::VectorUInt(items)
            }
            Amf3Marker::VectorDouble => {
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(buf.read_f64::<BigEndian>()?);
                }
                AmfValue::VectorDouble(items)
            }
            _ => {
                // object-type-name, unused by the value model
                self.read_string(buf)?;

                let slot = self.reserve_complex();
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode_value(buf)?);
                }
                return Ok(self.commit_complex(slot, AmfValue::VectorObject(items)));
            }
        };

        self.complex.push(value.clone());
        Ok(value)
    }
}

/// AMF3 encoder over any [`io::Write`].
///
/// Repeated strings and trait shapes are emitted by reference; complex
/// values are always emitted inline except for the explicit
/// [`AmfValue::Reference`] variant.
#[derive(Debug)]
pub struct Amf3Encoder<W> {
    writer: W,
    strings: HashMap<String, usize>,
    traits: HashMap<(String, bool), usize>,
}

impl<W> Amf3Encoder<W> {
    /// Creates an encoder with empty reference tables.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            strings: HashMap::new(),
            traits: HashMap::new(),
        }
    }
}

impl<W: io::Write> Amf3Encoder<W> {
    /// Encodes any [`AmfValue`] with its canonical AMF3 wire form.
    pub fn encode_value(&mut self, value: &AmfValue) -> Result<(), AmfError> {
        match value {
            AmfValue::Undefined => Ok(self.writer.write_u8(Amf3Marker::Undefined as u8)?),
            AmfValue::Null => Ok(self.writer.write_u8(Amf3Marker::Null as u8)?),
            AmfValue::Boolean(false) => Ok(self.writer.write_u8(Amf3Marker::False as u8)?),
            AmfValue::Boolean(true) => Ok(self.writer.write_u8(Amf3Marker::True as u8)?),
            AmfValue::Integer(v) => self.encode_integer(i64::from(*v)),
            AmfValue::Number(v) => self.encode_double(*v),
            AmfValue::String(v) => {
                self.writer.write_u8(Amf3Marker::String as u8)?;
                self.write_string(v)
            }
            AmfValue::XmlDocument(v) => {
                self.writer.write_u8(Amf3Marker::XmlDocument as u8)?;
                write_u29(&mut self.writer, ((v.len() as u32) << 1) | 1)?;
                self.writer.write_all(v.as_bytes())?;
                Ok(())
            }
            AmfValue::Date { unix_ms, .. } => {
                self.writer.write_u8(Amf3Marker::Date as u8)?;
                write_u29(&mut self.writer, 1)?;
                self.writer.write_f64::<BigEndian>(*unix_ms)?;
                Ok(())
            }
            AmfValue::StrictArray(items) => {
                self.writer.write_u8(Amf3Marker::Array as u8)?;
                write_u29(&mut self.writer, ((items.len() as u32) << 1) | 1)?;
                // empty associative part
                self.write_string("")?;
                for item in items {
                    self.encode_value(item)?;
                }
                Ok(())
            }
            AmfValue::EcmaArray(object) => {
                self.writer.write_u8(Amf3Marker::Array as u8)?;
                // no dense part, everything goes through the associative part
                write_u29(&mut self.writer, 1)?;
                for (key, item) in object.iter() {
                    self.write_string(key)?;
                    self.encode_value(item)?;
                }
                self.write_string("")?;
                Ok(())
            }
            AmfValue::Object(object) => self.encode_object("", object),
            AmfValue::TypedObject { class_name, object } => self.encode_object(class_name, object),
            AmfValue::Reference(index) => {
                self.writer.write_u8(Amf3Marker::Object as u8)?;
                write_u29(&mut self.writer, u32::from(*index) << 1)?;
                Ok(())
            }
            AmfValue::ByteArray(bytes) => {
                self.writer.write_u8(Amf3Marker::ByteArray as u8)?;
                write_u29(&mut self.writer, ((bytes.len() as u32) << 1) | 1)?;
                self.writer.write_all(bytes)?;
                Ok(())
            }
            AmfValue::VectorInt(items) => {
                self.write_vector_header(Amf3Marker::VectorInt, items.len())?;
                for item in items {
                    self.writer.write_i32::<BigEndian>(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorUInt(items) => {
                self.write_vector_header(Amf3Marker::VectorUInt, items.len())?;
                for item in items {
                    self.writer.write_u32::<BigEndian>(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorDouble(items) => {
                self.write_vector_header(Amf3Marker::VectorDouble, items.len())?;
                for item in items {
                    self.writer.write_f64::<BigEndian>(*item)?;
                }
                Ok(())
            }
            AmfValue::VectorObject(items) => {
                self.write_vector_header(Amf3Marker::VectorObject, items.len())?;
                // any object type
                self.write_string("*")?;
                for item in items {
                    self.encode_value(item)?;
                }
                Ok(())
            }
        }
    }

    /// Encodes an integer, falling back to a double outside the 29-bit range.
    pub fn encode_integer(&mut self, value: i64) -> Result<(), AmfError> {
        if value < i64::from(INTEGER_MIN) || value > i64::from(INTEGER_MAX) {
            return self.encode_double(value as f64);
        }

        self.writer.write_u8(Amf3Marker::Integer as u8)?;
        write_u29(&mut self.writer, (value as u32) & 0x1FFF_FFFF)?;
        Ok(())
    }

    fn encode_double(&mut self, value: f64) -> Result<(), AmfError> {
        self.writer.write_u8(Amf3Marker::Double as u8)?;
        self.writer.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    fn encode_object(&mut self, class_name: &str, object: &AmfObject) -> Result<(), AmfError> {
        self.writer.write_u8(Amf3Marker::Object as u8)?;

        let trait_key = (class_name.to_string(), true);
        match self.traits.get(&trait_key) {
            Some(index) => {
                // inline object, traits by reference
                write_u29(&mut self.writer, ((*index as u32) << 2) | 0b01)?;
            }
            None => {
                // inline object, inline dynamic traits with no sealed members
                write_u29(&mut self.writer, 0b1011)?;
                self.write_string(class_name)?;

                let index = self.traits.len();
                self.traits.insert(trait_key, index);
            }
        }

        for (key, value) in object.iter() {
            self.write_string(key)?;
            self.encode_value(value)?;
        }
        self.write_string("")?;

        Ok(())
    }

    fn write_vector_header(&mut self, marker: Amf3Marker, len: usize) -> Result<(), AmfError> {
        self.writer.write_u8(marker as u8)?;
        write_u29(&mut self.writer, ((len as u32) << 1) | 1)?;
        // not fixed-length
        self.writer.write_u8(0)?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> Result<(), AmfError> {
        if value.is_empty() {
            write_u29(&mut self.writer, 1)?;
            return Ok(());
        }

        if let Some(index) = self.strings.get(value) {
            write_u29(&mut self.writer, (*index as u32) << 1)?;
            return Ok(());
        }

        write_u29(&mut self.writer, ((value.len() as u32) << 1) | 1)?;
        self.writer.write_all(value.as_bytes())?;

        let index = self.strings.len();
        self.strings.insert(value.to_string(), index);

        Ok(())
    }
}

/// Reads a variable-length 29-bit integer: up to three 7-bit continuation
/// bytes, with the fourth byte contributing all 8 bits.
pub(crate) fn read_u29(buf: &mut impl io::Read) -> Result<u32, AmfError> {
    let mut value: u32 = 0;

    for i in 0..4 {
        let byte = buf.read_u8()?;

        if i == 3 {
            return Ok((value << 8) | u32::from(byte));
        }

        value = (value << 7) | u32::from(byte & 0x7F);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    unreachable!("loop returns within four bytes")
}

/// Writes a variable-length 29-bit integer.
pub(crate) fn write_u29(writer: &mut impl io::Write, value: u32) -> Result<(), AmfError> {
    debug_assert!(value < (1 << 29));

    if value < 0x80 {
        writer.write_all(&[value as u8])?;
    } else if value < 0x4000 {
        writer.write_all(&[(value >> 7) as u8 | 0x80, (value & 0x7F) as u8])?;
    } else if value < 0x20_0000 {
        writer.write_all(&[
            (value >> 14) as u8 | 0x80,
            ((value >> 7) & 0x7F) as u8 | 0x80,
            (value & 0x7F) as u8,
        ])?;
    } else {
        writer.write_all(&[
            (value >> 22) as u8 | 0x80,
            ((value >> 15) & 0x7F) as u8 | 0x80,
            ((value >> 8) & 0x7F) as u8 | 0x80,
            (value & 0xFF) as u8,
        ])?;
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;

    fn round_trip(value: AmfValue) {
        let mut buf = Vec::new();
        Amf3Encoder::new(&mut buf).encode_value(&value).unwrap();

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let decoded = Amf3Decoder::new().decode_value(&mut cursor).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(cursor.position() as usize, cursor.get_ref().len());
    }

    fn u29_len(value: u32) -> usize {
        let mut buf = Vec::new();
        write_u29(&mut buf, value).unwrap();

        let mut cursor = io::Cursor::new(buf.clone());
        assert_eq!(read_u29(&mut cursor).unwrap(), value);

        buf.len()
    }

    #[test]
    fn u29_boundaries() {
        assert_eq!(u29_len(0), 1);
        assert_eq!(u29_len((1 << 7) - 1), 1);
        assert_eq!(u29_len(1 << 7), 2);
        assert_eq!(u29_len((1 << 14) - 1), 2);
        assert_eq!(u29_len(1 << 14), 3);
        assert_eq!(u29_len((1 << 21) - 1), 3);
        assert_eq!(u29_len(1 << 21), 4);
        assert_eq!(u29_len((1 << 28) - 1), 4);
        assert_eq!(u29_len((1 << 29) - 1), 4);
    }

    #[test]
    fn integer_boundaries() {
        round_trip(AmfValue::Integer(0));
        round_trip(AmfValue::Integer(INTEGER_MAX));
        round_trip(AmfValue::Integer(INTEGER_MIN));
        round_trip(AmfValue::Integer(-1));
    }

    #[test]
    fn integer_overflow_becomes_double() {
        let mut buf = Vec::new();
        Amf3Encoder::new(&mut buf).encode_integer(1 << 29).unwrap();
        assert_eq!(buf[0], Amf3Marker::Double as u8);

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let decoded = Amf3Decoder::new().decode_value(&mut cursor).unwrap();
        assert_eq!(decoded, AmfValue::Number((1u32 << 29) as f64));
    }

    #[test]
    fn round_trip_scalars() {
        round_trip(AmfValue::Undefined);
        round_trip(AmfValue::Null);
        round_trip(AmfValue::Boolean(true));
        round_trip(AmfValue::Boolean(false));
        round_trip(AmfValue::Number(2.5));
        round_trip(AmfValue::String("amf3".to_string()));
        round_trip(AmfValue::Date {
            unix_ms: 1000.0,
            timezone: 0,
        });
        round_trip(AmfValue::ByteArray(Bytes::from_static(&[1, 2, 3])));
    }

    #[test]
    fn round_trip_containers() {
        round_trip(AmfValue::StrictArray(vec![
            AmfValue::Integer(1),
            AmfValue::String("two".to_string()),
        ]));
        round_trip(AmfValue::Object(
            [("key", AmfValue::Integer(1)), ("other", AmfValue::Null)]
                .into_iter()
                .collect(),
        ));
        round_trip(AmfValue::TypedObject {
            class_name: "com.example.Thing".to_string(),
            object: [("key", AmfValue::Boolean(true))].into_iter().collect(),
        });
        round_trip(AmfValue::VectorInt(vec![-1, 0, 1]));
        round_trip(AmfValue::VectorUInt(vec![0, u32::MAX]));
        round_trip(AmfValue::VectorDouble(vec![0.5, -0.5]));
        round_trip(AmfValue::VectorObject(vec![AmfValue::Null, AmfValue::Integer(2)]));
    }

    #[test]
    fn string_reference_table() {
        let values = [
            AmfValue::String("repeated".to_string()),
            AmfValue::String("repeated".to_string()),
        ];

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        for value in &values {
            encoder.encode_value(value).unwrap();
        }

        // marker + inline header + 8 bytes, then marker + 1-byte reference
        assert_eq!(buf.len(), 1 + 1 + 8 + 1 + 1);
        assert_eq!(buf[buf.len() - 1], 0x00); // reference to string 0

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let mut decoder = Amf3Decoder::new();
        assert_eq!(decoder.decode_value(&mut cursor).unwrap(), values[0]);
        assert_eq!(decoder.decode_value(&mut cursor).unwrap(), values[1]);
    }

    #[test]
    fn traits_reference_table() {
        let a = AmfValue::Object([("x", AmfValue::Integer(1))].into_iter().collect());
        let b = AmfValue::Object([("x", AmfValue::Integer(2))].into_iter().collect());

        let mut buf = Vec::new();
        let mut encoder = Amf3Encoder::new(&mut buf);
        encoder.encode_value(&a).unwrap();
        encoder.encode_value(&b).unwrap();

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let mut decoder = Amf3Decoder::new();
        assert_eq!(decoder.decode_value(&mut cursor).unwrap(), a);
        assert_eq!(decoder.decode_value(&mut cursor).unwrap(), b);
    }

    #[test]
    fn reference_out_of_range() {
        // object marker with a reference to index 5 in an empty table
        let buf = vec![Amf3Marker::Object as u8, 5 << 1];

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let err = Amf3Decoder::new().decode_value(&mut cursor).unwrap_err();
        assert!(matches!(err, AmfError::ReferenceOutOfRange { index: 5, .. }));
    }

    #[test]
    fn dictionary_unsupported() {
        let buf = vec![Amf3Marker::Dictionary as u8, 0x01];

        let mut cursor = io::Cursor::new(Bytes::from(buf));
        let err = Amf3Decoder::new().decode_value(&mut cursor).unwrap_err();
        assert!(matches!(err, AmfError::UnsupportedAmf3Marker(Amf3Marker::Dictionary)));
    }
}
