//! AMF0 encoder.

use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::amf3::Amf3Encoder;
use crate::{Amf0Marker, AmfError, AmfObject, AmfValue};

/// AMF0 encoder.
///
/// Provides various functions to encode different types of AMF values into a writer.
#[derive(Debug)]
pub struct Amf0Encoder<W> {
    writer: W,
}

impl<W> Amf0Encoder<W> {
    /// Creates a new encoder from a writer.
    pub fn new(writer: W) -> Self {
        Amf0Encoder { writer }
    }
}

impl<W> Amf0Encoder<W>
where
    W: io::Write,
{
    /// Encodes a [`bool`] as an AMF0 boolean value.
    pub fn encode_boolean(&mut self, value: bool) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Boolean as u8)?;
        self.writer.write_u8(value as u8)?;
        Ok(())
    }

    /// Encodes a [`f64`] as an AMF0 number value.
    pub fn encode_number(&mut self, value: f64) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Number as u8)?;
        self.writer.write_f64::<BigEndian>(value)?;
        Ok(())
    }

    /// Encodes a [`&str`](str) as an AMF0 string value.
    ///
    /// This function decides based on the length of the given string slice
    /// whether to use a normal string or a long string.
    pub fn encode_string(&mut self, value: &str) -> Result<(), AmfError> {
        let len = value.len();

        if len <= (u16::MAX as usize) {
            self.writer.write_u8(Amf0Marker::String as u8)?;
            self.writer.write_u16::<BigEndian>(len as u16)?;
        } else {
            // This try_into fails if the length is greater than u32::MAX
            let len: u32 = len.try_into()?;

            self.writer.write_u8(Amf0Marker::LongString as u8)?;
            self.writer.write_u32::<BigEndian>(len)?;
        }

        self.writer.write_all(value.as_bytes())?;

        Ok(())
    }

    /// Encodes an AMF0 null value.
    pub fn encode_null(&mut self) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Null as u8)?;
        Ok(())
    }

    /// Encodes an AMF0 undefined value.
    pub fn encode_undefined(&mut self) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Undefined as u8)?;
        Ok(())
    }

    /// Encodes an AMF0 date value. The timezone is always written as 0.
    pub fn encode_date(&mut self, unix_ms: f64) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Date as u8)?;
        self.writer.write_f64::<BigEndian>(unix_ms)?;
        self.writer.write_i16::<BigEndian>(0)?;
        Ok(())
    }

    /// Encodes an AMF0 reference to a previously encoded complex value.
    pub fn encode_reference(&mut self, index: u16) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Reference as u8)?;
        self.writer.write_u16::<BigEndian>(index)?;
        Ok(())
    }

    pub(crate) fn encode_array_header(&mut self, len: u32) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::StrictArray as u8)?;
        self.writer.write_u32::<BigEndian>(len)?;
        Ok(())
    }

    pub(crate) fn encode_object_header(&mut self) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::Object as u8)?;
        Ok(())
    }

    /// Encodes a slice of values as an AMF0 strict array.
    pub fn encode_strict_array(&mut self, values: &[AmfValue]) -> Result<(), AmfError> {
        self.encode_array_header(values.len().try_into()?)?;

        for value in values {
            self.encode_value(value)?;
        }

        Ok(())
    }

    pub(crate) fn encode_object_key(&mut self, key: &str) -> Result<(), AmfError> {
        self.writer.write_u16::<BigEndian>(key.len().try_into()?)?;
        self.writer.write_all(key.as_bytes())?;
        Ok(())
    }

    pub(crate) fn encode_object_trailer(&mut self) -> Result<(), AmfError> {
        self.writer.write_u24::<BigEndian>(Amf0Marker::ObjectEnd as u32)?;
        Ok(())
    }

    fn encode_object_body(&mut self, values: &AmfObject) -> Result<(), AmfError> {
        for (key, value) in values.iter() {
            self.encode_object_key(key)?;
            self.encode_value(value)?;
        }

        self.encode_object_trailer()?;

        Ok(())
    }

    /// Encodes an [`AmfObject`] as an AMF0 anonymous object.
    pub fn encode_object(&mut self, values: &AmfObject) -> Result<(), AmfError> {
        self.encode_object_header()?;
        self.encode_object_body(values)
    }

    /// Encodes an [`AmfObject`] as an AMF0 ECMA array.
    ///
    /// The advisory count field carries the actual entry count.
    pub fn encode_ecma_array(&mut self, values: &AmfObject) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::EcmaArray as u8)?;
        self.writer.write_u32::<BigEndian>(values.len().try_into()?)?;
        self.encode_object_body(values)
    }

    /// Encodes an [`AmfObject`] as an AMF0 typed object.
    pub fn encode_typed_object(&mut self, class_name: &str, values: &AmfObject) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::TypedObject as u8)?;
        self.encode_object_key(class_name)?;
        self.encode_object_body(values)
    }

    /// Encodes an XML document (u32-length body, like a long string).
    pub fn encode_xml_document(&mut self, value: &str) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::XmlDocument as u8)?;
        self.writer.write_u32::<BigEndian>(value.len().try_into()?)?;
        self.writer.write_all(value.as_bytes())?;
        Ok(())
    }

    /// Encodes a value through the avmplus switch: the `0x11` marker
    /// followed by the AMF3 encoding of `value` with fresh reference tables.
    pub fn encode_avmplus(&mut self, value: &AmfValue) -> Result<(), AmfError> {
        self.writer.write_u8(Amf0Marker::AVMPlusObject as u8)?;
        let mut amf3 = Amf3Encoder::new(&mut self.writer);
        amf3.encode_value(value)
    }

    /// Encodes any [`AmfValue`] with its canonical AMF0 wire form.
    ///
    /// AMF3-only variants are emitted through the avmplus switch.
    pub fn encode_value(&mut self, value: &AmfValue) -> Result<(), AmfError> {
        match value {
            AmfValue::Number(v) => self.encode_number(*v),
            AmfValue::Boolean(v) => self.encode_boolean(*v),
            AmfValue::String(v) => self.encode_string(v),
            AmfValue::Object(v) => self.encode_object(v),
            AmfValue::Null => self.encode_null(),
            AmfValue::Undefined => self.encode_undefined(),
            AmfValue::Reference(index) => self.encode_reference(*index),
            AmfValue::EcmaArray(v) => self.encode_ecma_array(v),
            AmfValue::StrictArray(v) => self.encode_strict_array(v),
            AmfValue::Date { unix_ms, .. } => self.encode_date(*unix_ms),
            AmfValue::XmlDocument(v) => self.encode_xml_document(v),
            AmfValue::TypedObject { class_name, object } => self.encode_typed_object(class_name, object),
            AmfValue::Integer(_)
            | AmfValue::ByteArray(_)
            | AmfValue::VectorInt(_)
            | AmfValue::VectorUInt(_)
            | AmfValue::VectorDouble(_)
            | AmfValue::VectorObject(_) => self.encode_avmplus(value),
        }
    }

    /// Encodes a given value using [serde].
    #[cfg(feature = "serde")]
    pub fn serialize<T>(&mut self, value: T) -> Result<(), AmfError>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut crate::ser::Serializer::from_encoder(self))?;
        Ok(())
    }

    pub(crate) fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::Amf0Decoder;

    fn round_trip(value: AmfValue) {
        let mut buf = Vec::new();
        let mut encoder = Amf0Encoder::new(&mut buf);
        encoder.encode_value(&value).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        assert_eq!(decoder.decode_value().unwrap(), value);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn round_trip_scalars() {
        round_trip(AmfValue::Number(42.5));
        round_trip(AmfValue::Boolean(true));
        round_trip(AmfValue::String("freshet".to_string()));
        round_trip(AmfValue::Null);
        round_trip(AmfValue::Undefined);
        round_trip(AmfValue::Date {
            unix_ms: 1234567890.0,
            timezone: 0,
        });
    }

    #[test]
    fn round_trip_containers() {
        round_trip(AmfValue::Object(
            [
                ("app", AmfValue::String("live".to_string())),
                ("fpad", AmfValue::Boolean(false)),
            ]
            .into_iter()
            .collect(),
        ));
        round_trip(AmfValue::EcmaArray(
            [("duration", AmfValue::Number(0.0))].into_iter().collect(),
        ));
        round_trip(AmfValue::StrictArray(vec![
            AmfValue::Number(1.0),
            AmfValue::String("two".to_string()),
            AmfValue::Null,
        ]));
        round_trip(AmfValue::TypedObject {
            class_name: "flex.messaging.io.ArrayCollection".to_string(),
            object: [("length", AmfValue::Number(0.0))].into_iter().collect(),
        });
    }

    #[test]
    fn round_trip_preserves_key_order() {
        let object: AmfObject = [
            ("zulu", AmfValue::Number(1.0)),
            ("alpha", AmfValue::Number(2.0)),
            ("mike", AmfValue::Number(3.0)),
        ]
        .into_iter()
        .collect();

        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_object(&object).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        let decoded = decoder.decode_object().unwrap();

        let keys: Vec<_> = decoded.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn encode_object_wire_form() {
        let object: AmfObject = [("a", AmfValue::Boolean(true))].into_iter().collect();

        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_object(&object).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            buf,
            vec![
                Amf0Marker::Object as u8,
                0, 1, b'a',
                Amf0Marker::Boolean as u8, 1,
                0, 0, Amf0Marker::ObjectEnd as u8,
            ]
        );
    }

    #[test]
    fn amf3_variant_uses_avmplus_switch() {
        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_value(&AmfValue::Integer(3)).unwrap();

        // 0x11 switch, 0x04 integer marker, U29 payload
        assert_eq!(buf, vec![0x11, 0x04, 0x03]);

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        assert_eq!(decoder.decode_value().unwrap(), AmfValue::Integer(3));
    }
}
