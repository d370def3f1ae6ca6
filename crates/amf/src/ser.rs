//! Serde serializer producing AMF0.
//!
//! This is the declarative descriptor layer: struct field names become
//! object keys, `Option` fields serialize as null when absent, sequences
//! become strict arrays and unit enum variants become strings.

use std::io;

use serde::ser::{Impossible, Serialize};

use crate::{Amf0Encoder, AmfError};

/// Serializes a value as AMF0 into the given writer.
pub fn to_writer<W: io::Write, T: Serialize>(writer: W, value: &T) -> Result<(), AmfError> {
    let mut encoder = Amf0Encoder::new(writer);
    let mut serializer = Serializer::from_encoder(&mut encoder);
    value.serialize(&mut serializer)
}

/// Serde serializer wrapping an [`Amf0Encoder`].
pub struct Serializer<'a, W> {
    encoder: &'a mut Amf0Encoder<W>,
}

impl<'a, W> Serializer<'a, W> {
    /// Creates a serializer writing through the given encoder.
    pub fn from_encoder(encoder: &'a mut Amf0Encoder<W>) -> Self {
        Self { encoder }
    }
}

impl<'a, W: io::Write> serde::Serializer for &'a mut Serializer<'_, W> {
    type Error = AmfError;
    type Ok = ();
    type SerializeMap = SerializeObject<'a, W>;
    type SerializeSeq = SerializeSeq<'a, W>;
    type SerializeStruct = SerializeObject<'a, W>;
    type SerializeStructVariant = Impossible<(), AmfError>;
    type SerializeTuple = SerializeSeq<'a, W>;
    type SerializeTupleStruct = SerializeSeq<'a, W>;
    type SerializeTupleVariant = Impossible<(), AmfError>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_boolean(v)
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_number(v)
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_string(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_string(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        // byte strings have no AMF0 form, emit a strict array of numbers
        self.encoder.encode_array_header(v.len().try_into()?)?;
        for byte in v {
            self.encoder.encode_number(*byte as f64)?;
        }
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_null()
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_null()
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_null()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_string(variant)
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        let len = len.ok_or(AmfError::Custom("cannot serialize sequence with unknown length".to_string()))?;
        self.encoder.encode_array_header(len.try_into()?)?;

        Ok(SerializeSeq { encoder: &mut *self.encoder })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(AmfError::UnsupportedType("tuple variant"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        self.encoder.encode_object_header()?;

        Ok(SerializeObject {
            encoder: &mut *self.encoder,
            pending_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, Self::Error> {
        self.encoder.encode_object_header()?;

        Ok(SerializeObject {
            encoder: &mut *self.encoder,
            pending_key: None,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(AmfError::UnsupportedType("struct variant"))
    }
}

/// Compound serializer for sequences and tuples.
pub struct SerializeSeq<'a, W> {
    encoder: &'a mut Amf0Encoder<W>,
}

impl<W: io::Write> serde::ser::SerializeSeq for SerializeSeq<'_, W> {
    type Error = AmfError;
    type Ok = ();

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(&mut Serializer::from_encoder(self.encoder))
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<W: io::Write> serde::ser::SerializeTuple for SerializeSeq<'_, W> {
    type Error = AmfError;
    type Ok = ();

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        serde::ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<W: io::Write> serde::ser::SerializeTupleStruct for SerializeSeq<'_, W> {
    type Error = AmfError;
    type Ok = ();

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        serde::ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

/// Compound serializer for objects: maps and structs.
pub struct SerializeObject<'a, W> {
    encoder: &'a mut Amf0Encoder<W>,
    pending_key: Option<String>,
}

impl<W: io::Write> serde::ser::SerializeMap for SerializeObject<'_, W> {
    type Error = AmfError;
    type Ok = ();

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.pending_key = Some(key.serialize(MapKeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or(AmfError::Custom("serialize_value called before serialize_key".to_string()))?;

        self.encoder.encode_object_key(&key)?;
        value.serialize(&mut Serializer::from_encoder(self.encoder))
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_object_trailer()
    }
}

impl<W: io::Write> serde::ser::SerializeStruct for SerializeObject<'_, W> {
    type Error = AmfError;
    type Ok = ();

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.encoder.encode_object_key(key)?;
        value.serialize(&mut Serializer::from_encoder(self.encoder))
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.encoder.encode_object_trailer()
    }
}

/// Object keys must be strings; this serializer rejects everything else.
struct MapKeySerializer;

impl serde::Serializer for MapKeySerializer {
    type Error = AmfError;
    type Ok = String;
    type SerializeMap = Impossible<String, AmfError>;
    type SerializeSeq = Impossible<String, AmfError>;
    type SerializeStruct = Impossible<String, AmfError>;
    type SerializeStructVariant = Impossible<String, AmfError>;
    type SerializeTuple = Impossible<String, AmfError>;
    type SerializeTupleStruct = Impossible<String, AmfError>;
    type SerializeTupleVariant = Impossible<String, AmfError>;

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(variant.to_string())
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        Ok(v.to_string())
    }

    fn serialize_bool(self, _v: bool) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_i8(self, _v: i8) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_i16(self, _v: i16) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_i32(self, _v: i32) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_i64(self, _v: i64) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_u8(self, _v: u8) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_u16(self, _v: u16) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_u32(self, _v: u32) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_u64(self, _v: u64) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_f32(self, _v: f32) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_f64(self, _v: f64) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(AmfError::Custom("cannot serialize map with non-string key".to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;
    use serde_derive::Serialize;

    use super::to_writer;
    use crate::{Amf0Decoder, AmfValue};

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct ConnectInfo {
        app: String,
        flash_ver: String,
        fpad: bool,
        capabilities: f64,
    }

    #[test]
    fn serialize_struct_as_object() {
        let mut buf = Vec::new();
        to_writer(
            &mut buf,
            &ConnectInfo {
                app: "live".to_string(),
                flash_ver: "FMLE/3.0".to_string(),
                fpad: false,
                capabilities: 239.0,
            },
        )
        .unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        let value = decoder.decode_value().unwrap();

        assert_eq!(
            value,
            AmfValue::Object(
                [
                    ("app", AmfValue::String("live".to_string())),
                    ("flashVer", AmfValue::String("FMLE/3.0".to_string())),
                    ("fpad", AmfValue::Boolean(false)),
                    ("capabilities", AmfValue::Number(239.0)),
                ]
                .into_iter()
                .collect()
            )
        );
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    enum PublishingType {
        Live,
        Record,
    }

    #[test]
    fn serialize_unit_variant_as_string() {
        let mut buf = Vec::new();
        to_writer(&mut buf, &PublishingType::Live).unwrap();
        to_writer(&mut buf, &PublishingType::Record).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        assert_eq!(decoder.decode_value().unwrap(), AmfValue::String("live".to_string()));
        assert_eq!(decoder.decode_value().unwrap(), AmfValue::String("record".to_string()));
    }

    #[test]
    fn serialize_option_and_seq() {
        let mut buf = Vec::new();
        to_writer(&mut buf, &Option::<f64>::None).unwrap();
        to_writer(&mut buf, &vec![1.0f64, 2.0]).unwrap();

        let mut decoder = Amf0Decoder::new(Bytes::from(buf));
        assert_eq!(decoder.decode_value().unwrap(), AmfValue::Null);
        assert_eq!(
            decoder.decode_value().unwrap(),
            AmfValue::StrictArray(vec![AmfValue::Number(1.0), AmfValue::Number(2.0)])
        );
    }
}
