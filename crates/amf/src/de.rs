//! Serde deserializer consuming AMF0.
//!
//! Values are decoded through [`Amf0Decoder`] into the tagged value model
//! and then mapped onto the visitor, so every AMF0 shape (including the
//! avmplus switch into AMF3) deserializes through one code path.

use bytes::Bytes;
use serde::de::{IntoDeserializer, Visitor};

use crate::{Amf0Decoder, AmfError, AmfValue};

/// Deserializes a value from an AMF0 byte buffer.
pub fn from_buf<'de, T>(buf: Bytes) -> Result<T, AmfError>
where
    T: serde::de::Deserialize<'de>,
{
    let mut decoder = Amf0Decoder::new(buf);
    T::deserialize(&mut Deserializer::from_decoder(&mut decoder))
}

/// Serde deserializer wrapping an [`Amf0Decoder`].
pub struct Deserializer<'a> {
    decoder: &'a mut Amf0Decoder,
}

impl<'a> Deserializer<'a> {
    /// Creates a deserializer reading through the given decoder.
    pub fn from_decoder(decoder: &'a mut Amf0Decoder) -> Self {
        Self { decoder }
    }
}

impl<'de> serde::Deserializer<'de> for &mut Deserializer<'_> {
    type Error = AmfError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.decoder.decode_value()?;
        ValueDeserializer { value }.deserialize_any(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.decoder.decode_value()?;
        ValueDeserializer { value }.deserialize_option(visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let value = self.decoder.decode_value()?;
        ValueDeserializer { value }.deserialize_enum(name, variants, visitor)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string bytes
        byte_buf unit unit_struct newtype_struct seq tuple tuple_struct map
        struct identifier ignored_any
    }
}

/// Deserializer over an already decoded [`AmfValue`].
struct ValueDeserializer {
    value: AmfValue,
}

impl ValueDeserializer {
    fn number(&self) -> Result<f64, AmfError> {
        self.value
            .as_number()
            .ok_or(AmfError::Custom(format!("expected a number, got {:?}", self.value)))
    }
}

macro_rules! deserialize_number {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
        where
            V: Visitor<'de>,
        {
            let n = self.number()?;
            visitor.$visit(n as $ty)
        }
    };
}

impl<'de> serde::Deserializer<'de> for ValueDeserializer {
    type Error = AmfError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            AmfValue::Number(n) => visitor.visit_f64(n),
            AmfValue::Integer(n) => visitor.visit_i32(n),
            AmfValue::Boolean(b) => visitor.visit_bool(b),
            AmfValue::String(s) | AmfValue::XmlDocument(s) => visitor.visit_string(s),
            AmfValue::Null | AmfValue::Undefined => visitor.visit_unit(),
            AmfValue::Date { unix_ms, .. } => visitor.visit_f64(unix_ms),
            AmfValue::Object(object) | AmfValue::EcmaArray(object) | AmfValue::TypedObject { object, .. } => visitor
                .visit_map(ObjectAccess {
                    entries: object.into_iter(),
                    pending: None,
                }),
            AmfValue::StrictArray(items) | AmfValue::VectorObject(items) => visitor.visit_seq(ArrayAccess {
                items: items.into_iter(),
            }),
            AmfValue::ByteArray(bytes) => visitor.visit_byte_buf(bytes.to_vec()),
            AmfValue::VectorInt(items) => visitor.visit_seq(ArrayAccess {
                items: items.into_iter().map(AmfValue::Integer).collect::<Vec<_>>().into_iter(),
            }),
            AmfValue::VectorUInt(items) => visitor.visit_seq(ArrayAccess {
                items: items
                    .into_iter()
                    .map(|v| AmfValue::Number(v as f64))
                    .collect::<Vec<_>>()
                    .into_iter(),
            }),
            AmfValue::VectorDouble(items) => visitor.visit_seq(ArrayAccess {
                items: items.into_iter().map(AmfValue::Number).collect::<Vec<_>>().into_iter(),
            }),
            AmfValue::Reference(_) => Err(AmfError::Custom("cannot deserialize an unresolved reference".to_string())),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            AmfValue::Null | AmfValue::Undefined => visitor.visit_none(),
            value => visitor.visit_some(ValueDeserializer { value }),
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            // unit variants are encoded as plain strings
            AmfValue::String(s) => visitor.visit_enum(s.into_deserializer()),
            value => Err(AmfError::Custom(format!("expected a variant string, got {value:?}"))),
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    deserialize_number!(deserialize_i8, visit_i8, i8);
    deserialize_number!(deserialize_i16, visit_i16, i16);
    deserialize_number!(deserialize_i32, visit_i32, i32);
    deserialize_number!(deserialize_i64, visit_i64, i64);
    deserialize_number!(deserialize_u8, visit_u8, u8);
    deserialize_number!(deserialize_u16, visit_u16, u16);
    deserialize_number!(deserialize_u32, visit_u32, u32);
    deserialize_number!(deserialize_u64, visit_u64, u64);
    deserialize_number!(deserialize_f32, visit_f32, f32);
    deserialize_number!(deserialize_f64, visit_f64, f64);

    serde::forward_to_deserialize_any! {
        bool char str string bytes byte_buf unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

struct ObjectAccess {
    entries: std::vec::IntoIter<(String, AmfValue)>,
    pending: Option<AmfValue>,
}

impl<'de> serde::de::MapAccess<'de> for ObjectAccess {
    type Error = AmfError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: serde::de::DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(key.into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or(AmfError::Custom("next_value called before next_key".to_string()))?;

        seed.deserialize(ValueDeserializer { value })
    }
}

struct ArrayAccess {
    items: std::vec::IntoIter<AmfValue>,
}

impl<'de> serde::de::SeqAccess<'de> for ArrayAccess {
    type Error = AmfError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: serde::de::DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(value) => seed.deserialize(ValueDeserializer { value }).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use bytes::Bytes;
    use serde_derive::Deserialize;

    use crate::{Amf0Encoder, AmfObject, AmfValue, from_buf};

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ConnectInfo {
        app: String,
        #[serde(default)]
        tc_url: Option<String>,
        #[serde(default)]
        capabilities: Option<f64>,
        #[serde(flatten)]
        other: AmfObject,
    }

    #[test]
    fn deserialize_struct_with_flatten() {
        let object: AmfObject = [
            ("app", AmfValue::String("live".to_string())),
            ("tcUrl", AmfValue::String("rtmp://localhost/live".to_string())),
            ("capabilities", AmfValue::Number(239.0)),
            ("extra", AmfValue::Boolean(true)),
        ]
        .into_iter()
        .collect();

        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_object(&object).unwrap();

        let info: ConnectInfo = from_buf(Bytes::from(buf)).unwrap();

        assert_eq!(info.app, "live");
        assert_eq!(info.tc_url.as_deref(), Some("rtmp://localhost/live"));
        assert_eq!(info.capabilities, Some(239.0));
        assert_eq!(info.other.get("extra"), Some(&AmfValue::Boolean(true)));
    }

    #[test]
    fn deserialize_missing_optional_fields() {
        let object: AmfObject = [("app", AmfValue::String("live".to_string()))].into_iter().collect();

        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_object(&object).unwrap();

        let info: ConnectInfo = from_buf(Bytes::from(buf)).unwrap();
        assert_eq!(info.app, "live");
        assert_eq!(info.tc_url, None);
        assert_eq!(info.capabilities, None);
        assert!(info.other.is_empty());
    }

    #[derive(Debug, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    enum PublishingType {
        Live,
        Record,
        Append,
        #[serde(untagged)]
        Unknown(String),
    }

    #[test]
    fn deserialize_unit_variant_from_string() {
        let mut buf = Vec::new();
        let mut encoder = Amf0Encoder::new(&mut buf);
        encoder.encode_string("record").unwrap();
        encoder.encode_string("weird").unwrap();

        let mut decoder = crate::Amf0Decoder::new(Bytes::from(buf));
        let first: PublishingType = decoder.deserialize().unwrap();
        let second: PublishingType = decoder.deserialize().unwrap();

        assert_eq!(first, PublishingType::Record);
        assert_eq!(second, PublishingType::Unknown("weird".to_string()));
    }

    #[test]
    fn deserialize_number_widths() {
        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_number(255.0).unwrap();

        let n: u32 = from_buf(Bytes::from(buf.clone())).unwrap();
        assert_eq!(n, 255);

        let n: f64 = from_buf(Bytes::from(buf)).unwrap();
        assert_eq!(n, 255.0);
    }

    #[test]
    fn deserialize_ecma_array_as_map() {
        let object: AmfObject = [("duration", AmfValue::Number(1.5))].into_iter().collect();

        let mut buf = Vec::new();
        Amf0Encoder::new(&mut buf).encode_ecma_array(&object).unwrap();

        let decoded: AmfObject = from_buf(Bytes::from(buf)).unwrap();
        assert_eq!(decoded, object);
    }
}
