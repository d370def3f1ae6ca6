//! AMF value types.

use bytes::Bytes;

/// An ordered string-keyed map of AMF values.
///
/// AMF objects and ECMA arrays preserve insertion order so that re-emission
/// is byte-identical; this is a thin wrapper over a pair vector with a
/// map-shaped API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmfObject(Vec<(String, AmfValue)>);

impl AmfObject {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates an empty object with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Appends a key-value pair, replacing the value of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AmfValue>) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value.into(),
            None => self.0.push((key, value.into())),
        }
    }

    /// Returns the value for the given key, if present.
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AmfValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<Vec<(String, AmfValue)>> for AmfObject {
    fn from(value: Vec<(String, AmfValue)>) -> Self {
        Self(value)
    }
}

impl IntoIterator for AmfObject {
    type IntoIter = std::vec::IntoIter<Self::Item>;
    type Item = (String, AmfValue);

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<AmfValue>> FromIterator<(K, V)> for AmfObject {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Represents any AMF value.
///
/// The AMF0 and AMF3 codecs share this model; the variants below the
/// AMF3 comment only appear on the wire in AMF3 streams.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    /// Number (IEEE-754 double).
    Number(f64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
    /// Anonymous object.
    Object(AmfObject),
    /// Null.
    Null,
    /// Undefined.
    Undefined,
    /// Back-reference to a previously emitted complex value.
    ///
    /// Decoders resolve references in place; this variant is only seen when
    /// explicitly constructed for emission.
    Reference(u16),
    /// Associative array with an advisory entry count.
    EcmaArray(AmfObject),
    /// Dense array.
    StrictArray(Vec<AmfValue>),
    /// Date: milliseconds since epoch plus a timezone that is always 0.
    Date {
        /// Milliseconds since the unix epoch.
        unix_ms: f64,
        /// Timezone offset in minutes, always 0 on the wire.
        timezone: i16,
    },
    /// XML document.
    XmlDocument(String),
    /// Object with a class name.
    TypedObject {
        /// The class name.
        class_name: String,
        /// The sealed and dynamic members.
        object: AmfObject,
    },

    // AMF3-only variants.
    /// 29-bit integer (AMF3).
    Integer(i32),
    /// Byte array (AMF3).
    ByteArray(Bytes),
    /// Vector of 32-bit signed integers (AMF3).
    VectorInt(Vec<i32>),
    /// Vector of 32-bit unsigned integers (AMF3).
    VectorUInt(Vec<u32>),
    /// Vector of doubles (AMF3).
    VectorDouble(Vec<f64>),
    /// Vector of objects (AMF3).
    VectorObject(Vec<AmfValue>),
}

impl AmfValue {
    /// Returns the number value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            AmfValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the object entries, if this is an object or ECMA array.
    pub fn as_object(&self) -> Option<&AmfObject> {
        match self {
            AmfValue::Object(o) | AmfValue::EcmaArray(o) => Some(o),
            AmfValue::TypedObject { object, .. } => Some(object),
            _ => None,
        }
    }
}

impl From<f64> for AmfValue {
    fn from(value: f64) -> Self {
        AmfValue::Number(value)
    }
}

impl From<bool> for AmfValue {
    fn from(value: bool) -> Self {
        AmfValue::Boolean(value)
    }
}

impl From<String> for AmfValue {
    fn from(value: String) -> Self {
        AmfValue::String(value)
    }
}

impl From<&str> for AmfValue {
    fn from(value: &str) -> Self {
        AmfValue::String(value.to_string())
    }
}

impl From<AmfObject> for AmfValue {
    fn from(value: AmfObject) -> Self {
        AmfValue::Object(value)
    }
}

impl From<Vec<AmfValue>> for AmfValue {
    fn from(value: Vec<AmfValue>) -> Self {
        AmfValue::StrictArray(value)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Serialize for AmfObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::de::Deserialize<'de> for AmfObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AmfObjectVisitor;

        impl<'de> serde::de::Visitor<'de> for AmfObjectVisitor {
            type Value = AmfObject;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an AMF object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut object = AmfObject::new();

                while let Some((key, value)) = map.next_entry::<String, AmfValue>()? {
                    object.insert(key, value);
                }

                Ok(object)
            }
        }

        deserializer.deserialize_map(AmfObjectVisitor)
    }
}

#[cfg(feature = "serde")]
impl serde::ser::Serialize for AmfValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            AmfValue::Number(v) => serializer.serialize_f64(*v),
            AmfValue::Integer(v) => serializer.serialize_i32(*v),
            AmfValue::Boolean(v) => serializer.serialize_bool(*v),
            AmfValue::String(v) | AmfValue::XmlDocument(v) => serializer.serialize_str(v),
            AmfValue::Null | AmfValue::Undefined => serializer.serialize_none(),
            AmfValue::Date { unix_ms, .. } => serializer.serialize_f64(*unix_ms),
            AmfValue::Object(v) | AmfValue::EcmaArray(v) | AmfValue::TypedObject { object: v, .. } => {
                let mut map = serializer.serialize_map(Some(v.len()))?;

                for (key, value) in v.iter() {
                    map.serialize_entry(key, value)?;
                }

                map.end()
            }
            AmfValue::StrictArray(v) | AmfValue::VectorObject(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;

                for value in v.iter() {
                    seq.serialize_element(value)?;
                }

                seq.end()
            }
            AmfValue::ByteArray(v) => serializer.serialize_bytes(v),
            AmfValue::VectorInt(v) => serializer.collect_seq(v.iter()),
            AmfValue::VectorUInt(v) => serializer.collect_seq(v.iter()),
            AmfValue::VectorDouble(v) => serializer.collect_seq(v.iter()),
            AmfValue::Reference(_) => Err(serde::ser::Error::custom("cannot serialize an unresolved reference")),
        }
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::de::Deserialize<'de> for AmfValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AmfValueVisitor;

        impl<'de> serde::de::Visitor<'de> for AmfValueVisitor {
            type Value = AmfValue;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an AMF value")
            }

            #[inline]
            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Boolean(v))
            }

            #[inline]
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Number(v as f64))
            }

            #[inline]
            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Number(v as f64))
            }

            #[inline]
            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Number(v))
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::String(v.to_owned()))
            }

            #[inline]
            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::String(v))
            }

            #[inline]
            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Null)
            }

            #[inline]
            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::Null)
            }

            #[inline]
            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                serde::Deserialize::deserialize(deserializer)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();

                while let Some(value) = seq.next_element()? {
                    vec.push(value);
                }

                Ok(AmfValue::StrictArray(vec))
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut object = AmfObject::new();

                while let Some((key, value)) = map.next_entry::<String, AmfValue>()? {
                    object.insert(key, value);
                }

                Ok(AmfValue::Object(object))
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(AmfValue::ByteArray(bytes::Bytes::copy_from_slice(v)))
            }
        }

        deserializer.deserialize_any(AmfValueVisitor)
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::{AmfObject, AmfValue};

    #[test]
    fn object_preserves_insertion_order() {
        let mut object = AmfObject::new();
        object.insert("zulu", 1.0);
        object.insert("alpha", 2.0);
        object.insert("mike", 3.0);

        let keys: Vec<_> = object.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn object_insert_replaces() {
        let mut object = AmfObject::new();
        object.insert("key", 1.0);
        object.insert("key", 2.0);

        assert_eq!(object.len(), 1);
        assert_eq!(object.get("key"), Some(&AmfValue::Number(2.0)));
    }
}
