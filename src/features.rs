#[cfg(feature = "ahash")]
use ahash::AHashMap;
#[allow(unused_imports)]
use bytes::{Buf, BufMut, Bytes, BytesMut};
#[cfg(feature = "fxhash")]
use fxhash::FxHashMap;
#[cfg(feature = "indexmap")]
use indexmap::IndexMap;
#[cfg(feature = "serde_json")]
use serde_json::{Map, Number};
#[cfg(feature = "smol_str")]
use smol_str::SmolStr;

#[allow(unused_imports)]
use crate::core::*;
#[allow(unused_imports)]
use crate::*;

// --- IndexMap ---
/// Encodes an `IndexMap` as a map, preserving insertion order.
#[cfg(feature = "indexmap")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for IndexMap<K, V> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_pairs(self.len(), self, writer)
    }
}

/// Decodes a map into an `IndexMap`, preserving wire order.
#[cfg(feature = "indexmap")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for IndexMap<K, V> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = decode_map_len(reader)?;
        let mut map = IndexMap::with_capacity(len);
        for _ in 0..len {
            let k = K::decode(reader)?;
            let v = V::decode(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

// --- SmolStr ---
#[cfg(feature = "smol_str")]
impl Encoder for SmolStr {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_str(writer, self.as_str())
    }
}

#[cfg(feature = "smol_str")]
impl Decoder for SmolStr {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        Ok(SmolStr::from(read_str(reader)?))
    }
}

// --- serde_json::Value ---
/// Encodes JSON values directly: unsigned/signed numbers use integer tags, the rest `float 64`.
#[cfg(feature = "serde_json")]
impl Encoder for serde_json::Value {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            serde_json::Value::Null => write_nil(writer),
            serde_json::Value::Bool(b) => write_bool(writer, *b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    write_uint(writer, u);
                } else if let Some(i) = n.as_i64() {
                    write_sint(writer, i);
                } else {
                    write_f64(writer, n.as_f64().unwrap_or(f64::NAN));
                }
            }
            serde_json::Value::String(s) => write_str(writer, s)?,
            serde_json::Value::Array(arr) => {
                write_array_header(writer, arr.len())?;
                for item in arr {
                    item.encode(writer)?;
                }
            }
            serde_json::Value::Object(obj) => {
                write_map_header(writer, obj.len())?;
                for (key, value) in obj {
                    write_str(writer, key)?;
                    value.encode(writer)?;
                }
            }
        }
        Ok(())
    }
}

/// Decodes into a JSON value. Map keys must be strings and floats must be finite.
#[cfg(feature = "serde_json")]
impl Decoder for serde_json::Value {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        serde_json::Value::try_from(Value::decode(reader)?)
    }
}

#[cfg(feature = "serde_json")]
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => Value::Map(
                obj.into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts a `Value` into JSON.
///
/// # Errors
/// Returns `TypeMismatch` for binary blobs, non-string map keys and non-finite floats.
#[cfg(feature = "serde_json")]
impl TryFrom<Value> for serde_json::Value {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let json = match value {
            Value::Nil => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(Number::from(i)),
            Value::UInt(u) => serde_json::Value::Number(Number::from(u)),
            Value::Float(f) => serde_json::Value::Number(Number::from_f64(f).ok_or(
                Error::TypeMismatch {
                    expected: "finite float",
                    found: "float",
                },
            )?),
            Value::Str(s) => serde_json::Value::String(s),
            Value::Bin(_) => {
                return Err(Error::TypeMismatch {
                    expected: "JSON value",
                    found: "binary",
                })
            }
            Value::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(serde_json::Value::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Map(pairs) => {
                let mut obj = Map::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = match key {
                        Value::Str(s) => s,
                        other => {
                            return Err(Error::TypeMismatch {
                                expected: "string map key",
                                found: other.type_name(),
                            })
                        }
                    };
                    obj.insert(key, serde_json::Value::try_from(value)?);
                }
                serde_json::Value::Object(obj)
            }
        };
        Ok(json)
    }
}

// --- FxHashMap ---
#[cfg(feature = "fxhash")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for FxHashMap<K, V> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_pairs(self.len(), self, writer)
    }
}

#[cfg(feature = "fxhash")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for FxHashMap<K, V> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = decode_map_len(reader)?;
        let mut map = FxHashMap::with_capacity_and_hasher(len, Default::default());
        for _ in 0..len {
            let k = K::decode(reader)?;
            let v = V::decode(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

// --- AHashMap ---
#[cfg(feature = "ahash")]
impl<K: Encoder + Eq + std::hash::Hash, V: Encoder> Encoder for AHashMap<K, V> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_pairs(self.len(), self.iter(), writer)
    }
}

#[cfg(feature = "ahash")]
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for AHashMap<K, V> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = decode_map_len(reader)?;
        let mut map = AHashMap::with_capacity(len);
        for _ in 0..len {
            let k = K::decode(reader)?;
            let v = V::decode(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}
