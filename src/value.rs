//! Dynamic value representation for MessagePack data.
//!
//! [`Value`] covers every category this codec reads or writes. Signed and unsigned integers are
//! separate variants because the wire format distinguishes them; callers holding a single numeric
//! type must pick `Int`, `UInt` or `Float` before encoding.
//!
//! ## Integer identity
//!
//! The encoder always picks the smallest tag, and the decoder returns `UInt` for every
//! non-negative integer and `Int` for every negative one, whichever tag carried it. Equality
//! follows the numeric value, so `Value::Int(5) == Value::UInt(5)`.
//!
//! ```rust
//! use msgpack_value::{decode_from_slice, encode, Value};
//!
//! let bytes = encode(&Value::Int(5)).unwrap();
//! let (decoded, _) = decode_from_slice(&bytes).unwrap();
//! assert_eq!(decoded, Value::UInt(5));
//! assert_eq!(decoded, Value::Int(5));
//! ```

use crate::core::*;
use crate::options::{DecodeOptions, EncodeOptions, FloatPolicy};
use crate::{Decoder, Encoder, Error, Result};
use bytes::{Buf, Bytes, BytesMut};

/// A dynamically-typed MessagePack value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    /// Key/value pairs in insertion order. Keys are not required to be unique.
    Map(Vec<(Value, Value)>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).map_or(false, |a| a == *b)
            }
            // NaN payloads round-trip unchanged; treat any two NaNs as equal.
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bin(a), Value::Bin(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Builds an integer value, `UInt` when non-negative and `Int` otherwise.
    ///
    /// # Errors
    /// Returns `OutOfRange` outside `i64::MIN..=u64::MAX`.
    pub fn from_integer(value: i128) -> Result<Value> {
        if let Ok(v) = u64::try_from(value) {
            Ok(Value::UInt(v))
        } else if let Ok(v) = i64::try_from(value) {
            Ok(Value::Int(v))
        } else {
            Err(Error::OutOfRange(format!(
                "{} is outside the 64-bit integer range",
                value
            )))
        }
    }

    /// Category name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bin(_) => "binary",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer as `i64` if it fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Returns the integer as `u64` if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            Value::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns floats as-is and integers converted to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Looks up the first pair whose key is the string `key`.
    ///
    /// ```rust
    /// use msgpack_value::Value;
    ///
    /// let map = Value::Map(vec![(Value::from("id"), Value::from(7u32))]);
    /// assert_eq!(map.get("id"), Some(&Value::UInt(7)));
    /// assert_eq!(map.get("name"), None);
    /// ```
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Encodes this value with explicit options.
    pub fn encode_with(&self, writer: &mut BytesMut, options: &EncodeOptions) -> Result<()> {
        match self {
            Value::Nil => write_nil(writer),
            Value::Bool(b) => write_bool(writer, *b),
            Value::Int(i) => write_sint(writer, *i),
            Value::UInt(u) => write_uint(writer, *u),
            Value::Float(f) => match options.float {
                FloatPolicy::Always64 => write_f64(writer, *f),
                FloatPolicy::Compact => write_f64_compact(writer, *f),
            },
            Value::Str(s) => write_str(writer, s)?,
            Value::Bin(b) => write_bin(writer, b)?,
            Value::Array(items) => {
                write_array_header(writer, items.len())?;
                for item in items {
                    item.encode_with(writer, options)?;
                }
            }
            Value::Map(pairs) => {
                write_map_header(writer, pairs.len())?;
                for (key, value) in pairs {
                    key.encode_with(writer, options)?;
                    value.encode_with(writer, options)?;
                }
            }
        }
        Ok(())
    }

    /// Decodes one value with explicit options, advancing `reader` past it.
    ///
    /// Unlike [`crate::decode_with_options`], `reader` may be partially advanced on error.
    pub fn decode_with(reader: &mut Bytes, options: &DecodeOptions) -> Result<Value> {
        read_value(reader, options)
    }
}

/// Checks a declared length against the configured limit.
fn check_len(len: usize, options: &DecodeOptions) -> Result<usize> {
    if len > options.max_len {
        return Err(Error::LengthOverflow {
            len: len as u64,
            limit: options.max_len as u64,
        });
    }
    Ok(len)
}

fn enter_container(depth: usize, options: &DecodeOptions) -> Result<()> {
    if depth >= options.max_depth {
        return Err(Error::DepthLimitExceeded(options.max_depth));
    }
    Ok(())
}

/// Upper bound on elements reserved up front for one container; longer ones grow as they fill.
const MAX_PREALLOC: usize = 4096;

/// A container still collecting its children.
enum Frame {
    Array {
        items: Vec<Value>,
        len: usize,
    },
    Map {
        pairs: Vec<(Value, Value)>,
        len: usize,
        key: Option<Value>,
    },
}

impl Frame {
    /// Adds a finished child; returns true once the container is full.
    fn push(&mut self, value: Value) -> bool {
        match self {
            Frame::Array { items, len } => {
                items.push(value);
                items.len() == *len
            }
            Frame::Map { pairs, len, key } => match key.take() {
                None => {
                    *key = Some(value);
                    false
                }
                Some(k) => {
                    pairs.push((k, value));
                    pairs.len() == *len
                }
            },
        }
    }

    fn into_value(self) -> Value {
        match self {
            Frame::Array { items, .. } => Value::Array(items),
            Frame::Map { pairs, .. } => Value::Map(pairs),
        }
    }
}

/// Hands a finished value to the innermost open container, closing every container it
/// completes. Returns the top-level value once no container is left open.
fn attach(stack: &mut Vec<Frame>, mut value: Value) -> Option<Value> {
    while let Some(frame) = stack.last_mut() {
        if !frame.push(value) {
            return None;
        }
        value = stack.pop()?.into_value();
    }
    Some(value)
}

/// Decodes one value with an explicit work stack, so nesting depth costs heap rather than
/// call frames. The stack length is the depth of the next value read.
pub(crate) fn read_value<B: Buf>(reader: &mut B, options: &DecodeOptions) -> Result<Value> {
    let mut stack: Vec<Frame> = Vec::new();
    loop {
        let marker = read_marker(reader)?;
        let value = match marker {
            Marker::Nil => Value::Nil,
            Marker::False => Value::Bool(false),
            Marker::True => Value::Bool(true),
            m if m.is_integer() => Value::from_integer(read_integer_body(m, reader)?)?,
            Marker::F32 | Marker::F64 => Value::Float(read_float_body(marker, reader)?),
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                let len = check_len(read_length(marker, reader)?, options)?;
                Value::Str(read_str_payload(reader, len)?)
            }
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
                let len = check_len(read_length(marker, reader)?, options)?;
                Value::Bin(read_payload_vec(reader, len)?)
            }
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
                enter_container(stack.len(), options)?;
                let len = check_len(read_length(marker, reader)?, options)?;
                ensure_elements(reader, len)?;
                if len == 0 {
                    Value::Array(Vec::new())
                } else {
                    stack.push(Frame::Array {
                        items: Vec::with_capacity(len.min(MAX_PREALLOC)),
                        len,
                    });
                    continue;
                }
            }
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
                enter_container(stack.len(), options)?;
                let len = check_len(read_length(marker, reader)?, options)?;
                ensure_elements(reader, len.saturating_mul(2))?;
                if len == 0 {
                    Value::Map(Vec::new())
                } else {
                    stack.push(Frame::Map {
                        pairs: Vec::with_capacity(len.min(MAX_PREALLOC)),
                        len,
                        key: None,
                    });
                    continue;
                }
            }
            other => return Err(Error::InvalidTag(other.to_u8())),
        };
        if let Some(done) = attach(&mut stack, value) {
            return Ok(done);
        }
    }
}

/// Encodes a `Value` with default options (every float as `float 64`).
impl Encoder for Value {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        self.encode_with(writer, &EncodeOptions::default())
    }
}

/// Decodes a `Value` with default limits.
impl Decoder for Value {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        read_value(reader, &DecodeOptions::default())
    }
}

// --- Conversions ---

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::UInt(v as u64)
                }
            }
        )*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bin(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Vec<(Value, Value)>> for Value {
    fn from(v: Vec<(Value, Value)>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::Array(iter.into_iter().collect())
    }
}

impl FromIterator<(Value, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Value::Map(iter.into_iter().collect())
    }
}
