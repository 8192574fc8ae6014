//! # msgpack-value
//!
//! A compact MessagePack codec for dynamically-typed values.
//!
//! - Encodes [`Value`] trees (nil, bool, signed/unsigned integers, floats, strings, binary,
//!   arrays and insertion-ordered maps) using the smallest MessagePack tag that fits each value
//! - Decodes arbitrary byte streams back into values, rejecting truncated or malformed input
//! - Typed encoding/decoding for primitives and std collections through the [`Encoder`] and
//!   [`Decoder`] traits
//! - Feature-gated support for optional dependencies
//!
//! ## Wire Format
//!
//! The byte layout is the MessagePack tag table (see [`core`]). Extension types (`fixext*`,
//! `ext*`) and the reserved byte `0xc1` are rejected by the decoder with [`Error::InvalidTag`].
//!
//! ## Feature Flags
//!
//! - `indexmap`: Enables encoding/decoding of `IndexMap` as a MessagePack map.
//! - `serde_json`: Enables encoding/decoding of `serde_json::Value` and conversions to/from [`Value`].
//! - `smol_str`: Enables encoding/decoding of `smol_str::SmolStr` as a MessagePack string.
//! - `fxhash`: Enables encoding/decoding of `fxhash::FxHashMap`.
//! - `ahash`: Enables encoding/decoding of `ahash::AHashMap`.

pub mod core;
mod features;
pub mod options;
pub mod value;

use bytes::{Bytes, BytesMut};
use std::string::FromUtf8Error;

pub use options::{DecodeOptions, EncodeOptions, FloatPolicy};
pub use value::Value;

/// Errors that can occur during encoding or decoding operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream ended before a required tag, length field or payload byte could be read.
    #[error("Unexpected end of input: {needed} more byte(s) required")]
    UnexpectedEof { needed: usize },
    /// The leading byte is not assigned to any supported category.
    #[error("Invalid tag byte: 0x{0:02x}")]
    InvalidTag(u8),
    /// A string payload is not valid UTF-8.
    #[error("Invalid UTF-8 in string payload: {0}")]
    InvalidEncoding(#[from] FromUtf8Error),
    /// A declared length exceeds the configured limit or the 32-bit length field.
    #[error("Length {len} exceeds limit {limit}")]
    LengthOverflow { len: u64, limit: u64 },
    /// An integer does not fit the 64-bit envelope or the requested Rust type.
    #[error("Integer out of range: {0}")]
    OutOfRange(String),
    /// Arrays/maps are nested deeper than the configured limit.
    #[error("Nesting depth exceeds limit {0}")]
    DepthLimitExceeded(usize),
    /// Typed decoding found a tag belonging to another category.
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

/// The result type used throughout this crate for encode/decode operations.
///
/// All `Encoder` and `Decoder` trait methods return this type.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for types that can be encoded as MessagePack.
///
/// # Errors
/// Returns [`Error::OutOfRange`] for integers outside the 64-bit envelope and
/// [`Error::LengthOverflow`] for strings, binaries or collections longer than `u32::MAX`.
pub trait Encoder {
    /// Appends the encoded value to `writer`.
    fn encode(&self, writer: &mut BytesMut) -> Result<()>;
}

/// Trait for types that can be decoded from MessagePack.
///
/// Implementations consume exactly one encoded value from the front of `reader`.
pub trait Decoder: Sized {
    /// Decodes one value, advancing `reader` past its bytes.
    fn decode(reader: &mut Bytes) -> Result<Self>;
}

/// Convenience function to encode a value to bytes.
///
/// # Example
/// ```rust
/// use msgpack_value::{encode, Value};
///
/// let bytes = encode(&Value::from(0)).unwrap();
/// assert_eq!(&bytes[..], &[0x00]);
/// ```
pub fn encode<T: Encoder + ?Sized>(value: &T) -> Result<Bytes> {
    let mut writer = BytesMut::new();
    value.encode(&mut writer)?;
    Ok(writer.freeze())
}

/// Encodes a value into a freshly allocated `Vec<u8>`.
pub fn to_vec<T: Encoder + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(encode(value)?.to_vec())
}

/// Encodes a [`Value`] with explicit options.
///
/// # Example
/// ```rust
/// use msgpack_value::{encode_with_options, EncodeOptions, FloatPolicy, Value};
///
/// let options = EncodeOptions::new().with_float_policy(FloatPolicy::Compact);
/// let bytes = encode_with_options(&Value::Float(0.5), &options).unwrap();
/// assert_eq!(bytes.len(), 5);
/// ```
pub fn encode_with_options(value: &Value, options: &EncodeOptions) -> Result<Bytes> {
    let mut writer = BytesMut::new();
    value.encode_with(&mut writer, options)?;
    Ok(writer.freeze())
}

/// Convenience function to decode one value from the front of `reader`.
///
/// On success `reader` is advanced past exactly one value, so concatenated values can be read
/// in sequence. On failure `reader` is left untouched.
///
/// # Example
/// ```rust
/// use msgpack_value::{decode, encode, Value};
///
/// let value = Value::Array(vec![Value::from(-33), Value::from("hello")]);
/// let mut bytes = encode(&value).unwrap();
/// let decoded: Value = decode(&mut bytes).unwrap();
/// assert_eq!(value, decoded);
/// assert!(bytes.is_empty());
/// ```
pub fn decode<T: Decoder>(reader: &mut Bytes) -> Result<T> {
    let mut cursor = reader.clone();
    let value = T::decode(&mut cursor)?;
    *reader = cursor;
    Ok(value)
}

/// Decodes one [`Value`] from the front of `reader` with explicit options.
///
/// Like [`decode`], `reader` only advances when decoding succeeds.
pub fn decode_with_options(reader: &mut Bytes, options: &DecodeOptions) -> Result<Value> {
    let mut cursor = reader.clone();
    let value = Value::decode_with(&mut cursor, options)?;
    *reader = cursor;
    Ok(value)
}

/// Decodes one [`Value`] from the front of `input` and reports how many bytes it occupied.
///
/// The slice is read in place, so walking concatenated values with `&input[offset..]` only
/// copies the payloads of the values themselves.
///
/// # Example
/// ```rust
/// use msgpack_value::{decode_from_slice, Value};
///
/// let (value, consumed) = decode_from_slice(&[0xd0, 0xdf, 0xc0]).unwrap();
/// assert_eq!(value, Value::Int(-33));
/// assert_eq!(consumed, 2);
/// ```
pub fn decode_from_slice(input: &[u8]) -> Result<(Value, usize)> {
    let mut reader = input;
    let value = value::read_value(&mut reader, &DecodeOptions::default())?;
    Ok((value, input.len() - reader.len()))
}
