use crate::options::DEFAULT_MAX_DEPTH;
use crate::*;
use bytes::{Buf, BufMut};
use std::collections::{BTreeMap, HashMap};

/// MessagePack tag bytes.
///
/// These tags are written as the first byte of each encoded value to identify its category and,
/// for the fixed forms, its value or length. Tags are the compatibility contract of the wire format.
///
/// | Range         | Category                       |
/// |---------------|--------------------------------|
/// | `0x00..=0x7f` | positive fixint (0..=127)      |
/// | `0x80..=0x8f` | fixmap (0..=15 pairs)          |
/// | `0x90..=0x9f` | fixarray (0..=15 elements)     |
/// | `0xa0..=0xbf` | fixstr (0..=31 bytes)          |
/// | `0xc0..=0xdf` | single-byte tags listed below  |
/// | `0xe0..=0xff` | negative fixint (-32..=-1)     |
pub const TAG_POSITIVE_FIXINT_MAX: u8 = 0x7f;
pub const TAG_FIXMAP_BASE: u8 = 0x80;
pub const TAG_FIXARRAY_BASE: u8 = 0x90;
pub const TAG_FIXSTR_BASE: u8 = 0xa0;
pub const TAG_NIL: u8 = 0xc0;
///< Never assigned by the format
pub const TAG_RESERVED: u8 = 0xc1;
pub const TAG_FALSE: u8 = 0xc2;
pub const TAG_TRUE: u8 = 0xc3;
pub const TAG_BIN8: u8 = 0xc4;
pub const TAG_BIN16: u8 = 0xc5;
pub const TAG_BIN32: u8 = 0xc6;
pub const TAG_EXT8: u8 = 0xc7;
pub const TAG_EXT16: u8 = 0xc8;
pub const TAG_EXT32: u8 = 0xc9;
pub const TAG_F32: u8 = 0xca;
pub const TAG_F64: u8 = 0xcb;
pub const TAG_U8: u8 = 0xcc;
pub const TAG_U16: u8 = 0xcd;
pub const TAG_U32: u8 = 0xce;
pub const TAG_U64: u8 = 0xcf;
pub const TAG_I8: u8 = 0xd0;
pub const TAG_I16: u8 = 0xd1;
pub const TAG_I32: u8 = 0xd2;
pub const TAG_I64: u8 = 0xd3;
pub const TAG_FIXEXT1: u8 = 0xd4;
pub const TAG_FIXEXT2: u8 = 0xd5;
pub const TAG_FIXEXT4: u8 = 0xd6;
pub const TAG_FIXEXT8: u8 = 0xd7;
pub const TAG_FIXEXT16: u8 = 0xd8;
pub const TAG_STR8: u8 = 0xd9;
pub const TAG_STR16: u8 = 0xda;
pub const TAG_STR32: u8 = 0xdb;
pub const TAG_ARRAY16: u8 = 0xdc;
pub const TAG_ARRAY32: u8 = 0xdd;
pub const TAG_MAP16: u8 = 0xde;
pub const TAG_MAP32: u8 = 0xdf;
pub const TAG_NEGATIVE_FIXINT_MIN: u8 = 0xe0;

/// Largest string byte length carried in a fixstr tag.
pub const FIXSTR_MAX_LEN: usize = 0x1f;
/// Largest element/pair count carried in a fixarray or fixmap tag.
pub const FIXCOLLECTION_MAX_LEN: usize = 0x0f;
/// Smallest integer carried in a negative fixint tag.
pub const NEGATIVE_FIXINT_MIN: i64 = -32;

/// A decoded tag byte.
///
/// Every one of the 256 byte values maps to exactly one marker, so dispatch never guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    PositiveFixInt(u8),
    FixMap(u8),
    FixArray(u8),
    FixStr(u8),
    Nil,
    Reserved,
    False,
    True,
    Bin8,
    Bin16,
    Bin32,
    Ext8,
    Ext16,
    Ext32,
    F32,
    F64,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    FixExt1,
    FixExt2,
    FixExt4,
    FixExt8,
    FixExt16,
    Str8,
    Str16,
    Str32,
    Array16,
    Array32,
    Map16,
    Map32,
    NegativeFixInt(i8),
}

const fn classify(byte: u8) -> Marker {
    match byte {
        0x00..=TAG_POSITIVE_FIXINT_MAX => Marker::PositiveFixInt(byte),
        0x80..=0x8f => Marker::FixMap(byte & 0x0f),
        0x90..=0x9f => Marker::FixArray(byte & 0x0f),
        0xa0..=0xbf => Marker::FixStr(byte & 0x1f),
        TAG_NIL => Marker::Nil,
        TAG_RESERVED => Marker::Reserved,
        TAG_FALSE => Marker::False,
        TAG_TRUE => Marker::True,
        TAG_BIN8 => Marker::Bin8,
        TAG_BIN16 => Marker::Bin16,
        TAG_BIN32 => Marker::Bin32,
        TAG_EXT8 => Marker::Ext8,
        TAG_EXT16 => Marker::Ext16,
        TAG_EXT32 => Marker::Ext32,
        TAG_F32 => Marker::F32,
        TAG_F64 => Marker::F64,
        TAG_U8 => Marker::U8,
        TAG_U16 => Marker::U16,
        TAG_U32 => Marker::U32,
        TAG_U64 => Marker::U64,
        TAG_I8 => Marker::I8,
        TAG_I16 => Marker::I16,
        TAG_I32 => Marker::I32,
        TAG_I64 => Marker::I64,
        TAG_FIXEXT1 => Marker::FixExt1,
        TAG_FIXEXT2 => Marker::FixExt2,
        TAG_FIXEXT4 => Marker::FixExt4,
        TAG_FIXEXT8 => Marker::FixExt8,
        TAG_FIXEXT16 => Marker::FixExt16,
        TAG_STR8 => Marker::Str8,
        TAG_STR16 => Marker::Str16,
        TAG_STR32 => Marker::Str32,
        TAG_ARRAY16 => Marker::Array16,
        TAG_ARRAY32 => Marker::Array32,
        TAG_MAP16 => Marker::Map16,
        TAG_MAP32 => Marker::Map32,
        TAG_NEGATIVE_FIXINT_MIN..=0xff => Marker::NegativeFixInt(byte as i8),
    }
}

const fn build_markers() -> [Marker; 256] {
    let mut table = [Marker::Reserved; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = classify(i as u8);
        i += 1;
    }
    table
}

/// Dispatch table keyed by the full tag byte.
static MARKERS: [Marker; 256] = build_markers();

impl Marker {
    /// Looks up the marker for a tag byte.
    #[inline]
    pub fn from_u8(byte: u8) -> Marker {
        MARKERS[byte as usize]
    }

    /// Returns the tag byte for this marker.
    pub fn to_u8(self) -> u8 {
        match self {
            Marker::PositiveFixInt(n) => n,
            Marker::FixMap(n) => TAG_FIXMAP_BASE | n,
            Marker::FixArray(n) => TAG_FIXARRAY_BASE | n,
            Marker::FixStr(n) => TAG_FIXSTR_BASE | n,
            Marker::Nil => TAG_NIL,
            Marker::Reserved => TAG_RESERVED,
            Marker::False => TAG_FALSE,
            Marker::True => TAG_TRUE,
            Marker::Bin8 => TAG_BIN8,
            Marker::Bin16 => TAG_BIN16,
            Marker::Bin32 => TAG_BIN32,
            Marker::Ext8 => TAG_EXT8,
            Marker::Ext16 => TAG_EXT16,
            Marker::Ext32 => TAG_EXT32,
            Marker::F32 => TAG_F32,
            Marker::F64 => TAG_F64,
            Marker::U8 => TAG_U8,
            Marker::U16 => TAG_U16,
            Marker::U32 => TAG_U32,
            Marker::U64 => TAG_U64,
            Marker::I8 => TAG_I8,
            Marker::I16 => TAG_I16,
            Marker::I32 => TAG_I32,
            Marker::I64 => TAG_I64,
            Marker::FixExt1 => TAG_FIXEXT1,
            Marker::FixExt2 => TAG_FIXEXT2,
            Marker::FixExt4 => TAG_FIXEXT4,
            Marker::FixExt8 => TAG_FIXEXT8,
            Marker::FixExt16 => TAG_FIXEXT16,
            Marker::Str8 => TAG_STR8,
            Marker::Str16 => TAG_STR16,
            Marker::Str32 => TAG_STR32,
            Marker::Array16 => TAG_ARRAY16,
            Marker::Array32 => TAG_ARRAY32,
            Marker::Map16 => TAG_MAP16,
            Marker::Map32 => TAG_MAP32,
            Marker::NegativeFixInt(n) => n as u8,
        }
    }

    /// Human-readable category name, used in error messages.
    pub fn type_name(self) -> &'static str {
        match self {
            Marker::Nil => "nil",
            Marker::False | Marker::True => "bool",
            Marker::PositiveFixInt(_)
            | Marker::NegativeFixInt(_)
            | Marker::U8
            | Marker::U16
            | Marker::U32
            | Marker::U64
            | Marker::I8
            | Marker::I16
            | Marker::I32
            | Marker::I64 => "integer",
            Marker::F32 | Marker::F64 => "float",
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => "string",
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => "binary",
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => "array",
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => "map",
            Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32
            | Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16 => "extension",
            Marker::Reserved => "reserved",
        }
    }

    /// Returns true for integer tags of any width or sign.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Marker::PositiveFixInt(_)
                | Marker::NegativeFixInt(_)
                | Marker::U8
                | Marker::U16
                | Marker::U32
                | Marker::U64
                | Marker::I8
                | Marker::I16
                | Marker::I32
                | Marker::I64
        )
    }

    /// Returns true for tags this codec never decodes (extension types and `0xc1`).
    pub fn is_unsupported(self) -> bool {
        matches!(
            self,
            Marker::Reserved
                | Marker::Ext8
                | Marker::Ext16
                | Marker::Ext32
                | Marker::FixExt1
                | Marker::FixExt2
                | Marker::FixExt4
                | Marker::FixExt8
                | Marker::FixExt16
        )
    }
}

// --- Writers ---

/// Checks that a string/binary/collection length fits the 32-bit length field.
#[inline]
fn length_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow {
        len: len as u64,
        limit: u32::MAX as u64,
    })
}

/// Writes `nil`.
#[inline]
pub fn write_nil(writer: &mut BytesMut) {
    writer.put_u8(TAG_NIL);
}

/// Writes `true` or `false`.
#[inline]
pub fn write_bool(writer: &mut BytesMut, value: bool) {
    writer.put_u8(if value { TAG_TRUE } else { TAG_FALSE });
}

/// Writes a non-negative integer using the smallest unsigned form.
///
/// - `0..=0x7f` as positive fixint (1 byte)
/// - then `uint 8`, `uint 16`, `uint 32`, `uint 64` with a big-endian payload
pub fn write_uint(writer: &mut BytesMut, value: u64) {
    if value <= TAG_POSITIVE_FIXINT_MAX as u64 {
        writer.put_u8(value as u8);
    } else if value <= u8::MAX as u64 {
        writer.put_u8(TAG_U8);
        writer.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        writer.put_u8(TAG_U16);
        writer.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        writer.put_u8(TAG_U32);
        writer.put_u32(value as u32);
    } else {
        writer.put_u8(TAG_U64);
        writer.put_u64(value);
    }
}

/// Writes a signed integer using the smallest form.
///
/// Non-negative values take the unsigned forms (see [`write_uint`]). Negative values use
/// negative fixint for `-32..=-1`, then `int 8`, `int 16`, `int 32`, `int 64`.
pub fn write_sint(writer: &mut BytesMut, value: i64) {
    if value >= 0 {
        write_uint(writer, value as u64);
    } else if value >= NEGATIVE_FIXINT_MIN {
        writer.put_i8(value as i8);
    } else if value >= i8::MIN as i64 {
        writer.put_u8(TAG_I8);
        writer.put_i8(value as i8);
    } else if value >= i16::MIN as i64 {
        writer.put_u8(TAG_I16);
        writer.put_i16(value as i16);
    } else if value >= i32::MIN as i64 {
        writer.put_u8(TAG_I32);
        writer.put_i32(value as i32);
    } else {
        writer.put_u8(TAG_I64);
        writer.put_i64(value);
    }
}

/// Writes `float 32`.
#[inline]
pub fn write_f32(writer: &mut BytesMut, value: f32) {
    writer.put_u8(TAG_F32);
    writer.put_f32(value);
}

/// Writes `float 64`.
#[inline]
pub fn write_f64(writer: &mut BytesMut, value: f64) {
    writer.put_u8(TAG_F64);
    writer.put_f64(value);
}

/// Writes `float 32` when `value` survives the round trip through `f32` bit-for-bit,
/// otherwise `float 64`.
pub fn write_f64_compact(writer: &mut BytesMut, value: f64) {
    let narrow = value as f32;
    if (narrow as f64).to_bits() == value.to_bits() {
        write_f32(writer, narrow);
    } else {
        write_f64(writer, value);
    }
}

/// Writes a string header for a payload of `len` UTF-8 bytes.
pub fn write_str_header(writer: &mut BytesMut, len: usize) -> Result<()> {
    let len = length_u32(len)?;
    if len as usize <= FIXSTR_MAX_LEN {
        writer.put_u8(TAG_FIXSTR_BASE | len as u8);
    } else if len <= u8::MAX as u32 {
        writer.put_u8(TAG_STR8);
        writer.put_u8(len as u8);
    } else if len <= u16::MAX as u32 {
        writer.put_u8(TAG_STR16);
        writer.put_u16(len as u16);
    } else {
        writer.put_u8(TAG_STR32);
        writer.put_u32(len);
    }
    Ok(())
}

/// Writes a string: header sized by UTF-8 byte length, then the raw bytes.
pub fn write_str(writer: &mut BytesMut, value: &str) -> Result<()> {
    writer.reserve(5 + value.len());
    write_str_header(writer, value.len())?;
    writer.put_slice(value.as_bytes());
    Ok(())
}

/// Writes a binary header for a payload of `len` bytes.
pub fn write_bin_header(writer: &mut BytesMut, len: usize) -> Result<()> {
    let len = length_u32(len)?;
    if len <= u8::MAX as u32 {
        writer.put_u8(TAG_BIN8);
        writer.put_u8(len as u8);
    } else if len <= u16::MAX as u32 {
        writer.put_u8(TAG_BIN16);
        writer.put_u16(len as u16);
    } else {
        writer.put_u8(TAG_BIN32);
        writer.put_u32(len);
    }
    Ok(())
}

/// Writes a binary blob: header, then the raw bytes.
pub fn write_bin(writer: &mut BytesMut, value: &[u8]) -> Result<()> {
    writer.reserve(5 + value.len());
    write_bin_header(writer, value.len())?;
    writer.put_slice(value);
    Ok(())
}

/// Writes an array header for `len` elements. The caller writes the elements next.
pub fn write_array_header(writer: &mut BytesMut, len: usize) -> Result<()> {
    let len = length_u32(len)?;
    if len as usize <= FIXCOLLECTION_MAX_LEN {
        writer.put_u8(TAG_FIXARRAY_BASE | len as u8);
    } else if len <= u16::MAX as u32 {
        writer.put_u8(TAG_ARRAY16);
        writer.put_u16(len as u16);
    } else {
        writer.put_u8(TAG_ARRAY32);
        writer.put_u32(len);
    }
    Ok(())
}

/// Writes a map header for `len` pairs. The caller writes each key followed by its value.
pub fn write_map_header(writer: &mut BytesMut, len: usize) -> Result<()> {
    let len = length_u32(len)?;
    if len as usize <= FIXCOLLECTION_MAX_LEN {
        writer.put_u8(TAG_FIXMAP_BASE | len as u8);
    } else if len <= u16::MAX as u32 {
        writer.put_u8(TAG_MAP16);
        writer.put_u16(len as u16);
    } else {
        writer.put_u8(TAG_MAP32);
        writer.put_u32(len);
    }
    Ok(())
}

// --- Readers ---

/// Fails with `UnexpectedEof` unless at least `n` bytes remain.
#[inline]
pub(crate) fn ensure<B: Buf>(reader: &B, n: usize) -> Result<()> {
    let remaining = reader.remaining();
    if remaining < n {
        return Err(Error::UnexpectedEof {
            needed: n - remaining,
        });
    }
    Ok(())
}

/// Builds the error for a tag that does not belong to the `expected` category.
pub(crate) fn mismatch(expected: &'static str, marker: Marker) -> Error {
    if marker.is_unsupported() {
        Error::InvalidTag(marker.to_u8())
    } else {
        Error::TypeMismatch {
            expected,
            found: marker.type_name(),
        }
    }
}

/// Reads one tag byte.
#[inline]
pub fn read_marker<B: Buf>(reader: &mut B) -> Result<Marker> {
    ensure(reader, 1)?;
    Ok(Marker::from_u8(reader.get_u8()))
}

/// Returns the marker of the next value without consuming it.
#[inline]
pub fn peek_marker(reader: &Bytes) -> Result<Marker> {
    match reader.first() {
        Some(&byte) => Ok(Marker::from_u8(byte)),
        None => Err(Error::UnexpectedEof { needed: 1 }),
    }
}

/// Reads the integer payload that follows an integer `marker`.
///
/// The result is widened to `i128` so both `uint 64` and `int 64` payloads fit.
pub(crate) fn read_integer_body<B: Buf>(marker: Marker, reader: &mut B) -> Result<i128> {
    let value = match marker {
        Marker::PositiveFixInt(n) => n as i128,
        Marker::NegativeFixInt(n) => n as i128,
        Marker::U8 => {
            ensure(reader, 1)?;
            reader.get_u8() as i128
        }
        Marker::U16 => {
            ensure(reader, 2)?;
            reader.get_u16() as i128
        }
        Marker::U32 => {
            ensure(reader, 4)?;
            reader.get_u32() as i128
        }
        Marker::U64 => {
            ensure(reader, 8)?;
            reader.get_u64() as i128
        }
        Marker::I8 => {
            ensure(reader, 1)?;
            reader.get_i8() as i128
        }
        Marker::I16 => {
            ensure(reader, 2)?;
            reader.get_i16() as i128
        }
        Marker::I32 => {
            ensure(reader, 4)?;
            reader.get_i32() as i128
        }
        Marker::I64 => {
            ensure(reader, 8)?;
            reader.get_i64() as i128
        }
        other => return Err(mismatch("integer", other)),
    };
    Ok(value)
}

/// Reads the float payload that follows a float `marker`. `float 32` is widened exactly.
pub(crate) fn read_float_body<B: Buf>(marker: Marker, reader: &mut B) -> Result<f64> {
    match marker {
        Marker::F32 => {
            ensure(reader, 4)?;
            Ok(reader.get_f32() as f64)
        }
        Marker::F64 => {
            ensure(reader, 8)?;
            Ok(reader.get_f64())
        }
        other => Err(mismatch("float", other)),
    }
}

/// Reads the length carried by (or following) a string, binary, array or map `marker`.
pub(crate) fn read_length<B: Buf>(marker: Marker, reader: &mut B) -> Result<usize> {
    let len = match marker {
        Marker::FixStr(n) | Marker::FixArray(n) | Marker::FixMap(n) => n as usize,
        Marker::Str8 | Marker::Bin8 => {
            ensure(reader, 1)?;
            reader.get_u8() as usize
        }
        Marker::Str16 | Marker::Bin16 | Marker::Array16 | Marker::Map16 => {
            ensure(reader, 2)?;
            reader.get_u16() as usize
        }
        Marker::Str32 | Marker::Bin32 | Marker::Array32 | Marker::Map32 => {
            ensure(reader, 4)?;
            let len = reader.get_u32();
            usize::try_from(len).map_err(|_| Error::LengthOverflow {
                len: len as u64,
                limit: usize::MAX as u64,
            })?
        }
        other => return Err(mismatch("length-prefixed value", other)),
    };
    Ok(len)
}

/// Reads a string header and returns the payload byte length.
pub fn read_str_header(reader: &mut Bytes) -> Result<usize> {
    match read_marker(reader)? {
        m @ (Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32) => {
            read_length(m, reader)
        }
        other => Err(mismatch("string", other)),
    }
}

/// Reads a binary header and returns the payload byte length.
pub fn read_bin_header(reader: &mut Bytes) -> Result<usize> {
    match read_marker(reader)? {
        m @ (Marker::Bin8 | Marker::Bin16 | Marker::Bin32) => read_length(m, reader),
        other => Err(mismatch("binary", other)),
    }
}

/// Reads an array header and returns the element count.
pub fn read_array_header(reader: &mut Bytes) -> Result<usize> {
    match read_marker(reader)? {
        m @ (Marker::FixArray(_) | Marker::Array16 | Marker::Array32) => read_length(m, reader),
        other => Err(mismatch("array", other)),
    }
}

/// Reads a map header and returns the pair count.
pub fn read_map_header(reader: &mut Bytes) -> Result<usize> {
    match read_marker(reader)? {
        m @ (Marker::FixMap(_) | Marker::Map16 | Marker::Map32) => read_length(m, reader),
        other => Err(mismatch("map", other)),
    }
}

/// Copies `len` payload bytes into an owned buffer.
pub(crate) fn read_payload_vec<B: Buf>(reader: &mut B, len: usize) -> Result<Vec<u8>> {
    ensure(reader, len)?;
    let mut payload = vec![0; len];
    reader.copy_to_slice(&mut payload);
    Ok(payload)
}

/// Reads `len` payload bytes and validates them as UTF-8.
pub(crate) fn read_str_payload<B: Buf>(reader: &mut B, len: usize) -> Result<String> {
    Ok(String::from_utf8(read_payload_vec(reader, len)?)?)
}

/// Reads `len` payload bytes without copying.
pub(crate) fn read_bin_payload(reader: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure(reader, len)?;
    Ok(reader.split_to(len))
}

/// Checks that `count` elements of at least one byte each can still follow.
///
/// Keeps a forged count from driving a large allocation before any element is read.
#[inline]
pub(crate) fn ensure_elements<B: Buf>(reader: &B, count: usize) -> Result<()> {
    ensure(reader, count)
}

/// Reads a complete string value.
pub fn read_str(reader: &mut Bytes) -> Result<String> {
    let len = read_str_header(reader)?;
    read_str_payload(reader, len)
}

/// Skips one encoded value and returns the number of bytes it occupied.
///
/// On error `reader` is left untouched.
///
/// # Errors
/// Returns an error if the value is truncated, uses an unsupported tag, or nests deeper than
/// the default depth limit.
pub fn skip_value(reader: &mut Bytes) -> Result<usize> {
    let mut cursor = reader.clone();
    skip_one(&mut cursor)?;
    let consumed = reader.len() - cursor.len();
    *reader = cursor;
    Ok(consumed)
}

/// Walks one value without recursion. `pending` holds, per open container, how many
/// child values are still to be skipped.
fn skip_one(reader: &mut Bytes) -> Result<()> {
    let mut pending: Vec<usize> = Vec::new();
    loop {
        let marker = read_marker(reader)?;
        let skip = match marker {
            Marker::Nil
            | Marker::False
            | Marker::True
            | Marker::PositiveFixInt(_)
            | Marker::NegativeFixInt(_) => 0,
            Marker::U8 | Marker::I8 => 1,
            Marker::U16 | Marker::I16 => 2,
            Marker::U32 | Marker::I32 | Marker::F32 => 4,
            Marker::U64 | Marker::I64 | Marker::F64 => 8,
            Marker::FixStr(_)
            | Marker::Str8
            | Marker::Str16
            | Marker::Str32
            | Marker::Bin8
            | Marker::Bin16
            | Marker::Bin32 => read_length(marker, reader)?,
            Marker::FixArray(_)
            | Marker::Array16
            | Marker::Array32
            | Marker::FixMap(_)
            | Marker::Map16
            | Marker::Map32 => {
                if pending.len() >= DEFAULT_MAX_DEPTH {
                    return Err(Error::DepthLimitExceeded(DEFAULT_MAX_DEPTH));
                }
                let len = read_length(marker, reader)?;
                let children = match marker {
                    Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => len.saturating_mul(2),
                    _ => len,
                };
                ensure_elements(reader, children)?;
                if children > 0 {
                    pending.push(children);
                    continue;
                }
                0
            }
            other => return Err(Error::InvalidTag(other.to_u8())),
        };
        ensure(reader, skip)?;
        reader.advance(skip);

        // A value just ended; close every container it completes.
        loop {
            match pending.last_mut() {
                None => return Ok(()),
                Some(remaining) => {
                    *remaining -= 1;
                    if *remaining > 0 {
                        break;
                    }
                }
            }
            pending.pop();
        }
    }
}

// --- bool ---
/// Encodes a `bool` as `0xc3` (true) or `0xc2` (false).
impl Encoder for bool {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_bool(writer, *self);
        Ok(())
    }
}
/// Decodes a `bool`.
///
/// # Errors
/// Returns `TypeMismatch` if the tag is not `true`/`false`.
impl Decoder for bool {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        match read_marker(reader)? {
            Marker::True => Ok(true),
            Marker::False => Ok(false),
            other => Err(mismatch("bool", other)),
        }
    }
}

// --- () ---
/// Encodes the unit type as `nil`.
impl Encoder for () {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_nil(writer);
        Ok(())
    }
}
impl Decoder for () {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        match read_marker(reader)? {
            Marker::Nil => Ok(()),
            other => Err(mismatch("nil", other)),
        }
    }
}

// --- Integer types ---
/// Decodes any integer tag and narrows it to `T`.
fn decode_integer<T: TryFrom<i128>>(reader: &mut Bytes, type_name: &str) -> Result<T> {
    let marker = read_marker(reader)?;
    let value = read_integer_body(marker, reader)?;
    T::try_from(value)
        .map_err(|_| Error::OutOfRange(format!("{} does not fit in {}", value, type_name)))
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(
            /// Encodes with the smallest unsigned MessagePack form.
            impl Encoder for $t {
                fn encode(&self, writer: &mut BytesMut) -> Result<()> {
                    write_uint(writer, *self as u64);
                    Ok(())
                }
            }
            /// Decodes from any integer tag whose value fits the type.
            impl Decoder for $t {
                fn decode(reader: &mut Bytes) -> Result<Self> {
                    decode_integer(reader, stringify!($t))
                }
            }
        )*
    };
}

macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(
            /// Encodes with the smallest MessagePack form; non-negative values use unsigned tags.
            impl Encoder for $t {
                fn encode(&self, writer: &mut BytesMut) -> Result<()> {
                    write_sint(writer, *self as i64);
                    Ok(())
                }
            }
            /// Decodes from any integer tag whose value fits the type.
            impl Decoder for $t {
                fn decode(reader: &mut Bytes) -> Result<Self> {
                    decode_integer(reader, stringify!($t))
                }
            }
        )*
    };
}

impl_unsigned!(u8, u16, u32, u64, usize);
impl_signed!(i8, i16, i32, i64, isize);

/// Encodes a `u128` if it fits in 64 bits.
///
/// # Errors
/// Returns `OutOfRange` for values above `u64::MAX`.
impl Encoder for u128 {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        let value = u64::try_from(*self)
            .map_err(|_| Error::OutOfRange(format!("{} exceeds u64::MAX", self)))?;
        write_uint(writer, value);
        Ok(())
    }
}
impl Decoder for u128 {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        decode_integer(reader, "u128")
    }
}
/// Encodes an `i128` if it lies within `i64::MIN..=u64::MAX`.
///
/// # Errors
/// Returns `OutOfRange` outside that envelope.
impl Encoder for i128 {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        if let Ok(value) = u64::try_from(*self) {
            write_uint(writer, value);
        } else if let Ok(value) = i64::try_from(*self) {
            write_sint(writer, value);
        } else {
            return Err(Error::OutOfRange(format!(
                "{} is outside the 64-bit integer range",
                self
            )));
        }
        Ok(())
    }
}
impl Decoder for i128 {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        decode_integer(reader, "i128")
    }
}

// --- f32/f64 ---
/// Encodes an `f32` as `float 32` (4 bytes, big-endian IEEE 754).
impl Encoder for f32 {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_f32(writer, *self);
        Ok(())
    }
}
/// Decodes an `f32` from `float 32`, `float 64` (with precision loss) or an integer tag.
impl Decoder for f32 {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let marker = read_marker(reader)?;
        match marker {
            Marker::F32 | Marker::F64 => Ok(read_float_body(marker, reader)? as f32),
            m if m.is_integer() => Ok(read_integer_body(m, reader)? as f32),
            other => Err(mismatch("float", other)),
        }
    }
}
/// Encodes an `f64` as `float 64` (8 bytes, big-endian IEEE 754).
impl Encoder for f64 {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_f64(writer, *self);
        Ok(())
    }
}
/// Decodes an `f64` from `float 32`, `float 64` or an integer tag.
impl Decoder for f64 {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let marker = read_marker(reader)?;
        match marker {
            Marker::F32 | Marker::F64 => read_float_body(marker, reader),
            m if m.is_integer() => Ok(read_integer_body(m, reader)? as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

// --- String ---
/// Encodes a string slice; the length class is chosen by UTF-8 byte length.
impl Encoder for str {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_str(writer, self)
    }
}
impl Encoder for String {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_str(writer, self)
    }
}
/// Decodes a `String`, validating UTF-8.
impl Decoder for String {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        read_str(reader)
    }
}

impl<T: Encoder + ?Sized> Encoder for &T {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        (**self).encode(writer)
    }
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        (**self).encode(writer)
    }
}

// --- Bytes ---
/// Encodes `Bytes` as a binary blob.
impl Encoder for Bytes {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        write_bin(writer, self)
    }
}
/// Decodes a binary blob without copying its payload.
impl Decoder for Bytes {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = read_bin_header(reader)?;
        read_bin_payload(reader, len)
    }
}

// --- Option ---
/// Encodes `None` as `nil` and `Some(v)` as `v`.
impl<T: Encoder> Encoder for Option<T> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        match self {
            Some(value) => value.encode(writer),
            None => {
                write_nil(writer);
                Ok(())
            }
        }
    }
}
/// Decodes `nil` as `None`; anything else is decoded as `T`.
impl<T: Decoder> Decoder for Option<T> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        if peek_marker(reader)? == Marker::Nil {
            reader.advance(1);
            return Ok(None);
        }
        T::decode(reader).map(Some)
    }
}

// --- Vec<T> ---
/// Encodes a `Vec<T>` as an array. `Vec<u8>` is written as a binary blob.
///
/// The `u8` check needs `T: 'static`, so a vector of borrowed items such as `Vec<&str>` is
/// encoded through its slice instead: `encode(&words[..])`.
impl<T: Encoder + 'static> Encoder for Vec<T> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        if std::any::TypeId::of::<T>() == std::any::TypeId::of::<u8>() {
            // Safety: We've verified T is u8, so this cast is safe
            let vec_u8 = unsafe { &*(self as *const Vec<T> as *const Vec<u8>) };
            write_bin(writer, vec_u8)
        } else {
            encode_seq(self, writer)
        }
    }
}
/// Decodes a `Vec<T>` from an array. `Vec<u8>` is read from a binary blob.
///
/// Like the encoder, this requires `T: 'static`.
impl<T: Decoder + 'static> Decoder for Vec<T> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        if std::any::TypeId::of::<T>() == std::any::TypeId::of::<u8>() {
            let len = read_bin_header(reader)?;
            let vec_u8 = read_bin_payload(reader, len)?.to_vec();
            // Safety: We've verified T is u8, so this cast is safe
            let mut vec_u8 = std::mem::ManuallyDrop::new(vec_u8);
            let ptr = vec_u8.as_mut_ptr() as *mut T;
            let len = vec_u8.len();
            let cap = vec_u8.capacity();
            unsafe { Ok(Vec::from_raw_parts(ptr, len, cap)) }
        } else {
            let len = read_array_header(reader)?;
            ensure_elements(reader, len)?;
            let mut vec = Vec::with_capacity(len);
            for _ in 0..len {
                vec.push(T::decode(reader)?);
            }
            Ok(vec)
        }
    }
}

/// Encodes a slice as an array.
impl<T: Encoder> Encoder for [T] {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_seq(self, writer)
    }
}

fn encode_seq<T: Encoder>(items: &[T], writer: &mut BytesMut) -> Result<()> {
    write_array_header(writer, items.len())?;
    for item in items {
        item.encode(writer)?;
    }
    Ok(())
}

// --- Maps ---
/// Writes a map header followed by each key and value in iteration order.
pub(crate) fn encode_pairs<'a, K, V, I>(len: usize, pairs: I, writer: &mut BytesMut) -> Result<()>
where
    K: Encoder + 'a,
    V: Encoder + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    write_map_header(writer, len)?;
    for (k, v) in pairs {
        k.encode(writer)?;
        v.encode(writer)?;
    }
    Ok(())
}

/// Reads a map header and checks that the declared pairs can still follow.
pub(crate) fn decode_map_len(reader: &mut Bytes) -> Result<usize> {
    let len = read_map_header(reader)?;
    ensure_elements(reader, len.saturating_mul(2))?;
    Ok(len)
}

/// Encodes a `HashMap` as a map. Pair order follows the map's iteration order.
impl<K: Encoder, V: Encoder> Encoder for HashMap<K, V> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_pairs(self.len(), self, writer)
    }
}
/// Decodes a map; later duplicates of a key replace earlier ones.
impl<K: Decoder + Eq + std::hash::Hash, V: Decoder> Decoder for HashMap<K, V> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = decode_map_len(reader)?;
        let mut map = HashMap::with_capacity(len);
        for _ in 0..len {
            let k = K::decode(reader)?;
            let v = V::decode(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}

/// Encodes a `BTreeMap` as a map in key order.
impl<K: Encoder, V: Encoder> Encoder for BTreeMap<K, V> {
    fn encode(&self, writer: &mut BytesMut) -> Result<()> {
        encode_pairs(self.len(), self, writer)
    }
}
impl<K: Decoder + Ord, V: Decoder> Decoder for BTreeMap<K, V> {
    fn decode(reader: &mut Bytes) -> Result<Self> {
        let len = decode_map_len(reader)?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let k = K::decode(reader)?;
            let v = V::decode(reader)?;
            map.insert(k, v);
        }
        Ok(map)
    }
}
