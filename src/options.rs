//! Configuration options for encoding and decoding.
//!
//! - [`EncodeOptions`]: controls how floats are written
//! - [`DecodeOptions`]: bounds nesting depth and declared lengths on untrusted input
//!
//! ## Examples
//!
//! ```rust
//! use msgpack_value::{DecodeOptions, EncodeOptions, FloatPolicy};
//!
//! let encode = EncodeOptions::new().with_float_policy(FloatPolicy::Compact);
//! let decode = DecodeOptions::new().with_max_depth(32).with_max_len(1 << 20);
//! assert_eq!(decode.max_depth, 32);
//! # let _ = encode;
//! ```

/// Width selection for floating point values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FloatPolicy {
    /// Always emit `float 64` (`0xcb`).
    #[default]
    Always64,
    /// Emit `float 32` (`0xca`) when the value survives the `f32` round trip bit-for-bit.
    Compact,
}

/// Options applied while encoding a [`Value`](crate::Value).
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    pub float: FloatPolicy,
}

impl EncodeOptions {
    /// Creates default options (every float as `float 64`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the float width policy.
    #[must_use]
    pub fn with_float_policy(mut self, float: FloatPolicy) -> Self {
        self.float = float;
        self
    }
}

/// Default limit on array/map nesting while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options applied while decoding a [`Value`](crate::Value).
///
/// Declared lengths are also checked against the bytes actually remaining, so these limits
/// only need to be tightened for inputs where even a fully-present payload is too large.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Maximum array/map nesting depth. The top-level value is at depth 0.
    pub max_depth: usize,
    /// Maximum declared string/binary byte length and array/map element count.
    pub max_len: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            max_len: u32::MAX as usize,
        }
    }
}

impl DecodeOptions {
    /// Creates default options (depth 512, lengths up to `u32::MAX`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the maximum declared length.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}
