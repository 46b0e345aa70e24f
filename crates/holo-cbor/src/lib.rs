// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact CBOR object codec for display-service commands.
//!
//! The codec covers the value kinds the display daemon speaks: null, bool,
//! integers, floats, byte/text strings, arrays, maps and tagged values.
//!
//! Encoding rules:
//! - Integers and lengths use the shortest head (inline, 1, 2, 4 or 8 bytes)
//! - Floats are always written as 8-byte IEEE-754 doubles
//! - Containers are written with definite lengths
//! - Map keys must be text or integers
//!
//! Decoding additionally accepts half/single floats and indefinite-length
//! strings and containers. Both directions refuse to nest deeper than
//! [`MAX_DEPTH`].
//!
//! [`bitmap`] holds the fast path that wraps a dense pixel buffer as a BMP
//! byte string without building an intermediate [`Value`].

#![forbid(unsafe_code)]

pub mod bitmap;
mod decode;
mod encode;
mod value;

pub use bitmap::{bitmap_file, bitmap_len, encode_bitmap, RowOrder, Sample, Shape};
pub use decode::{decode, decode_exact};
pub use encode::{encode, encode_into, encode_map_header};
pub use value::Value;

/// Maximum container nesting accepted by the encoder and decoder.
pub const MAX_DEPTH: usize = 64;

/// Errors produced while encoding or decoding.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The value (or one of its parts) cannot be represented on the wire.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    /// A length prefix is inconsistent with the remaining input.
    #[error("malformed length {0}")]
    MalformedLength(u64),
    /// Bytes do not form a well-formed item.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// Containers are nested deeper than [`MAX_DEPTH`].
    #[error("nesting depth exceeds {}", MAX_DEPTH)]
    DepthExceeded,
    /// A pixel buffer does not match the shape it was described with.
    #[error("pixel buffer holds {actual} samples, shape needs {expected}")]
    ShapeMismatch {
        /// Samples implied by `height * width * channels`.
        expected: usize,
        /// Samples actually supplied.
        actual: usize,
    },
    /// Input continues after a complete value.
    #[error("{0} trailing bytes after value")]
    Trailing(usize),
}

/// Codec result alias.
pub type Result<T> = std::result::Result<T, CodecError>;
