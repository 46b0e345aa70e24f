// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Decoder half of the codec.

use half::f16;

use crate::{CodecError, Result, Value, MAX_DEPTH};

const BREAK: u8 = 0xff;

/// Decode one item from the front of `bytes`.
///
/// Returns the value and the number of bytes it occupied; anything after that
/// is left for the caller.
pub fn decode(bytes: &[u8]) -> Result<(Value, usize)> {
    let mut reader = Reader::new(bytes);
    let v = reader.value(0)?;
    Ok((v, reader.pos))
}

/// Decode a buffer that must contain exactly one item.
pub fn decode_exact(bytes: &[u8]) -> Result<Value> {
    let (v, used) = decode(bytes)?;
    if used != bytes.len() {
        return Err(CodecError::Trailing(bytes.len() - used));
    }
    Ok(v)
}

/// Argument of an item head.
enum Arg {
    Definite(u64),
    Indefinite,
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(CodecError::UnexpectedEndOfInput)?;
        if end > self.bytes.len() {
            return Err(CodecError::UnexpectedEndOfInput);
        }
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn take_uint(&mut self, len: usize) -> Result<u64> {
        let chunk = self.take(len)?;
        let mut buf = [0u8; 8];
        buf[8 - len..].copy_from_slice(chunk);
        Ok(u64::from_be_bytes(buf))
    }

    fn peek(&self) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEndOfInput)
    }

    /// Read an initial byte and its argument.
    fn head(&mut self) -> Result<(u8, u8, Arg)> {
        let b0 = self.take(1)?[0];
        let major = b0 >> 5;
        let ai = b0 & 0x1f;
        let arg = match ai {
            0..=23 => Arg::Definite(u64::from(ai)),
            24 => Arg::Definite(self.take_uint(1)?),
            25 => Arg::Definite(self.take_uint(2)?),
            26 => Arg::Definite(self.take_uint(4)?),
            27 => Arg::Definite(self.take_uint(8)?),
            31 => Arg::Indefinite,
            _ => {
                return Err(CodecError::MalformedInput(format!(
                    "reserved additional info {ai}"
                )))
            }
        };
        Ok((major, ai, arg))
    }

    /// Convert a definite length to `usize`, refusing counts the input cannot
    /// possibly hold (each element needs at least `min_item` bytes).
    fn length(&self, n: u64, min_item: usize) -> Result<usize> {
        let len = usize::try_from(n).map_err(|_| CodecError::MalformedLength(n))?;
        if len.saturating_mul(min_item) > self.remaining() {
            return Err(CodecError::MalformedLength(n));
        }
        Ok(len)
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        let (major, ai, arg) = self.head()?;
        match (major, arg) {
            (0, Arg::Definite(n)) => Ok(Value::Integer(i128::from(n))),
            (1, Arg::Definite(n)) => Ok(Value::Integer(-1 - i128::from(n))),
            (2, arg) => self.string_bytes(2, arg).map(Value::Bytes),
            (3, arg) => {
                let raw = self.string_bytes(3, arg)?;
                String::from_utf8(raw)
                    .map(Value::Text)
                    .map_err(|e| CodecError::MalformedInput(e.to_string()))
            }
            (4, arg) => {
                enter(depth)?;
                let mut items = Vec::new();
                match arg {
                    Arg::Definite(n) => {
                        let len = self.length(n, 1)?;
                        items.reserve(len);
                        for _ in 0..len {
                            items.push(self.value(depth + 1)?);
                        }
                    }
                    Arg::Indefinite => {
                        while !self.at_break()? {
                            items.push(self.value(depth + 1)?);
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            (5, arg) => {
                enter(depth)?;
                let mut entries = Vec::new();
                match arg {
                    Arg::Definite(n) => {
                        let len = self.length(n, 2)?;
                        entries.reserve(len);
                        for _ in 0..len {
                            entries.push(self.entry(depth + 1)?);
                        }
                    }
                    Arg::Indefinite => {
                        while !self.at_break()? {
                            entries.push(self.entry(depth + 1)?);
                        }
                    }
                }
                Ok(Value::Map(entries))
            }
            (6, Arg::Definite(tag)) => {
                enter(depth)?;
                let inner = self.value(depth + 1)?;
                Ok(Value::Tag(tag, Box::new(inner)))
            }
            (7, arg) => self.simple(ai, arg),
            (m, Arg::Indefinite) => Err(CodecError::MalformedInput(format!(
                "indefinite length not allowed for major type {m}"
            ))),
            (m, Arg::Definite(_)) => Err(CodecError::MalformedInput(format!(
                "unknown major type {m}"
            ))),
        }
    }

    fn entry(&mut self, depth: usize) -> Result<(Value, Value)> {
        let key = self.value(depth)?;
        if !matches!(key, Value::Text(_) | Value::Integer(_)) {
            return Err(CodecError::MalformedInput(
                "map key must be text or integer".into(),
            ));
        }
        let val = self.value(depth)?;
        Ok((key, val))
    }

    /// Consume a break marker if one is next.
    fn at_break(&mut self) -> Result<bool> {
        if self.peek()? == BREAK {
            self.pos += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn string_bytes(&mut self, major: u8, arg: Arg) -> Result<Vec<u8>> {
        match arg {
            Arg::Definite(n) => {
                let len = usize::try_from(n).map_err(|_| CodecError::MalformedLength(n))?;
                Ok(self.take(len)?.to_vec())
            }
            Arg::Indefinite => {
                let mut out = Vec::new();
                while !self.at_break()? {
                    let (chunk_major, _, chunk_arg) = self.head()?;
                    match (chunk_major == major, chunk_arg) {
                        (true, Arg::Definite(n)) => {
                            let len =
                                usize::try_from(n).map_err(|_| CodecError::MalformedLength(n))?;
                            out.extend_from_slice(self.take(len)?);
                        }
                        _ => {
                            return Err(CodecError::MalformedInput(
                                "indefinite string chunk has wrong type".into(),
                            ))
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn simple(&mut self, ai: u8, arg: Arg) -> Result<Value> {
        match (ai, arg) {
            (20, _) => Ok(Value::Bool(false)),
            (21, _) => Ok(Value::Bool(true)),
            (22, _) => Ok(Value::Null),
            (23, _) => Ok(Value::Undefined),
            (25, Arg::Definite(bits)) => Ok(Value::Float(f16::from_bits(bits as u16).to_f64())),
            (26, Arg::Definite(bits)) => Ok(Value::Float(f64::from(f32::from_bits(bits as u32)))),
            (27, Arg::Definite(bits)) => Ok(Value::Float(f64::from_bits(bits))),
            (31, _) => Err(CodecError::MalformedInput("unexpected break".into())),
            (other, _) => Err(CodecError::MalformedInput(format!(
                "unsupported simple value {other}"
            ))),
        }
    }
}

fn enter(depth: usize) -> Result<()> {
    if depth >= MAX_DEPTH {
        Err(CodecError::DepthExceeded)
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reports_bytes_consumed() {
        let (v, used) = decode(&[0x01, 0x02]).unwrap();
        assert_eq!(v, Value::Integer(1));
        assert_eq!(used, 1);
        assert_eq!(decode_exact(&[0x01, 0x02]), Err(CodecError::Trailing(1)));
    }

    #[test]
    fn indefinite_array_and_map() {
        let (v, used) = decode(&[0x9f, 0x01, 0x02, 0xff]).unwrap();
        assert_eq!(v, Value::Array(vec![Value::Integer(1), Value::Integer(2)]));
        assert_eq!(used, 4);

        let v = decode_exact(&[0xbf, 0x61, 0x61, 0x01, 0xff]).unwrap();
        assert_eq!(v.get("a"), Some(&Value::Integer(1)));
    }

    #[test]
    fn indefinite_text_joins_chunks() {
        let bytes = [0x7f, 0x62, b'h', b'o', 0x61, b'l', 0xff];
        assert_eq!(decode_exact(&bytes).unwrap(), Value::Text("hol".into()));
        // a byte-string chunk inside a text string is malformed
        let bad = [0x7f, 0x41, b'h', 0xff];
        assert!(matches!(
            decode_exact(&bad),
            Err(CodecError::MalformedInput(_))
        ));
    }

    #[test]
    fn accepts_short_floats() {
        assert_eq!(decode_exact(&[0xf9, 0x3c, 0x00]).unwrap(), Value::Float(1.0));
        assert_eq!(
            decode_exact(&[0xfa, 0x3f, 0xc0, 0x00, 0x00]).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn truncated_input_is_unexpected_end() {
        assert_eq!(decode(&[]), Err(CodecError::UnexpectedEndOfInput));
        assert_eq!(decode(&[0x19, 0x01]), Err(CodecError::UnexpectedEndOfInput));
        assert_eq!(
            decode(&[0x43, 0x01, 0x02]),
            Err(CodecError::UnexpectedEndOfInput)
        );
        assert_eq!(decode(&[0x9f, 0x01]), Err(CodecError::UnexpectedEndOfInput));
    }

    #[test]
    fn oversized_counts_are_malformed_lengths() {
        // array claiming 2^32 items with one byte of payload
        let bytes = [0x9a, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert_eq!(decode(&bytes), Err(CodecError::MalformedLength(0xffff_ffff)));
    }

    #[test]
    fn stray_break_and_reserved_info_are_malformed() {
        assert!(matches!(decode(&[0xff]), Err(CodecError::MalformedInput(_))));
        assert!(matches!(decode(&[0x1c]), Err(CodecError::MalformedInput(_))));
        assert!(matches!(decode(&[0x1f]), Err(CodecError::MalformedInput(_))));
    }

    #[test]
    fn deep_input_stops_at_limit_without_recursing_further() {
        let bytes = vec![0x81u8; 100_000];
        assert_eq!(decode(&bytes), Err(CodecError::DepthExceeded));
    }
}
