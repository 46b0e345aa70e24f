// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Encoder half of the codec.

use crate::{CodecError, Result, Value, MAX_DEPTH};

/// Largest magnitude representable by a CBOR integer head.
const INT_LIMIT: i128 = u64::MAX as i128;

/// Encode a value into a fresh buffer.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(value, &mut out)?;
    Ok(out)
}

/// Append the encoding of `value` to `out`.
///
/// On error `out` may hold a partial item; callers discard it.
pub fn encode_into(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    enc_value(value, out, 0)
}

fn enc_value(v: &Value, out: &mut Vec<u8>, depth: usize) -> Result<()> {
    match v {
        Value::Bool(b) => out.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => out.push(0xf6),
        Value::Undefined => out.push(0xf7),
        Value::Integer(n) => enc_int(*n, out)?,
        Value::Float(f) => {
            out.push(0xfb);
            out.extend_from_slice(&f.to_be_bytes());
        }
        Value::Bytes(b) => {
            write_head(2, b.len() as u64, out);
            out.extend_from_slice(b);
        }
        Value::Text(s) => {
            write_head(3, s.len() as u64, out);
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            enter(depth)?;
            write_head(4, items.len() as u64, out);
            for it in items {
                enc_value(it, out, depth + 1)?;
            }
        }
        Value::Map(entries) => {
            enter(depth)?;
            write_head(5, entries.len() as u64, out);
            for (k, v) in entries {
                match k {
                    Value::Text(_) | Value::Integer(_) => enc_value(k, out, depth + 1)?,
                    other => {
                        return Err(CodecError::UnsupportedType(format!(
                            "map key must be text or integer, got {}",
                            kind_name(other)
                        )))
                    }
                }
                enc_value(v, out, depth + 1)?;
            }
        }
        Value::Tag(tag, inner) => {
            enter(depth)?;
            write_head(6, *tag, out);
            enc_value(inner, out, depth + 1)?;
        }
    }
    Ok(())
}

fn enter(depth: usize) -> Result<()> {
    if depth >= MAX_DEPTH {
        Err(CodecError::DepthExceeded)
    } else {
        Ok(())
    }
}

fn enc_int(n: i128, out: &mut Vec<u8>) -> Result<()> {
    if n >= 0 {
        if n > INT_LIMIT {
            return Err(CodecError::UnsupportedType(format!(
                "integer {n} exceeds 64-bit range"
            )));
        }
        write_head(0, n as u64, out);
    } else {
        // major 1 carries -1 - n
        let m = -1 - n;
        if m > INT_LIMIT {
            return Err(CodecError::UnsupportedType(format!(
                "integer {n} exceeds 64-bit range"
            )));
        }
        write_head(1, m as u64, out);
    }
    Ok(())
}

/// Append the head of a definite-length map with `len` entries.
///
/// Lets a caller stream entries whose values are produced by other writers,
/// such as a [`crate::encode_bitmap`] payload.
pub fn encode_map_header(len: usize, out: &mut Vec<u8>) {
    write_head(5, len as u64, out);
}

/// Write an item head with the shortest argument width.
pub(crate) fn write_head(major: u8, n: u64, out: &mut Vec<u8>) {
    debug_assert!(major <= 7);
    match n {
        0..=23 => out.push((major << 5) | n as u8),
        24..=0xff => {
            out.push((major << 5) | 24);
            out.push(n as u8);
        }
        0x100..=0xffff => {
            out.push((major << 5) | 25);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push((major << 5) | 26);
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
        _ => {
            out.push((major << 5) | 27);
            out.extend_from_slice(&n.to_be_bytes());
        }
    }
}

fn kind_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Undefined => "undefined",
        Value::Bool(_) => "bool",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::Text(_) => "text",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Tag(..) => "tag",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn streamed_map_matches_value_map() {
        let whole = encode(&Value::map().with("a", 1).with("b", Value::Bytes(vec![7]))).unwrap();
        let mut streamed = Vec::new();
        encode_map_header(2, &mut streamed);
        encode_into(&Value::from("a"), &mut streamed).unwrap();
        encode_into(&Value::from(1), &mut streamed).unwrap();
        encode_into(&Value::from("b"), &mut streamed).unwrap();
        encode_into(&Value::Bytes(vec![7]), &mut streamed).unwrap();
        assert_eq!(streamed, whole);
    }

    #[test]
    fn shortest_int_widths() {
        assert_eq!(encode(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(encode(&Value::Integer(24)).unwrap(), vec![0x18, 0x18]);
        assert_eq!(encode(&Value::Integer(255)).unwrap(), vec![0x18, 0xff]);
        assert_eq!(encode(&Value::Integer(256)).unwrap(), vec![0x19, 0x01, 0x00]);
        assert_eq!(
            encode(&Value::Integer(65_536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            encode(&Value::Integer(1 << 32)).unwrap(),
            vec![0x1b, 0, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn negative_ints_use_major_one() {
        assert_eq!(encode(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(encode(&Value::Integer(-25)).unwrap(), vec![0x38, 0x18]);
        assert_eq!(
            encode(&Value::Integer(-(1i128 << 64))).unwrap(),
            vec![0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn ints_outside_64_bits_are_unsupported() {
        assert!(matches!(
            encode(&Value::Integer(1i128 << 64)),
            Err(CodecError::UnsupportedType(_))
        ));
        assert!(matches!(
            encode(&Value::Integer(-(1i128 << 64) - 1)),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn floats_are_always_doubles() {
        assert_eq!(
            encode(&Value::Float(1.5)).unwrap(),
            vec![0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
        // integral floats stay floats
        assert_eq!(encode(&Value::Float(1.0)).unwrap()[0], 0xfb);
    }

    #[test]
    fn map_keys_must_be_text_or_int() {
        let bad = Value::Map(vec![(Value::Bool(true), Value::Null)]);
        assert!(matches!(encode(&bad), Err(CodecError::UnsupportedType(_))));
        let ok = Value::Map(vec![(Value::Integer(7), Value::Null)]);
        assert_eq!(encode(&ok).unwrap(), vec![0xa1, 0x07, 0xf6]);
    }
}
