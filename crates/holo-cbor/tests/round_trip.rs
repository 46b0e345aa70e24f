// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Round-trip, depth-limit and interop checks for the object codec.

use holo_cbor::{decode, decode_exact, encode, CodecError, Value as Cbor, MAX_DEPTH};
use proptest::prelude::*;

fn arb_key() -> impl Strategy<Value = Cbor> {
    prop_oneof![
        any::<i64>().prop_map(|n| Cbor::Integer(n.into())),
        "[a-zA-Z_]{0,12}".prop_map(Cbor::Text),
    ]
}

fn arb_value() -> impl Strategy<Value = Cbor> {
    let leaf = prop_oneof![
        Just(Cbor::Null),
        Just(Cbor::Undefined),
        any::<bool>().prop_map(Cbor::Bool),
        any::<u64>().prop_map(|n| Cbor::Integer(n.into())),
        any::<i64>().prop_map(|n| Cbor::Integer(n.into())),
        any::<f64>()
            .prop_filter("NaN never compares equal", |f| !f.is_nan())
            .prop_map(Cbor::Float),
        prop::collection::vec(any::<u8>(), 0..48).prop_map(Cbor::Bytes),
        ".{0,16}".prop_map(Cbor::Text),
    ];
    leaf.prop_recursive(10, 256, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Cbor::Array),
            prop::collection::vec((arb_key(), inner.clone()), 0..6).prop_map(Cbor::Map),
            (0u64..100_000, inner).prop_map(|(t, v)| Cbor::Tag(t, Box::new(v))),
        ]
    })
}

fn nested(depth: usize) -> Cbor {
    let mut v = Cbor::Integer(1);
    for i in 0..depth {
        v = if i % 2 == 0 {
            Cbor::Array(vec![v])
        } else {
            Cbor::map().with("k", v)
        };
    }
    v
}

proptest! {
    #[test]
    fn decode_inverts_encode(v in arb_value()) {
        let bytes = encode(&v).unwrap();
        let (back, used) = decode(&bytes).unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(back, v);
    }

    #[test]
    fn decoding_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = decode(&bytes);
    }
}

#[test]
fn nesting_up_to_ten_round_trips() {
    for depth in 0..=10 {
        let v = nested(depth);
        assert_eq!(decode_exact(&encode(&v).unwrap()).unwrap(), v);
    }
}

#[test]
fn nesting_at_the_limit_is_accepted() {
    let v = nested(MAX_DEPTH);
    assert_eq!(decode_exact(&encode(&v).unwrap()).unwrap(), v);
}

#[test]
fn encoding_past_the_limit_fails() {
    assert_eq!(encode(&nested(MAX_DEPTH + 1)), Err(CodecError::DepthExceeded));
}

#[test]
fn decoding_past_the_limit_fails() {
    // MAX_DEPTH + 1 single-element arrays around a 0
    let mut bytes = vec![0x81u8; MAX_DEPTH + 1];
    bytes.push(0x00);
    assert_eq!(decode(&bytes), Err(CodecError::DepthExceeded));
}

#[test]
fn hide_command_golden_vector() {
    let cmd = Cbor::map()
        .with(
            "cmd",
            Cbor::map().with("hide", Cbor::map().with("targetDisplay", 0u32)),
        )
        .with("bin", Vec::<u8>::new());
    let bytes = encode(&cmd).unwrap();
    let expected = hex::decode(concat!(
        "a2",
        "63636d64",
        "a1",
        "6468696465",
        "a1",
        "6d746172676574446973706c6179",
        "00",
        "6362696e",
        "40",
    ))
    .unwrap();
    assert_eq!(bytes, expected);
}

#[test]
fn show_command_golden_vector() {
    let cmd = Cbor::map()
        .with(
            "cmd",
            Cbor::map().with("show", Cbor::map().with("targetDisplay", 1u32)),
        )
        .with("bin", vec![0x01u8, 0x02]);
    let bytes = encode(&cmd).unwrap();
    let expected = hex::decode(concat!(
        "a2",
        "63636d64",
        "a1",
        "6473686f77",
        "a1",
        "6d746172676574446973706c6179",
        "01",
        "6362696e",
        "420102",
    ))
    .unwrap();
    assert_eq!(bytes, expected);
}

#[test]
fn output_is_standard_cbor() {
    let v = Cbor::map()
        .with("version", "1.2.4")
        .with("error", 0u8)
        .with("aspect", 0.75f64)
        .with("neg", -300i32)
        .with("list", vec![Cbor::Bool(true), Cbor::Null])
        .with("bin", vec![1u8, 2, 3]);
    let bytes = encode(&v).unwrap();
    let parsed: ciborium::value::Value = ciborium::de::from_reader(&bytes[..]).unwrap();
    let entries = parsed.as_map().unwrap();
    assert_eq!(entries.len(), 6);
    assert_eq!(entries[0].0.as_text(), Some("version"));
    assert_eq!(entries[0].1.as_text(), Some("1.2.4"));
    assert_eq!(entries[2].1.as_float(), Some(0.75));
    assert_eq!(
        entries[3].1.as_integer().map(i128::from),
        Some(-300i128)
    );
    assert_eq!(entries[5].1.as_bytes().map(Vec::as_slice), Some(&[1u8, 2, 3][..]));
}

#[test]
fn reads_what_ciborium_writes() {
    let src = ciborium::value::Value::Map(vec![
        (
            ciborium::value::Value::Text("error".into()),
            ciborium::value::Value::Integer(0.into()),
        ),
        (
            ciborium::value::Value::Text("version".into()),
            ciborium::value::Value::Text("1.2.4".into()),
        ),
    ]);
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&src, &mut bytes).unwrap();
    let v = decode_exact(&bytes).unwrap();
    assert_eq!(v.get("error").and_then(Cbor::as_integer), Some(0));
    assert_eq!(v.get("version").and_then(Cbor::as_text), Some("1.2.4"));
}
