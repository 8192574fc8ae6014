//! Property-based tests for the round-trip law, minimal tag selection and truncation handling.

use msgpack_value::{decode_from_slice, to_vec, Error, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::UInt),
        any::<f64>().prop_map(Value::Float),
        ".{0,40}".prop_map(Value::Str),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bin),
    ];
    leaf.prop_recursive(4, 64, 20, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..20).prop_map(Value::Array),
            prop::collection::vec((inner.clone(), inner), 0..20).prop_map(Value::Map),
        ]
    })
}

fn uint_len(v: u64) -> usize {
    match v {
        0..=0x7f => 1,
        0x80..=0xff => 2,
        0x100..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn sint_len(v: i64) -> usize {
    if v >= 0 {
        uint_len(v as u64)
    } else if v >= -32 {
        1
    } else if v >= i8::MIN as i64 {
        2
    } else if v >= i16::MIN as i64 {
        3
    } else if v >= i32::MIN as i64 {
        5
    } else {
        9
    }
}

fn str_header_len(len: usize) -> usize {
    match len {
        0..=31 => 1,
        32..=0xff => 2,
        0x100..=0xffff => 3,
        _ => 5,
    }
}

proptest! {
    #[test]
    fn prop_roundtrip(value in arb_value()) {
        let bytes = to_vec(&value).unwrap();
        let (decoded, consumed) = decode_from_slice(&bytes).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, value);
    }

    #[test]
    fn prop_signed_minimal(v in any::<i64>()) {
        prop_assert_eq!(to_vec(&Value::Int(v)).unwrap().len(), sint_len(v));
    }

    #[test]
    fn prop_unsigned_minimal(v in any::<u64>()) {
        prop_assert_eq!(to_vec(&Value::UInt(v)).unwrap().len(), uint_len(v));
    }

    #[test]
    fn prop_string_minimal(s in "\\PC{0,300}") {
        let len = s.len();
        prop_assert_eq!(to_vec(&Value::Str(s)).unwrap().len(), str_header_len(len) + len);
    }

    #[test]
    fn prop_truncated_input_is_eof(value in arb_value(), cut in any::<prop::sample::Index>()) {
        let bytes = to_vec(&value).unwrap();
        let cut = cut.index(bytes.len());
        let err = decode_from_slice(&bytes[..cut]).unwrap_err();
        prop_assert!(matches!(err, Error::UnexpectedEof { .. }), "{:?}", err);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(input in prop::collection::vec(any::<u8>(), 0..128)) {
        if let Ok((_, consumed)) = decode_from_slice(&input) {
            prop_assert!(consumed <= input.len());
        }
    }
}
