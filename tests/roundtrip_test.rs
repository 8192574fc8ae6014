use msgpack_value::{decode, encode, Value};
use std::collections::HashSet;

/// Probe values around every power of two between `min` and `max`: `2^k - 1`, `2^k`, `2^k + 1`.
fn pattern(min: i64, max: i64) -> Vec<i64> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut val = min - 1;
    while val <= max {
        if min <= val && seen.insert(val) {
            out.push(val);
        }
        seen.insert(val);
        val += 1;
        if val <= max && seen.insert(val) {
            out.push(val);
        }
        val += 1;
        if val <= max && seen.insert(val) {
            out.push(val);
        }
        val -= 1;
        val = if val != 0 { val * 2 - 1 } else { 1 };
    }
    out
}

fn roundtrip(value: &Value) -> Value {
    let mut bytes = encode(value).unwrap();
    let decoded: Value = decode(&mut bytes).unwrap();
    assert!(bytes.is_empty(), "trailing bytes after {:?}", value.type_name());
    decoded
}

fn repeat(unit: &str, len: usize) -> String {
    unit.repeat(len)
}

#[test]
fn test_pattern_probes_power_of_two_boundaries() {
    let probes = pattern(0, 300);
    for expected in [0, 1, 2, 15, 16, 17, 31, 32, 33, 255, 256, 257] {
        assert!(probes.contains(&expected), "missing probe {}", expected);
    }
    assert!(probes.iter().all(|&v| (0..=300).contains(&v)));
    let big = pattern(0x4000_0000, 0xFFFF_FFFF);
    assert!(big.contains(&0x4000_0000));
    assert!(big.contains(&0x8000_0000));
    assert!(big.contains(&0xFFFF_FFFF));
}

#[test]
fn test_nil() {
    assert_eq!(roundtrip(&Value::Nil), Value::Nil);
}

#[test]
fn test_boolean() {
    for value in [true, false] {
        assert_eq!(roundtrip(&Value::Bool(value)), Value::Bool(value));
    }
}

#[test]
fn test_positive_int_small() {
    for value in pattern(0, 0x4000_0000) {
        let value = Value::from(value);
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_positive_int_large() {
    for value in pattern(0x4000_0000, 0xFFFF_FFFF) {
        let value = Value::from(value as u64);
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_negative_int_small() {
    for value in pattern(0, 0x4000_0000) {
        let value = Value::from(-value);
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_negative_int_large() {
    for value in pattern(0x4000_0000, 0xFFFF_FFFF) {
        let value = Value::from(-value);
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_int_extremes() {
    for value in [
        Value::Int(i64::MIN),
        Value::Int(i64::MAX),
        Value::UInt(u64::MAX),
        Value::Int(i32::MIN as i64 - 1),
    ] {
        assert_eq!(roundtrip(&value), value);
    }
}

#[test]
fn test_float() {
    for value in [
        1.1,
        10.01,
        100.001,
        1000.0001,
        10000.00001,
        100000.000001,
        1000000.0000001,
    ] {
        assert_eq!(roundtrip(&Value::Float(value)), Value::Float(value));
    }
}

#[test]
fn test_float_special_values() {
    for value in [0.0, -0.0, f64::INFINITY, f64::NEG_INFINITY, f64::MIN_POSITIVE] {
        let decoded = roundtrip(&Value::Float(value));
        assert_eq!(decoded.as_f64().unwrap().to_bits(), value.to_bits());
    }
    let decoded = roundtrip(&Value::Float(f64::NAN));
    assert!(decoded.as_f64().unwrap().is_nan());
}

fn check_strings(unit: &str) {
    for len in pattern(0, 65537) {
        let value = Value::from(repeat(unit, len as usize));
        assert_eq!(roundtrip(&value), value, "length {}", len);
    }
}

#[test]
fn test_string_ascii() {
    check_strings("a");
}

#[test]
fn test_string_greek() {
    check_strings("α");
}

#[test]
fn test_string_asian() {
    check_strings("亜");
}

#[test]
fn test_string_128k_characters() {
    let value = Value::from(repeat("亜", 131072));
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn test_array_small() {
    for len in pattern(0, 257) {
        let value: Value = (0..len as u32)
            .map(|i| Value::from(char::from_u32(i).unwrap().to_string()))
            .collect();
        let decoded = roundtrip(&value);
        let items = decoded.as_array().unwrap();
        assert_eq!(items.len(), len as usize);
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_array_large() {
    for len in pattern(0, 65537) {
        let value = Value::Array(vec![Value::Nil; len as usize]);
        let decoded = roundtrip(&value);
        assert_eq!(decoded.as_array().unwrap().len(), len as usize);
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_map_small() {
    for len in pattern(0, 257) {
        let value: Value = (0..len as u32)
            .map(|i| {
                (
                    Value::from(char::from_u32(i).unwrap().to_string()),
                    Value::from(i),
                )
            })
            .collect();
        let decoded = roundtrip(&value);
        assert_eq!(decoded.as_map().unwrap().len(), len as usize);
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_map_large() {
    for len in pattern(65536, 65537) {
        let value: Value = (0..len)
            .map(|i| (Value::from(i.to_string()), Value::Nil))
            .collect();
        let decoded = roundtrip(&value);
        assert_eq!(decoded.as_map().unwrap().len(), len as usize);
        assert_eq!(decoded.get("0"), Some(&Value::Nil));
        assert_eq!(decoded, value);
    }
}

#[test]
fn test_nested_mixed() {
    let value = Value::Map(vec![
        (Value::from("name"), Value::from("msgpack")),
        (
            Value::from("tags"),
            Value::Array(vec![Value::from(-1), Value::from(1.5), Value::Bool(true)]),
        ),
        (Value::from(7u8), Value::Bin(vec![0, 1, 2, 255])),
        (Value::Nil, Value::Map(vec![])),
    ]);
    assert_eq!(roundtrip(&value), value);
}
