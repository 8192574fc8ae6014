#[allow(unused_imports)]
use msgpack_value::{decode, encode, Error, Value};

#[cfg(feature = "serde_json")]
#[test]
fn test_serde_json_value_encode_decode() {
    use serde_json::json;

    let json = json!({
        "id": 7,
        "delta": -33,
        "ratio": 0.5,
        "name": "msgpack",
        "tags": ["a", null, true],
        "nested": {"empty": []}
    });
    let mut bytes = encode(&json).unwrap();
    // Same bytes as going through Value.
    assert_eq!(bytes, encode(&Value::from(json.clone())).unwrap());
    let decoded: serde_json::Value = decode(&mut bytes).unwrap();
    assert_eq!(decoded, json);
}

#[cfg(feature = "serde_json")]
#[test]
fn test_serde_json_rejects_non_json_values() {
    let err = serde_json::Value::try_from(Value::Bin(vec![1])).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { found: "binary", .. }));

    let err =
        serde_json::Value::try_from(Value::Map(vec![(Value::from(1), Value::Nil)])).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { found: "integer", .. }));

    let err = serde_json::Value::try_from(Value::Float(f64::NAN)).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));

    let mut bytes = encode(&Value::Map(vec![(Value::Nil, Value::Nil)])).unwrap();
    assert!(decode::<serde_json::Value>(&mut bytes).is_err());
    assert_eq!(bytes.len(), 3);
}

#[cfg(feature = "indexmap")]
#[test]
fn test_indexmap_preserves_order() {
    use indexmap::IndexMap;

    let mut map = IndexMap::new();
    map.insert("b".to_string(), 1u8);
    map.insert("a".to_string(), 2u8);
    let mut bytes = encode(&map).unwrap();
    assert_eq!(&bytes[..], &[0x82, 0xa1, b'b', 0x01, 0xa1, b'a', 0x02]);
    let decoded: IndexMap<String, u8> = decode(&mut bytes).unwrap();
    assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["b", "a"]);
}

#[cfg(feature = "smol_str")]
#[test]
fn test_smol_str_encode_decode() {
    use smol_str::SmolStr;

    let value = SmolStr::new("compact string");
    let mut bytes = encode(&value).unwrap();
    assert_eq!(bytes, encode("compact string").unwrap());
    let decoded: SmolStr = decode(&mut bytes).unwrap();
    assert_eq!(decoded, value);
}

#[cfg(feature = "fxhash")]
#[test]
fn test_fxhash_map_encode_decode() {
    use fxhash::FxHashMap;

    let mut map = FxHashMap::default();
    map.insert(1u32, "one".to_string());
    map.insert(300u32, "three hundred".to_string());
    let mut bytes = encode(&map).unwrap();
    let decoded: FxHashMap<u32, String> = decode(&mut bytes).unwrap();
    assert_eq!(decoded, map);
}

#[cfg(feature = "ahash")]
#[test]
fn test_ahash_map_encode_decode() {
    use ahash::AHashMap;

    let mut map = AHashMap::new();
    map.insert("neg".to_string(), -1000i64);
    map.insert("pos".to_string(), 1000i64);
    let mut bytes = encode(&map).unwrap();
    let decoded: AHashMap<String, i64> = decode(&mut bytes).unwrap();
    assert_eq!(decoded, map);
}
