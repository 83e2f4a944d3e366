//! Canonical JSON encoding for signing, mirroring `uam.protocol.crypto.canonicalize`.
//!
//! Deterministic bytes are required so that signatures verify identically
//! regardless of field insertion order or implementation language: keys are
//! sorted, separators are compact, and the output is plain UTF-8 JSON.

use std::collections::BTreeMap;

use serde_json::Value;

/// Produce deterministic JSON bytes for signing.
///
/// Drops the `"signature"` key and any key whose value is `null`, sorts the
/// remaining keys, and serializes with compact separators. Nested objects
/// are canonicalized recursively. Output is restricted to ASCII: codepoints
/// at or above `0x80` are escaped as `\uXXXX`, matching `ensure_ascii=True`
/// so the same text canonicalizes to the same bytes regardless of
/// implementation language.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let filtered = filter_and_sort(value, true);
    let compact = serde_json::to_string(&filtered).expect("canonical value always serializes");
    escape_non_ascii(&compact).into_bytes()
}

/// Rewrite every non-ASCII character in a JSON string as a `\uXXXX` escape
/// (surrogate pairs for codepoints above the BMP), leaving existing ASCII
/// content, including escapes already produced by `serde_json`, untouched.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

fn filter_and_sort(value: &Value, top_level: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = BTreeMap::new();
            for (k, v) in map {
                if top_level && k == "signature" {
                    continue;
                }
                if v.is_null() {
                    continue;
                }
                sorted.insert(k.clone(), filter_and_sort(v, false));
            }
            let mut obj = serde_json::Map::new();
            for (k, v) in sorted {
                obj.insert(k, v);
            }
            Value::Object(obj)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| filter_and_sort(v, false)).collect())
        }
        other => other.clone(),
    }
}

/// Canonicalize a serializable value by round-tripping it through `serde_json::Value`.
pub fn canonicalize_serializable<T: serde::Serialize>(value: &T) -> Vec<u8> {
    let json = serde_json::to_value(value).expect("value serializes to JSON");
    canonicalize(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_and_drops_signature() {
        let value = json!({
            "b": 1,
            "a": 2,
            "signature": "abc",
        });
        let bytes = canonicalize(&value);
        assert_eq!(bytes, br#"{"a":2,"b":1}"#);
    }

    #[test]
    fn drops_null_valued_keys() {
        let value = json!({"a": 1, "b": null});
        let bytes = canonicalize(&value);
        assert_eq!(bytes, br#"{"a":1}"#);
    }

    #[test]
    fn is_stable_regardless_of_input_order() {
        let v1 = json!({"z": 1, "a": 2});
        let v2 = json!({"a": 2, "z": 1});
        assert_eq!(canonicalize(&v1), canonicalize(&v2));
    }

    #[test]
    fn recurses_into_nested_objects() {
        let value = json!({"outer": {"z": 1, "a": null, "b": 2}});
        let bytes = canonicalize(&value);
        assert_eq!(bytes, br#"{"outer":{"b":2,"z":1}}"#);
    }

    #[test]
    fn escapes_non_ascii_codepoints_in_the_bmp() {
        let value = json!({"display_name": "caf\u{e9}"});
        let bytes = canonicalize(&value);
        let expected: &[u8] = br#"{"display_name":"caf\u00e9"}"#;
        assert_eq!(bytes, expected);
    }

    #[test]
    fn escapes_non_ascii_codepoints_outside_the_bmp_as_a_surrogate_pair() {
        let value = json!({"emoji": "\u{1f600}"});
        let bytes = canonicalize(&value);
        let expected: &[u8] = br#"{"emoji":"\ud83d\ude00"}"#;
        assert_eq!(bytes, expected);
    }

    #[test]
    fn leaves_plain_ascii_untouched() {
        let value = json!({"name": "alice"});
        let bytes = canonicalize(&value);
        assert_eq!(bytes, br#"{"name":"alice"}"#);
    }
}
