//! Byte-stable serialization of the free-form `details` mapping for chain input.
//!
//! `serde_json`'s own `Map` happens to sort keys (it is backed by a
//! `BTreeMap` unless the `preserve_order` feature is pulled in transitively),
//! but the chain hash is a security boundary: we canonicalize explicitly so
//! the guarantee does not depend on that feature staying off in some future
//! dependency upgrade.

use serde_json::Value;

/// Serialize `details` into the byte-stable form used as chain input.
///
/// Keys are sorted lexicographically at every nesting depth; the output has
/// no insignificant whitespace. An empty or absent mapping serializes to
/// the literal `{}`.
#[must_use]
pub fn canonicalize(details: &Value) -> String {
    let mut out = String::new();
    write_canonical(details, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                // `key` came from `map.keys()`, so the lookup cannot miss.
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

/// Escape a string per JSON rules, matching `serde_json`'s own escaping so
/// re-parsing round-trips to the same `Value`.
fn write_json_string(s: &str, out: &mut String) {
    // `serde_json::to_string` on a bare string is exactly the JSON string
    // encoding (quotes included); reuse it rather than re-deriving escape
    // rules for control characters and unicode.
    out.push_str(&serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_owned()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_is_braces() {
        assert_eq!(canonicalize(&json!({})), "{}");
        assert_eq!(canonicalize(&Value::Null), "null");
    }

    #[test]
    fn keys_sorted_at_top_level() {
        let a = canonicalize(&json!({"b": 1, "a": 2}));
        assert_eq!(a, r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn byte_stable_under_key_permutation() {
        let a = canonicalize(&json!({"foo": "bar", "baz": 1, "qux": [3, 2, 1]}));
        let b = canonicalize(&json!({"qux": [3, 2, 1], "baz": 1, "foo": "bar"}));
        assert_eq!(a, b);
    }

    #[test]
    fn keys_sorted_at_every_depth() {
        let a = canonicalize(&json!({"outer": {"z": 1, "a": 2}}));
        assert_eq!(a, r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn no_insignificant_whitespace() {
        let a = canonicalize(&json!({"a": [1, 2, 3], "b": "x"}));
        assert!(!a.contains(' '));
        assert_eq!(a, r#"{"a":[1,2,3],"b":"x"}"#);
    }

    #[test]
    fn strings_are_json_escaped() {
        let a = canonicalize(&json!({"a": "line\nbreak \"quoted\""}));
        assert_eq!(a, r#"{"a":"line\nbreak \"quoted\""}"#);
    }

    #[test]
    fn round_trip_preserves_canonical_form() {
        let original = json!({"b": {"y": 2, "x": 1}, "a": [true, null, 1.5]});
        let canon = canonicalize(&original);
        let reparsed: Value = serde_json::from_str(&canon).unwrap();
        assert_eq!(canonicalize(&reparsed), canon);
    }
}
