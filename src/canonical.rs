//! Deterministic, restricted-subset canonical JSON serialization.
//!
//! This is deliberately not RFC-8785: the only values this crate ever signs
//! are ones it produced itself (audit records, policy snapshots), so rather
//! than adopt full float/Unicode-normalization semantics we enforce a
//! restricted subset — ASCII strings, i64-range integers, booleans, null,
//! and nested maps/arrays — and reject anything else outright.
//!
//! Object keys are emitted in ascending code-point order, which for the
//! ASCII-only keys this crate uses is the same as Rust's default `&str`
//! ordering.

use serde_json::Value;

use crate::error::{Result, WardenError};

/// Render `value` as a canonical string, or reject it if it contains a
/// value outside the supported subset.
pub fn to_canonical_string(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => {
            out.push_str("null");
            Ok(())
        }
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Number(n) => {
            let i = n.as_i64().ok_or_else(|| {
                WardenError::NonCanonicalValue(format!(
                    "number {n} is not a valid i64 (floats and u64 overflow are not canonical)"
                ))
            })?;
            out.push_str(&i.to_string());
            Ok(())
        }
        Value::String(s) => {
            write_canonical_string(s, out)?;
            Ok(())
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical_string(key, out)?;
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
            Ok(())
        }
    }
}

fn write_canonical_string(s: &str, out: &mut String) -> Result<()> {
    if !s.is_ascii() {
        return Err(WardenError::NonCanonicalValue(format!(
            "string '{s}' contains non-ASCII characters"
        )));
    }
    // serde_json's string serialization for an ASCII-only input produces the
    // minimal, deterministic escaping this format needs.
    let encoded = serde_json::to_string(s).map_err(WardenError::Json)?;
    out.push_str(&encoded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_ascending() {
        let value = json!({"b": 1, "a": 2, "c": 3});
        assert_eq!(to_canonical_string(&value).unwrap(), r#"{"a":2,"b":1,"c":3}"#);
    }

    #[test]
    fn is_stable_across_clones() {
        let value = json!({"z": [1, 2, {"y": true, "x": null}], "a": "hello world"});
        let once = to_canonical_string(&value).unwrap();
        let twice = to_canonical_string(&value.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_floats() {
        let value = json!({"amount": 1.5});
        assert!(to_canonical_string(&value).is_err());
    }

    #[test]
    fn rejects_non_ascii_strings() {
        let value = json!({"name": "caf\u{e9}"});
        assert!(to_canonical_string(&value).is_err());
    }

    #[test]
    fn nested_arrays_and_objects() {
        let value = json!({"arr": [3, 2, 1], "obj": {"k": "v"}});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"arr":[3,2,1],"obj":{"k":"v"}}"#
        );
    }
}
