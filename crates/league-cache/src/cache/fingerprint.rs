//! Deterministic content fingerprints.
//!
//! A value is rendered to a canonical JSON form (compact, object keys sorted
//! at every depth) and hashed with SHA-256. Two deep-equal values always
//! produce the same fingerprint regardless of field order or serde_json
//! feature flags.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render `value` into its canonical byte form.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(b':');
                write_canonical(val, out);
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) {
    // Scalars serialize infallibly into a Vec
    if serde_json::to_writer(&mut *out, value).is_err() {
        out.extend_from_slice(b"null");
    }
}

/// Fingerprint an already-converted JSON value.
pub fn fingerprint_value(value: &Value) -> String {
    let digest = Sha256::digest(canonical_bytes(value));
    hex::encode(digest)
}

/// Fingerprint any serializable value.
///
/// Returns the JSON form alongside the fingerprint so callers that store the
/// value do not convert it twice.
pub fn fingerprint<T: serde::Serialize + ?Sized>(
    value: &T,
) -> Result<(Value, String), serde_json::Error> {
    let json = serde_json::to_value(value)?;
    let fp = fingerprint_value(&json);
    Ok((json, fp))
}
