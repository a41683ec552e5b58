//! Cache entries and their on-wire envelope.
//!
//! Remote values are stored as
//! `{"schemaVersion": 1, "value": <T>, "fingerprint": "<hex>"}`.
//! Readers also accept the untagged `{"value": <T>, "fingerprint": "<hex>"}`
//! form (schema 0), and bare legacy values written before any envelope
//! existed, for which a fingerprint is synthesized.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::fingerprint::fingerprint_value;

/// Current envelope schema.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_FIELD: &str = "schemaVersion";

/// A cached value together with its content fingerprint.
///
/// Both fields are reference counted so local hits clone cheaply.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub value: Arc<Value>,
    pub fingerprint: Arc<str>,
}

impl CacheEntry {
    pub fn new(value: Value, fingerprint: impl Into<Arc<str>>) -> Self {
        Self {
            value: Arc::new(value),
            fingerprint: fingerprint.into(),
        }
    }

    /// Build an entry, computing the fingerprint from the value.
    pub fn from_value(value: Value) -> Self {
        let fp = fingerprint_value(&value);
        Self::new(value, fp)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    schema_version: u32,
    value: &'a Value,
    fingerprint: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[allow(dead_code)]
    schema_version: u32,
    value: Value,
    fingerprint: String,
}

/// How a remote payload was interpreted.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// Current envelope
    Envelope(CacheEntry),
    /// Bare value from before the envelope existed
    Legacy(CacheEntry),
}

impl Decoded {
    pub fn into_entry(self) -> CacheEntry {
        match self {
            Decoded::Envelope(entry) | Decoded::Legacy(entry) => entry,
        }
    }
}

/// Why a remote payload could not be used.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// Bytes are not JSON or the envelope is missing fields
    Malformed(String),
    /// Envelope written by a newer (or unknown) schema
    UnknownSchema(Value),
}

/// Encode an entry into its wire form.
pub fn encode(entry: &CacheEntry) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        value: &entry.value,
        fingerprint: &entry.fingerprint,
    })
}

/// Decode a wire payload.
pub fn decode(bytes: &[u8]) -> Result<Decoded, DecodeError> {
    let raw: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let schema = match &raw {
        Value::Object(map) => map.get(SCHEMA_FIELD).cloned(),
        _ => None,
    };

    match schema {
        None => Ok(match untagged_envelope(raw) {
            Ok(entry) => Decoded::Envelope(entry),
            Err(raw) => Decoded::Legacy(CacheEntry::from_value(raw)),
        }),
        Some(Value::Number(n)) if n.as_u64() == Some(SCHEMA_VERSION as u64) => {
            let envelope: Envelope =
                serde_json::from_value(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;
            Ok(Decoded::Envelope(CacheEntry::new(
                envelope.value,
                envelope.fingerprint,
            )))
        }
        Some(other) => Err(DecodeError::UnknownSchema(other)),
    }
}

/// Schema 0: an object with exactly a `value` and a string `fingerprint`.
fn untagged_envelope(raw: Value) -> Result<CacheEntry, Value> {
    let mut map = match raw {
        Value::Object(map) => map,
        other => return Err(other),
    };
    let shaped = map.len() == 2
        && map.contains_key("value")
        && matches!(map.get("fingerprint"), Some(Value::String(_)));
    if !shaped {
        return Err(Value::Object(map));
    }
    match (map.remove("value"), map.remove("fingerprint")) {
        (Some(value), Some(Value::String(fp))) => Ok(CacheEntry::new(value, fp)),
        _ => Err(Value::Object(map)),
    }
}
