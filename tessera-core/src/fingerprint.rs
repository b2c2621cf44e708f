//! Parameter fingerprints.
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of the call
//! parameters. Object keys are sorted before hashing, so two structurally
//! equal parameter lists always produce the same fingerprint regardless of
//! key insertion order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed-width (64 hex chars) request-tier lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of a positional parameter list.
    pub fn of(params: &[Value]) -> Self {
        let mut canonical = String::new();
        canonical.push('[');
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                canonical.push(',');
            }
            write_canonical(param, &mut canonical);
        }
        canonical.push(']');
        Self::digest(canonical.as_bytes())
    }

    /// Fingerprint of an optional value. `None` hashes the empty string.
    pub fn of_value(value: Option<&Value>) -> Self {
        match value {
            Some(value) => Self::digest(canonical_json(value).as_bytes()),
            None => Self::digest(b""),
        }
    }

    fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a value as JSON with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
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
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        // Scalars already have a single JSON rendering.
        scalar => out.push_str(&scalar.to_string()),
    }
}
