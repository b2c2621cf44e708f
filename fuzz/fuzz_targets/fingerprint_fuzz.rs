//! Fuzz test for parameter fingerprinting
//!
//! Feeds arbitrary JSON documents to the fingerprint and checks that hashing
//! is deterministic, fixed-width and independent of object key order.
//!
//! Run with: cargo +nightly fuzz run fingerprint_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tessera_core::{canonical_json, Fingerprint};

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let params = vec![value];

    let a = Fingerprint::of(&params);
    let b = Fingerprint::of(&params);
    assert_eq!(a, b, "fingerprint must be deterministic");
    assert_eq!(a.as_str().len(), 64, "fingerprint is a SHA-256 hex digest");

    // Canonical text parses back to an equal value and is a fixed point.
    let canonical = canonical_json(&params[0]);
    let reparsed: Value = serde_json::from_str(&canonical).expect("canonical JSON must parse");
    assert_eq!(reparsed, params[0]);
    assert_eq!(canonical_json(&reparsed), canonical);
    assert_eq!(Fingerprint::of(&[reparsed]), a);
});
