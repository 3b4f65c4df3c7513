//! Deterministic fingerprints for alerts, groups and requests.
//!
//! All fingerprints depend only on their inputs, never on process state, so
//! they survive restarts.

use sha1::{Digest, Sha1};
use xxhash_rust::xxh64::Xxh64;

use crate::Labels;

/// Returns the lowercase hex sha1 digest of `data`.
pub fn sha1_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha1::digest(data.as_ref()))
}

/// Fingerprint of a label set.
///
/// xxh64 over `name 0xff value 0xff` for every label in name order.
pub fn labels_fingerprint(labels: &Labels) -> String {
    let mut hasher = Xxh64::new(0);
    for (name, value) in labels {
        hasher.update(name.as_bytes());
        hasher.update(&[0xff]);
        hasher.update(value.as_bytes());
        hasher.update(&[0xff]);
    }
    format!("{:016x}", hasher.digest())
}

/// Identity of an alert group.
///
/// `sha1(receiver + sha1(dump))` where `dump` renders the group labels as
/// `["k1":"v1","k2":"v2"]` in name order.
pub fn group_id(receiver: &str, labels: &Labels) -> String {
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}:{}", quote(k), quote(v)))
        .collect();
    let dump = format!("[{}]", pairs.join(","));
    sha1_hex(format!("{receiver}{}", sha1_hex(dump)))
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}
