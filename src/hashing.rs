//! Hashing - SHA-256 fingerprints for render requests and outputs
//!
//! Callers that persist a rendered asset store both hashes next to the bytes:
//! the job hash identifies what was asked for, the content hash what came out.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// job_hash = sha256(template_id:template_version:canonical_descriptor:engine_version)
pub fn compute_job_hash(
    template_id: &str,
    template_version: &str,
    descriptor: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(descriptor)?;
    let combined = format!("{template_id}:{template_version}:{canonical}:{engine_version}");
    Ok(sha256_hex(combined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": {"y": 1, "b": [{"d": 1, "c": 2}]}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":{"b":[{"c":2,"d":1}],"y":1},"z":1}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_job_hash_ignores_key_order_but_not_values() {
        let a = json!({"price": "1", "status": "for-sale"});
        let b = json!({"status": "for-sale", "price": "1"});
        let c = json!({"status": "for-sale", "price": "2"});
        let ha = compute_job_hash("social-square", "2.1.0", &a, "1.0.0").unwrap();
        let hb = compute_job_hash("social-square", "2.1.0", &b, "1.0.0").unwrap();
        let hc = compute_job_hash("social-square", "2.1.0", &c, "1.0.0").unwrap();
        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
        assert_ne!(ha, compute_job_hash("social-square", "2.2.0", &a, "1.0.0").unwrap());
    }
}
