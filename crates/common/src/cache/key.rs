//! Cache key derivation
//!
//! A key is a pure function of method, full URL, body and headers. JSON
//! bodies are canonicalised (object keys sorted recursively) so logically
//! identical payloads share a key regardless of field order.

use std::collections::BTreeMap;

use serde_json::Value;

/// Derive the cache key for a request
///
/// Header names are expected lower-cased; pass only the headers that make
/// responses differ (e.g. those set by the caller).
pub fn cache_key(
    method: &str,
    url: &str,
    body: Option<&Value>,
    headers: &BTreeMap<String, String>,
) -> String {
    let mut hasher = blake3::Hasher::new();

    update_field(&mut hasher, method.to_ascii_uppercase().as_bytes());
    update_field(&mut hasher, url.as_bytes());

    match body {
        Some(body) => {
            let mut canonical = String::new();
            write_canonical(body, &mut canonical);
            update_field(&mut hasher, canonical.as_bytes());
        }
        None => update_field(&mut hasher, b""),
    }

    for (name, value) in headers {
        update_field(&mut hasher, name.as_bytes());
        update_field(&mut hasher, value.as_bytes());
    }

    hasher.finalize().to_hex().to_string()
}

/// Length-prefix each field so adjacent fields cannot run together
fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (index, (key, value)) in sorted.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
