//! Canonical form of a license, the exact bytes covered by its signature.
//!
//! Object keys are emitted in byte-wise lexicographic order at every depth,
//! arrays keep their order, output is compact and strings use the JSON
//! encoder's escaping. Numbers are re-emitted from their source text. The
//! signature `value` is removed wherever the signature block lives.

use crate::error::{LicenseError, LicenseResult};
use serde_json::{Map, Value};

/// Serializes `value` in canonical form.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Parses a raw license and returns it with its canonical form.
pub fn canonical_license(raw_json: &str) -> LicenseResult<(Value, String)> {
    let value: Value = serde_json::from_str(raw_json)?;
    let Value::Object(root) = &value else {
        return Err(LicenseError::InvalidDocument(
            "license is not a JSON object".to_string(),
        ));
    };

    let mut signable = root.clone();
    strip_signature_value(&mut signable);
    if let Some(Value::Object(encryption)) = signable.get_mut("encryption") {
        strip_signature_value(encryption);
    }
    let canonical = canonicalize(&Value::Object(signable));
    Ok((value, canonical))
}

fn strip_signature_value(object: &mut Map<String, Value>) {
    if let Some(Value::Object(signature)) = object.get_mut("signature") {
        signature.remove("value");
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
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
        leaf => out.push_str(&leaf.to_string()),
    }
}
