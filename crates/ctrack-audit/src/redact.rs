//! Secret redaction for audit details

use serde_json::{Map, Value};

/// Replacement written in place of secret values
pub const REDACTED: &str = "[REDACTED]";

const SECRET_MARKERS: [&str; 6] = [
    "password",
    "secret",
    "token",
    "apikey",
    "authorization",
    "credential",
];

/// Whether a detail key looks like it holds a secret
///
/// Matching ignores case, `_` and `-`, so `apiKey`, `api_key` and
/// `X-Api-Key` are all caught.
#[must_use]
pub fn is_secret_key(key: &str) -> bool {
    let folded: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    SECRET_MARKERS.iter().any(|marker| folded.contains(marker))
}

/// Replace secret-looking values, descending into nested objects and arrays
pub fn redact_details(details: &mut Map<String, Value>) -> usize {
    let mut count = 0;
    for (key, value) in details.iter_mut() {
        if is_secret_key(key) {
            *value = Value::String(REDACTED.to_string());
            count += 1;
        } else {
            count += redact_value(value);
        }
    }
    count
}

fn redact_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => redact_details(map),
        Value::Array(items) => items.iter_mut().map(redact_value).sum(),
        _ => 0,
    }
}
