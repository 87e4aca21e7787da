use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
        .expect("email pattern is a valid regex")
});

/// Pulls email addresses out of arbitrary provider payloads.
///
/// Stateless and deterministic: the same payload always yields the same set.
/// Deduplication is per payload only; global uniqueness is the store's job.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmailExtractor;

impl EmailExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the distinct addresses found anywhere in `payload`.
    ///
    /// Object keys and every scalar leaf are flattened into text first, so
    /// nested objects, arrays and non-string values are all scanned.
    pub fn extract(&self, payload: &Value) -> BTreeSet<String> {
        let mut text = String::new();
        flatten_into(payload, &mut text);
        self.extract_text(&text)
    }

    pub fn extract_text(&self, text: &str) -> BTreeSet<String> {
        EMAIL_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

fn flatten_into(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Bool(b) => push_piece(out, if *b { "true" } else { "false" }),
        Value::Number(n) => push_piece(out, &n.to_string()),
        Value::String(s) => push_piece(out, s),
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                push_piece(out, key);
                flatten_into(item, out);
            }
        }
    }
}

// Pieces are separated by a newline so adjacent leaves never fuse into one token.
fn push_piece(out: &mut String, piece: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(piece);
}
