//! Ordered-precedence field lookup shared by every "first of these names" read.
//!
//! A field counts as present when it exists, is not `null`, and is not an
//! empty string. Empty arrays and objects are present.

use serde_json::Value;

pub fn first_present<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| is_present(v))
}

/// First present field rendered as text. Strings are taken verbatim, numbers
/// and booleans are formatted; other kinds are skipped.
pub fn first_text(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter(|v| is_present(v))
        .find_map(as_text)
}

/// Walks a dotted path (`meta.valid_json`).
pub fn path<'a>(obj: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(obj, |cur, key| cur.get(key))
        .filter(|v| is_present(v))
}

pub fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
