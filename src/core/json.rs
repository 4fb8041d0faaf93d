/*!
 * Host Value Coercions
 * Truthiness and text conversion for JSON values received from the host
 */

use serde_json::Value;

/// Truthiness as the host scripting language defines it: `null`, `false`,
/// `0`, and `""` are falsy; every array and object is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `Some(value)` when present and truthy
pub fn truthy(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| is_truthy(v))
}

/// Text conversion as the host's `String(value)` performs it
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_to_text(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_to_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
