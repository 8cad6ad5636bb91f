//! Lenient helpers for reading the model's raw argument payload.
//!
//! The completion service hands back arguments as a JSON string that may
//! be malformed, empty, or use loose types (a student number sent as a
//! number, an amount sent as `"500"`).  These helpers turn that payload
//! into plain Rust values; they never decide what is *required*.

use serde_json::{Map, Value};
use tracing::warn;

/// Parse the raw argument string into a JSON object.
///
/// An empty string, malformed JSON, or a non-object value yields an
/// empty map so that session inheritance can still fill the gaps.
pub fn parse_arguments(raw: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(payload = %other, "tool arguments are not a JSON object, ignoring");
            Map::new()
        }
        Err(e) => {
            warn!(error = %e, "malformed tool arguments, treating as empty");
            Map::new()
        }
    }
}

/// Read a string-like field.  Numbers are stringified; empty or
/// whitespace-only strings and `null` count as absent.
pub fn opt_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("`{key}` must be a string, got {other}")),
    }
}

/// Read a numeric field, accepting numbers and numeric strings.
pub fn opt_number(args: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    let n = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match n {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("`{key}` must be a number")),
    }
}

/// Read a positive page-style integer.  Zero, negative, or fractional
/// values below 1 count as absent so the caller's default applies.
pub fn opt_positive(args: &Map<String, Value>, key: &str) -> Result<Option<u32>, String> {
    Ok(opt_number(args, key)?
        .filter(|v| *v >= 1.0)
        .map(|v| v.min(u32::MAX as f64) as u32))
}

/// Render a number for a query string without a trailing `.0`.
pub fn format_number(v: f64) -> String {
    format!("{v}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn malformed_payload_is_empty() {
        assert!(parse_arguments("").is_empty());
        assert!(parse_arguments("{not json").is_empty());
        assert!(parse_arguments("[1,2]").is_empty());
        assert_eq!(parse_arguments("{\"a\":1}").len(), 1);
    }

    #[test]
    fn strings_are_trimmed_and_blank_is_absent() {
        let args = obj(json!({ "a": "  S1 ", "b": "   ", "c": 2021001, "d": null, "e": [1] }));
        assert_eq!(opt_string(&args, "a").unwrap().as_deref(), Some("S1"));
        assert_eq!(opt_string(&args, "b").unwrap(), None);
        assert_eq!(opt_string(&args, "c").unwrap().as_deref(), Some("2021001"));
        assert_eq!(opt_string(&args, "d").unwrap(), None);
        assert_eq!(opt_string(&args, "missing").unwrap(), None);
        assert!(opt_string(&args, "e").is_err());
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let args = obj(json!({ "a": 500, "b": "250.5", "c": "lots", "d": true }));
        assert_eq!(opt_number(&args, "a").unwrap(), Some(500.0));
        assert_eq!(opt_number(&args, "b").unwrap(), Some(250.5));
        assert!(opt_number(&args, "c").is_err());
        assert!(opt_number(&args, "d").is_err());
    }

    #[test]
    fn non_positive_pages_are_absent() {
        let args = obj(json!({ "page": 0, "pageSize": -3, "x": 2 }));
        assert_eq!(opt_positive(&args, "page").unwrap(), None);
        assert_eq!(opt_positive(&args, "pageSize").unwrap(), None);
        assert_eq!(opt_positive(&args, "x").unwrap(), Some(2));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(99.5), "99.5");
    }
}
