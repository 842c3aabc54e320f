//! Request parameter maps.
//!
//! Parameters are string-keyed and carry heterogeneous values, so they are
//! held as a JSON object map. Keys iterate in sorted order, which keeps every
//! encoder deterministic.

use serde_json::Value;
use std::borrow::Cow;

/// String-keyed parameter map with scalar or structured values.
pub type Parameters = serde_json::Map<String, Value>;

/// Coerce a parameter value to the string placed on the wire for query and
/// form encodings.
///
/// Strings are used verbatim, `null` becomes the empty string, and every other
/// value uses its JSON text.
pub fn display_value(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Flatten a parameter map into `(key, display value)` pairs.
pub fn to_pairs(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(k, v)| (k.clone(), display_value(v).into_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_scalars() {
        assert_eq!(display_value(&json!("text")), "text");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(1.5)), "1.5");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&Value::Null), "");
    }

    #[test]
    fn test_display_structured() {
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
        assert_eq!(display_value(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn test_pairs_are_sorted() {
        let mut params = Parameters::new();
        params.insert("zeta".into(), json!(1));
        params.insert("alpha".into(), json!("a"));

        let pairs = to_pairs(&params);
        assert_eq!(pairs[0], ("alpha".to_string(), "a".to_string()));
        assert_eq!(pairs[1], ("zeta".to_string(), "1".to_string()));
    }
}
