//! Helpers for loosely typed device values

use serde_json::{Number, Value};

/// Wrap a number, keeping integral values as JSON integers
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Numeric view of a value; numeric strings are parsed
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// String form used when comparing values by key
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose truthiness: `true`, non-zero numbers and `true`/`1`/`on`/`yes`
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        ),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_value_keeps_integers() {
        assert_eq!(number_value(42.0), json!(42));
        assert_eq!(number_value(21.5), json!(21.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(15)), Some(15.0));
        assert_eq!(as_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(as_number(&json!("high")), None);
        assert_eq!(as_number(&json!(true)), None);
    }

    #[test]
    fn test_value_key() {
        assert_eq!(value_key(&json!("ON")), "ON");
        assert_eq!(value_key(&json!(1)), "1");
        assert_eq!(value_key(&json!(true)), "true");
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!("On")));
        assert!(is_truthy(&json!(2)));
        assert!(!is_truthy(&json!("off")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
    }
}
