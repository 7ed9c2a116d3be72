//! Scalar values and identity keys.
//!
//! Parameters, row cells and entity fields are all `sea_query::Value`s. Identity-map
//! lookups and foreign-key matching need a hashable form that does not care which
//! integer width a driver picked for a column (`5` may come back as `Int`, `BigInt`
//! or even a `String`), so keys are folded into [`KeyValue`] before comparison.

use std::fmt;

pub use sea_query::Value;

/// Normalized primary/foreign key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Any integer-like key, including numeric strings
    Int(i64),
    /// Any other non-null key, compared textually
    Text(String),
}

impl KeyValue {
    /// Normalize a value into a key. Returns `None` for SQL NULL.
    pub fn from_value(value: &Value) -> Option<Self> {
        if is_null(value) {
            return None;
        }
        let key = match value {
            Value::Bool(Some(b)) => Self::Int(i64::from(*b)),
            Value::TinyInt(Some(i)) => Self::Int(i64::from(*i)),
            Value::SmallInt(Some(i)) => Self::Int(i64::from(*i)),
            Value::Int(Some(i)) => Self::Int(i64::from(*i)),
            Value::BigInt(Some(i)) => Self::Int(*i),
            Value::TinyUnsigned(Some(u)) => Self::Int(i64::from(*u)),
            Value::SmallUnsigned(Some(u)) => Self::Int(i64::from(*u)),
            Value::Unsigned(Some(u)) => Self::Int(i64::from(*u)),
            Value::BigUnsigned(Some(u)) => match i64::try_from(*u) {
                Ok(i) => Self::Int(i),
                Err(_) => Self::Text(u.to_string()),
            },
            Value::String(Some(s)) => {
                let text = s.to_string();
                match text.parse::<i64>() {
                    Ok(i) => Self::Int(i),
                    Err(_) => Self::Text(text),
                }
            }
            Value::Char(Some(c)) => Self::Text(c.to_string()),
            other => Self::Text(format!("{other:?}")),
        };
        Some(key)
    }

    /// Turn the key back into a bindable value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Whether a value is SQL NULL.
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Json(None)
            | Value::ChronoDate(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::Uuid(None)
    )
}

/// Loose key equality: `Int(5) == BigInt(5) == String("5")`, NULL equals nothing.
pub fn same_key(left: &Value, right: &Value) -> bool {
    match (KeyValue::from_value(left), KeyValue::from_value(right)) {
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// The untyped NULL used for absent cells.
pub fn null() -> Value {
    Value::String(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_fold_together() {
        let a = KeyValue::from_value(&Value::Int(Some(5)));
        let b = KeyValue::from_value(&Value::BigInt(Some(5)));
        let c = KeyValue::from_value(&Value::from("5"));
        assert_eq!(a, Some(KeyValue::Int(5)));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_null_has_no_key() {
        assert_eq!(KeyValue::from_value(&Value::Int(None)), None);
        assert_eq!(KeyValue::from_value(&null()), None);
        assert!(is_null(&Value::BigInt(None)));
        assert!(!is_null(&Value::BigInt(Some(0))));
    }

    #[test]
    fn test_text_keys() {
        let key = KeyValue::from_value(&Value::from("abc")).unwrap();
        assert_eq!(key, KeyValue::Text("abc".to_string()));
        assert_eq!(key.to_string(), "abc");
        assert_eq!(key.to_value(), Value::from("abc".to_string()));
    }

    #[test]
    fn test_same_key() {
        assert!(same_key(&Value::Int(Some(7)), &Value::from("7")));
        assert!(!same_key(&Value::Int(Some(7)), &Value::Int(Some(8))));
        assert!(!same_key(&Value::Int(None), &Value::Int(None)));
    }

    #[test]
    fn test_big_unsigned_overflow_is_textual() {
        let key = KeyValue::from_value(&Value::BigUnsigned(Some(u64::MAX))).unwrap();
        assert_eq!(key, KeyValue::Text(u64::MAX.to_string()));
    }
}
