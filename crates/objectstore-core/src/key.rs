//! Keys, records and key path resolution
//!
//! A [`Record`] is the stored form of an entity: a JSON object. A [`Key`] is
//! the subset of JSON values the engine can order and index by. The ordering
//! follows IndexedDB: every number sorts before every string, and every
//! string sorts before every array.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Map, Number, Value};

use crate::error::EngineError;

/// Stored representation of an entity.
pub type Record = Map<String, Value>;

/// A primary or index key.
#[derive(Debug, Clone)]
pub enum Key {
    Number(f64),
    String(String),
    Array(Vec<Key>),
}

impl Key {
    /// Number key with `-0.0` folded into `0.0`, which the engine treats as one key.
    pub fn number(f: f64) -> Self {
        Key::Number(if f == 0.0 { 0.0 } else { f })
    }

    /// Convert a JSON value into a key.
    ///
    /// Booleans, nulls, objects and NaN are not valid keys.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) if !f.is_nan() => Ok(Key::number(f)),
                _ => Err(EngineError::data(format!("{} is not a valid key", n))),
            },
            Value::String(s) => Ok(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Key::Array),
            other => Err(EngineError::data(format!("{} is not a valid key", other))),
        }
    }

    /// Convert the key back into a JSON value.
    ///
    /// Integral numbers come back as JSON integers so that `1` round-trips as `1`.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(f) => {
                if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
                    Value::Number(Number::from(*f as i64))
                } else {
                    Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
                }
            }
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::String(_) => 1,
            Key::Array(_) => 2,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Equal zeros of either sign are one key
            (Key::Number(a), Key::Number(b)) if a == b => Ordering::Equal,
            (Key::Number(a), Key::Number(b)) => a.total_cmp(b),
            (Key::String(a), Key::String(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

macro_rules! key_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::number(n as f64)
                }
            }
        )*
    };
}

key_from_number!(i32, i64, u32, u64, usize, f64);

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<&String> for Key {
    fn from(s: &String) -> Self {
        Key::String(s.clone())
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

/// Resolve a dotted key path (`"id"`, `"profile.email"`) against a record.
///
/// Returns `None` when any segment is missing or crosses a non-object.
pub fn resolve_key_path<'a>(record: &'a Record, key_path: &str) -> Option<&'a Value> {
    let mut segments = key_path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Extract the key a record is stored under.
pub fn extract_key(record: &Record, key_path: &str) -> Result<Key, EngineError> {
    let value = resolve_key_path(record, key_path).ok_or_else(|| {
        EngineError::data(format!(
            "key path '{}' did not resolve to a value",
            key_path
        ))
    })?;
    Key::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numbers_sort_before_strings_and_arrays() {
        let mut keys = vec![
            Key::Array(vec![Key::from(1)]),
            Key::from("a"),
            Key::from(10),
            Key::from(-2.5),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(-2.5),
                Key::from(10),
                Key::from("a"),
                Key::Array(vec![Key::from(1)]),
            ]
        );
    }

    #[test]
    fn test_integer_and_float_keys_are_equal() {
        assert_eq!(Key::from(1), Key::from(1.0));
        assert_eq!(Key::from(1).to_value(), json!(1));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let key = Key::from_value(&json!(-0.0)).unwrap();
        assert_eq!(key, Key::from(0));
        assert!(matches!(key, Key::Number(f) if f.is_sign_positive()));
        assert_eq!(Key::from(-0.0_f64).cmp(&Key::from(0.0_f64)), Ordering::Equal);
    }

    #[test]
    fn test_invalid_keys_are_rejected() {
        assert!(Key::from_value(&json!(true)).is_err());
        assert!(Key::from_value(&json!(null)).is_err());
        assert!(Key::from_value(&json!({"a": 1})).is_err());
        assert!(Key::from_value(&json!([1, null])).is_err());
    }

    #[test]
    fn test_nested_key_path() {
        let r = record(json!({"id": 7, "profile": {"email": "ann@example.com"}}));
        assert_eq!(extract_key(&r, "id").unwrap(), Key::from(7));
        assert_eq!(
            extract_key(&r, "profile.email").unwrap(),
            Key::from("ann@example.com")
        );
        assert!(extract_key(&r, "profile.phone").is_err());
        assert!(extract_key(&r, "id.inner").is_err());
    }
}
