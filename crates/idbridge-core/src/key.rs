//! Primary keys and key-path extraction
//!
//! Keys follow IndexedDB's valid-key rules and ordering: every number sorts
//! before every string, every string before every array. Arrays compare
//! element by element, then by length.

use std::cmp::Ordering;
use std::fmt;

use serde_json::{Number, Value};

use crate::error::{StoreError, StoreResult};

/// A valid primary key.
#[derive(Debug, Clone)]
pub enum Key {
    Number(f64),
    String(String),
    Array(Vec<Key>),
}

impl Key {
    /// Convert a JSON value into a key.
    ///
    /// Returns `None` for null, booleans, objects, NaN and arrays containing
    /// any of those.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_f64().filter(|f| !f.is_nan()).map(Key::from),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            _ => None,
        }
    }

    /// Extract the key stored at `key_path` in `record`.
    ///
    /// Dotted paths walk nested objects (`"profile.id"`).
    pub fn extract(record: &Value, key_path: &str) -> StoreResult<Key> {
        let mut current = record;
        for segment in key_path.split('.') {
            current = current.get(segment).ok_or_else(|| {
                StoreError::InvalidKey(format!("record has no value at key path '{}'", key_path))
            })?;
        }
        Key::from_value(current).ok_or_else(|| {
            StoreError::InvalidKey(format!(
                "value at key path '{}' is not a valid key: {}",
                key_path, current
            ))
        })
    }

    /// Convert back into a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => number_value(*n),
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::String(_) => 1,
            Key::Array(_) => 2,
        }
    }
}

/// Integral floats become JSON integers so `1` round-trips as `1`, not `1.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // -0 and 0 are the same key
            (Key::Number(a), Key::Number(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            // Strings order by UTF-16 code unit, not by code point
            (Key::String(a), Key::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(if n == 0.0 { 0.0 } else { n })
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(n as f64)
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(n as f64)
    }
}

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

impl TryFrom<&Value> for Key {
    type Error = StoreError;

    fn try_from(value: &Value) -> StoreResult<Self> {
        Key::from_value(value)
            .ok_or_else(|| StoreError::InvalidKey(format!("not a valid key: {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ordering_across_types() {
        let mut keys = vec![
            Key::from("b"),
            Key::Array(vec![Key::from(1)]),
            Key::from(10),
            Key::from("a"),
            Key::from(2),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(2),
                Key::from(10),
                Key::from("a"),
                Key::from("b"),
                Key::Array(vec![Key::from(1)]),
            ]
        );
    }

    #[test]
    fn test_array_ordering_is_lexicographic() {
        let short = Key::Array(vec![Key::from(1)]);
        let long = Key::Array(vec![Key::from(1), Key::from(0)]);
        let bigger = Key::Array(vec![Key::from(2)]);
        assert!(short < long);
        assert!(long < bigger);
    }

    #[test]
    fn test_extract_nested_path() {
        let record = json!({"profile": {"id": "u-1"}, "name": "Ann"});
        assert_eq!(Key::extract(&record, "profile.id").unwrap(), Key::from("u-1"));
    }

    #[test]
    fn test_extract_missing_path() {
        let record = json!({"name": "Ann"});
        let err = Key::extract(&record, "id").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn test_invalid_key_values() {
        assert!(Key::from_value(&json!(true)).is_none());
        assert!(Key::from_value(&json!(null)).is_none());
        assert!(Key::from_value(&json!({"a": 1})).is_none());
        assert!(Key::from_value(&json!([1, null])).is_none());
    }

    #[test]
    fn test_integral_numbers_stay_integral() {
        assert_eq!(Key::from(3).to_value(), json!(3));
        assert_eq!(Key::from(1.5).to_value(), json!(1.5));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let neg = Key::from_value(&json!(-0.0)).unwrap();
        assert_eq!(neg, Key::from(0));
        assert_eq!(neg.cmp(&Key::from(0)), Ordering::Equal);
        assert_eq!(neg.to_value(), json!(0));
    }

    #[test]
    fn test_strings_order_by_utf16_code_units() {
        // U+10000 encodes as a surrogate pair starting at 0xD800
        let supplementary = Key::from("\u{10000}");
        let bmp_high = Key::from("\u{FFFF}");
        assert!(supplementary < bmp_high);
        assert!(Key::from("a") < Key::from("b"));
    }
}
