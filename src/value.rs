//! SPDX-License-Identifier: MIT

//! The BSER value universe: the JSON-superset data model the codec
//! transports.

use indexmap::IndexMap;

use crate::int64::Int64;

/// A BSER object's key-value map. Insertion order is preserved, matching
/// the decoder's contract and the encoder's key-ordering rule.
pub type Object = IndexMap<String, Value>;

/// A decoded or to-be-encoded BSER value.
///
/// `Value` is a JSON-superset data model: it adds [`Value::Int64`] (a
/// width-preserving 64-bit carrier, see [`crate::int64`]) and
/// [`Value::Undefined`] (a marker erased from objects on encode) on top of
/// the usual JSON shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent-but-present object property. Only meaningful as an object
    /// value; erased by the encoder and never produced by the decoder.
    Undefined,
    Null,
    Bool(bool),
    /// A number that was encoded (or will be encoded) as one of the
    /// integer tags. Carries a native `i64` because width-selection is an
    /// encoder concern, not part of the value's identity.
    Int(i64),
    /// A number known to have arrived as (or to require) the 64-bit wire
    /// tag, regardless of whether it would fit narrower.
    Int64(Int64),
    /// IEEE-754 double; also the catch-all for any non-integral number.
    Real(f64),
    /// UTF-8 string. The decoder does not require the wire bytes to be
    /// well-formed Unicode; non-UTF-8 sequences are lossily replaced rather
    /// than rejected, since the service emits standards-compliant UTF-8 in
    /// practice.
    String(String),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {
    /// Shorthand for building an empty object, which is otherwise a common
    /// first step before inserting keys.
    pub fn object() -> Self {
        Value::Object(Object::new())
    }

    /// Shorthand for building an array from an iterator of values.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Returns the string slice if this is a `Value::String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the `i64` if this is an integer of either representation.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Int64(v) => Some(v.get()),
            _ => None,
        }
    }

    /// Returns the bool if this is a `Value::Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the array slice if this is a `Value::Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the object map if this is a `Value::Object`.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a key, returning `None` for both "key absent" and
    /// "key present but `Undefined`".
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self.as_object()?.get(key) {
            Some(Value::Undefined) => None,
            other => other,
        }
    }

    /// True for `Value::Null` only (`Undefined` is a distinct state).
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<Int64> for Value {
    fn from(v: Int64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Converts a parsed JSON document into the BSER value universe, used to
/// attach the service's JSON `get-sockname` response as diagnostic data on
/// discovery failures.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Real(n.as_f64().unwrap_or(0.0))
                }
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            },
            serde_json::Value::Object(map) => {
                let mut obj = Object::new();
                for (k, v) in map {
                    obj.insert(k, Value::from(v));
                }
                Value::Object(obj)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_treats_undefined_as_absent() {
        let mut obj = Object::new();
        obj.insert("present".to_owned(), Value::Int(1));
        obj.insert("erased".to_owned(), Value::Undefined);
        let value = Value::Object(obj);

        assert_eq!(value.get("present").and_then(Value::as_i64), Some(1));
        assert_eq!(value.get("erased"), None);
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn null_is_not_undefined() {
        assert!(Value::Null.is_null());
        assert!(!Value::Undefined.is_null());
    }

    #[test]
    fn converts_from_json() {
        let json = serde_json::json!({"sockname": "/tmp/x.sock", "pid": 42});
        let value = Value::from(json);
        assert_eq!(value.get("sockname").and_then(Value::as_str), Some("/tmp/x.sock"));
        assert_eq!(value.get("pid").and_then(Value::as_i64), Some(42));
    }
}
