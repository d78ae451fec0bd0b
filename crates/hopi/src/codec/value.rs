//! Decoded host values

use crate::error::DecodeError;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A value produced by the interpreter, after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `None`
    Null,
    /// `bool`
    Bool(bool),
    /// An integer that fits in 64 bits
    Int(i64),
    /// A float, or an integer too large for [`Value::Int`]
    Float(f64),
    /// `str`
    String(String),
    /// `list` or `tuple`, or a decoder's sequence output
    List(Vec<Value>),
    /// `dict`, keys rendered as strings
    Map(BTreeMap<String, Value>),
    /// Output of a custom decoder that has no structural equivalent
    Opaque(Opaque),
}

/// A host object built by a custom decoder
///
/// Compares equal only to clones of itself.
#[derive(Clone)]
pub struct Opaque {
    type_tag: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap `value`, remembering the remote type it came from
    pub fn new<T: Any + Send + Sync>(type_tag: impl Into<String>, value: T) -> Self {
        Self {
            type_tag: type_tag.into(),
            inner: Arc::new(value),
        }
    }

    /// Remote type tag, `module.qualname`
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Borrow the wrapped value if it is a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_tag)
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Value {
    /// Short name of the variant, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Whether this is [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The number as a float, for both integers and floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The elements, if this is a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The entries, if this is a map
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The custom object, if this is one
    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Element `index` of a list
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.as_list().and_then(|items| items.get(index))
    }

    /// Entry `key` of a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Convert to JSON
    ///
    /// Returns `None` for opaque values and non-finite floats, which JSON
    /// cannot represent.
    pub fn to_json(&self) -> Option<JsonValue> {
        Some(match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::Number(serde_json::Number::from_f64(*f)?),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::List(items) => {
                JsonValue::Array(items.iter().map(Value::to_json).collect::<Option<_>>()?)
            }
            Value::Map(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| Some((k.clone(), v.to_json()?)))
                    .collect::<Option<_>>()?,
            ),
            Value::Opaque(_) => return None,
        })
    }

    /// Deserialize into any serde type
    ///
    /// # Errors
    ///
    /// [`DecodeError::Conversion`] if the value has no JSON form or does not
    /// match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let json = self.to_json().ok_or_else(|| {
            DecodeError::Conversion(format!("{} value has no JSON representation", self.kind()))
        })?;
        serde_json::from_value(json).map_err(|e| DecodeError::Conversion(e.to_string()))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}
