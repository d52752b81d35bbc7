//! Result tree produced by the decoder.
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;

/// A decoded, natively typed value. `Null` is an explicit null, which is
/// not the same thing as [`Slot::Absent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn float(f: f64) -> Self {
        Value::Float(OrderedFloat(f))
    }
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs) => Some(xs),
            _ => None,
        }
    }
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }
}

/// Outcome of decoding one schema node.
///
/// `Absent` means nothing usable was submitted. It never reaches the final
/// output: structured parents turn it into [`Value::Null`], unstructured
/// parents and kwargs drop the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Present(Value),
    Absent,
}

impl Slot {
    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent)
    }

    /// Resolution used where the slot must exist.
    pub fn or_null(self) -> Value {
        match self {
            Slot::Present(v) => v,
            Slot::Absent => Value::Null,
        }
    }

    /// Resolution used where the slot may be skipped.
    pub fn present(self) -> Option<Value> {
        match self {
            Slot::Present(v) => Some(v),
            Slot::Absent => None,
        }
    }
}

impl From<Value> for Slot {
    fn from(v: Value) -> Self {
        Slot::Present(v)
    }
}
