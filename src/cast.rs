//! Type-name directed string → value conversion.
//!
//! The set of type names is closed: a name is first parsed into
//! [`NativeType`] and only then converted with a `match`. A name outside
//! the whitelist never reaches a converter.
use std::fmt;
use std::str::FromStr;

use crate::error::CastError;
use crate::value::{Slot, Value};

/// Type names that mean "no type": the cast yields an explicit null.
pub const NO_TYPE_MARKERS: [&str; 2] = ["None", "NoneType"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeType {
    Int,
    Float,
    Double,
    Long,
    Str,
    Bool,
}

impl NativeType {
    pub const ALL: [NativeType; 6] = [
        NativeType::Int,
        NativeType::Float,
        NativeType::Double,
        NativeType::Long,
        NativeType::Str,
        NativeType::Bool,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NativeType::Int => "int",
            NativeType::Float => "float",
            NativeType::Double => "double",
            NativeType::Long => "long",
            NativeType::Str => "str",
            NativeType::Bool => "bool",
        }
    }

    fn convert(self, raw: &str) -> Option<Value> {
        match self {
            NativeType::Int | NativeType::Long => raw.trim().parse::<i64>().ok().map(Value::Int),
            NativeType::Float | NativeType::Double => {
                raw.trim().parse::<f64>().ok().map(Value::float)
            }
            NativeType::Str => Some(Value::Str(raw.to_string())),
            NativeType::Bool => parse_bool(raw.trim()).map(Value::Bool),
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NativeType {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NativeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CastError::InvalidType(s.to_string()))
    }
}

pub fn is_no_type(type_name: &str) -> bool {
    NO_TYPE_MARKERS.contains(&type_name)
}

// checkboxes submit "on"
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Cast `raw` to the type named by `type_name`.
///
/// - a no-type marker yields `Present(Null)`
/// - an empty `raw` yields `Absent` (left blank, not invalid)
/// - a name outside the whitelist fails with [`CastError::InvalidType`]
/// - an unconvertible `raw` fails with [`CastError::InvalidValue`], naming
///   `context` when given
pub fn cast(raw: &str, type_name: &str, context: Option<&str>) -> Result<Slot, CastError> {
    if is_no_type(type_name) {
        return Ok(Slot::Present(Value::Null));
    }
    if raw.is_empty() {
        return Ok(Slot::Absent);
    }
    let ty = NativeType::from_str(type_name)?;
    ty.convert(raw)
        .map(Slot::Present)
        .ok_or_else(|| CastError::InvalidValue {
            value: raw.to_string(),
            type_name: type_name.to_string(),
            context: context.map(str::to_string),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_vs_invalid_vs_valid() {
        assert_eq!(cast("", "int", None), Ok(Slot::Absent));
        assert!(matches!(
            cast("abc", "int", Some("a")),
            Err(CastError::InvalidValue { ref value, ref type_name, ref context })
                if value == "abc" && type_name == "int" && context.as_deref() == Some("a")
        ));
        assert_eq!(cast("5", "int", None), Ok(Slot::Present(Value::Int(5))));
    }

    #[test]
    fn type_names_outside_whitelist_are_rejected() {
        for name in ["os.system", "eval", "Int", "dict", "list", ""] {
            assert_eq!(
                cast("5", name, None),
                Err(CastError::InvalidType(name.to_string())),
                "{name}"
            );
        }
    }

    #[test]
    fn no_type_marker_is_explicit_null() {
        assert_eq!(cast("", "None", None), Ok(Slot::Present(Value::Null)));
        assert_eq!(cast("x", "NoneType", None), Ok(Slot::Present(Value::Null)));
    }

    #[test]
    fn each_whitelisted_type_converts() {
        assert_eq!(cast("-12", "long", None), Ok(Slot::Present(Value::Int(-12))));
        assert_eq!(cast(" 2.5 ", "float", None), Ok(Slot::Present(Value::float(2.5))));
        assert_eq!(cast("1e3", "double", None), Ok(Slot::Present(Value::float(1000.0))));
        assert_eq!(cast(" keep ", "str", None), Ok(Slot::Present(Value::str(" keep "))));
        assert_eq!(cast("on", "bool", None), Ok(Slot::Present(Value::Bool(true))));
        assert_eq!(cast("False", "bool", None), Ok(Slot::Present(Value::Bool(false))));
        assert!(cast("maybe", "bool", None).is_err());
        assert!(cast("1.5", "int", None).is_err());
    }
}
