//! # Typed Value Codec
//!
//! Converts between the tagged external representation of an attribute value
//! (textual value plus optional type tag, e.g. `"3"` / `"integer"`) and the
//! native value kinds used by the graph.
//!
//! The external tag vocabulary is wider than the native one: `byte` and
//! `char` collapse to string, `float` to double, `long` and `short` to
//! integer. Lists are represented externally as a bracketed,
//! comma-separated text form and carry a `list_of_` prefixed tag.
//!
//! Decoding an unrecognized tag fails with [`CxError::Codec`]; encoding is
//! total.

use crate::CxError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// TYPE TAGS
// =============================================================================

/// Scalar type tags recognized by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScalarType {
    Boolean,
    Byte,
    Char,
    Double,
    Float,
    Integer,
    Long,
    Short,
    String,
}

impl ScalarType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "boolean" => Some(Self::Boolean),
            "byte" => Some(Self::Byte),
            "char" => Some(Self::Char),
            "double" => Some(Self::Double),
            "float" => Some(Self::Float),
            "integer" => Some(Self::Integer),
            "long" => Some(Self::Long),
            "short" => Some(Self::Short),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Double => "double",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Short => "short",
            Self::String => "string",
        }
    }
}

/// A full type tag: a scalar kind, or a list of one scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DataType {
    Scalar(ScalarType),
    List(ScalarType),
}

impl DataType {
    /// Parse an external tag string.
    ///
    /// Returns `CxError::Codec` for tags outside the enumerated vocabulary;
    /// an unknown tag signals corrupt or forward-incompatible data.
    pub fn from_tag(tag: &str) -> Result<Self, CxError> {
        if let Some(element) = tag.strip_prefix("list_of_") {
            ScalarType::from_tag(element).map(Self::List)
        } else {
            ScalarType::from_tag(tag).map(Self::Scalar)
        }
        .ok_or_else(|| CxError::Codec(format!("unrecognized type tag '{}'", tag)))
    }

    /// The external tag string for this type.
    #[must_use]
    pub fn tag(self) -> String {
        match self {
            Self::Scalar(s) => s.tag().to_string(),
            Self::List(s) => format!("list_of_{}", s.tag()),
        }
    }
}

// =============================================================================
// NATIVE VALUES
// =============================================================================

/// A decoded attribute value.
///
/// `Eq` is not derived because the double variants carry `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Str(String),
    BoolList(Vec<bool>),
    IntegerList(Vec<i64>),
    DoubleList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    /// The type tag this value carries on the wire.
    ///
    /// Plain strings are the untagged default and return `None`.
    #[must_use]
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Str(_) => None,
            Self::Bool(_) => Some(DataType::Scalar(ScalarType::Boolean)),
            Self::Integer(_) => Some(DataType::Scalar(ScalarType::Integer)),
            Self::Double(_) => Some(DataType::Scalar(ScalarType::Double)),
            Self::BoolList(_) => Some(DataType::List(ScalarType::Boolean)),
            Self::IntegerList(_) => Some(DataType::List(ScalarType::Integer)),
            Self::DoubleList(_) => Some(DataType::List(ScalarType::Double)),
            Self::StrList(_) => Some(DataType::List(ScalarType::String)),
        }
    }
}

// =============================================================================
// DECODE
// =============================================================================

/// Strip every `[` and `]` from tagged text input.
///
/// The external list form is bracketed; brackets are removed globally before
/// splitting, for scalar tags as well, matching how the format has always
/// been read in the wild.
fn strip_brackets(text: &str) -> String {
    text.chars().filter(|c| *c != '[' && *c != ']').collect()
}

fn decode_scalar_text(text: &str, scalar: ScalarType) -> Result<AttrValue, CxError> {
    match scalar {
        ScalarType::Boolean => Ok(AttrValue::Bool(text.trim().eq_ignore_ascii_case("true"))),
        ScalarType::Byte | ScalarType::Char | ScalarType::String => {
            Ok(AttrValue::Str(text.to_string()))
        }
        ScalarType::Double | ScalarType::Float => text
            .trim()
            .parse::<f64>()
            .map(AttrValue::Double)
            .map_err(|_| CxError::Codec(format!("'{}' is not a valid double", text))),
        ScalarType::Integer | ScalarType::Long | ScalarType::Short => text
            .trim()
            .parse::<i64>()
            .map(AttrValue::Integer)
            .map_err(|_| CxError::Codec(format!("'{}' is not a valid integer", text))),
    }
}

fn decode_scalar_raw(raw: &Value, scalar: ScalarType) -> Result<AttrValue, CxError> {
    if let Some(text) = raw.as_str() {
        return decode_scalar_text(&strip_brackets(text), scalar);
    }
    match scalar {
        // Non-textual boolean sources decode via truthiness.
        ScalarType::Boolean => match raw {
            Value::Bool(b) => Ok(AttrValue::Bool(*b)),
            Value::Number(n) => Ok(AttrValue::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
            Value::Null => Ok(AttrValue::Bool(false)),
            other => Err(CxError::Codec(format!("'{}' is not a valid boolean", other))),
        },
        ScalarType::Byte | ScalarType::Char | ScalarType::String => {
            Ok(AttrValue::Str(raw.to_string()))
        }
        ScalarType::Double | ScalarType::Float => raw
            .as_f64()
            .map(AttrValue::Double)
            .ok_or_else(|| CxError::Codec(format!("'{}' is not a valid double", raw))),
        ScalarType::Integer | ScalarType::Long | ScalarType::Short => raw
            .as_i64()
            .or_else(|| raw.as_f64().map(|f| f as i64))
            .map(AttrValue::Integer)
            .ok_or_else(|| CxError::Codec(format!("'{}' is not a valid integer", raw))),
    }
}

fn collect_list(items: Vec<AttrValue>, scalar: ScalarType) -> Result<AttrValue, CxError> {
    match scalar {
        ScalarType::Boolean => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AttrValue::Bool(b) => out.push(b),
                    other => return Err(CxError::Codec(format!("{:?} in boolean list", other))),
                }
            }
            Ok(AttrValue::BoolList(out))
        }
        ScalarType::Integer | ScalarType::Long | ScalarType::Short => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AttrValue::Integer(i) => out.push(i),
                    other => return Err(CxError::Codec(format!("{:?} in integer list", other))),
                }
            }
            Ok(AttrValue::IntegerList(out))
        }
        ScalarType::Double | ScalarType::Float => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AttrValue::Double(d) => out.push(d),
                    other => return Err(CxError::Codec(format!("{:?} in double list", other))),
                }
            }
            Ok(AttrValue::DoubleList(out))
        }
        ScalarType::Byte | ScalarType::Char | ScalarType::String => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AttrValue::Str(s) => out.push(s),
                    other => return Err(CxError::Codec(format!("{:?} in string list", other))),
                }
            }
            Ok(AttrValue::StrList(out))
        }
    }
}

fn decode_list(raw: &Value, scalar: ScalarType) -> Result<AttrValue, CxError> {
    let items = if let Some(text) = raw.as_str() {
        let stripped = strip_brackets(text);
        stripped
            .split(',')
            .map(|part| decode_scalar_text(part, scalar))
            .collect::<Result<Vec<_>, _>>()?
    } else if let Some(array) = raw.as_array() {
        array
            .iter()
            .map(|item| decode_scalar_raw(item, scalar))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        return Err(CxError::Codec(format!("'{}' is not a list", raw)));
    };
    collect_list(items, scalar)
}

/// Decode an untagged value.
///
/// Untagged values keep their JSON kind; a bare string stays a string,
/// which is the default type of the format.
fn decode_untagged(raw: &Value) -> Result<AttrValue, CxError> {
    match raw {
        Value::String(s) => Ok(AttrValue::Str(s.clone())),
        Value::Bool(b) => Ok(AttrValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(AttrValue::Integer)
            .or_else(|| n.as_f64().map(AttrValue::Double))
            .ok_or_else(|| CxError::Codec(format!("'{}' is not representable", n))),
        Value::Array(items) => {
            // Element kind is inferred from the first element, as on the wire.
            let scalar = match items.first() {
                None => return Ok(AttrValue::StrList(Vec::new())),
                Some(Value::Bool(_)) => ScalarType::Boolean,
                Some(Value::String(_)) => ScalarType::String,
                Some(Value::Number(n)) if n.is_i64() => ScalarType::Integer,
                Some(Value::Number(_)) => ScalarType::Double,
                Some(other) => {
                    return Err(CxError::Codec(format!("'{}' in untagged list", other)));
                }
            };
            decode_list(raw, scalar)
        }
        other => Err(CxError::Codec(format!("'{}' is not a value", other))),
    }
}

/// Decode an external value into its native form.
///
/// `tag` is the optional `d` field of the attribute element; `raw` is the
/// `v` field. Unrecognized tags fail rather than silently defaulting.
pub fn decode(raw: &Value, tag: Option<&str>) -> Result<AttrValue, CxError> {
    match tag {
        None => decode_untagged(raw),
        Some(tag) => match DataType::from_tag(tag)? {
            DataType::Scalar(scalar) => decode_scalar_raw(raw, scalar),
            DataType::List(scalar) => decode_list(raw, scalar),
        },
    }
}

// =============================================================================
// ENCODE
// =============================================================================

fn join<T: ToString>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(","))
}

/// Encode a native value into its external form: textual value plus
/// optional type tag. Plain strings stay untagged.
#[must_use]
pub fn encode(value: &AttrValue) -> (String, Option<DataType>) {
    let text = match value {
        AttrValue::Str(s) => s.clone(),
        AttrValue::Bool(b) => b.to_string(),
        AttrValue::Integer(i) => i.to_string(),
        AttrValue::Double(d) => d.to_string(),
        AttrValue::BoolList(items) => join(items),
        AttrValue::IntegerList(items) => join(items),
        AttrValue::DoubleList(items) => join(items),
        AttrValue::StrList(items) => format!("[{}]", items.join(",")),
    };
    (text, value.data_type())
}

// =============================================================================
// TESTS
// =============================================================================
