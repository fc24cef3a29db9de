//! Graph-native typed values.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Built-in data types a variable node can declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Any type; writes are not type-checked.
    BaseDataType,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    DateTime,
    ByteString,
    LocalizedText,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Text with a locale, as held by localized-text variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    pub locale: String,
    pub text: String,
}

impl LocalizedText {
    pub fn new(locale: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            text: text.into(),
        }
    }
}

/// A typed value stored in a variable node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    #[default]
    Null,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    ByteString(Vec<u8>),
    LocalizedText(LocalizedText),
    Array(Vec<Variant>),
}

impl Variant {
    /// The scalar type of this value. `None` for null and empty arrays,
    /// which are accepted by every variable.
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Variant::Null => return None,
            Variant::Boolean(_) => DataType::Boolean,
            Variant::SByte(_) => DataType::SByte,
            Variant::Byte(_) => DataType::Byte,
            Variant::Int16(_) => DataType::Int16,
            Variant::UInt16(_) => DataType::UInt16,
            Variant::Int32(_) => DataType::Int32,
            Variant::UInt32(_) => DataType::UInt32,
            Variant::Int64(_) => DataType::Int64,
            Variant::UInt64(_) => DataType::UInt64,
            Variant::Float(_) => DataType::Float,
            Variant::Double(_) => DataType::Double,
            Variant::String(_) => DataType::String,
            Variant::DateTime(_) => DataType::DateTime,
            Variant::ByteString(_) => DataType::ByteString,
            Variant::LocalizedText(_) => DataType::LocalizedText,
            Variant::Array(items) => return items.first().and_then(Variant::data_type),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Variant]> {
        match self {
            Variant::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<Option<String>> for Variant {
    fn from(value: Option<String>) -> Self {
        value.map(Variant::String).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_type_follows_first_element() {
        let arr = Variant::Array(vec![Variant::from("a"), Variant::from("b")]);
        assert_eq!(arr.data_type(), Some(DataType::String));
        assert_eq!(Variant::Array(vec![]).data_type(), None);
        assert_eq!(Variant::Null.data_type(), None);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Variant::Int32(7)).unwrap();
        assert_eq!(json["type"], "Int32");
        assert_eq!(json["value"], 7);
    }
}
