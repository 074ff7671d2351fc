//! Data types for polled values.
//!
//! A device reports dynamically typed scalars. `Value` keeps the exact
//! width the device used (an `Int16` stays an `Int16`), so downstream
//! consumers can see what the server actually sent. No coercion happens on
//! the read path.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type tag of a polled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
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
    Guid,
    ByteString,
    /// Any non-scalar or exotic type, carried in its textual form.
    Other,
}

impl ValueType {
    /// Name as used by OPC UA built-in types.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dynamically typed scalar read from a device.
///
/// Serializes as the bare scalar. It is output-only: the JSON form does not
/// carry the type, so it is never read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
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
    /// GUID in its canonical hyphenated form.
    Guid(String),
    ByteString(Vec<u8>),
    /// Textual rendering of a value with no scalar mapping.
    Other(String),
}

impl Value {
    /// The type tag matching this value.
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean(_) => ValueType::Boolean,
            Self::SByte(_) => ValueType::SByte,
            Self::Byte(_) => ValueType::Byte,
            Self::Int16(_) => ValueType::Int16,
            Self::UInt16(_) => ValueType::UInt16,
            Self::Int32(_) => ValueType::Int32,
            Self::UInt32(_) => ValueType::UInt32,
            Self::Int64(_) => ValueType::Int64,
            Self::UInt64(_) => ValueType::UInt64,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::String(_) => ValueType::String,
            Self::DateTime(_) => ValueType::DateTime,
            Self::Guid(_) => ValueType::Guid,
            Self::ByteString(_) => ValueType::ByteString,
            Self::Other(_) => ValueType::Other,
        }
    }

    /// Try to get the value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(*v as f64),
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// Try to get the value as i64 (integers only, no truncation of floats).
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|v| i64::try_from(v).ok())
    }

    /// Try to get the value as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => self.as_i128().map(|v| v != 0),
        }
    }

    /// Try to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Guid(s) | Self::Other(s) => Some(s),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            Self::SByte(v) => Some(*v as i128),
            Self::Byte(v) => Some(*v as i128),
            Self::Int16(v) => Some(*v as i128),
            Self::UInt16(v) => Some(*v as i128),
            Self::Int32(v) => Some(*v as i128),
            Self::UInt32(v) => Some(*v as i128),
            Self::Int64(v) => Some(*v as i128),
            Self::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::ByteString(v) => write!(f, "{:02X?}", v),
            Self::String(s) | Self::Guid(s) | Self::Other(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_preserves_width() {
        assert_eq!(Value::Int16(-3).value_type(), ValueType::Int16);
        assert_eq!(Value::UInt64(u64::MAX).value_type(), ValueType::UInt64);
        assert_eq!(Value::Float(1.5).value_type(), ValueType::Float);
        assert_eq!(Value::from("x").value_type(), ValueType::String);
    }

    #[test]
    fn test_value_conversions() {
        let v = Value::from(42.5);
        assert_eq!(v.as_f64(), Some(42.5));
        assert_eq!(v.as_i64(), None);

        let v = Value::UInt16(7);
        assert_eq!(v.as_i64(), Some(7));
        assert_eq!(v.as_f64(), Some(7.0));
        assert_eq!(v.as_bool(), Some(true));

        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(Value::from(true).as_f64(), Some(1.0));
    }

    #[test]
    fn test_value_json_is_bare_scalar() {
        assert_eq!(serde_json::to_string(&Value::Int32(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Value::from("on")).unwrap(), "\"on\"");
        assert_eq!(serde_json::to_string(&Value::Boolean(false)).unwrap(), "false");
    }

    #[test]
    fn test_string_like_values_share_json_form() {
        let guid = Value::Guid("09087e75-8e5e-499b-954f-f2a9603db28a".into());
        let text = Value::from("09087e75-8e5e-499b-954f-f2a9603db28a");
        assert_eq!(
            serde_json::to_string(&guid).unwrap(),
            serde_json::to_string(&text).unwrap()
        );
        // Only the type tag tells them apart.
        assert_ne!(guid.value_type(), text.value_type());
        assert_eq!(serde_json::to_string(&guid.value_type()).unwrap(), "\"Guid\"");
    }
}
