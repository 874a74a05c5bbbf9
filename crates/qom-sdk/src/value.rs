//! Property values and type tags
//!
//! `PropertyValue` is the tagged variant that moves through the value
//! visitors; `PropertyType` is the declared tag a property advertises for
//! introspection. Both are plain data and independent of any object graph.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectError, ObjectResult};
use crate::util::{enum_parse, parse_name};

// ============================================================================
// Enum lookup tables
// ============================================================================

/// Name table for an enumerated property.
///
/// The index of a name in `values` is the integer stored by the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumLookup {
    /// Enum type name, reported as the property type
    pub name: &'static str,
    /// Value names, indexed by discriminant
    pub values: &'static [&'static str],
}

impl EnumLookup {
    /// Create a lookup table
    pub const fn new(name: &'static str, values: &'static [&'static str]) -> Self {
        Self { name, values }
    }

    /// Parse a value name into its index
    pub fn parse(&self, text: &str) -> ObjectResult<usize> {
        enum_parse(self.values, text)
    }

    /// Name for an index
    pub fn name_of(&self, index: usize) -> Option<&'static str> {
        self.values.get(index).copied()
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the table has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check that every value is a well-formed name
    pub fn validate(&self) -> ObjectResult<()> {
        for value in self.values {
            if parse_name(value, true).is_none() {
                return Err(ObjectError::ValidationFailed(format!(
                    "Enum '{}' has malformed value name '{}'",
                    self.name, value
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Property type tags
// ============================================================================

/// Declared type of a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    /// Boolean
    Bool,
    /// Signed 64-bit integer
    Int,
    /// UTF-8 string
    Str,
    /// Enumerated value from a lookup table
    Enum(EnumLookup),
    /// List of values
    List,
    /// Non-owning reference to an object of the named type
    Link(String),
    /// Owning reference to a child of the named type
    Child(String),
}

impl PropertyType {
    /// Whether this property is a child edge of the ownership tree
    pub fn is_child(&self) -> bool {
        matches!(self, PropertyType::Child(_))
    }

    /// Whether this property is a link
    pub fn is_link(&self) -> bool {
        matches!(self, PropertyType::Link(_))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => write!(f, "bool"),
            PropertyType::Int => write!(f, "int"),
            PropertyType::Str => write!(f, "str"),
            PropertyType::Enum(lookup) => write!(f, "{}", lookup.name),
            PropertyType::List => write!(f, "list"),
            PropertyType::Link(target) => write!(f, "link<{}>", target),
            PropertyType::Child(target) => write!(f, "child<{}>", target),
        }
    }
}

// ============================================================================
// Property values
// ============================================================================

/// A property value in transit between a property and the outside world
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// String
    Str(String),
    /// Enum value by name
    Enum(String),
    /// Object path of a link target (empty for none)
    Link(String),
    /// List of values
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Str(_) => "str",
            PropertyValue::Enum(_) => "enum",
            PropertyValue::Link(_) => "link",
            PropertyValue::List(_) => "list",
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the textual payload of string-like variants
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) | PropertyValue::Enum(s) | PropertyValue::Link(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a plain JSON value (monitor representation)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            PropertyValue::Int(i) => serde_json::Value::from(*i),
            PropertyValue::Str(s) | PropertyValue::Enum(s) | PropertyValue::Link(s) => {
                serde_json::Value::String(s.clone())
            }
            PropertyValue::List(items) => {
                serde_json::Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
        }
    }

    /// Convert from a plain JSON value.
    ///
    /// Strings become `Str`; the input visitor accepts `Str` for enum and
    /// link properties as well.
    pub fn from_json(value: &serde_json::Value) -> ObjectResult<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(PropertyValue::Int).ok_or_else(|| {
                ObjectError::ValidationFailed(format!("Number {} is not a 64-bit integer", n))
            }),
            serde_json::Value::String(s) => Ok(PropertyValue::Str(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(PropertyValue::from_json)
                .collect::<ObjectResult<Vec<_>>>()
                .map(PropertyValue::List),
            other => Err(ObjectError::ValidationFailed(format!(
                "Unsupported JSON value: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Str(s) | PropertyValue::Enum(s) | PropertyValue::Link(s) => {
                write!(f, "{}", s)
            }
            PropertyValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ON_OFF_AUTO: EnumLookup = EnumLookup::new("OnOffAuto", &["auto", "on", "off"]);

    #[test]
    fn test_enum_lookup_parse() {
        assert_eq!(ON_OFF_AUTO.parse("on").unwrap(), 1);
        assert_eq!(ON_OFF_AUTO.name_of(2), Some("off"));
        assert!(matches!(
            ON_OFF_AUTO.parse("maybe"),
            Err(ObjectError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_enum_lookup_validate() {
        assert!(ON_OFF_AUTO.validate().is_ok());
        let bad = EnumLookup::new("Bad", &["ok", "not ok"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_property_type_display() {
        assert_eq!(PropertyType::Bool.to_string(), "bool");
        assert_eq!(PropertyType::Enum(ON_OFF_AUTO).to_string(), "OnOffAuto");
        assert_eq!(
            PropertyType::Link("hotplug-handler".to_string()).to_string(),
            "link<hotplug-handler>"
        );
        assert_eq!(
            PropertyType::Child("container".to_string()).to_string(),
            "child<container>"
        );
    }

    #[test]
    fn test_json_conversion() {
        let value = PropertyValue::List(vec![
            PropertyValue::Int(3),
            PropertyValue::Str("x".to_string()),
        ]);
        let json = value.to_json();
        assert_eq!(json, serde_json::json!([3, "x"]));
        assert_eq!(PropertyValue::from_json(&json).unwrap(), value);
        assert!(PropertyValue::from_json(&serde_json::Value::Null).is_err());
    }

    #[test]
    fn test_tagged_serde() {
        let json = serde_json::to_string(&PropertyValue::Bool(true)).unwrap();
        assert_eq!(json, r#"{"type":"bool","value":true}"#);
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PropertyValue::Bool(true));
    }

    #[test]
    fn test_display_list() {
        let value = PropertyValue::List(vec![1i64.into(), 2i64.into()]);
        assert_eq!(value.to_string(), "1,2");
    }
}
