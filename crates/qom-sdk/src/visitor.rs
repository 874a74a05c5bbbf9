//! Visitors: typed encode/decode of property values
//!
//! A property getter visits its current value; a setter visits a scratch
//! value and commits it afterwards. Output visitors read the value they are
//! handed, input visitors overwrite it, so the same getter/setter code serves
//! both directions without knowing which one is active.

use crate::error::{ObjectError, ObjectResult};
use crate::value::{EnumLookup, PropertyValue};

/// Typed value visitor
pub trait Visitor {
    /// Visit a boolean
    fn visit_bool(&mut self, name: &str, value: &mut bool) -> ObjectResult<()>;

    /// Visit a signed integer
    fn visit_int(&mut self, name: &str, value: &mut i64) -> ObjectResult<()>;

    /// Visit a string
    fn visit_str(&mut self, name: &str, value: &mut String) -> ObjectResult<()>;

    /// Visit an enum discriminant described by `lookup`
    fn visit_enum(&mut self, name: &str, value: &mut usize, lookup: &EnumLookup)
        -> ObjectResult<()>;

    /// Visit a link target path (empty string for no target)
    fn visit_link(&mut self, name: &str, path: &mut String) -> ObjectResult<()>;

    /// Visit a list of values
    fn visit_list(&mut self, name: &str, values: &mut Vec<PropertyValue>) -> ObjectResult<()>;
}

fn enum_name(name: &str, value: usize, lookup: &EnumLookup) -> ObjectResult<&'static str> {
    lookup.name_of(value).ok_or_else(|| {
        ObjectError::ValidationFailed(format!(
            "Value {} of '{}' is out of range for enum {}",
            value, name, lookup.name
        ))
    })
}

// ============================================================================
// PropertyValue visitors
// ============================================================================

/// Captures the value a getter produces as a `PropertyValue`
#[derive(Debug, Default)]
pub struct ValueOutputVisitor {
    value: Option<PropertyValue>,
}

impl ValueOutputVisitor {
    /// Create an empty output visitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the captured value
    pub fn into_value(self, name: &str) -> ObjectResult<PropertyValue> {
        self.value.ok_or_else(|| {
            ObjectError::ValidationFailed(format!("Property '{}' produced no value", name))
        })
    }
}

impl Visitor for ValueOutputVisitor {
    fn visit_bool(&mut self, _name: &str, value: &mut bool) -> ObjectResult<()> {
        self.value = Some(PropertyValue::Bool(*value));
        Ok(())
    }

    fn visit_int(&mut self, _name: &str, value: &mut i64) -> ObjectResult<()> {
        self.value = Some(PropertyValue::Int(*value));
        Ok(())
    }

    fn visit_str(&mut self, _name: &str, value: &mut String) -> ObjectResult<()> {
        self.value = Some(PropertyValue::Str(value.clone()));
        Ok(())
    }

    fn visit_enum(
        &mut self,
        name: &str,
        value: &mut usize,
        lookup: &EnumLookup,
    ) -> ObjectResult<()> {
        let text = enum_name(name, *value, lookup)?;
        self.value = Some(PropertyValue::Enum(text.to_string()));
        Ok(())
    }

    fn visit_link(&mut self, _name: &str, path: &mut String) -> ObjectResult<()> {
        self.value = Some(PropertyValue::Link(path.clone()));
        Ok(())
    }

    fn visit_list(&mut self, _name: &str, values: &mut Vec<PropertyValue>) -> ObjectResult<()> {
        self.value = Some(PropertyValue::List(values.clone()));
        Ok(())
    }
}

/// Feeds a `PropertyValue` into a setter, checking it against the visited type
#[derive(Debug)]
pub struct ValueInputVisitor {
    value: Option<PropertyValue>,
}

impl ValueInputVisitor {
    /// Create an input visitor holding `value`
    pub fn new(value: PropertyValue) -> Self {
        Self { value: Some(value) }
    }

    fn take(&mut self, name: &str) -> ObjectResult<PropertyValue> {
        self.value.take().ok_or_else(|| {
            ObjectError::ValidationFailed(format!("No value left to visit for '{}'", name))
        })
    }
}

impl Visitor for ValueInputVisitor {
    fn visit_bool(&mut self, name: &str, value: &mut bool) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::Bool(b) => {
                *value = b;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, "bool")),
        }
    }

    fn visit_int(&mut self, name: &str, value: &mut i64) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::Int(i) => {
                *value = i;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, "int")),
        }
    }

    fn visit_str(&mut self, name: &str, value: &mut String) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::Str(s) => {
                *value = s;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, "str")),
        }
    }

    fn visit_enum(
        &mut self,
        name: &str,
        value: &mut usize,
        lookup: &EnumLookup,
    ) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::Enum(s) | PropertyValue::Str(s) => {
                *value = lookup.parse(&s)?;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, lookup.name)),
        }
    }

    fn visit_link(&mut self, name: &str, path: &mut String) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::Link(s) | PropertyValue::Str(s) => {
                *path = s;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, "link")),
        }
    }

    fn visit_list(&mut self, name: &str, values: &mut Vec<PropertyValue>) -> ObjectResult<()> {
        match self.take(name)? {
            PropertyValue::List(items) => {
                *values = items;
                Ok(())
            }
            _ => Err(ObjectError::invalid_type(name, "list")),
        }
    }
}

// ============================================================================
// String visitors (textual configuration)
// ============================================================================

/// Parses a textual value, e.g. from a global property or a config file
///
/// Lists are comma separated and every item becomes a string, so an item
/// cannot itself contain a comma. [`StringOutputVisitor`] refuses to render
/// such lists rather than produce text that splits differently.
#[derive(Debug)]
pub struct StringInputVisitor<'a> {
    input: &'a str,
}

impl<'a> StringInputVisitor<'a> {
    /// Create a visitor over `input`
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }
}

fn parse_int(name: &str, text: &str) -> ObjectResult<i64> {
    let invalid = || ObjectError::invalid_type(name, "an int64 value");
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    // from_str_radix accepts a leading sign of its own
    if digits.starts_with(['+', '-']) {
        return Err(invalid());
    }
    let magnitude = u64::from_str_radix(digits, radix).map_err(|_| invalid())?;
    if negative {
        0i64.checked_sub_unsigned(magnitude).ok_or_else(invalid)
    } else {
        i64::try_from(magnitude).map_err(|_| invalid())
    }
}

impl Visitor for StringInputVisitor<'_> {
    fn visit_bool(&mut self, name: &str, value: &mut bool) -> ObjectResult<()> {
        *value = match self.input {
            "on" | "yes" | "true" => true,
            "off" | "no" | "false" => false,
            _ => {
                return Err(ObjectError::ValidationFailed(format!(
                    "Parameter '{}' expects 'on' or 'off'",
                    name
                )))
            }
        };
        Ok(())
    }

    fn visit_int(&mut self, name: &str, value: &mut i64) -> ObjectResult<()> {
        *value = parse_int(name, self.input)?;
        Ok(())
    }

    fn visit_str(&mut self, _name: &str, value: &mut String) -> ObjectResult<()> {
        *value = self.input.to_string();
        Ok(())
    }

    fn visit_enum(
        &mut self,
        _name: &str,
        value: &mut usize,
        lookup: &EnumLookup,
    ) -> ObjectResult<()> {
        *value = lookup.parse(self.input)?;
        Ok(())
    }

    fn visit_link(&mut self, _name: &str, path: &mut String) -> ObjectResult<()> {
        *path = self.input.to_string();
        Ok(())
    }

    fn visit_list(&mut self, _name: &str, values: &mut Vec<PropertyValue>) -> ObjectResult<()> {
        *values = if self.input.is_empty() {
            Vec::new()
        } else {
            self.input
                .split(',')
                .map(|item| PropertyValue::Str(item.to_string()))
                .collect()
        };
        Ok(())
    }
}

/// Renders a value as text
#[derive(Debug, Default)]
pub struct StringOutputVisitor {
    output: Option<String>,
}

impl StringOutputVisitor {
    /// Create an empty output visitor
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the rendered text
    pub fn into_string(self, name: &str) -> ObjectResult<String> {
        self.output.ok_or_else(|| {
            ObjectError::ValidationFailed(format!("Property '{}' produced no value", name))
        })
    }
}

impl Visitor for StringOutputVisitor {
    fn visit_bool(&mut self, _name: &str, value: &mut bool) -> ObjectResult<()> {
        self.output = Some(value.to_string());
        Ok(())
    }

    fn visit_int(&mut self, _name: &str, value: &mut i64) -> ObjectResult<()> {
        self.output = Some(value.to_string());
        Ok(())
    }

    fn visit_str(&mut self, _name: &str, value: &mut String) -> ObjectResult<()> {
        self.output = Some(value.clone());
        Ok(())
    }

    fn visit_enum(
        &mut self,
        name: &str,
        value: &mut usize,
        lookup: &EnumLookup,
    ) -> ObjectResult<()> {
        self.output = Some(enum_name(name, *value, lookup)?.to_string());
        Ok(())
    }

    fn visit_link(&mut self, _name: &str, path: &mut String) -> ObjectResult<()> {
        self.output = Some(path.clone());
        Ok(())
    }

    fn visit_list(&mut self, name: &str, values: &mut Vec<PropertyValue>) -> ObjectResult<()> {
        let mut items = Vec::with_capacity(values.len());
        for value in values.iter() {
            let item = value.to_string();
            if item.contains(',') || matches!(value, PropertyValue::List(_)) {
                return Err(ObjectError::ValidationFailed(format!(
                    "List item '{}' of '{}' cannot be written as text",
                    item, name
                )));
            }
            items.push(item);
        }
        self.output = Some(items.join(","));
        Ok(())
    }
}
