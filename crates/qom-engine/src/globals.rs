//! Global property defaults
//!
//! A global property sets `property` to `value` on every new instance whose
//! class chain contains `driver`. Values are text and go through the string
//! input visitor, exactly like values given on a command line. Globals are
//! applied after the instance init hooks ran, walking the chain from the
//! leaf type up to the root.
//!
//! Configuration file format:
//!
//! ```toml
//! [[global]]
//! driver = "openable-object"
//! property = "opened"
//! value = "on"
//! ```

use std::path::Path;
use std::str::FromStr;

use qom_sdk::{ObjectError, ObjectResult};
use serde::{Deserialize, Serialize};

use crate::types::ObjectClass;

/// One `driver.property=value` default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalProperty {
    /// Type name the default applies to (and its subtypes)
    pub driver: String,
    /// Property name
    pub property: String,
    /// Textual value
    pub value: String,
}

impl GlobalProperty {
    /// Create a global property
    pub fn new(
        driver: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            driver: driver.into(),
            property: property.into(),
            value: value.into(),
        }
    }
}

impl FromStr for GlobalProperty {
    type Err = ObjectError;

    /// Parse `driver.property=value`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| ObjectError::Config(format!("missing '=' in global '{}'", s)))?;
        let (driver, property) = key
            .split_once('.')
            .ok_or_else(|| ObjectError::Config(format!("missing '.' in global '{}'", s)))?;
        if driver.is_empty() || property.is_empty() {
            return Err(ObjectError::Config(format!(
                "empty driver or property in global '{}'",
                s
            )));
        }
        Ok(Self::new(driver, property, value))
    }
}

/// Ordered list of global property defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalProperties {
    #[serde(default, rename = "global")]
    globals: Vec<GlobalProperty>,
}

impl GlobalProperties {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document of `[[global]]` tables
    pub fn from_toml_str(text: &str) -> ObjectResult<Self> {
        toml::from_str(text).map_err(|e| ObjectError::Config(e.to_string()))
    }

    /// Load a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> ObjectResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ObjectError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> ObjectResult<String> {
        toml::to_string(self).map_err(|e| ObjectError::Config(e.to_string()))
    }

    /// Append a default; later entries win over earlier ones
    pub fn register(&mut self, global: GlobalProperty) {
        self.globals.push(global);
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &GlobalProperty> {
        self.globals.iter()
    }

    /// Number of defaults
    pub fn len(&self) -> usize {
        self.globals.len()
    }

    /// Check if there are no defaults
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Defaults that apply to an instance of `class`, in application order:
    /// leaf type first, registration order within one type
    pub fn for_class(&self, class: &ObjectClass) -> Vec<GlobalProperty> {
        class
            .ancestors()
            .iter()
            .rev()
            .flat_map(|type_name| self.globals.iter().filter(move |g| &g.driver == type_name))
            .cloned()
            .collect()
    }
}

impl FromIterator<GlobalProperty> for GlobalProperties {
    fn from_iter<I: IntoIterator<Item = GlobalProperty>>(iter: I) -> Self {
        Self {
            globals: iter.into_iter().collect(),
        }
    }
}
