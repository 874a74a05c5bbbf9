//! Property system
//!
//! A property is a named, typed attribute with optional getter, setter and
//! release callbacks. Getters write the current value into a [`Visitor`];
//! setters read the new value out of one and decide whether to commit it, so
//! the same pair of callbacks serves every encoding (tagged values, text,
//! JSON).
//!
//! Properties live either on an instance (added by init hooks or at run
//! time) or on a class (added by class init hooks, shared by every
//! instance). Lookups try the instance first, so an instance property
//! shadows a class property of the same name.

mod alias;
mod flip;
mod link;
mod typed;

pub use flip::{FlipCloseFn, FlipOpenFn};
pub use link::{LinkCheckFn, LinkStrength};
pub use typed::{
    bool_property, enum_property, int_property, str_property, BoolGetter, BoolSetter, EnumGetter,
    EnumSetter, FieldAccess, IntGetter, IntSetter, StrGetter, StrSetter,
};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use qom_sdk::{
    is_valid_path_component, ObjectError, ObjectResult, PropertyType, PropertyValue,
    StringInputVisitor, StringOutputVisitor, ValueInputVisitor, ValueOutputVisitor, Visitor,
};
use serde::Serialize;
use tracing::trace;

use crate::object::{ObjectGraph, ObjectId};

/// Getter: writes the current value into the visitor
pub type PropertyGetter =
    Arc<dyn Fn(&ObjectGraph, ObjectId, &mut dyn Visitor, &str) -> ObjectResult<()> + Send + Sync>;

/// Setter: reads the new value from the visitor and commits it
pub type PropertySetter = Arc<
    dyn Fn(&mut ObjectGraph, ObjectId, &mut dyn Visitor, &str) -> ObjectResult<()> + Send + Sync,
>;

/// Release hook, run once when the property is deleted or its owner dies
pub type PropertyRelease = Arc<dyn Fn(&mut ObjectGraph, ObjectId, &str) + Send + Sync>;

// ============================================================================
// Property
// ============================================================================

/// Property definition
#[derive(Clone)]
pub struct Property {
    name: String,
    kind: PropertyType,
    description: Option<String>,
    get: Option<PropertyGetter>,
    set: Option<PropertySetter>,
    release: Option<PropertyRelease>,
}

impl Property {
    /// Create a property with no callbacks
    pub fn new(name: impl Into<String>, kind: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            get: None,
            set: None,
            release: None,
        }
    }

    /// Set the description shown by introspection
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the getter
    pub fn getter(
        mut self,
        f: impl Fn(&ObjectGraph, ObjectId, &mut dyn Visitor, &str) -> ObjectResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.get = Some(Arc::new(f));
        self
    }

    /// Set the setter
    pub fn setter(
        mut self,
        f: impl Fn(&mut ObjectGraph, ObjectId, &mut dyn Visitor, &str) -> ObjectResult<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.set = Some(Arc::new(f));
        self
    }

    /// Set the release hook
    pub fn release(mut self, f: impl Fn(&mut ObjectGraph, ObjectId, &str) + Send + Sync + 'static) -> Self {
        self.release = Some(Arc::new(f));
        self
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type
    pub fn kind(&self) -> &PropertyType {
        &self.kind
    }

    /// Whether the property has a getter
    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    /// Whether the property has a setter
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    fn info(&self, class_level: bool) -> PropertyInfo {
        PropertyInfo {
            name: self.name.clone(),
            type_name: self.kind.to_string(),
            description: self.description.clone(),
            readable: self.is_readable(),
            writable: self.is_writable(),
            class_level,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("readable", &self.is_readable())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Property attached to an instance
pub(crate) struct PropertyEntry {
    pub(crate) property: Property,
    /// Set for child edges of the ownership tree
    pub(crate) child: Option<ObjectId>,
}

impl PropertyEntry {
    pub(crate) fn release(self, graph: &mut ObjectGraph, owner: ObjectId, name: &str) {
        if let Some(release) = self.property.release {
            release(graph, owner, name);
        }
    }
}

/// Introspection record for one property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyInfo {
    /// Property name
    pub name: String,
    /// Declared type, e.g. `bool` or `link<hotplug-handler>`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Description, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Has a getter
    pub readable: bool,
    /// Has a setter
    pub writable: bool,
    /// Declared on the class rather than the instance
    pub class_level: bool,
}

// ============================================================================
// Field projections
// ============================================================================

/// Projection from an instance state struct `S` to one of its fields
pub struct Field<S, T> {
    get: fn(&S) -> &T,
    get_mut: fn(&mut S) -> &mut T,
}

impl<S, T> Clone for Field<S, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, T> Copy for Field<S, T> {}

impl<S: Any, T: 'static> Field<S, T> {
    /// Create a projection; see the [`field!`](crate::field) macro
    pub const fn new(get: fn(&S) -> &T, get_mut: fn(&mut S) -> &mut T) -> Self {
        Self { get, get_mut }
    }

    /// Borrow the field on an instance
    pub fn read<'g>(&self, graph: &'g ObjectGraph, id: ObjectId) -> ObjectResult<&'g T> {
        Ok((self.get)(graph.state::<S>(id)?))
    }

    /// Mutably borrow the field on an instance
    pub fn write<'g>(&self, graph: &'g mut ObjectGraph, id: ObjectId) -> ObjectResult<&'g mut T> {
        Ok((self.get_mut)(graph.state_mut::<S>(id)?))
    }
}

/// Build a [`Field`] projection: `field!(Door, opened)`
#[macro_export]
macro_rules! field {
    ($state:ty, $name:ident) => {
        $crate::property::Field::<$state, _>::new(
            |s: &$state| &s.$name,
            |s: &mut $state| &mut s.$name,
        )
    };
}

// ============================================================================
// Graph API
// ============================================================================

impl ObjectGraph {
    /// Add an instance property.
    ///
    /// Fails with `DuplicateProperty` if the instance already has a property
    /// of that name. A class property of the same name is shadowed.
    pub fn add_property(&mut self, owner: ObjectId, property: Property) -> ObjectResult<()> {
        if !is_valid_path_component(property.name()) {
            return Err(ObjectError::ValidationFailed(format!(
                "Invalid property name '{}'",
                property.name()
            )));
        }
        if self.has_instance_property(owner, property.name()) {
            return Err(ObjectError::DuplicateProperty(property.name().to_string()));
        }
        trace!(%owner, name = property.name(), kind = %property.kind(), "added property");
        self.instance_mut(owner)?.properties.insert(
            property.name().to_string(),
            PropertyEntry {
                property,
                child: None,
            },
        );
        Ok(())
    }

    /// Whether the object has an instance or class property `name`
    pub fn has_property(&self, owner: ObjectId, name: &str) -> bool {
        self.instance(owner)
            .map(|inst| inst.properties.contains_key(name) || inst.class.property(name).is_some())
            .unwrap_or(false)
    }

    pub(crate) fn has_instance_property(&self, owner: ObjectId, name: &str) -> bool {
        self.instance(owner)
            .map(|inst| inst.properties.contains_key(name))
            .unwrap_or(false)
    }

    /// Look up a property, instance properties first
    pub fn find_property(&self, owner: ObjectId, name: &str) -> ObjectResult<Property> {
        let inst = self.instance(owner)?;
        inst.properties
            .get(name)
            .map(|entry| entry.property.clone())
            .or_else(|| inst.class.property(name).cloned())
            .ok_or_else(|| ObjectError::NoSuchProperty(name.to_string()))
    }

    pub(crate) fn take_property(&mut self, owner: ObjectId, name: &str) -> Option<PropertyEntry> {
        self.instance_mut(owner)
            .ok()
            .and_then(|inst| inst.properties.shift_remove(name))
    }

    /// Remove an instance property, running its release hook.
    ///
    /// Deleting a child property unparents the child. Class properties cannot
    /// be deleted.
    pub fn delete_property(&mut self, owner: ObjectId, name: &str) -> ObjectResult<()> {
        self.instance(owner)?;
        let entry = self
            .take_property(owner, name)
            .ok_or_else(|| ObjectError::NoSuchProperty(name.to_string()))?;
        trace!(%owner, name, "deleted property");
        entry.release(self, owner, name);
        Ok(())
    }

    /// Declared type of a property
    pub fn property_type(&self, owner: ObjectId, name: &str) -> ObjectResult<PropertyType> {
        Ok(self.find_property(owner, name)?.kind().clone())
    }

    /// Every property visible on the object: instance properties in
    /// insertion order, then unshadowed class properties
    pub fn properties(&self, owner: ObjectId) -> ObjectResult<Vec<PropertyInfo>> {
        let inst = self.instance(owner)?;
        let mut infos: Vec<PropertyInfo> = inst
            .properties
            .values()
            .map(|entry| entry.property.info(false))
            .collect();
        infos.extend(
            inst.class
                .properties()
                .filter(|p| !inst.properties.contains_key(p.name()))
                .map(|p| p.info(true)),
        );
        Ok(infos)
    }

    /// Read a property into `visitor`
    pub fn get_property(
        &self,
        owner: ObjectId,
        name: &str,
        visitor: &mut dyn Visitor,
    ) -> ObjectResult<()> {
        let property = self.find_property(owner, name)?;
        let get = property
            .get
            .ok_or_else(|| ObjectError::NotReadable(name.to_string()))?;
        get(self, owner, visitor, name)
    }

    /// Write a property from `visitor`
    pub fn set_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        visitor: &mut dyn Visitor,
    ) -> ObjectResult<()> {
        let property = self.find_property(owner, name)?;
        let set = property
            .set
            .ok_or_else(|| ObjectError::NotWritable(name.to_string()))?;
        trace!(%owner, name, "setting property");
        set(self, owner, visitor, name)
    }

    /// Read a property as a tagged value
    pub fn get_value(&self, owner: ObjectId, name: &str) -> ObjectResult<PropertyValue> {
        let mut visitor = ValueOutputVisitor::new();
        self.get_property(owner, name, &mut visitor)?;
        visitor.into_value(name)
    }

    /// Write a property from a tagged value
    pub fn set_value(
        &mut self,
        owner: ObjectId,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> ObjectResult<()> {
        let mut visitor = ValueInputVisitor::new(value.into());
        self.set_property(owner, name, &mut visitor)
    }

    /// Read a boolean property
    pub fn get_bool(&self, owner: ObjectId, name: &str) -> ObjectResult<bool> {
        let value = self.get_value(owner, name)?;
        value
            .as_bool()
            .ok_or_else(|| ObjectError::invalid_type(name, "bool"))
    }

    /// Write a boolean property
    pub fn set_bool(&mut self, owner: ObjectId, name: &str, value: bool) -> ObjectResult<()> {
        self.set_value(owner, name, value)
    }

    /// Read an integer property
    pub fn get_int(&self, owner: ObjectId, name: &str) -> ObjectResult<i64> {
        let value = self.get_value(owner, name)?;
        value
            .as_int()
            .ok_or_else(|| ObjectError::invalid_type(name, "int"))
    }

    /// Write an integer property
    pub fn set_int(&mut self, owner: ObjectId, name: &str, value: i64) -> ObjectResult<()> {
        self.set_value(owner, name, value)
    }

    /// Read a string-like property (string, enum, link or child path)
    pub fn get_str(&self, owner: ObjectId, name: &str) -> ObjectResult<String> {
        match self.get_value(owner, name)? {
            PropertyValue::Str(s) | PropertyValue::Enum(s) | PropertyValue::Link(s) => Ok(s),
            _ => Err(ObjectError::invalid_type(name, "str")),
        }
    }

    /// Write a string property
    pub fn set_str(&mut self, owner: ObjectId, name: &str, value: &str) -> ObjectResult<()> {
        self.set_value(owner, name, value)
    }

    /// Target of a link or child property, `None` when unset
    pub fn get_link(&self, owner: ObjectId, name: &str) -> ObjectResult<Option<ObjectId>> {
        let path = self.get_str(owner, name)?;
        if path.is_empty() {
            return Ok(None);
        }
        self.resolve_path(&path).map(Some)
    }

    /// Point a link property at `target`, or clear it with `None`
    pub fn set_link(
        &mut self,
        owner: ObjectId,
        name: &str,
        target: Option<ObjectId>,
    ) -> ObjectResult<()> {
        let path = match target {
            Some(target) => self.canonical_path(target).ok_or_else(|| {
                ObjectError::ValidationFailed(format!(
                    "Link target {} of '{}' is not in the object tree",
                    target, name
                ))
            })?,
            None => String::new(),
        };
        self.set_value(owner, name, PropertyValue::Link(path))
    }

    /// Write a property from its textual form
    pub fn parse_property(&mut self, owner: ObjectId, name: &str, text: &str) -> ObjectResult<()> {
        let mut visitor = StringInputVisitor::new(text);
        self.set_property(owner, name, &mut visitor)
    }

    /// Render a property as text
    pub fn print_property(&self, owner: ObjectId, name: &str) -> ObjectResult<String> {
        let mut visitor = StringOutputVisitor::new();
        self.get_property(owner, name, &mut visitor)?;
        visitor.into_string(name)
    }

    /// Read a property as plain JSON
    pub fn get_json(&self, owner: ObjectId, name: &str) -> ObjectResult<serde_json::Value> {
        Ok(self.get_value(owner, name)?.to_json())
    }

    /// Write a property from plain JSON
    pub fn set_json(
        &mut self,
        owner: ObjectId,
        name: &str,
        value: &serde_json::Value,
    ) -> ObjectResult<()> {
        self.set_value(owner, name, PropertyValue::from_json(value)?)
    }
}
