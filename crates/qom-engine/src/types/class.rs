//! Class objects
//!
//! An `ObjectClass` is the realized, immutable singleton for one type: the
//! ancestor chain, the flattened interface set, the virtual method table and
//! the class-level properties. Method tables are plain Rust structs (usually
//! of `Option<fn ...>` slots) keyed by their `TypeId`; a subclass starts from
//! a copy of its parent's tables and its class init hook may overwrite any
//! slot.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use qom_sdk::{is_valid_path_component, ObjectError, ObjectResult};
use rustc_hash::{FxHashMap, FxHashSet};

use super::descriptor::{ClassLayout, InstanceFinalizeFn, InstanceInitFn, StateLayout};
use super::registry::TYPE_INTERFACE;
use crate::property::Property;

// ============================================================================
// Class data
// ============================================================================

/// Type-erased class struct
pub trait ClassData: Any + Send + Sync {
    /// Clone into a new box
    fn clone_box(&self) -> Box<dyn ClassData>;
    /// View as `Any`
    fn as_any(&self) -> &dyn Any;
    /// View as mutable `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone + Send + Sync> ClassData for T {
    fn clone_box(&self) -> Box<dyn ClassData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Method tables of a class, one per declaring type or interface
#[derive(Default)]
pub(crate) struct ClassTable {
    entries: FxHashMap<TypeId, Box<dyn ClassData>>,
}

impl Clone for ClassTable {
    fn clone(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(id, data)| (*id, (**data).clone_box()))
                .collect(),
        }
    }
}

impl ClassTable {
    pub(crate) fn get<C: Any>(&self) -> Option<&C> {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|data| (**data).as_any().downcast_ref::<C>())
    }

    pub(crate) fn get_mut<C: Any>(&mut self) -> Option<&mut C> {
        self.entries
            .get_mut(&TypeId::of::<C>())
            .and_then(|data| (**data).as_any_mut().downcast_mut::<C>())
    }

    pub(crate) fn contains(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    pub(crate) fn insert(&mut self, type_id: TypeId, data: Box<dyn ClassData>) {
        self.entries.insert(type_id, data);
    }

    /// Copy in every table of `other` this table does not have yet
    pub(crate) fn merge_missing(&mut self, other: &ClassTable) {
        for (id, data) in &other.entries {
            self.entries.entry(*id).or_insert_with(|| (**data).clone_box());
        }
    }
}

/// Init and finalize hooks of one type in the chain
#[derive(Clone)]
pub(crate) struct InstanceHooks {
    pub(crate) type_name: String,
    pub(crate) init: Option<InstanceInitFn>,
    pub(crate) finalize: Option<InstanceFinalizeFn>,
}

// ============================================================================
// ObjectClass
// ============================================================================

/// Realized class of a registered type
pub struct ObjectClass {
    pub(crate) type_name: String,
    pub(crate) parent: Option<Arc<ObjectClass>>,
    pub(crate) ancestors: Vec<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) interface_set: FxHashSet<String>,
    pub(crate) is_abstract: bool,
    pub(crate) table: ClassTable,
    pub(crate) class_layout: Vec<ClassLayout>,
    pub(crate) properties: IndexMap<String, Property>,
    pub(crate) state_layout: Vec<StateLayout>,
    pub(crate) hooks: Vec<InstanceHooks>,
}

impl ObjectClass {
    /// Name of the type this class realizes
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Parent class (None for root types)
    pub fn parent(&self) -> Option<&Arc<ObjectClass>> {
        self.parent.as_ref()
    }

    /// Linear ancestor chain, root first, ending with this type
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Every interface implemented anywhere in the chain
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Whether the type is abstract
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether the type is an interface type
    pub fn is_interface(&self) -> bool {
        self.ancestors.first().map(String::as_str) == Some(TYPE_INTERFACE)
    }

    /// Whether `type_name` is this type or one of its ancestors
    pub fn is_subclass_of(&self, type_name: &str) -> bool {
        self.ancestors.iter().any(|a| a == type_name)
    }

    /// Whether the chain implements `interface`
    pub fn implements(&self, interface: &str) -> bool {
        self.interface_set.contains(interface)
    }

    /// Cast to the class of an ancestor type
    pub fn dynamic_cast(&self, type_name: &str) -> Option<&ObjectClass> {
        let mut class = Some(self);
        while let Some(current) = class {
            if current.type_name == type_name {
                return Some(current);
            }
            class = current.parent.as_deref();
        }
        None
    }

    /// Method table declared by this type, an ancestor or an interface
    pub fn get<C: Any>(&self) -> Option<&C> {
        self.table.get::<C>()
    }

    /// Total size of the instance data of the whole chain
    pub fn instance_size(&self) -> usize {
        self.state_layout.iter().map(|s| s.size).sum()
    }

    /// Total size of the method tables of the chain and its interfaces
    pub fn class_size(&self) -> usize {
        self.class_layout.iter().map(|c| c.size).sum()
    }

    /// Class-level property by name, including inherited ones
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Class-level properties in declaration order, ancestors first
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("type_name", &self.type_name)
            .field("ancestors", &self.ancestors)
            .field("interfaces", &self.interfaces)
            .field("abstract", &self.is_abstract)
            .field("instance_size", &self.instance_size())
            .field("class_size", &self.class_size())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// ClassBuilder
// ============================================================================

/// Mutable view of a class under construction, handed to class init hooks
pub struct ClassBuilder<'a> {
    pub(crate) type_name: &'a str,
    pub(crate) table: &'a mut ClassTable,
    pub(crate) properties: &'a mut IndexMap<String, Property>,
}

impl ClassBuilder<'_> {
    /// Name of the type being built
    pub fn type_name(&self) -> &str {
        self.type_name
    }

    /// Read a method table
    pub fn data<C: Any>(&self) -> ObjectResult<&C> {
        let type_name = self.type_name;
        self.table.get::<C>().ok_or_else(|| missing_table::<C>(type_name))
    }

    /// Get a method table for overriding its slots
    pub fn data_mut<C: Any>(&mut self) -> ObjectResult<&mut C> {
        let type_name = self.type_name;
        self.table
            .get_mut::<C>()
            .ok_or_else(|| missing_table::<C>(type_name))
    }

    /// Add a class-level property, visible on every instance
    pub fn add_property(&mut self, property: Property) -> ObjectResult<()> {
        if !is_valid_path_component(property.name()) {
            return Err(ObjectError::ValidationFailed(format!(
                "Invalid property name '{}'",
                property.name()
            )));
        }
        if self.properties.contains_key(property.name()) {
            return Err(ObjectError::DuplicateProperty(property.name().to_string()));
        }
        self.properties.insert(property.name().to_string(), property);
        Ok(())
    }
}

fn missing_table<C: Any>(type_name: &str) -> ObjectError {
    ObjectError::InvalidDescriptor {
        type_name: type_name.to_string(),
        reason: format!(
            "class struct {} is not declared by the type, its ancestors or its interfaces",
            std::any::type_name::<C>()
        ),
    }
}
