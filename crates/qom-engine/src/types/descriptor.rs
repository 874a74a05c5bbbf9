//! Type descriptors
//!
//! A `TypeDescriptor` is the static definition of a type: its name, parent,
//! implemented interfaces, the Rust structs backing its class and instance
//! data, and its lifecycle hooks. Descriptors are registered once and never
//! change afterwards.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use qom_sdk::ObjectResult;

use super::class::{ClassBuilder, ClassData};
use super::registry::{TYPE_INTERFACE, TYPE_OBJECT};
use crate::object::{ObjectGraph, ObjectId};

/// Instance init hook, run root-to-leaf on creation
pub type InstanceInitFn = Arc<dyn Fn(&mut ObjectGraph, ObjectId) -> ObjectResult<()> + Send + Sync>;

/// Instance finalize hook, run leaf-to-root on destruction
pub type InstanceFinalizeFn = Arc<dyn Fn(&mut ObjectGraph, ObjectId) + Send + Sync>;

/// Class init hook, run once when the class is built
pub type ClassInitFn = Arc<dyn Fn(&mut ClassBuilder<'_>) -> ObjectResult<()> + Send + Sync>;

/// Instance data block contributed by one type of the chain
#[derive(Clone, Copy)]
pub(crate) struct StateLayout {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) size: usize,
    pub(crate) make: fn() -> Box<dyn Any + Send>,
}

/// Class struct contributed by one type of the chain
#[derive(Clone, Copy)]
pub(crate) struct ClassLayout {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) size: usize,
    pub(crate) make: fn() -> Box<dyn ClassData>,
}

fn make_state<S: Default + Send + 'static>() -> Box<dyn Any + Send> {
    Box::new(S::default())
}

fn make_class<C: Default + Clone + Send + Sync + 'static>() -> Box<dyn ClassData> {
    Box::new(C::default())
}

/// Static definition of a type
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) is_abstract: bool,
    pub(crate) state: Option<StateLayout>,
    pub(crate) class: Option<ClassLayout>,
    pub(crate) instance_init: Option<InstanceInitFn>,
    pub(crate) instance_finalize: Option<InstanceFinalizeFn>,
    pub(crate) class_init: Option<ClassInitFn>,
}

impl TypeDescriptor {
    /// Create a root type (no parent)
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            is_abstract: false,
            state: None,
            class: None,
            instance_init: None,
            instance_finalize: None,
            class_init: None,
        }
    }

    /// Create a type deriving from `object`
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name).parent(TYPE_OBJECT)
    }

    /// Create an interface type deriving from `interface`
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name).parent(TYPE_INTERFACE).abstract_type()
    }

    /// Set the parent type name
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Mark the type abstract
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Declare the instance data this type adds to its parent's
    pub fn instance_state<S: Default + Send + 'static>(mut self) -> Self {
        self.state = Some(StateLayout {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            size: std::mem::size_of::<S>(),
            make: make_state::<S>,
        });
        self
    }

    /// Declare the class struct (virtual method table) this type introduces
    pub fn class_data<C: Default + Clone + Send + Sync + 'static>(mut self) -> Self {
        self.class = Some(ClassLayout {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            size: std::mem::size_of::<C>(),
            make: make_class::<C>,
        });
        self
    }

    /// Set the instance init hook
    pub fn instance_init(
        mut self,
        f: impl Fn(&mut ObjectGraph, ObjectId) -> ObjectResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.instance_init = Some(Arc::new(f));
        self
    }

    /// Set the instance finalize hook
    pub fn instance_finalize(
        mut self,
        f: impl Fn(&mut ObjectGraph, ObjectId) + Send + Sync + 'static,
    ) -> Self {
        self.instance_finalize = Some(Arc::new(f));
        self
    }

    /// Set the class init hook
    pub fn class_init(
        mut self,
        f: impl Fn(&mut ClassBuilder<'_>) -> ObjectResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.class_init = Some(Arc::new(f));
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent type name (None for root types)
    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Directly implemented interfaces
    pub fn interface_names(&self) -> &[String] {
        &self.interfaces
    }

    /// Whether the type is abstract
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Size of the instance data this type adds
    pub fn own_instance_size(&self) -> usize {
        self.state.map(|s| s.size).unwrap_or(0)
    }

    /// Size of the class struct this type adds
    pub fn own_class_size(&self) -> usize {
        self.class.map(|c| c.size).unwrap_or(0)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("abstract", &self.is_abstract)
            .field("state", &self.state.map(|s| s.type_name))
            .field("class", &self.class.map(|c| c.type_name))
            .field("has_instance_init", &self.instance_init.is_some())
            .field("has_instance_finalize", &self.instance_finalize.is_some())
            .field("has_class_init", &self.class_init.is_some())
            .finish()
    }
}
