//! Type system: descriptors, realized classes and the registry

pub mod class;
pub mod descriptor;
pub mod registry;

pub use class::{ClassBuilder, ClassData, ObjectClass};
pub use descriptor::{ClassInitFn, InstanceFinalizeFn, InstanceInitFn, TypeDescriptor};
pub use registry::{
    TypeRegistry, TypeRegistryBuilder, TYPE_CONTAINER, TYPE_INTERFACE, TYPE_OBJECT,
};
