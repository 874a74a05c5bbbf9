//! qom engine - object and type runtime
//!
//! This crate provides the object model that device emulation code is built
//! on:
//! - A type registry with single inheritance and interfaces
//! - Lazily realized classes carrying per-type method tables
//! - Reference-counted instances arranged in an ownership tree
//! - Named, typed, introspectable properties driven through visitors
//! - Flip, link and alias properties
//! - Global property defaults loaded from TOML
//! - Dispatch helpers for the hotplug, stream and interrupt statistics
//!   interfaces
//!
//! All mutation goes through `&mut ObjectGraph`. Code that shares a graph
//! across threads wraps it in a [`BigLock`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qom_engine::{field, FieldAccess, ObjectGraph, TypeDescriptor, TypeRegistry};
//!
//! #[derive(Default)]
//! struct Uart {
//!     baud: i64,
//! }
//!
//! let registry = TypeRegistry::new();
//! registry.register(TypeDescriptor::object("uart").instance_state::<Uart>())?;
//!
//! let mut graph = ObjectGraph::new(Arc::new(registry))?;
//! let uart = graph.create_child(graph.root(), "uart0", "uart")?;
//! graph.add_int_field(uart, "baud", field!(Uart, baud), FieldAccess::ReadWrite)?;
//! graph.parse_property(uart, "baud", "115200")?;
//! assert_eq!(graph.resolve_path("/uart0")?, uart);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod globals;
pub mod hw;
pub mod logging;
pub mod object;
pub mod property;
pub mod sync;
pub mod types;

pub use globals::{GlobalProperties, GlobalProperty};
pub use logging::{init_logging, LogConfig, LogFormat, LogInitError};
pub use object::{GraphOptions, InterfaceRef, ObjectGraph, ObjectId};
pub use property::{Field, FieldAccess, LinkStrength, Property, PropertyInfo};
pub use sync::BigLock;
pub use types::{
    ClassBuilder, ObjectClass, TypeDescriptor, TypeRegistry, TypeRegistryBuilder,
    TYPE_CONTAINER, TYPE_INTERFACE, TYPE_OBJECT,
};

pub use qom_sdk::{
    EnumLookup, ObjectError, ObjectResult, PropertyType, PropertyValue, StringInputVisitor,
    StringOutputVisitor, ValueInputVisitor, ValueOutputVisitor, Visitor,
};
