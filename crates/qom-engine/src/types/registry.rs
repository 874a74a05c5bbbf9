//! Type registry
//!
//! Maps type names to their descriptors and caches the realized class of
//! each type. Registration only records the descriptor: parents and
//! interfaces are resolved lazily, the first time the class of the type (or
//! of any descendant) is requested, so modules may register their types in
//! any order.

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use qom_sdk::{is_valid_path_component, ObjectError, ObjectResult};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::class::{ClassBuilder, ClassTable, InstanceHooks, ObjectClass};
use super::descriptor::TypeDescriptor;

/// Root of every instantiable type
pub const TYPE_OBJECT: &str = "object";

/// Abstract root of every interface type
pub const TYPE_INTERFACE: &str = "interface";

/// Plain object used as a path namespace
pub const TYPE_CONTAINER: &str = "container";

struct TypeEntry {
    descriptor: TypeDescriptor,
    class: OnceCell<Arc<ObjectClass>>,
}

/// Registry of types and their realized classes
///
/// Thread-safe: the name table sits behind a `RwLock` and each class is built
/// at most once, racing callers observe the same `Arc<ObjectClass>`.
pub struct TypeRegistry {
    types: RwLock<FxHashMap<String, Arc<TypeEntry>>>,
}

impl TypeRegistry {
    /// Create a registry holding the built-in root types
    pub fn new() -> Self {
        let registry = Self {
            types: RwLock::new(FxHashMap::default()),
        };
        for descriptor in [
            TypeDescriptor::new(TYPE_OBJECT),
            TypeDescriptor::new(TYPE_INTERFACE).abstract_type(),
            TypeDescriptor::object(TYPE_CONTAINER),
        ] {
            registry.insert(descriptor);
        }
        registry
    }

    /// Create a registry builder
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder {
            descriptors: Vec::new(),
        }
    }

    fn insert(&self, descriptor: TypeDescriptor) {
        let entry = Arc::new(TypeEntry {
            descriptor,
            class: OnceCell::new(),
        });
        self.types
            .write()
            .insert(entry.descriptor.name.clone(), entry);
    }

    /// Register a type.
    ///
    /// Fails with `DuplicateType` if the name is taken. The parent does not
    /// have to be registered yet.
    pub fn register(&self, descriptor: TypeDescriptor) -> ObjectResult<()> {
        let name = descriptor.name.clone();
        if !is_valid_path_component(&name) {
            return Err(ObjectError::InvalidDescriptor {
                type_name: name,
                reason: "type names must be non-empty and must not contain '/'".to_string(),
            });
        }
        if descriptor.parent.as_deref() == Some(name.as_str()) {
            return Err(ObjectError::InvalidDescriptor {
                type_name: name,
                reason: "a type cannot be its own parent".to_string(),
            });
        }

        let mut types = self.types.write();
        if types.contains_key(&name) {
            return Err(ObjectError::DuplicateType(name));
        }
        debug!(
            type_name = %name,
            parent = descriptor.parent.as_deref().unwrap_or("-"),
            "registered type"
        );
        types.insert(
            name,
            Arc::new(TypeEntry {
                descriptor,
                class: OnceCell::new(),
            }),
        );
        Ok(())
    }

    /// Register several types, stopping at the first failure
    pub fn register_all(
        &self,
        descriptors: impl IntoIterator<Item = TypeDescriptor>,
    ) -> ObjectResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Check if a type is registered
    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Get the number of registered types
    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptor of a registered type
    pub fn descriptor(&self, name: &str) -> ObjectResult<TypeDescriptor> {
        Ok(self.entry(name)?.descriptor.clone())
    }

    fn entry(&self, name: &str) -> ObjectResult<Arc<TypeEntry>> {
        self.types
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ObjectError::UnknownType(name.to_string()))
    }

    /// Ancestor chain of a type by name, root first.
    ///
    /// Only walks descriptors; does not build classes.
    pub fn ancestors(&self, name: &str) -> ObjectResult<Vec<String>> {
        let mut chain = vec![name.to_string()];
        let mut seen = FxHashSet::default();
        seen.insert(name.to_string());

        let mut current = self.entry(name)?;
        while let Some(parent) = current.descriptor.parent.clone() {
            if !seen.insert(parent.clone()) {
                return Err(ObjectError::InvalidDescriptor {
                    type_name: name.to_string(),
                    reason: format!("type hierarchy cycle through '{}'", parent),
                });
            }
            current = self.entry(&parent).map_err(|_| ObjectError::UnknownParent {
                type_name: current.descriptor.name.clone(),
                parent: parent.clone(),
            })?;
            chain.push(parent);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Whether `name` is `ancestor` or derives from it
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> ObjectResult<bool> {
        Ok(self.ancestors(name)?.iter().any(|a| a == ancestor))
    }

    /// Names of registered types deriving from `ancestor`, sorted.
    ///
    /// Types whose chain cannot be resolved are skipped.
    pub fn subtypes_of(&self, ancestor: &str, include_abstract: bool) -> Vec<String> {
        self.type_names()
            .into_iter()
            .filter(|name| {
                let concrete_ok = include_abstract
                    || self
                        .entry(name)
                        .map(|e| !e.descriptor.is_abstract)
                        .unwrap_or(false);
                concrete_ok && self.is_subtype(name, ancestor).unwrap_or(false)
            })
            .collect()
    }

    /// Resolve every registered type eagerly, reporting the first failure
    pub fn validate(&self) -> ObjectResult<()> {
        for name in self.type_names() {
            self.resolve_class(&name)?;
        }
        Ok(())
    }

    /// Get the class of a type, building it on first use.
    ///
    /// The parent's class is resolved first; the new class starts from a
    /// copy of it (the result of every ancestor's class init applied root
    /// first), merges in the method tables of newly implemented interfaces,
    /// adds this type's own class struct and finally runs this type's class
    /// init hook.
    pub fn resolve_class(&self, name: &str) -> ObjectResult<Arc<ObjectClass>> {
        let mut resolving = Vec::new();
        self.resolve_inner(name, &mut resolving)
    }

    fn resolve_inner(
        &self,
        name: &str,
        resolving: &mut Vec<String>,
    ) -> ObjectResult<Arc<ObjectClass>> {
        let entry = self.entry(name)?;
        if let Some(class) = entry.class.get() {
            return Ok(Arc::clone(class));
        }
        if resolving.iter().any(|n| n == name) {
            return Err(ObjectError::InvalidDescriptor {
                type_name: name.to_string(),
                reason: format!("circular type dependency: {}", resolving.join(" -> ")),
            });
        }
        resolving.push(name.to_string());

        let descriptor = &entry.descriptor;
        let parent = match &descriptor.parent {
            Some(parent) => Some(self.resolve_inner(parent, resolving).map_err(|err| {
                match err {
                    ObjectError::UnknownType(missing) if missing == *parent => {
                        ObjectError::UnknownParent {
                            type_name: name.to_string(),
                            parent: missing,
                        }
                    }
                    other => other,
                }
            })?),
            None => None,
        };
        let interfaces = descriptor
            .interfaces
            .iter()
            .map(|iface| self.resolve_inner(iface, resolving))
            .collect::<ObjectResult<Vec<_>>>()?;

        resolving.pop();

        entry
            .class
            .get_or_try_init(|| build_class(descriptor, parent, &interfaces).map(Arc::new))
            .map(Arc::clone)
    }
}

fn build_class(
    descriptor: &TypeDescriptor,
    parent: Option<Arc<ObjectClass>>,
    interfaces: &[Arc<ObjectClass>],
) -> ObjectResult<ObjectClass> {
    let name = descriptor.name.as_str();
    let invalid = |reason: String| ObjectError::InvalidDescriptor {
        type_name: name.to_string(),
        reason,
    };

    let (mut table, mut ancestors, mut iface_names, mut class_layout, mut properties, mut state_layout, mut hooks) =
        match &parent {
            Some(p) => (
                p.table.clone(),
                p.ancestors.clone(),
                p.interfaces.clone(),
                p.class_layout.clone(),
                p.properties.clone(),
                p.state_layout.clone(),
                p.hooks.clone(),
            ),
            None => (
                ClassTable::default(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
                IndexMap::new(),
                Vec::new(),
                Vec::new(),
            ),
        };
    ancestors.push(name.to_string());
    let is_interface = ancestors.first().map(String::as_str) == Some(TYPE_INTERFACE);
    if is_interface {
        iface_names.push(name.to_string());
    }

    for iface in interfaces {
        if !iface.is_interface() {
            return Err(invalid(format!(
                "'{}' is listed as an interface but is not one",
                iface.type_name
            )));
        }
        for implemented in iface.interfaces() {
            if !iface_names.contains(implemented) {
                iface_names.push(implemented.clone());
            }
        }
        for layout in &iface.class_layout {
            if !class_layout.iter().any(|l| l.type_id == layout.type_id) {
                class_layout.push(*layout);
            }
        }
        table.merge_missing(&iface.table);
    }

    if let Some(layout) = descriptor.class {
        if table.contains(layout.type_id) {
            return Err(invalid(format!(
                "class struct {} is already declared in the chain",
                layout.type_name
            )));
        }
        table.insert(layout.type_id, (layout.make)());
        class_layout.push(layout);
    }

    if let Some(layout) = descriptor.state {
        if state_layout.iter().any(|s| s.type_id == layout.type_id) {
            return Err(invalid(format!(
                "instance state {} is already declared in the chain",
                layout.type_name
            )));
        }
        state_layout.push(layout);
    }

    hooks.push(InstanceHooks {
        type_name: name.to_string(),
        init: descriptor.instance_init.clone(),
        finalize: descriptor.instance_finalize.clone(),
    });

    if let Some(class_init) = &descriptor.class_init {
        let mut builder = ClassBuilder {
            type_name: name,
            table: &mut table,
            properties: &mut properties,
        };
        class_init(&mut builder)?;
    }

    let interface_set = iface_names.iter().cloned().collect::<FxHashSet<_>>();
    trace!(type_name = %name, interfaces = ?iface_names, "built class");

    Ok(ObjectClass {
        type_name: name.to_string(),
        parent,
        ancestors,
        interfaces: iface_names,
        interface_set,
        is_abstract: descriptor.is_abstract,
        table,
        class_layout,
        properties,
        state_layout,
        hooks,
    })
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Builder for TypeRegistry
pub struct TypeRegistryBuilder {
    descriptors: Vec<TypeDescriptor>,
}

impl TypeRegistryBuilder {
    /// Register a type
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Build the registry, failing on the first rejected descriptor
    pub fn build(self) -> ObjectResult<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry.register_all(self.descriptors)?;
        Ok(registry)
    }
}
