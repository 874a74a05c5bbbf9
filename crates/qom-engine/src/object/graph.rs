//! Instance storage, lifecycle and casting

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use qom_sdk::{ObjectError, ObjectResult};
use tracing::{debug, trace};

use super::ObjectId;
use crate::globals::{GlobalProperties, GlobalProperty};
use crate::property::PropertyEntry;
use crate::types::{ObjectClass, TypeRegistry, TYPE_CONTAINER};

// ============================================================================
// Options
// ============================================================================

/// Configuration for an `ObjectGraph`
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Types available to the graph
    pub registry: Arc<TypeRegistry>,

    /// Property defaults applied to every new instance
    pub globals: GlobalProperties,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new()),
            globals: GlobalProperties::default(),
        }
    }
}

impl GraphOptions {
    /// Options for `registry` with no global properties
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            globals: GlobalProperties::default(),
        }
    }

    /// Set the global property defaults
    pub fn with_globals(mut self, globals: GlobalProperties) -> Self {
        self.globals = globals;
        self
    }
}

// ============================================================================
// Instances
// ============================================================================

pub(crate) struct Instance {
    pub(crate) class: Arc<ObjectClass>,
    pub(crate) refcount: u32,
    pub(crate) finalizing: bool,
    pub(crate) parent: Option<ObjectId>,
    /// Name of the child property holding this instance on its parent
    pub(crate) name: Option<String>,
    pub(crate) properties: IndexMap<String, PropertyEntry>,
    /// One block per `StateLayout` of the class, in chain order
    state: Vec<Box<dyn Any + Send>>,
}

struct Slot {
    generation: u32,
    instance: Option<Instance>,
}

/// Owner of every instance and of the ownership tree rooted at `/`
///
/// All mutation goes through `&mut ObjectGraph`: holding the exclusive
/// borrow is holding the global execution lock. Wrap the graph in a
/// [`BigLock`](crate::sync::BigLock) to share it between threads.
pub struct ObjectGraph {
    registry: Arc<TypeRegistry>,
    globals: GlobalProperties,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    root: ObjectId,
}

impl ObjectGraph {
    /// Create a graph over `registry` with no global properties
    pub fn new(registry: Arc<TypeRegistry>) -> ObjectResult<Self> {
        Self::with_options(GraphOptions::new(registry))
    }

    /// Create a graph and its root container
    pub fn with_options(options: GraphOptions) -> ObjectResult<Self> {
        let mut graph = Self {
            registry: options.registry,
            globals: GlobalProperties::default(),
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            root: ObjectId::new(0, 0),
        };
        graph.root = graph.create(TYPE_CONTAINER)?;
        graph.globals = options.globals;
        Ok(graph)
    }

    /// Type registry backing this graph
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Root container, path `/`
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Number of live instances, the root included
    pub fn object_count(&self) -> usize {
        self.live
    }

    /// Whether `id` names a live instance
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.instance(id).is_ok()
    }

    /// Global property defaults
    pub fn globals(&self) -> &GlobalProperties {
        &self.globals
    }

    /// Add a global property default for instances created from now on
    pub fn register_global(&mut self, global: GlobalProperty) {
        self.globals.register(global);
    }

    pub(crate) fn instance(&self, id: ObjectId) -> ObjectResult<&Instance> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.instance.as_ref())
            .ok_or_else(|| ObjectError::InvalidObject(id.to_string()))
    }

    pub(crate) fn instance_mut(&mut self, id: ObjectId) -> ObjectResult<&mut Instance> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.instance.as_mut())
            .ok_or_else(|| ObjectError::InvalidObject(id.to_string()))
    }

    fn alloc(&mut self, instance: Instance) -> ObjectId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.instance = Some(instance);
                ObjectId::new(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    instance: Some(instance),
                });
                ObjectId::new(index, 0)
            }
        }
    }

    fn free_slot(&mut self, id: ObjectId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if slot.generation == id.generation() && slot.instance.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index() as u32);
                self.live -= 1;
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Instantiate a type.
    ///
    /// Builds the instance state of every type in the chain, runs instance
    /// init hooks root first, then applies matching global properties. The
    /// new instance has one reference, owned by the caller, and no parent.
    /// If a hook or a global fails, the hooks that already ran are undone
    /// through their finalize hooks and the error is returned.
    pub fn create(&mut self, type_name: &str) -> ObjectResult<ObjectId> {
        let class = self.registry.resolve_class(type_name)?;
        if class.is_abstract() {
            return Err(ObjectError::AbstractType(type_name.to_string()));
        }

        let state = class
            .state_layout
            .iter()
            .map(|layout| (layout.make)())
            .collect();
        let id = self.alloc(Instance {
            class: Arc::clone(&class),
            refcount: 1,
            finalizing: false,
            parent: None,
            name: None,
            properties: IndexMap::new(),
            state,
        });

        for (ran, hooks) in class.hooks.iter().enumerate() {
            if let Some(init) = &hooks.init {
                if let Err(err) = init(self, id) {
                    debug!(type_name, %id, hook = %hooks.type_name, error = %err, "instance init failed");
                    self.abort_create(id, ran);
                    return Err(err);
                }
                if !self.is_alive(id) {
                    return Err(ObjectError::InvalidObject(id.to_string()));
                }
            }
        }

        if let Err(err) = self.apply_globals(id, &class) {
            debug!(type_name, %id, error = %err, "global property rejected");
            self.abort_create(id, class.hooks.len());
            return Err(err);
        }

        trace!(type_name, %id, "created object");
        Ok(id)
    }

    fn abort_create(&mut self, id: ObjectId, hooks_run: usize) {
        if self.is_alive(id) {
            self.finalize(id, hooks_run);
        }
    }

    fn apply_globals(&mut self, id: ObjectId, class: &ObjectClass) -> ObjectResult<()> {
        let pending = self.globals.for_class(class);
        for global in pending {
            debug!(
                %id,
                driver = %global.driver,
                property = %global.property,
                value = %global.value,
                "applying global property"
            );
            self.parse_property(id, &global.property, &global.value)?;
        }
        Ok(())
    }

    /// Take a reference, returning the new count
    pub fn add_ref(&mut self, id: ObjectId) -> ObjectResult<u32> {
        let inst = self.instance_mut(id)?;
        if inst.finalizing {
            return Err(ObjectError::InvalidObject(id.to_string()));
        }
        inst.refcount += 1;
        Ok(inst.refcount)
    }

    /// Drop a reference, finalizing the instance when the count reaches zero.
    ///
    /// Dropping a reference to an instance that is already being finalized is
    /// a no-op. The root's last reference belongs to the graph and cannot be
    /// dropped.
    pub fn unref(&mut self, id: ObjectId) -> ObjectResult<()> {
        let is_root = id == self.root;
        let inst = self.instance_mut(id)?;
        if inst.refcount == 0 {
            return Ok(());
        }
        if is_root && inst.refcount == 1 {
            return Err(ObjectError::PermissionDenied);
        }
        inst.refcount -= 1;
        if inst.refcount == 0 {
            let hooks = inst.class.hooks.len();
            self.finalize(id, hooks);
        }
        Ok(())
    }

    /// Drop the caller's reference; same as [`unref`](Self::unref)
    pub fn destroy(&mut self, id: ObjectId) -> ObjectResult<()> {
        self.unref(id)
    }

    /// Current reference count
    pub fn refcount(&self, id: ObjectId) -> ObjectResult<u32> {
        Ok(self.instance(id)?.refcount)
    }

    /// Tear an instance down.
    ///
    /// Order: leave the parent, release child edges (children finalize
    /// before their parent), run finalize hooks leaf first, release the
    /// remaining properties in insertion order, free the slot.
    fn finalize(&mut self, id: ObjectId, hooks_run: usize) {
        let class = match self.instance_mut(id) {
            Ok(inst) => {
                inst.finalizing = true;
                inst.refcount = 0;
                Arc::clone(&inst.class)
            }
            Err(_) => return,
        };
        trace!(%id, type_name = class.type_name(), "finalizing object");

        self.detach_from_parent(id);

        let children: Vec<String> = self
            .instance(id)
            .map(|inst| {
                inst.properties
                    .iter()
                    .filter(|(_, entry)| entry.child.is_some())
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        for name in children {
            if let Some(entry) = self.take_property(id, &name) {
                entry.release(self, id, &name);
            }
        }

        let ran = hooks_run.min(class.hooks.len());
        for hooks in class.hooks[..ran].iter().rev() {
            if let Some(finalize) = &hooks.finalize {
                finalize(self, id);
            }
        }

        loop {
            let next = match self.instance_mut(id) {
                Ok(inst) => inst.properties.shift_remove_index(0),
                Err(_) => break,
            };
            match next {
                Some((name, entry)) => entry.release(self, id, &name),
                None => break,
            }
        }

        self.free_slot(id);
        debug!(%id, type_name = class.type_name(), "finalized object");
    }

    /// Remove the child edge from the parent without touching references
    pub(crate) fn detach_from_parent(&mut self, id: ObjectId) {
        let (parent, name) = match self.instance_mut(id) {
            Ok(inst) => match (inst.parent.take(), inst.name.take()) {
                (Some(parent), Some(name)) => (parent, name),
                _ => return,
            },
            Err(_) => return,
        };
        if let Ok(parent) = self.instance_mut(parent) {
            parent.properties.shift_remove(&name);
        }
    }

    // ========================================================================
    // Instance state
    // ========================================================================

    /// Instance data block `S` contributed by some type of the chain
    pub fn state<S: Any>(&self, id: ObjectId) -> ObjectResult<&S> {
        let inst = self.instance(id)?;
        inst.state
            .iter()
            .find_map(|block| (**block).downcast_ref::<S>())
            .ok_or_else(|| state_mismatch::<S>(&inst.class))
    }

    /// Mutable instance data block `S`
    pub fn state_mut<S: Any>(&mut self, id: ObjectId) -> ObjectResult<&mut S> {
        let inst = self.instance_mut(id)?;
        match inst
            .state
            .iter_mut()
            .find_map(|block| (**block).downcast_mut::<S>())
        {
            Some(state) => Ok(state),
            None => Err(state_mismatch::<S>(&inst.class)),
        }
    }

    // ========================================================================
    // Casting
    // ========================================================================

    /// Resolve a class through the graph's registry
    pub fn resolve_class(&self, type_name: &str) -> ObjectResult<Arc<ObjectClass>> {
        self.registry.resolve_class(type_name)
    }

    /// Class of an instance
    pub fn class_of(&self, id: ObjectId) -> ObjectResult<Arc<ObjectClass>> {
        Ok(Arc::clone(&self.instance(id)?.class))
    }

    /// Dynamic type name of an instance
    pub fn type_name(&self, id: ObjectId) -> ObjectResult<&str> {
        Ok(self.instance(id)?.class.type_name())
    }

    /// Whether the instance's type is `type_name`, derives from it or
    /// implements it
    pub fn is_instance_of(&self, id: ObjectId, type_name: &str) -> bool {
        self.instance(id)
            .map(|inst| inst.class.is_subclass_of(type_name) || inst.class.implements(type_name))
            .unwrap_or(false)
    }

    /// Checked cast to an ancestor type or implemented interface
    pub fn dynamic_cast(&self, id: ObjectId, type_name: &str) -> ObjectResult<ObjectId> {
        let inst = self.instance(id)?;
        if inst.class.is_subclass_of(type_name) || inst.class.implements(type_name) {
            Ok(id)
        } else {
            Err(ObjectError::InvalidCast {
                type_name: inst.class.type_name().to_string(),
                target: type_name.to_string(),
            })
        }
    }

    /// Bind an instance to one of its interfaces.
    ///
    /// Fails with `InterfaceNotImplemented` when no type of the chain
    /// implements `interface`; dispatchers treat that as a capability probe.
    pub fn as_interface(&self, id: ObjectId, interface: &str) -> ObjectResult<InterfaceRef> {
        let inst = self.instance(id)?;
        if !inst.class.implements(interface) {
            return Err(ObjectError::InterfaceNotImplemented {
                type_name: inst.class.type_name().to_string(),
                interface: interface.to_string(),
            });
        }
        Ok(InterfaceRef {
            object: id,
            interface: interface.to_string(),
            class: Arc::clone(&inst.class),
        })
    }

    /// Short human-readable name for error messages
    pub(crate) fn describe(&self, id: ObjectId) -> String {
        match self.canonical_path(id) {
            Some(path) => path,
            None => match self.type_name(id) {
                Ok(type_name) => format!("{}{}", type_name, id),
                Err(_) => id.to_string(),
            },
        }
    }
}

fn state_mismatch<S: Any>(class: &ObjectClass) -> ObjectError {
    ObjectError::InvalidCast {
        type_name: class.type_name().to_string(),
        target: std::any::type_name::<S>().to_string(),
    }
}

impl fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("root", &self.root)
            .field("objects", &self.live)
            .field("globals", &self.globals.len())
            .finish()
    }
}

// ============================================================================
// Interface proxies
// ============================================================================

/// An instance viewed through one of its interfaces
///
/// Method slots are looked up in the instance's own class, so overrides by
/// the implementing type or its descendants are honoured.
#[derive(Debug, Clone)]
pub struct InterfaceRef {
    object: ObjectId,
    interface: String,
    class: Arc<ObjectClass>,
}

impl InterfaceRef {
    /// Instance behind the interface
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// Interface type name
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Class of the instance
    pub fn object_class(&self) -> &Arc<ObjectClass> {
        &self.class
    }

    /// Method table declared by the interface
    pub fn class<C: Any>(&self) -> Option<&C> {
        self.class.get::<C>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        value: i64,
    }

    fn graph_with(types: Vec<TypeDescriptor>) -> ObjectGraph {
        let registry = TypeRegistry::new();
        registry.register_all(types).unwrap();
        ObjectGraph::new(Arc::new(registry)).unwrap()
    }

    #[test]
    fn test_root_exists() {
        let graph = graph_with(vec![]);
        assert!(graph.is_alive(graph.root()));
        assert_eq!(graph.object_count(), 1);
        assert_eq!(graph.type_name(graph.root()).unwrap(), TYPE_CONTAINER);
    }

    #[test]
    fn test_stale_handle() {
        let mut graph = graph_with(vec![TypeDescriptor::object("leaf")]);
        let id = graph.create("leaf").unwrap();
        graph.unref(id).unwrap();
        assert!(!graph.is_alive(id));
        assert!(matches!(graph.refcount(id), Err(ObjectError::InvalidObject(_))));

        let reused = graph.create("leaf").unwrap();
        assert_eq!(reused.index(), id.index());
        assert_ne!(reused, id);
        assert!(!graph.is_alive(id));
    }

    #[test]
    fn test_state_access() {
        let mut graph = graph_with(vec![TypeDescriptor::object("counter").instance_state::<Counter>()]);
        let id = graph.create("counter").unwrap();
        graph.state_mut::<Counter>(id).unwrap().value = 9;
        assert_eq!(graph.state::<Counter>(id).unwrap().value, 9);
        assert!(matches!(
            graph.state::<String>(id),
            Err(ObjectError::InvalidCast { .. })
        ));
    }

    #[test]
    fn test_refcount() {
        let mut graph = graph_with(vec![TypeDescriptor::object("leaf")]);
        let id = graph.create("leaf").unwrap();
        assert_eq!(graph.add_ref(id).unwrap(), 2);
        graph.unref(id).unwrap();
        assert!(graph.is_alive(id));
        graph.destroy(id).unwrap();
        assert!(!graph.is_alive(id));
    }

    #[test]
    fn test_root_keeps_last_reference() {
        let mut graph = graph_with(vec![]);
        let root = graph.root();
        assert_eq!(graph.unref(root), Err(ObjectError::PermissionDenied));
        assert!(graph.is_alive(root));
    }

    #[test]
    fn test_failed_init_runs_completed_finalizers_only() {
        static FINALIZED: AtomicUsize = AtomicUsize::new(0);
        let mut graph = graph_with(vec![
            TypeDescriptor::object("base").instance_finalize(|_, _| {
                FINALIZED.fetch_add(1, Ordering::SeqCst);
            }),
            TypeDescriptor::new("broken")
                .parent("base")
                .instance_init(|_, _| Err("no backend".into()))
                .instance_finalize(|_, _| {
                    FINALIZED.fetch_add(100, Ordering::SeqCst);
                }),
        ]);
        let err = graph.create("broken").unwrap_err();
        assert_eq!(err, ObjectError::Failed("no backend".to_string()));
        assert_eq!(FINALIZED.load(Ordering::SeqCst), 1);
        assert_eq!(graph.object_count(), 1);
    }
}
