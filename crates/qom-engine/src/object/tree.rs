//! Ownership tree: child properties, paths and path resolution

use qom_sdk::{is_valid_path_component, ObjectError, ObjectResult, PropertyType};
use tracing::debug;

use super::{ObjectGraph, ObjectId};
use crate::property::{Property, PropertyEntry};

impl ObjectGraph {
    /// Attach `child` below `parent` as the child property `name`.
    ///
    /// The parent takes a reference on the child. A child that already has a
    /// parent is moved: it leaves the old parent first, the old parent's
    /// reference is dropped. Attaching an object below itself or below one
    /// of its descendants fails with `OwnershipCycle`; every failure leaves
    /// the tree unchanged.
    pub fn add_child(&mut self, parent: ObjectId, name: &str, child: ObjectId) -> ObjectResult<()> {
        self.instance(parent)?;
        let child_type = self.type_name(child)?.to_string();
        if !is_valid_path_component(name) {
            return Err(ObjectError::ValidationFailed(format!(
                "Invalid child name '{}'",
                name
            )));
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(ObjectError::OwnershipCycle {
                child: self.describe(child),
                parent: self.describe(parent),
            });
        }
        if self.has_instance_property(parent, name) {
            return Err(ObjectError::DuplicateProperty(name.to_string()));
        }

        // Keeps the child alive while it moves between parents
        self.add_ref(child)?;
        if self.parent_of(child)?.is_some() {
            self.unparent(child)?;
        }

        let property = Property::new(name, PropertyType::Child(child_type))
            .description("child object")
            .getter(move |graph, _owner, visitor, name| {
                let mut path = graph.canonical_path(child).unwrap_or_default();
                visitor.visit_str(name, &mut path)
            })
            .release(move |graph, _owner, _name| {
                if let Ok(inst) = graph.instance_mut(child) {
                    inst.parent = None;
                    inst.name = None;
                }
                // Already finalizing or gone: nothing left to drop
                let _ = graph.unref(child);
            });
        self.instance_mut(parent)?.properties.insert(
            name.to_string(),
            PropertyEntry {
                property,
                child: Some(child),
            },
        );
        let inst = self.instance_mut(child)?;
        inst.parent = Some(parent);
        inst.name = Some(name.to_string());

        debug!(parent = %parent, child = %child, name, "attached child");
        Ok(())
    }

    /// Create an instance and attach it below `parent`.
    ///
    /// The returned handle is borrowed from the parent: the tree holds the
    /// only reference.
    pub fn create_child(
        &mut self,
        parent: ObjectId,
        name: &str,
        type_name: &str,
    ) -> ObjectResult<ObjectId> {
        let child = self.create(type_name)?;
        let attached = self.add_child(parent, name, child);
        self.unref(child)?;
        attached.map(|()| child)
    }

    /// Detach an object from its parent, dropping the parent's reference.
    ///
    /// Finalizes the object if nobody else holds a reference. Unparented
    /// objects are left alone.
    pub fn unparent(&mut self, id: ObjectId) -> ObjectResult<()> {
        let inst = self.instance(id)?;
        match (inst.parent, inst.name.clone()) {
            (Some(parent), Some(name)) => self.delete_property(parent, &name),
            _ => Ok(()),
        }
    }

    /// Tear down everything attached below the root.
    ///
    /// Children of the root are unparented newest first, so each subtree
    /// finalizes with the usual ordering and open flip properties get their
    /// best-effort close. Objects still referenced elsewhere survive. The
    /// root itself stays alive and the graph remains usable.
    pub fn shutdown(&mut self) -> ObjectResult<()> {
        let root = self.root();
        let children = self.children(root)?;
        debug!(count = children.len(), "shutting down object tree");
        for (_, child) in children.into_iter().rev() {
            if self.is_alive(child) {
                self.unparent(child)?;
            }
        }
        Ok(())
    }

    /// Parent in the ownership tree
    pub fn parent_of(&self, id: ObjectId) -> ObjectResult<Option<ObjectId>> {
        Ok(self.instance(id)?.parent)
    }

    /// Name of the child property holding the object on its parent
    pub fn name_of(&self, id: ObjectId) -> ObjectResult<Option<&str>> {
        Ok(self.instance(id)?.name.as_deref())
    }

    /// Child edges in insertion order
    pub fn children(&self, id: ObjectId) -> ObjectResult<Vec<(String, ObjectId)>> {
        Ok(self
            .instance(id)?
            .properties
            .iter()
            .filter_map(|(name, entry)| entry.child.map(|child| (name.clone(), child)))
            .collect())
    }

    fn child_named(&self, id: ObjectId, name: &str) -> Option<ObjectId> {
        self.instance(id)
            .ok()
            .and_then(|inst| inst.properties.get(name))
            .and_then(|entry| entry.child)
    }

    /// Whether `ancestor` sits above `id` in the ownership tree
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = self.instance(id).ok().and_then(|inst| inst.parent);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.instance(node).ok().and_then(|inst| inst.parent);
        }
        false
    }

    /// Absolute path from the root, `None` if the object is not in the tree
    pub fn canonical_path(&self, id: ObjectId) -> Option<String> {
        if id == self.root() {
            return Some("/".to_string());
        }
        let mut components = Vec::new();
        let mut current = id;
        loop {
            let inst = self.instance(current).ok()?;
            match (inst.parent, inst.name.as_deref()) {
                (Some(parent), Some(name)) => {
                    components.push(name);
                    if parent == self.root() {
                        break;
                    }
                    current = parent;
                }
                _ => return None,
            }
        }
        components.reverse();
        Some(format!("/{}", components.join("/")))
    }

    /// Resolve a path to an object.
    ///
    /// Absolute paths walk child properties from the root. Any other path is
    /// a partial path: it must match the tail of exactly one object's
    /// canonical path.
    pub fn resolve_path(&self, path: &str) -> ObjectResult<ObjectId> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        if path.starts_with('/') {
            return self
                .walk(self.root(), &components)
                .ok_or_else(|| ObjectError::NoSuchPath(path.to_string()));
        }
        if components.is_empty() {
            return Err(ObjectError::NoSuchPath(path.to_string()));
        }

        let mut found = None;
        let mut stack = vec![self.root()];
        while let Some(node) = stack.pop() {
            if let Some(hit) = self.walk(node, &components) {
                if found.is_some_and(|prev| prev != hit) {
                    return Err(ObjectError::AmbiguousPath(path.to_string()));
                }
                found = Some(hit);
            }
            if let Ok(children) = self.children(node) {
                stack.extend(children.into_iter().map(|(_, child)| child));
            }
        }
        found.ok_or_else(|| ObjectError::NoSuchPath(path.to_string()))
    }

    fn walk(&self, from: ObjectId, components: &[&str]) -> Option<ObjectId> {
        components
            .iter()
            .try_fold(from, |node, name| self.child_named(node, name))
    }
}
