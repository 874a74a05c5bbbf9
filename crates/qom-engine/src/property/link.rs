//! Link properties: typed, path-addressed references to other objects

use std::any::Any;

use qom_sdk::{ObjectError, ObjectResult, PropertyType};
use tracing::trace;

use super::{Field, Property};
use crate::object::{ObjectGraph, ObjectId};

/// Extra validation run before a link is changed
pub type LinkCheckFn = fn(&ObjectGraph, ObjectId, &str, ObjectId) -> ObjectResult<()>;

/// Whether a link keeps its target alive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrength {
    /// Holds no reference; reads as unset once the target dies
    Weak,
    /// Holds a reference on the target until changed or released
    Strong,
}

impl ObjectGraph {
    /// Add a `link<target_type>` property stored in `field`.
    ///
    /// Setting resolves the path, requires the target to be an instance of
    /// `target_type`, runs `check`, then swaps the target. An empty path
    /// clears the link.
    pub fn add_link_property<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        target_type: &str,
        field: Field<S, Option<ObjectId>>,
        strength: LinkStrength,
        check: Option<LinkCheckFn>,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let strong = strength == LinkStrength::Strong;
        let expected = target_type.to_string();

        let mut property = Property::new(name, PropertyType::Link(target_type.to_string()))
            .getter(move |graph, owner, visitor, name| {
                let mut path = field
                    .read(graph, owner)?
                    .and_then(|target| graph.canonical_path(target))
                    .unwrap_or_default();
                visitor.visit_link(name, &mut path)
            })
            .setter(move |graph, owner, visitor, name| {
                let mut path = String::new();
                visitor.visit_link(name, &mut path)?;

                let target = if path.is_empty() {
                    None
                } else {
                    let target = graph.resolve_path(&path)?;
                    if !graph.is_instance_of(target, &expected) {
                        return Err(ObjectError::invalid_type(name, &expected));
                    }
                    Some(target)
                };
                if let (Some(check), Some(target)) = (check, target) {
                    check(graph, owner, name, target)?;
                }

                field.read(graph, owner)?;
                if strong {
                    if let Some(target) = target {
                        graph.add_ref(target)?;
                    }
                }
                let old = std::mem::replace(field.write(graph, owner)?, target);
                if strong {
                    if let Some(old) = old {
                        // A dead target has nothing left to drop
                        let _ = graph.unref(old);
                    }
                }
                trace!(%owner, property = name, path = %path, "link changed");
                Ok(())
            });

        if strong {
            property = property.release(move |graph, owner, _name| {
                let old = field.write(graph, owner).ok().and_then(|slot| slot.take());
                if let Some(old) = old {
                    let _ = graph.unref(old);
                }
            });
        }
        self.add_property(owner, property)
    }
}
