//! Flip properties: booleans gated by open/close hooks
//!
//! `Closed -> Open` runs the open hook (if any) and only then sets the flag.
//! `Open -> Closed` runs the close hook; with an open hook but no close hook
//! the transition is refused with `PermissionDenied`. Setting the current
//! value again is a no-op. A hook error leaves the flag unchanged. When the
//! owner is finalized while open, the property closes itself and drops any
//! close error.

use std::any::Any;

use qom_sdk::{ObjectError, ObjectResult, PropertyType};
use tracing::warn;

use super::{Field, Property};
use crate::object::{ObjectGraph, ObjectId};

/// Open hook
pub type FlipOpenFn = fn(&mut ObjectGraph, ObjectId) -> ObjectResult<()>;

/// Close hook
pub type FlipCloseFn = fn(&mut ObjectGraph, ObjectId) -> ObjectResult<()>;

struct Flip<S> {
    field: Field<S, bool>,
    open: Option<FlipOpenFn>,
    close: Option<FlipCloseFn>,
}

impl<S> Clone for Flip<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Flip<S> {}

impl<S: Any> Flip<S> {
    fn open(&self, graph: &mut ObjectGraph, owner: ObjectId) -> ObjectResult<()> {
        if *self.field.read(graph, owner)? {
            return Ok(());
        }
        if let Some(open) = self.open {
            open(graph, owner)?;
        }
        *self.field.write(graph, owner)? = true;
        Ok(())
    }

    fn close(&self, graph: &mut ObjectGraph, owner: ObjectId) -> ObjectResult<()> {
        if !*self.field.read(graph, owner)? {
            return Ok(());
        }
        match (self.open, self.close) {
            (_, Some(close)) => close(graph, owner)?,
            (Some(_), None) => return Err(ObjectError::PermissionDenied),
            (None, None) => {}
        }
        *self.field.write(graph, owner)? = false;
        Ok(())
    }
}

impl ObjectGraph {
    /// Add a flip property over the boolean `field` of the owner's state
    pub fn add_flip_property<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        field: Field<S, bool>,
        open: Option<FlipOpenFn>,
        close: Option<FlipCloseFn>,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let flip = Flip { field, open, close };

        let property = Property::new(name, PropertyType::Bool)
            .getter(move |graph, owner, visitor, name| {
                let mut value = *field.read(graph, owner)?;
                visitor.visit_bool(name, &mut value)
            })
            .setter(move |graph, owner, visitor, name| {
                let mut value = false;
                visitor.visit_bool(name, &mut value)?;
                if value {
                    flip.open(graph, owner)
                } else {
                    flip.close(graph, owner)
                }
            })
            .release(move |graph, owner, name| {
                if let Err(err) = flip.close(graph, owner) {
                    warn!(%owner, property = name, error = %err, "close on teardown failed");
                }
            });
        self.add_property(owner, property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field;
    use crate::types::{TypeDescriptor, TypeRegistry};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tap {
        up: bool,
        opens: u32,
    }

    fn bring_up(graph: &mut ObjectGraph, id: ObjectId) -> ObjectResult<()> {
        graph.state_mut::<Tap>(id)?.opens += 1;
        Ok(())
    }

    fn tap_graph() -> (ObjectGraph, ObjectId) {
        let registry = TypeRegistry::new();
        registry
            .register(TypeDescriptor::object("tap").instance_state::<Tap>())
            .unwrap();
        let mut graph = ObjectGraph::new(Arc::new(registry)).unwrap();
        let id = graph.create("tap").unwrap();
        (graph, id)
    }

    #[test]
    fn test_no_hooks_flag_follows_value() {
        let (mut graph, id) = tap_graph();
        graph
            .add_flip_property(id, "up", field!(Tap, up), None, None)
            .unwrap();
        graph.set_bool(id, "up", true).unwrap();
        assert!(graph.get_bool(id, "up").unwrap());
        graph.set_bool(id, "up", false).unwrap();
        assert!(!graph.get_bool(id, "up").unwrap());
    }

    #[test]
    fn test_open_only_refuses_close() {
        let (mut graph, id) = tap_graph();
        graph
            .add_flip_property(id, "up", field!(Tap, up), Some(bring_up), None)
            .unwrap();
        graph.set_bool(id, "up", true).unwrap();
        graph.set_bool(id, "up", true).unwrap();
        assert_eq!(graph.state::<Tap>(id).unwrap().opens, 1);
        assert_eq!(
            graph.set_bool(id, "up", false),
            Err(ObjectError::PermissionDenied)
        );
        assert!(graph.state::<Tap>(id).unwrap().up);
    }

    #[test]
    fn test_wrong_value_type() {
        let (mut graph, id) = tap_graph();
        graph
            .add_flip_property(id, "up", field!(Tap, up), Some(bring_up), None)
            .unwrap();
        assert!(matches!(
            graph.set_int(id, "up", 1),
            Err(ObjectError::ValidationFailed(_))
        ));
        assert_eq!(graph.state::<Tap>(id).unwrap().opens, 0);
    }
}
