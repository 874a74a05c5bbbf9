//! Alias properties: forward to a property of another object

use qom_sdk::{ObjectResult, PropertyType};

use super::Property;
use crate::object::{ObjectGraph, ObjectId};

impl ObjectGraph {
    /// Add `name` on `owner` as an alias of `target_name` on `target`.
    ///
    /// The target property must exist now. The alias mirrors its
    /// readability and writability; aliases of child properties read as
    /// links. The alias holds no reference on the target.
    pub fn add_alias_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        target: ObjectId,
        target_name: &str,
    ) -> ObjectResult<()> {
        let original = self.find_property(target, target_name)?;
        let kind = match original.kind() {
            PropertyType::Child(type_name) => PropertyType::Link(type_name.clone()),
            other => other.clone(),
        };

        let mut property = Property::new(name, kind).description(
            original
                .description
                .clone()
                .unwrap_or_else(|| format!("alias of {}", target_name)),
        );
        if original.is_readable() {
            let target_name = target_name.to_string();
            property = property.getter(move |graph, _owner, visitor, _name| {
                graph.get_property(target, &target_name, visitor)
            });
        }
        if original.is_writable() {
            let target_name = target_name.to_string();
            property = property.setter(move |graph, _owner, visitor, _name| {
                graph.set_property(target, &target_name, visitor)
            });
        }
        self.add_property(owner, property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::FieldAccess;
    use crate::types::{TypeDescriptor, TypeRegistry, TYPE_CONTAINER};
    use crate::field;
    use qom_sdk::ObjectError;
    use std::sync::Arc;

    #[derive(Default)]
    struct Nic {
        mac: String,
    }

    #[test]
    fn test_alias_forwards_both_ways() {
        let registry = TypeRegistry::new();
        registry
            .register(TypeDescriptor::object("nic").instance_state::<Nic>())
            .unwrap();
        let mut graph = ObjectGraph::new(Arc::new(registry)).unwrap();
        let root = graph.root();
        let board = graph.create_child(root, "board", TYPE_CONTAINER).unwrap();
        let nic = graph.create_child(board, "nic0", "nic").unwrap();
        graph
            .add_str_field(nic, "mac", field!(Nic, mac), FieldAccess::ReadWrite)
            .unwrap();
        graph.add_alias_property(board, "mac", nic, "mac").unwrap();

        graph.set_str(board, "mac", "52:54:00:12:34:56").unwrap();
        assert_eq!(graph.state::<Nic>(nic).unwrap().mac, "52:54:00:12:34:56");
        assert_eq!(graph.get_str(board, "mac").unwrap(), "52:54:00:12:34:56");

        graph.add_alias_property(board, "nic", board, "nic0").unwrap();
        assert_eq!(
            graph.property_type(board, "nic").unwrap(),
            PropertyType::Link("nic".to_string())
        );
        assert_eq!(graph.get_link(board, "nic").unwrap(), Some(nic));
        assert_eq!(
            graph.set_str(board, "nic", "/"),
            Err(ObjectError::NotWritable("nic".to_string()))
        );
    }

    #[test]
    fn test_alias_needs_existing_target() {
        let mut graph = ObjectGraph::new(Arc::new(TypeRegistry::new())).unwrap();
        let root = graph.root();
        assert_eq!(
            graph.add_alias_property(root, "x", root, "missing"),
            Err(ObjectError::NoSuchProperty("missing".to_string()))
        );
    }
}
