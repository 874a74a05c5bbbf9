//! Typed property helpers
//!
//! Two flavours: accessor-backed properties built from plain function
//! pointers (the common device pattern), and field-backed properties that
//! project straight into an instance state struct.

use std::any::Any;
use std::sync::Arc;

use qom_sdk::{EnumLookup, ObjectResult, PropertyType, PropertyValue, Visitor};

use super::{Field, Property};
use crate::object::{ObjectGraph, ObjectId};

/// Boolean getter
pub type BoolGetter = fn(&ObjectGraph, ObjectId) -> ObjectResult<bool>;
/// Boolean setter
pub type BoolSetter = fn(&mut ObjectGraph, ObjectId, bool) -> ObjectResult<()>;
/// Integer getter
pub type IntGetter = fn(&ObjectGraph, ObjectId) -> ObjectResult<i64>;
/// Integer setter
pub type IntSetter = fn(&mut ObjectGraph, ObjectId, i64) -> ObjectResult<()>;
/// String getter
pub type StrGetter = fn(&ObjectGraph, ObjectId) -> ObjectResult<String>;
/// String setter
pub type StrSetter = fn(&mut ObjectGraph, ObjectId, String) -> ObjectResult<()>;
/// Enum getter, returning an index into the lookup table
pub type EnumGetter = fn(&ObjectGraph, ObjectId) -> ObjectResult<usize>;
/// Enum setter, receiving an already validated index
pub type EnumSetter = fn(&mut ObjectGraph, ObjectId, usize) -> ObjectResult<()>;

type ValueGetter<T> = Arc<dyn Fn(&ObjectGraph, ObjectId) -> ObjectResult<T> + Send + Sync>;
type ValueSetter<T> = Arc<dyn Fn(&mut ObjectGraph, ObjectId, T) -> ObjectResult<()> + Send + Sync>;

/// Whether a field-backed property accepts writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Getter and setter
    ReadWrite,
    /// Getter only
    ReadOnly,
}

/// Build a property from typed accessors.
///
/// The setter decodes into a scratch value first, so a visitor error never
/// reaches the setter and the stored value stays untouched.
fn scalar_property<T: Default + 'static>(
    name: &str,
    kind: PropertyType,
    get: Option<ValueGetter<T>>,
    set: Option<ValueSetter<T>>,
    visit: impl Fn(&mut dyn Visitor, &str, &mut T) -> ObjectResult<()> + Clone + Send + Sync + 'static,
) -> Property {
    let mut property = Property::new(name, kind);
    if let Some(get) = get {
        let visit = visit.clone();
        property = property.getter(move |graph, owner, visitor, name| {
            let mut value = get(graph, owner)?;
            visit(visitor, name, &mut value)
        });
    }
    if let Some(set) = set {
        property = property.setter(move |graph, owner, visitor, name| {
            let mut value = T::default();
            visit(visitor, name, &mut value)?;
            set(graph, owner, value)
        });
    }
    property
}

fn visit_bool(visitor: &mut dyn Visitor, name: &str, value: &mut bool) -> ObjectResult<()> {
    visitor.visit_bool(name, value)
}

fn visit_int(visitor: &mut dyn Visitor, name: &str, value: &mut i64) -> ObjectResult<()> {
    visitor.visit_int(name, value)
}

fn visit_str(visitor: &mut dyn Visitor, name: &str, value: &mut String) -> ObjectResult<()> {
    visitor.visit_str(name, value)
}

fn visit_str_list(
    visitor: &mut dyn Visitor,
    name: &str,
    value: &mut Vec<String>,
) -> ObjectResult<()> {
    let mut items: Vec<PropertyValue> = value.iter().map(|s| PropertyValue::from(s.as_str())).collect();
    visitor.visit_list(name, &mut items)?;
    *value = items.iter().map(PropertyValue::to_string).collect();
    Ok(())
}

fn enum_visit(
    lookup: EnumLookup,
) -> impl Fn(&mut dyn Visitor, &str, &mut usize) -> ObjectResult<()> + Clone + Send + Sync + 'static
{
    move |visitor: &mut dyn Visitor, name: &str, value: &mut usize| {
        visitor.visit_enum(name, value, &lookup)
    }
}

fn boxed_get<T: 'static>(get: fn(&ObjectGraph, ObjectId) -> ObjectResult<T>) -> ValueGetter<T> {
    Arc::new(get)
}

fn boxed_set<T: 'static>(
    set: fn(&mut ObjectGraph, ObjectId, T) -> ObjectResult<()>,
) -> ValueSetter<T> {
    Arc::new(set)
}

/// Boolean property over accessor functions
pub fn bool_property(name: &str, get: Option<BoolGetter>, set: Option<BoolSetter>) -> Property {
    scalar_property(
        name,
        PropertyType::Bool,
        get.map(boxed_get),
        set.map(boxed_set),
        visit_bool,
    )
}

/// Integer property over accessor functions
pub fn int_property(name: &str, get: Option<IntGetter>, set: Option<IntSetter>) -> Property {
    scalar_property(
        name,
        PropertyType::Int,
        get.map(boxed_get),
        set.map(boxed_set),
        visit_int,
    )
}

/// String property over accessor functions
pub fn str_property(name: &str, get: Option<StrGetter>, set: Option<StrSetter>) -> Property {
    scalar_property(
        name,
        PropertyType::Str,
        get.map(boxed_get),
        set.map(boxed_set),
        visit_str,
    )
}

/// Enum property over accessor functions.
///
/// Fails with `ValidationFailed` if a value name in `lookup` is malformed.
pub fn enum_property(
    name: &str,
    lookup: EnumLookup,
    get: Option<EnumGetter>,
    set: Option<EnumSetter>,
) -> ObjectResult<Property> {
    lookup.validate()?;
    Ok(scalar_property(
        name,
        PropertyType::Enum(lookup),
        get.map(boxed_get),
        set.map(boxed_set),
        enum_visit(lookup),
    ))
}

fn field_property<S: Any, T: Clone + Default + 'static>(
    name: &str,
    kind: PropertyType,
    field: Field<S, T>,
    access: FieldAccess,
    visit: impl Fn(&mut dyn Visitor, &str, &mut T) -> ObjectResult<()> + Clone + Send + Sync + 'static,
) -> Property {
    let get: ValueGetter<T> =
        Arc::new(move |graph: &ObjectGraph, id: ObjectId| field.read(graph, id).cloned());
    let set = match access {
        FieldAccess::ReadWrite => {
            let set: ValueSetter<T> = Arc::new(
                move |graph: &mut ObjectGraph, id: ObjectId, value: T| -> ObjectResult<()> {
                    *field.write(graph, id)? = value;
                    Ok(())
                },
            );
            Some(set)
        }
        FieldAccess::ReadOnly => None,
    };
    scalar_property(name, kind, Some(get), set, visit)
}

impl ObjectGraph {
    /// Add a boolean property over accessor functions
    pub fn add_bool_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        get: Option<BoolGetter>,
        set: Option<BoolSetter>,
    ) -> ObjectResult<()> {
        self.add_property(owner, bool_property(name, get, set))
    }

    /// Add an integer property over accessor functions
    pub fn add_int_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        get: Option<IntGetter>,
        set: Option<IntSetter>,
    ) -> ObjectResult<()> {
        self.add_property(owner, int_property(name, get, set))
    }

    /// Add a string property over accessor functions
    pub fn add_str_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        get: Option<StrGetter>,
        set: Option<StrSetter>,
    ) -> ObjectResult<()> {
        self.add_property(owner, str_property(name, get, set))
    }

    /// Add an enum property over accessor functions
    pub fn add_enum_property(
        &mut self,
        owner: ObjectId,
        name: &str,
        lookup: EnumLookup,
        get: Option<EnumGetter>,
        set: Option<EnumSetter>,
    ) -> ObjectResult<()> {
        let property = enum_property(name, lookup, get, set)?;
        self.add_property(owner, property)
    }

    /// Add a boolean property backed by a state field
    pub fn add_bool_field<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        field: Field<S, bool>,
        access: FieldAccess,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let property = field_property(name, PropertyType::Bool, field, access, visit_bool);
        self.add_property(owner, property)
    }

    /// Add an integer property backed by a state field
    pub fn add_int_field<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        field: Field<S, i64>,
        access: FieldAccess,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let property = field_property(name, PropertyType::Int, field, access, visit_int);
        self.add_property(owner, property)
    }

    /// Add a string property backed by a state field
    pub fn add_str_field<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        field: Field<S, String>,
        access: FieldAccess,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let property = field_property(name, PropertyType::Str, field, access, visit_str);
        self.add_property(owner, property)
    }

    /// Add an enum property backed by a state field holding the index
    pub fn add_enum_field<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        lookup: EnumLookup,
        field: Field<S, usize>,
        access: FieldAccess,
    ) -> ObjectResult<()> {
        lookup.validate()?;
        self.state::<S>(owner)?;
        let property = field_property(
            name,
            PropertyType::Enum(lookup),
            field,
            access,
            enum_visit(lookup),
        );
        self.add_property(owner, property)
    }

    /// Add a string list property backed by a state field
    pub fn add_str_list_field<S: Any>(
        &mut self,
        owner: ObjectId,
        name: &str,
        field: Field<S, Vec<String>>,
        access: FieldAccess,
    ) -> ObjectResult<()> {
        self.state::<S>(owner)?;
        let property = field_property(name, PropertyType::List, field, access, visit_str_list);
        self.add_property(owner, property)
    }
}
