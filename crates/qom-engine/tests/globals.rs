//! Integration tests for global property defaults
//!
//! Tests cover:
//! - Loading defaults from a TOML file
//! - Application order along the class chain
//! - A rejected default failing creation

use std::io::Write;
use std::sync::Arc;

use qom_engine::{
    field, FieldAccess, GlobalProperties, GlobalProperty, GraphOptions, ObjectError, ObjectGraph,
    TypeDescriptor, TypeRegistry,
};

#[derive(Default)]
struct Serial {
    baud: i64,
    label: String,
    enabled: bool,
}

fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    registry
        .register_all([
            TypeDescriptor::object("serial")
                .instance_state::<Serial>()
                .instance_init(|graph, id| {
                    graph.add_int_field(id, "baud", field!(Serial, baud), FieldAccess::ReadWrite)?;
                    graph.add_str_field(id, "label", field!(Serial, label), FieldAccess::ReadWrite)?;
                    graph.add_bool_field(
                        id,
                        "enabled",
                        field!(Serial, enabled),
                        FieldAccess::ReadWrite,
                    )
                }),
            TypeDescriptor::new("isa-serial").parent("serial"),
        ])
        .unwrap();
    Arc::new(registry)
}

#[test]
fn test_defaults_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[global]]
driver = "serial"
property = "baud"
value = "9600"

[[global]]
driver = "isa-serial"
property = "enabled"
value = "on"
"#
    )
    .unwrap();

    let globals = GlobalProperties::from_file(file.path()).unwrap();
    assert_eq!(globals.len(), 2);

    let mut graph =
        ObjectGraph::with_options(GraphOptions::new(registry()).with_globals(globals)).unwrap();
    let plain = graph.create("serial").unwrap();
    let isa = graph.create("isa-serial").unwrap();

    assert_eq!(graph.get_int(plain, "baud").unwrap(), 9600);
    assert!(!graph.get_bool(plain, "enabled").unwrap());
    assert_eq!(graph.get_int(isa, "baud").unwrap(), 9600);
    assert!(graph.get_bool(isa, "enabled").unwrap());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        GlobalProperties::from_file(dir.path().join("absent.toml")),
        Err(ObjectError::Config(_))
    ));
}

#[test]
fn test_leaf_defaults_apply_first() {
    let mut graph = ObjectGraph::new(registry()).unwrap();
    graph.register_global("serial.label=generic".parse().unwrap());
    graph.register_global(GlobalProperty::new("isa-serial", "label", "com1"));

    // The base type's default is applied last and wins
    let isa = graph.create("isa-serial").unwrap();
    assert_eq!(graph.get_str(isa, "label").unwrap(), "generic");
}

#[test]
fn test_rejected_default_fails_create() {
    let mut graph = ObjectGraph::new(registry()).unwrap();
    graph.register_global(GlobalProperty::new("serial", "baud", "fast"));
    let before = graph.object_count();

    assert!(matches!(
        graph.create("isa-serial"),
        Err(ObjectError::ValidationFailed(_))
    ));
    assert_eq!(graph.object_count(), before);

    let mut graph2 = ObjectGraph::new(registry()).unwrap();
    graph2.register_global(GlobalProperty::new("isa-serial", "parity", "odd"));
    assert_eq!(
        graph2.create("isa-serial"),
        Err(ObjectError::NoSuchProperty("parity".to_string()))
    );
}
