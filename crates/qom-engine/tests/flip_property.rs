//! Integration tests for flip properties
//!
//! Tests cover the open/close state machine:
//! - Open hook only: close is refused
//! - Open and close hooks: alternating transitions
//! - Failing open hook: flag unchanged, retry allowed
//! - Teardown while open: best-effort close
//! - Graph shutdown closing attached doors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use qom_engine::property::{FlipCloseFn, FlipOpenFn};
use qom_engine::{
    field, ObjectError, ObjectGraph, ObjectId, ObjectResult, TypeDescriptor, TypeRegistry,
};

#[derive(Default)]
struct Door {
    opened: bool,
    journal: Vec<&'static str>,
    open_attempts: u32,
}

fn record_open(graph: &mut ObjectGraph, id: ObjectId) -> ObjectResult<()> {
    graph.state_mut::<Door>(id)?.journal.push("open");
    Ok(())
}

fn record_close(graph: &mut ObjectGraph, id: ObjectId) -> ObjectResult<()> {
    graph.state_mut::<Door>(id)?.journal.push("close");
    Ok(())
}

fn open_fails_first(graph: &mut ObjectGraph, id: ObjectId) -> ObjectResult<()> {
    let door = graph.state_mut::<Door>(id)?;
    door.open_attempts += 1;
    if door.open_attempts == 1 {
        return Err("device busy".into());
    }
    Ok(())
}

static TEARDOWN_CLOSES: AtomicUsize = AtomicUsize::new(0);

fn close_fails(_: &mut ObjectGraph, _: ObjectId) -> ObjectResult<()> {
    TEARDOWN_CLOSES.fetch_add(1, Ordering::SeqCst);
    Err("close failed".into())
}

static SHUTDOWN_CLOSES: AtomicUsize = AtomicUsize::new(0);

fn count_close(_: &mut ObjectGraph, _: ObjectId) -> ObjectResult<()> {
    SHUTDOWN_CLOSES.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

fn door_type(name: &str, open: Option<FlipOpenFn>, close: Option<FlipCloseFn>) -> TypeDescriptor {
    TypeDescriptor::new(name)
        .parent("door")
        .instance_init(move |graph, id| {
            graph.add_flip_property(id, "opened", field!(Door, opened), open, close)
        })
}

fn graph() -> ObjectGraph {
    let registry = TypeRegistry::new();
    registry
        .register_all([
            TypeDescriptor::object("door")
                .abstract_type()
                .instance_state::<Door>(),
            door_type("openable-object", Some(record_open), None),
            door_type("open-close-object", Some(record_open), Some(record_close)),
            door_type("flaky-object", Some(open_fails_first), None),
            door_type("sticky-object", None, Some(close_fails)),
            door_type("counted-object", None, Some(count_close)),
        ])
        .unwrap();
    ObjectGraph::new(Arc::new(registry)).unwrap()
}

#[test]
fn test_open_only_hook() {
    let mut graph = graph();
    let door = graph.create("openable-object").unwrap();
    assert!(!graph.get_bool(door, "opened").unwrap());

    graph.set_bool(door, "opened", true).unwrap();
    graph.set_bool(door, "opened", true).unwrap();
    assert_eq!(graph.state::<Door>(door).unwrap().journal, vec!["open"]);

    assert_eq!(
        graph.set_bool(door, "opened", false),
        Err(ObjectError::PermissionDenied)
    );
    assert!(graph.get_bool(door, "opened").unwrap());
}

#[test]
fn test_open_and_close_hooks() {
    let mut graph = graph();
    let door = graph.create("open-close-object").unwrap();

    for value in [true, false, true, false] {
        graph.set_bool(door, "opened", value).unwrap();
    }
    assert_eq!(
        graph.state::<Door>(door).unwrap().journal,
        vec!["open", "close", "open", "close"]
    );
    assert!(!graph.get_bool(door, "opened").unwrap());

    // Closing a closed door runs nothing
    graph.set_bool(door, "opened", false).unwrap();
    assert_eq!(graph.state::<Door>(door).unwrap().journal.len(), 4);
}

#[test]
fn test_failed_open_can_be_retried() {
    let mut graph = graph();
    let door = graph.create("flaky-object").unwrap();

    assert_eq!(
        graph.set_bool(door, "opened", true),
        Err(ObjectError::Failed("device busy".to_string()))
    );
    assert!(!graph.get_bool(door, "opened").unwrap());

    graph.parse_property(door, "opened", "on").unwrap();
    assert!(graph.get_bool(door, "opened").unwrap());
    assert_eq!(graph.state::<Door>(door).unwrap().open_attempts, 2);
}

#[test]
fn test_teardown_closes_once_and_ignores_failure() {
    let mut graph = graph();
    let door = graph.create("sticky-object").unwrap();
    graph.set_bool(door, "opened", true).unwrap();

    // An explicit close surfaces the hook error and stays open
    assert_eq!(
        graph.set_bool(door, "opened", false),
        Err(ObjectError::Failed("close failed".to_string()))
    );
    assert!(graph.get_bool(door, "opened").unwrap());
    let before = TEARDOWN_CLOSES.load(Ordering::SeqCst);

    graph.unref(door).unwrap();
    assert!(!graph.is_alive(door));
    assert_eq!(TEARDOWN_CLOSES.load(Ordering::SeqCst), before + 1);

    // Closed at teardown: no hook
    let closed = graph.create("sticky-object").unwrap();
    graph.unref(closed).unwrap();
    assert_eq!(TEARDOWN_CLOSES.load(Ordering::SeqCst), before + 1);
}

#[test]
fn test_shutdown_closes_open_doors() {
    let mut graph = graph();
    let root = graph.root();
    let open = graph.create_child(root, "front", "counted-object").unwrap();
    graph.set_bool(open, "opened", true).unwrap();
    let shut = graph.create_child(root, "back", "counted-object").unwrap();

    graph.shutdown().unwrap();
    assert!(!graph.is_alive(open));
    assert!(!graph.is_alive(shut));
    assert_eq!(SHUTDOWN_CLOSES.load(Ordering::SeqCst), 1);
    assert_eq!(graph.object_count(), 1);
}
