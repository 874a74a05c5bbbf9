//! Integration tests for the hotplug, stream and interrupt statistics
//! dispatch helpers
//!
//! Tests cover:
//! - Dispatch to implemented slots, including subclass overrides
//! - Neutral defaults for missing interfaces and empty slots
//! - Stream backpressure notifications
//! - Published interrupt counters

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use qom_engine::hw::{
    self, hotplug_handler_plug, hotplug_handler_pre_plug, hotplug_handler_unplug,
    hotplug_handler_unplug_request, interrupt_stats, interrupt_stats_print_info, stream_can_push,
    stream_notify_ready, stream_push, CanPushNotifier, HotplugHandlerClass,
    InterruptStatsProviderClass, StreamNotifyFn, StreamSinkClass, TYPE_HOTPLUG_HANDLER,
    TYPE_INTERRUPT_STATS_PROVIDER, TYPE_STREAM_SINK,
};
use qom_engine::{
    field, BigLock, ObjectError, ObjectGraph, ObjectId, ObjectResult, TypeDescriptor,
    TypeRegistry, TYPE_OBJECT,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Bus {
    plugged: Vec<ObjectId>,
    journal: Vec<&'static str>,
}

fn bus_pre_plug(graph: &mut ObjectGraph, _bus: ObjectId, dev: ObjectId) -> ObjectResult<()> {
    if graph.type_name(dev)? == "legacy-dev" {
        return Err("legacy devices cannot be hotplugged".into());
    }
    Ok(())
}

fn bus_plug(graph: &mut ObjectGraph, bus: ObjectId, dev: ObjectId) -> ObjectResult<()> {
    let bus = graph.state_mut::<Bus>(bus)?;
    bus.plugged.push(dev);
    bus.journal.push("plug");
    Ok(())
}

fn bus_unplug(graph: &mut ObjectGraph, bus: ObjectId, dev: ObjectId) -> ObjectResult<()> {
    let bus = graph.state_mut::<Bus>(bus)?;
    bus.plugged.retain(|d| *d != dev);
    bus.journal.push("unplug");
    Ok(())
}

fn express_plug(graph: &mut ObjectGraph, bus: ObjectId, dev: ObjectId) -> ObjectResult<()> {
    bus_plug(graph, bus, dev)?;
    graph.state_mut::<Bus>(bus)?.journal.push("link up");
    Ok(())
}

#[derive(Default)]
struct Fifo {
    data: Vec<u8>,
    capacity: usize,
    packets: u32,
    notifier: CanPushNotifier,
}

fn fifo_push(graph: &mut ObjectGraph, sink: ObjectId, data: &[u8], eop: bool) -> usize {
    let Ok(fifo) = graph.state_mut::<Fifo>(sink) else {
        return 0;
    };
    let room = fifo.capacity.saturating_sub(fifo.data.len());
    let accepted = room.min(data.len());
    fifo.data.extend_from_slice(&data[..accepted]);
    if eop && accepted == data.len() {
        fifo.packets += 1;
    }
    accepted
}

fn fifo_can_push(
    graph: &mut ObjectGraph,
    sink: ObjectId,
    caller: ObjectId,
    notify: StreamNotifyFn,
) -> bool {
    let Ok(fifo) = graph.state_mut::<Fifo>(sink) else {
        return false;
    };
    if fifo.data.len() < fifo.capacity {
        return true;
    }
    fifo.notifier.register(caller, notify);
    false
}

fn fifo_drain(graph: &mut ObjectGraph, sink: ObjectId) -> ObjectResult<usize> {
    graph.state_mut::<Fifo>(sink)?.data.clear();
    stream_notify_ready(graph, sink, field!(Fifo, notifier))
}

#[derive(Default)]
struct Pic {
    counts: Vec<u64>,
}

fn pic_stats(graph: &ObjectGraph, pic: ObjectId) -> Option<&[u64]> {
    graph.state::<Pic>(pic).ok().map(|p| p.counts.as_slice())
}

fn pic_print(graph: &ObjectGraph, pic: ObjectId, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
    let total: u64 = pic_stats(graph, pic).unwrap_or_default().iter().sum();
    write!(out, "pic: {} interrupts", total)
}

fn graph() -> ObjectGraph {
    let registry = TypeRegistry::new();
    hw::register_types(&registry).unwrap();
    registry
        .register_all([
            TypeDescriptor::object("pci-bus")
                .implements(TYPE_HOTPLUG_HANDLER)
                .instance_state::<Bus>()
                .class_init(|c| {
                    let hotplug = c.data_mut::<HotplugHandlerClass>()?;
                    hotplug.pre_plug = Some(bus_pre_plug);
                    hotplug.plug = Some(bus_plug);
                    hotplug.unplug = Some(bus_unplug);
                    Ok(())
                }),
            TypeDescriptor::new("pcie-bus").parent("pci-bus").class_init(|c| {
                c.data_mut::<HotplugHandlerClass>()?.plug = Some(express_plug);
                Ok(())
            }),
            TypeDescriptor::object("nic"),
            TypeDescriptor::object("legacy-dev"),
            TypeDescriptor::object("fifo-sink")
                .implements(TYPE_STREAM_SINK)
                .instance_state::<Fifo>()
                .instance_init(|graph, id| {
                    graph.state_mut::<Fifo>(id)?.capacity = 8;
                    Ok(())
                })
                .class_init(|c| {
                    let sink = c.data_mut::<StreamSinkClass>()?;
                    sink.push = Some(fifo_push);
                    sink.can_push = Some(fifo_can_push);
                    Ok(())
                }),
            TypeDescriptor::object("null-sink").implements(TYPE_STREAM_SINK),
            TypeDescriptor::object("pic")
                .implements(TYPE_INTERRUPT_STATS_PROVIDER)
                .instance_state::<Pic>()
                .class_init(|c| {
                    let stats = c.data_mut::<InterruptStatsProviderClass>()?;
                    stats.get_statistics = Some(pic_stats);
                    stats.print_info = Some(pic_print);
                    Ok(())
                }),
        ])
        .unwrap();
    ObjectGraph::new(Arc::new(registry)).unwrap()
}

// ============================================================================
// Hotplug
// ============================================================================

#[test]
fn test_hotplug_dispatch() {
    let mut graph = graph();
    let bus = graph.create("pci-bus").unwrap();
    let nic = graph.create("nic").unwrap();

    hotplug_handler_pre_plug(&mut graph, bus, nic).unwrap();
    hotplug_handler_plug(&mut graph, bus, nic).unwrap();
    assert_eq!(graph.state::<Bus>(bus).unwrap().plugged, vec![nic]);

    // Empty slot
    hotplug_handler_unplug_request(&mut graph, bus, nic).unwrap();
    hotplug_handler_unplug(&mut graph, bus, nic).unwrap();
    let state = graph.state::<Bus>(bus).unwrap();
    assert!(state.plugged.is_empty());
    assert_eq!(state.journal, vec!["plug", "unplug"]);
}

#[test]
fn test_hotplug_errors_propagate() {
    let mut graph = graph();
    let bus = graph.create("pci-bus").unwrap();
    let legacy = graph.create("legacy-dev").unwrap();
    assert_eq!(
        hotplug_handler_pre_plug(&mut graph, bus, legacy),
        Err(ObjectError::Failed(
            "legacy devices cannot be hotplugged".to_string()
        ))
    );
}

#[test]
fn test_hotplug_override_in_subclass() {
    let mut graph = graph();
    let bus = graph.create("pcie-bus").unwrap();
    let nic = graph.create("nic").unwrap();
    hotplug_handler_plug(&mut graph, bus, nic).unwrap();
    assert_eq!(
        graph.state::<Bus>(bus).unwrap().journal,
        vec!["plug", "link up"]
    );
}

#[test]
fn test_hotplug_without_handler_is_noop() {
    let mut graph = graph();
    let nic = graph.create("nic").unwrap();
    let other = graph.create(TYPE_OBJECT).unwrap();
    hotplug_handler_plug(&mut graph, nic, other).unwrap();
    hotplug_handler_unplug(&mut graph, nic, other).unwrap();

    let dead = graph.create("nic").unwrap();
    graph.unref(dead).unwrap();
    assert!(matches!(
        hotplug_handler_plug(&mut graph, dead, other),
        Err(ObjectError::InvalidObject(_))
    ));
}

// ============================================================================
// Stream
// ============================================================================

#[test]
fn test_stream_push() {
    let mut graph = graph();
    let sink = graph.create("fifo-sink").unwrap();

    assert_eq!(stream_push(&mut graph, sink, b"hello", true), 5);
    assert_eq!(stream_push(&mut graph, sink, b"world", false), 3);
    let fifo = graph.state::<Fifo>(sink).unwrap();
    assert_eq!(fifo.data, b"hellowor");
    assert_eq!(fifo.packets, 1);

    let null = graph.create("null-sink").unwrap();
    let nic = graph.create("nic").unwrap();
    assert_eq!(stream_push(&mut graph, null, b"x", true), 0);
    assert_eq!(stream_push(&mut graph, nic, b"x", true), 0);
}

#[test]
fn test_can_push_defaults() {
    let mut graph = graph();
    let caller = graph.create(TYPE_OBJECT).unwrap();
    let null = graph.create("null-sink").unwrap();
    let nic = graph.create("nic").unwrap();
    let sink = graph.create("fifo-sink").unwrap();

    assert!(stream_can_push(&mut graph, null, caller, |_| {}));
    assert!(!stream_can_push(&mut graph, nic, caller, |_| {}));
    assert!(stream_can_push(&mut graph, sink, caller, |_| {}));
}

#[test]
fn test_backpressure_notifies_once() {
    let mut graph = graph();
    let sink = graph.create("fifo-sink").unwrap();
    let caller = graph.create(TYPE_OBJECT).unwrap();
    let kicks = Arc::new(AtomicUsize::new(0));

    stream_push(&mut graph, sink, &[0; 8], true);
    for _ in 0..2 {
        let kicks = Arc::clone(&kicks);
        let ready = stream_can_push(&mut graph, sink, caller, move |_| {
            kicks.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!ready);
    }
    assert_eq!(graph.state::<Fifo>(sink).unwrap().notifier.len(), 1);

    assert_eq!(fifo_drain(&mut graph, sink), Ok(1));
    assert_eq!(fifo_drain(&mut graph, sink), Ok(0));
    assert_eq!(kicks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_no_notification_after_sink_destroyed() {
    let mut graph = graph();
    let sink = graph.create("fifo-sink").unwrap();
    let caller = graph.create(TYPE_OBJECT).unwrap();
    let kicks = Arc::new(AtomicUsize::new(0));

    stream_push(&mut graph, sink, &[0; 8], false);
    let k = Arc::clone(&kicks);
    assert!(!stream_can_push(&mut graph, sink, caller, move |_| {
        k.fetch_add(1, Ordering::SeqCst);
    }));
    graph.unref(sink).unwrap();
    assert_eq!(kicks.load(Ordering::SeqCst), 0);
    assert_eq!(Arc::strong_count(&kicks), 1);
}

#[test]
fn test_delivery_stops_when_callback_destroys_sink() {
    let mut graph = graph();
    let sink = graph.create("fifo-sink").unwrap();
    let first = graph.create(TYPE_OBJECT).unwrap();
    let second = graph.create(TYPE_OBJECT).unwrap();
    let kicks = Arc::new(AtomicUsize::new(0));

    stream_push(&mut graph, sink, &[0; 8], false);
    let k = Arc::clone(&kicks);
    stream_can_push(&mut graph, sink, first, move |g: &mut ObjectGraph| {
        k.fetch_add(1, Ordering::SeqCst);
        g.unref(sink).unwrap();
    });
    let k = Arc::clone(&kicks);
    stream_can_push(&mut graph, sink, second, move |_| {
        k.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(fifo_drain(&mut graph, sink), Ok(1));
    assert!(!graph.is_alive(sink));
    assert_eq!(kicks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_notify_ready_on_wrong_state() {
    let mut graph = graph();
    let nic = graph.create("nic").unwrap();
    assert!(matches!(
        stream_notify_ready(&mut graph, nic, field!(Fifo, notifier)),
        Err(ObjectError::InvalidCast { .. })
    ));
}

// ============================================================================
// Interrupt statistics
// ============================================================================

#[test]
fn test_interrupt_stats() {
    let mut graph = graph();
    let pic = graph.create("pic").unwrap();
    graph.state_mut::<Pic>(pic).unwrap().counts = vec![3, 0, 7];

    assert_eq!(interrupt_stats(&graph, pic), Some(&[3, 0, 7][..]));
    let mut out = String::new();
    interrupt_stats_print_info(&graph, pic, &mut out).unwrap();
    assert_eq!(out, "pic: 10 interrupts");

    let nic = graph.create("nic").unwrap();
    assert_eq!(interrupt_stats(&graph, nic), None);
    let mut out = String::new();
    interrupt_stats_print_info(&graph, nic, &mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_interrupt_stats_under_big_lock() {
    let mut graph = graph();
    let pic = graph.create("pic").unwrap();
    graph.state_mut::<Pic>(pic).unwrap().counts = vec![1, 2];
    let lock = BigLock::new(graph);

    let guard = lock.lock();
    let stats = interrupt_stats(&guard, pic).unwrap();
    assert_eq!(stats.len(), 2);
    let mut line = String::new();
    for (irq, count) in stats.iter().enumerate() {
        write!(line, "{}:{} ", irq, count).unwrap();
    }
    assert_eq!(line.trim_end(), "0:1 1:2");
    drop(guard);
    assert!(!lock.is_locked());
}
