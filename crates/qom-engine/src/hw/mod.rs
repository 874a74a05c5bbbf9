//! Generic dispatch helpers
//!
//! Each helper casts the target to an interface, looks the method slot up in
//! the target's class and calls it. A target that does not implement the
//! interface, or leaves the slot empty, gets a neutral default instead of an
//! error: callers use these helpers as capability probes.

pub mod hotplug;
pub mod intc;
pub mod stream;

pub use hotplug::{
    hotplug_handler_plug, hotplug_handler_pre_plug, hotplug_handler_unplug,
    hotplug_handler_unplug_request, HotplugFn, HotplugHandlerClass, TYPE_HOTPLUG_HANDLER,
};
pub use intc::{
    interrupt_stats, interrupt_stats_print_info, GetStatisticsFn, InterruptStatsProviderClass,
    PrintInfoFn, TYPE_INTERRUPT_STATS_PROVIDER,
};
pub use stream::{
    stream_can_push, stream_notify_ready, stream_push, CanPushNotifier, StreamCanPushFn,
    StreamNotifyFn, StreamPushFn, StreamSinkClass, TYPE_STREAM_SINK,
};

use qom_sdk::ObjectResult;
use tracing::trace;

use crate::object::{InterfaceRef, ObjectGraph, ObjectId};
use crate::types::TypeRegistry;

/// Register the interface types of the dispatch helpers
pub fn register_types(registry: &TypeRegistry) -> ObjectResult<()> {
    registry.register_all([
        hotplug::hotplug_handler_type(),
        stream::stream_sink_type(),
        intc::interrupt_stats_provider_type(),
    ])
}

/// Cast for dispatch: `Ok(None)` when the capability is absent
fn probe(graph: &ObjectGraph, id: ObjectId, interface: &str) -> ObjectResult<Option<InterfaceRef>> {
    match graph.as_interface(id, interface) {
        Ok(iface) => Ok(Some(iface)),
        Err(err) if err.is_capability_absence() => {
            trace!(%id, interface, "capability absent");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Like `probe`, for helpers that cannot report errors
fn probe_quiet(graph: &ObjectGraph, id: ObjectId, interface: &str) -> Option<InterfaceRef> {
    probe(graph, id, interface).ok().flatten()
}
