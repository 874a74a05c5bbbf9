//! Hotplug handler dispatch
//!
//! A hotplug handler (usually a bus or a machine) is told about devices
//! being plugged into or unplugged from it. Every step is optional.

use qom_sdk::ObjectResult;

use super::probe;
use crate::object::{ObjectGraph, ObjectId};
use crate::types::TypeDescriptor;

/// Interface type name
pub const TYPE_HOTPLUG_HANDLER: &str = "hotplug-handler";

/// Hotplug step: `(graph, handler, plugged device)`
pub type HotplugFn = fn(&mut ObjectGraph, ObjectId, ObjectId) -> ObjectResult<()>;

/// Method table of the hotplug handler interface
#[derive(Clone, Copy, Default)]
pub struct HotplugHandlerClass {
    /// Validate the device before it is realized
    pub pre_plug: Option<HotplugFn>,
    /// Wire up a realized device
    pub plug: Option<HotplugFn>,
    /// Ask the guest to release the device
    pub unplug_request: Option<HotplugFn>,
    /// Tear the device out
    pub unplug: Option<HotplugFn>,
}

pub(crate) fn hotplug_handler_type() -> TypeDescriptor {
    TypeDescriptor::interface(TYPE_HOTPLUG_HANDLER).class_data::<HotplugHandlerClass>()
}

fn dispatch(
    graph: &mut ObjectGraph,
    handler: ObjectId,
    plugged: ObjectId,
    slot: fn(&HotplugHandlerClass) -> Option<HotplugFn>,
) -> ObjectResult<()> {
    let Some(iface) = probe(graph, handler, TYPE_HOTPLUG_HANDLER)? else {
        return Ok(());
    };
    match iface.class::<HotplugHandlerClass>().and_then(slot) {
        Some(f) => f(graph, handler, plugged),
        None => Ok(()),
    }
}

/// Run the handler's `pre_plug` step
pub fn hotplug_handler_pre_plug(
    graph: &mut ObjectGraph,
    handler: ObjectId,
    plugged: ObjectId,
) -> ObjectResult<()> {
    dispatch(graph, handler, plugged, |c| c.pre_plug)
}

/// Run the handler's `plug` step
pub fn hotplug_handler_plug(
    graph: &mut ObjectGraph,
    handler: ObjectId,
    plugged: ObjectId,
) -> ObjectResult<()> {
    dispatch(graph, handler, plugged, |c| c.plug)
}

/// Run the handler's `unplug_request` step
pub fn hotplug_handler_unplug_request(
    graph: &mut ObjectGraph,
    handler: ObjectId,
    plugged: ObjectId,
) -> ObjectResult<()> {
    dispatch(graph, handler, plugged, |c| c.unplug_request)
}

/// Run the handler's `unplug` step
pub fn hotplug_handler_unplug(
    graph: &mut ObjectGraph,
    handler: ObjectId,
    plugged: ObjectId,
) -> ObjectResult<()> {
    dispatch(graph, handler, plugged, |c| c.unplug)
}
