//! Interrupt statistics dispatch

use std::fmt;

use super::probe_quiet;
use crate::object::{ObjectGraph, ObjectId};
use crate::types::TypeDescriptor;

/// Interface type name
pub const TYPE_INTERRUPT_STATS_PROVIDER: &str = "intctrl";

/// Per-IRQ counters of an interrupt controller.
///
/// The slice borrows from the graph: it stays valid only as long as the
/// caller keeps the graph (and so the big lock) borrowed.
pub type GetStatisticsFn = fn(&ObjectGraph, ObjectId) -> Option<&[u64]>;

/// Human-readable controller state for the monitor
pub type PrintInfoFn = fn(&ObjectGraph, ObjectId, &mut dyn fmt::Write) -> fmt::Result;

/// Method table of the interrupt statistics interface
#[derive(Clone, Copy, Default)]
pub struct InterruptStatsProviderClass {
    /// Counter access
    pub get_statistics: Option<GetStatisticsFn>,
    /// Monitor output
    pub print_info: Option<PrintInfoFn>,
}

pub(crate) fn interrupt_stats_provider_type() -> TypeDescriptor {
    TypeDescriptor::interface(TYPE_INTERRUPT_STATS_PROVIDER)
        .class_data::<InterruptStatsProviderClass>()
}

/// Interrupt counters of `obj`, `None` if it does not publish any
pub fn interrupt_stats(graph: &ObjectGraph, obj: ObjectId) -> Option<&[u64]> {
    let iface = probe_quiet(graph, obj, TYPE_INTERRUPT_STATS_PROVIDER)?;
    let get = iface.class::<InterruptStatsProviderClass>()?.get_statistics?;
    get(graph, obj)
}

/// Write the controller's monitor output; writes nothing if unsupported
pub fn interrupt_stats_print_info(
    graph: &ObjectGraph,
    obj: ObjectId,
    out: &mut dyn fmt::Write,
) -> fmt::Result {
    let print = probe_quiet(graph, obj, TYPE_INTERRUPT_STATS_PROVIDER)
        .and_then(|iface| iface.class::<InterruptStatsProviderClass>()?.print_info);
    match print {
        Some(print) => print(graph, obj, out),
        None => Ok(()),
    }
}
