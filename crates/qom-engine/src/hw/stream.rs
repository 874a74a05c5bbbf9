//! Stream sink dispatch
//!
//! A stream source pushes byte chunks into a sink. A sink that cannot take
//! more data right now answers `false` to `can_push` and remembers the
//! caller's notification; once it drains it calls [`stream_notify_ready`].

use std::any::Any;
use std::fmt;

use qom_sdk::ObjectResult;
use tracing::trace;

use super::probe_quiet;
use crate::object::{ObjectGraph, ObjectId};
use crate::property::Field;
use crate::types::TypeDescriptor;

/// Interface type name
pub const TYPE_STREAM_SINK: &str = "stream-sink";

/// Deferred "ready again" callback, run at most once
pub type StreamNotifyFn = Box<dyn FnOnce(&mut ObjectGraph) + Send>;

/// Push `data` into the sink; `eop` marks the end of a packet. Returns the
/// number of bytes accepted.
pub type StreamPushFn = fn(&mut ObjectGraph, ObjectId, &[u8], bool) -> usize;

/// Ask whether the sink accepts data from `caller` now
pub type StreamCanPushFn = fn(&mut ObjectGraph, ObjectId, ObjectId, StreamNotifyFn) -> bool;

/// Method table of the stream sink interface
#[derive(Clone, Copy, Default)]
pub struct StreamSinkClass {
    /// Data path
    pub push: Option<StreamPushFn>,
    /// Flow control; sinks without it always accept
    pub can_push: Option<StreamCanPushFn>,
}

pub(crate) fn stream_sink_type() -> TypeDescriptor {
    TypeDescriptor::interface(TYPE_STREAM_SINK).class_data::<StreamSinkClass>()
}

/// Push a chunk into `sink`; 0 if the object is not a stream sink
pub fn stream_push(graph: &mut ObjectGraph, sink: ObjectId, data: &[u8], eop: bool) -> usize {
    let push = probe_quiet(graph, sink, TYPE_STREAM_SINK)
        .and_then(|iface| iface.class::<StreamSinkClass>()?.push);
    match push {
        Some(push) => push(graph, sink, data, eop),
        None => 0,
    }
}

/// Flow-control query.
///
/// Returns `false` if `sink` is not a stream sink, `true` if it has no
/// `can_push` slot, and the slot's answer otherwise. When the answer is
/// `false` the sink may keep `notify` and run it once it can take data.
pub fn stream_can_push(
    graph: &mut ObjectGraph,
    sink: ObjectId,
    caller: ObjectId,
    notify: impl FnOnce(&mut ObjectGraph) + Send + 'static,
) -> bool {
    let Some(iface) = probe_quiet(graph, sink, TYPE_STREAM_SINK) else {
        return false;
    };
    match iface.class::<StreamSinkClass>().and_then(|c| c.can_push) {
        Some(can_push) => can_push(graph, sink, caller, Box::new(notify)),
        None => true,
    }
}

/// Pending ready notifications kept by a sink, one per caller
#[derive(Default)]
pub struct CanPushNotifier {
    pending: Vec<(ObjectId, StreamNotifyFn)>,
}

impl CanPushNotifier {
    /// Create an empty notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `notify` for `caller`. Returns `false` and drops `notify` if
    /// the caller already waits.
    pub fn register(&mut self, caller: ObjectId, notify: StreamNotifyFn) -> bool {
        if self.is_pending(caller) {
            return false;
        }
        self.pending.push((caller, notify));
        true
    }

    /// Check if `caller` waits for a notification
    pub fn is_pending(&self, caller: ObjectId) -> bool {
        self.pending.iter().any(|(c, _)| *c == caller)
    }

    /// Forget the notification of `caller`
    pub fn cancel(&mut self, caller: ObjectId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(c, _)| *c != caller);
        self.pending.len() != before
    }

    /// Number of waiting callers
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nobody waits
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all pending notifications without running them
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn take(&mut self) -> Vec<(ObjectId, StreamNotifyFn)> {
        std::mem::take(&mut self.pending)
    }
}

impl fmt::Debug for CanPushNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let callers: Vec<ObjectId> = self.pending.iter().map(|(c, _)| *c).collect();
        f.debug_struct("CanPushNotifier")
            .field("pending", &callers)
            .finish()
    }
}

/// Run the notifications pending on `sink`, in registration order.
///
/// The pending list is detached first, so a callback may register again.
/// Delivery stops if a callback finalizes the sink. Returns how many
/// callbacks ran.
pub fn stream_notify_ready<S: Any>(
    graph: &mut ObjectGraph,
    sink: ObjectId,
    field: Field<S, CanPushNotifier>,
) -> ObjectResult<usize> {
    let pending = field.write(graph, sink)?.take();
    let mut delivered = 0;
    for (caller, notify) in pending {
        if !graph.is_alive(sink) {
            break;
        }
        trace!(%sink, %caller, "stream ready");
        notify(graph);
        delivered += 1;
    }
    Ok(delivered)
}
