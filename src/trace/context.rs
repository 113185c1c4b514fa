//! Ambient trace context, scoped per logical unit of work.
//!
//! The carrier is a tokio task-local, entered explicitly with
//! [`SpanTracer::in_scope`](super::SpanTracer::in_scope). Concurrent call
//! chains each get their own binding; nothing here is global mutable state.

use std::cell::RefCell;

use uuid::Uuid;

use super::span::Span;

/// The trace binding for one call chain.
#[derive(Debug)]
pub(crate) struct ActiveTrace {
    /// Trace all spans in this chain attach to.
    pub trace_id: Uuid,

    /// Root span held open until the trace ends. Absent when the root was
    /// synthesized by a caller-owned span.
    pub root_span: Option<Span>,

    /// Stack of open span ids; the top is the current parent.
    pub open_spans: Vec<Uuid>,
}

tokio::task_local! {
    pub(crate) static CURRENT_TRACE: RefCell<Option<ActiveTrace>>;
}

/// Run a closure against the current chain's binding slot.
///
/// Returns `None` when the caller is outside any trace scope; callers fall
/// back to synthesizing a root trace so instrumentation never fails.
pub(crate) fn with_slot<R>(f: impl FnOnce(&mut Option<ActiveTrace>) -> R) -> Option<R> {
    CURRENT_TRACE
        .try_with(|slot| f(&mut slot.borrow_mut()))
        .ok()
}
