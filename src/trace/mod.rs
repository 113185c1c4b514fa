//! Span tracing with ambient, call-chain-scoped context.
//!
//! Instrumented code wraps each logical unit of work (an inbound request, a
//! background job) in [`SpanTracer::in_scope`]; inside the scope,
//! `start_trace` binds a root span and `start_span` picks up the current
//! trace and parent without being passed them. Outside any scope the tracer
//! still works; every span simply roots its own synthetic trace.
//!
//! Completed spans land in a bounded recent-trace buffer for dashboard
//! display; the oldest trace is evicted once the capacity is exceeded.

pub mod context;
pub mod span;

pub use span::{Span, SpanLog, SpanStatus, SpanValue};

use std::collections::{HashMap, VecDeque};
use std::future::Future;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use context::ActiveTrace;

/// Default bound on retained completed traces.
pub const DEFAULT_TRACE_CAPACITY: usize = 1000;

/// All completed spans sharing one trace id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Trace identifier.
    pub trace_id: Uuid,
    /// Completed spans, in completion order.
    pub spans: Vec<Span>,
}

impl Trace {
    /// The root span, if it has completed.
    pub fn root(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.parent_span_id.is_none())
    }

    /// Operation name of the root span.
    pub fn root_operation(&self) -> Option<&str> {
        self.root().map(|s| s.operation.as_str())
    }
}

struct TraceBuffer {
    traces: HashMap<Uuid, Vec<Span>>,
    /// Trace ids ordered by recency of their last completed span.
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl TraceBuffer {
    fn store(&mut self, span: Span) {
        let trace_id = span.trace_id;
        self.traces.entry(trace_id).or_default().push(span);

        if let Some(pos) = self.order.iter().position(|id| *id == trace_id) {
            self.order.remove(pos);
        }
        self.order.push_back(trace_id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.traces.remove(&evicted);
            }
        }
    }
}

/// Records spans grouped by trace, with ambient propagation of the current
/// trace and parent inside one call chain.
pub struct SpanTracer {
    buffer: Mutex<TraceBuffer>,
}

impl SpanTracer {
    /// Create a tracer retaining up to `capacity` completed traces.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(TraceBuffer {
                traces: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Run a unit of work with its own ambient trace binding.
    ///
    /// Any trace left open when the future completes is committed, so
    /// instrumentation that forgets `end_trace` still yields a full trace.
    pub async fn in_scope<F: Future>(&self, fut: F) -> F::Output {
        context::CURRENT_TRACE
            .scope(std::cell::RefCell::new(None), async {
                let out = fut.await;
                self.end_trace();
                out
            })
            .await
    }

    /// Start a new trace, binding its root span into the ambient context.
    ///
    /// Returns the trace id. A trace already open in this chain is
    /// committed first. Outside any scope there is nowhere to hold the root
    /// open, so it is committed immediately.
    pub fn start_trace(&self, operation: &str) -> Uuid {
        let root = Span::new(operation, Uuid::new_v4(), None);
        let trace_id = root.trace_id;
        let root_id = root.span_id;

        let bound = context::with_slot(|slot| {
            if let Some(previous) = slot.take() {
                self.commit_active(previous);
            }
            *slot = Some(ActiveTrace {
                trace_id,
                root_span: Some(root.clone()),
                open_spans: vec![root_id],
            });
        });

        if bound.is_none() {
            tracing::debug!(operation, "trace started outside a scope");
            let mut root = root;
            root.finish();
            self.store_span(root);
        }

        trace_id
    }

    /// Start a span under the ambient trace and current parent.
    ///
    /// When no trace is open a new one is synthesized rooted at this span;
    /// instrumentation never fails for lack of context.
    pub fn start_span(&self, operation: &str) -> Span {
        let ambient = context::with_slot(|slot| match slot.as_mut() {
            Some(active) => {
                let parent = active.open_spans.last().copied();
                let span = Span::new(operation, active.trace_id, parent);
                active.open_spans.push(span.span_id);
                span
            }
            None => {
                let span = Span::new(operation, Uuid::new_v4(), None);
                *slot = Some(ActiveTrace {
                    trace_id: span.trace_id,
                    root_span: None,
                    open_spans: vec![span.span_id],
                });
                span
            }
        });

        ambient.unwrap_or_else(|| Span::new(operation, Uuid::new_v4(), None))
    }

    /// Finish a span and commit it to the recent-trace buffer.
    pub fn finish_span(&self, mut span: Span) {
        span.finish();
        context::with_slot(|slot| {
            if let Some(active) = slot.as_mut() {
                if let Some(pos) = active
                    .open_spans
                    .iter()
                    .rposition(|id| *id == span.span_id)
                {
                    active.open_spans.remove(pos);
                }
            }
        });
        self.store_span(span);
    }

    /// Finish the ambient trace's root span and clear the binding.
    pub fn end_trace(&self) {
        if let Some(Some(active)) = context::with_slot(|slot| slot.take()) {
            self.commit_active(active);
        }
    }

    /// Most recently completed traces, newest first.
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let buffer = self.buffer.lock();
        buffer
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| {
                buffer.traces.get(id).map(|spans| Trace {
                    trace_id: *id,
                    spans: spans.clone(),
                })
            })
            .collect()
    }

    /// Number of retained traces.
    pub fn trace_count(&self) -> usize {
        self.buffer.lock().traces.len()
    }

    fn commit_active(&self, active: ActiveTrace) {
        if let Some(mut root) = active.root_span {
            root.finish();
            self.store_span(root);
        }
    }

    fn store_span(&self, span: Span) {
        self.buffer.lock().store(span);
    }
}

impl Default for SpanTracer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_span_inherits_ambient_trace_and_parent() {
        let tracer = SpanTracer::default();
        let trace_id = tracer
            .in_scope(async {
                let trace_id = tracer.start_trace("handle_request");
                let child = tracer.start_span("db_query");
                assert_eq!(child.trace_id, trace_id);
                assert!(child.parent_span_id.is_some());
                tracer.finish_span(child);
                trace_id
            })
            .await;

        let traces = tracer.recent_traces(10);
        assert_eq!(traces.len(), 1);
        let trace = &traces[0];
        assert_eq!(trace.trace_id, trace_id);

        let root = trace.root().unwrap();
        assert_eq!(root.operation, "handle_request");
        let child = trace
            .spans
            .iter()
            .find(|s| s.operation == "db_query")
            .unwrap();
        assert_eq!(child.parent_span_id, Some(root.span_id));
    }

    #[tokio::test]
    async fn nested_spans_stack_parents() {
        let tracer = SpanTracer::default();
        tracer
            .in_scope(async {
                tracer.start_trace("outer");
                let a = tracer.start_span("middle");
                let b = tracer.start_span("inner");
                assert_eq!(b.parent_span_id, Some(a.span_id));
                tracer.finish_span(b);
                let c = tracer.start_span("sibling");
                // After inner finished, middle is the parent again.
                assert_eq!(c.parent_span_id, Some(a.span_id));
                tracer.finish_span(c);
                tracer.finish_span(a);
            })
            .await;
    }

    #[tokio::test]
    async fn concurrent_scopes_do_not_share_context() {
        let tracer = std::sync::Arc::new(SpanTracer::default());

        let t1 = {
            let tracer = tracer.clone();
            tokio::spawn(async move {
                tracer
                    .in_scope(async {
                        tracer.start_trace("chain_one");
                        let span = tracer.start_span("work");
                        let id = span.trace_id;
                        tracer.finish_span(span);
                        id
                    })
                    .await
            })
        };
        let t2 = {
            let tracer = tracer.clone();
            tokio::spawn(async move {
                tracer
                    .in_scope(async {
                        tracer.start_trace("chain_two");
                        let span = tracer.start_span("work");
                        let id = span.trace_id;
                        tracer.finish_span(span);
                        id
                    })
                    .await
            })
        };

        let (id1, id2) = (t1.await.unwrap(), t2.await.unwrap());
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn span_without_scope_synthesizes_a_trace() {
        let tracer = SpanTracer::default();
        let span = tracer.start_span("orphan_work");
        assert!(span.parent_span_id.is_none());
        tracer.finish_span(span);

        let traces = tracer.recent_traces(10);
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].root_operation(), Some("orphan_work"));
    }

    #[tokio::test]
    async fn spans_in_scope_without_start_trace_share_a_synthetic_trace() {
        let tracer = SpanTracer::default();
        tracer
            .in_scope(async {
                let a = tracer.start_span("first");
                let b = tracer.start_span("second");
                assert_eq!(a.trace_id, b.trace_id);
                assert_eq!(b.parent_span_id, Some(a.span_id));
                tracer.finish_span(b);
                tracer.finish_span(a);
            })
            .await;
    }

    #[test]
    fn buffer_evicts_oldest_trace_beyond_capacity() {
        let tracer = SpanTracer::new(2);
        for i in 0..3 {
            let span = tracer.start_span(&format!("op_{i}"));
            tracer.finish_span(span);
        }

        let traces = tracer.recent_traces(10);
        assert_eq!(traces.len(), 2);
        assert_eq!(tracer.trace_count(), 2);
        assert_eq!(traces[0].root_operation(), Some("op_2"));
        assert_eq!(traces[1].root_operation(), Some("op_1"));
    }

    #[tokio::test]
    async fn scope_exit_commits_open_trace() {
        let tracer = SpanTracer::default();
        tracer
            .in_scope(async {
                tracer.start_trace("forgot_to_end");
            })
            .await;

        let traces = tracer.recent_traces(10);
        assert_eq!(traces.len(), 1);
        let root = traces[0].root().unwrap();
        assert!(root.is_finished());
        assert!(root.duration().unwrap() >= chrono::Duration::zero());
    }
}
