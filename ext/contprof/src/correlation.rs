use std::collections::{HashMap, HashSet};

use crate::span_context::{SpanContext, ThreadId, ThreadSpanContext, TraceId};

/// Correlates worker threads with the span context last activated on them.
///
/// Three views are kept in lock-step:
/// - thread -> context
/// - context -> threads
/// - trace -> contexts
///
/// Every public operation leaves them mutually consistent. Callers serialize
/// access through the engine's correlation lock.
#[derive(Debug, Default)]
pub struct ThreadSpanIndex {
    thread_contexts: HashMap<ThreadId, ThreadSpanContext>,
    context_threads: HashMap<SpanContext, HashSet<ThreadId>>,
    trace_contexts: HashMap<TraceId, HashSet<SpanContext>>,
}

impl ThreadSpanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `context` as the active context of `thread`.
    ///
    /// The thread is always detached from its previous context first. An
    /// unset context (default trace and zero span) leaves the thread unmapped.
    /// A context with a default trace but a span id is kept.
    pub fn put(&mut self, thread: ThreadId, context: ThreadSpanContext) {
        if self.thread_contexts.get(&thread) == Some(&context) {
            return;
        }
        self.remove_thread(thread);
        if context.is_unset() {
            return;
        }

        self.thread_contexts.insert(thread, context);
        self.context_threads.entry(context).or_default().insert(thread);
        self.trace_contexts
            .entry(context.trace_id())
            .or_default()
            .insert(context);
    }

    pub fn remove_thread(&mut self, thread: ThreadId) {
        let Some(context) = self.thread_contexts.remove(&thread) else {
            return;
        };
        let now_unused = match self.context_threads.get_mut(&context) {
            Some(threads) => {
                threads.remove(&thread);
                threads.is_empty()
            }
            None => false,
        };
        if now_unused {
            self.context_threads.remove(&context);
            self.forget_context_for_trace(&context);
        }
    }

    /// Removes `context` from every thread currently mapped to it, and drops
    /// the owning trace once it has no live context left.
    pub fn remove_context(&mut self, context: &SpanContext) {
        if let Some(threads) = self.context_threads.remove(context) {
            for thread in threads {
                self.thread_contexts.remove(&thread);
            }
        }
        self.forget_context_for_trace(context);
    }

    pub fn get_context(&self, thread: ThreadId) -> Option<ThreadSpanContext> {
        self.thread_contexts.get(&thread).copied()
    }

    /// Threads whose current context belongs to `trace`.
    pub fn get_all_threads(&self, trace: &TraceId) -> HashSet<ThreadId> {
        let mut threads = HashSet::new();
        if let Some(contexts) = self.trace_contexts.get(trace) {
            for context in contexts {
                if let Some(context_threads) = self.context_threads.get(context) {
                    threads.extend(context_threads.iter().copied());
                }
            }
        }
        threads
    }

    pub fn len(&self) -> usize {
        self.thread_contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thread_contexts.is_empty()
    }

    fn forget_context_for_trace(&mut self, context: &SpanContext) {
        let trace = context.trace_id();
        let now_unused = match self.trace_contexts.get_mut(&trace) {
            Some(contexts) => {
                contexts.remove(context);
                contexts.is_empty()
            }
            None => false,
        };
        if now_unused {
            self.trace_contexts.remove(&trace);
        }
    }
}
