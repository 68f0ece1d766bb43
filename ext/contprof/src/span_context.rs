/// Identifies a native or managed thread as reported by the host runtime.
pub type ThreadId = u64;

/// The 128-bit trace identifier, split into its two halves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId {
    pub high: u64,
    pub low: u64,
}

impl TraceId {
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub fn is_default(&self) -> bool {
        self.high == 0 && self.low == 0
    }
}

/// A span/trace context reduced to the integers needed for correlation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    pub trace_id_high: u64,
    pub trace_id_low: u64,
    pub span_id: u64,
}

/// The context that last became active on a thread. Same shape as [`SpanContext`].
pub type ThreadSpanContext = SpanContext;

impl SpanContext {
    pub const fn new(trace_id_high: u64, trace_id_low: u64, span_id: u64) -> Self {
        Self {
            trace_id_high,
            trace_id_low,
            span_id,
        }
    }

    pub fn trace_id(&self) -> TraceId {
        TraceId::new(self.trace_id_high, self.trace_id_low)
    }

    /// A context is default iff both trace id halves are zero.
    pub fn is_default(&self) -> bool {
        self.trace_id().is_default()
    }

    /// Thread contexts are unset only when the span id is zero as well.
    pub fn is_unset(&self) -> bool {
        self.is_default() && self.span_id == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_context() {
        assert!(SpanContext::default().is_default());
        assert!(SpanContext::default().is_unset());

        // A dangling span id does not make the trace non-default
        let ctx = SpanContext::new(0, 0, 7);
        assert!(ctx.is_default());
        assert!(!ctx.is_unset());

        assert!(!SpanContext::new(0, 1, 0).is_default());
        assert!(!SpanContext::new(1, 0, 0).is_default());
    }

    #[test]
    fn test_trace_id() {
        let ctx = SpanContext::new(3, 4, 5);
        assert_eq!(ctx.trace_id(), TraceId::new(3, 4));
        assert_eq!(ctx, SpanContext::new(3, 4, 5));
        assert_ne!(ctx, SpanContext::new(3, 4, 6));
    }
}
