use thiserror::Error;

use crate::frame::{FunctionIdentifier, RawFrame};
use crate::span_context::ThreadId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("runtime pause failed (status {0})")]
    Pause(i32),
    #[error("runtime resume failed (status {0})")]
    Resume(i32),
    #[error("stack walk of thread {thread} failed (status {status})")]
    StackWalk { thread: ThreadId, status: i32 },
    #[error("function resolution failed (status {0})")]
    Resolution(i32),
}

/// Primitives supplied by the host runtime.
///
/// `pause_runtime`/`resume_runtime` must be callable repeatedly and must not
/// deadlock as long as no application thread holds one of the engine's locks;
/// the scheduler acquires all of them before pausing.
pub trait RuntimeHost: Send + Sync {
    fn pause_runtime(&self) -> Result<(), HostError>;

    fn resume_runtime(&self) -> Result<(), HostError>;

    /// Threads to consider for a continuous capture. Called while paused.
    fn live_threads(&self) -> Vec<ThreadId>;

    /// Invokes `on_frame` once per frame of `thread`, innermost first.
    fn walk_stack(&self, thread: ThreadId, on_frame: &mut dyn FnMut(RawFrame)) -> Result<(), HostError>;

    fn resolve_function_identifier(&self, frame: RawFrame) -> Result<FunctionIdentifier, HostError>;

    /// Best-effort display name for a managed function.
    fn resolve_function_name(&self, function: &FunctionIdentifier) -> Result<String, HostError>;
}
