use std::collections::HashMap;
use std::sync::Mutex;

use crate::frame::{FunctionIdentifier, RawFrame};
use crate::host::{HostError, RuntimeHost};
use crate::span_context::ThreadId;
use crate::util::lock;

type PauseHook = Box<dyn Fn() + Send + Sync>;

/// A scripted runtime: threads with fixed stacks and a metadata table.
#[derive(Default)]
pub(crate) struct FakeHost {
    inner: Mutex<Inner>,
    pause_hook: Mutex<Option<PauseHook>>,
}

#[derive(Default)]
struct Inner {
    threads: Vec<ThreadId>,
    stacks: HashMap<ThreadId, Vec<RawFrame>>,
    function_identifiers: HashMap<RawFrame, FunctionIdentifier>,
    function_names: HashMap<FunctionIdentifier, String>,
    paused: bool,
    pause_count: usize,
    resume_count: usize,
    identifier_resolutions: usize,
    name_resolutions: usize,
    fail_pause: bool,
    panic_on_walk: Option<ThreadId>,
}

impl FakeHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a live thread whose stack (innermost first) consists of the given
    /// `(function handle, name)` frames. Handle zero makes a native frame.
    pub(crate) fn add_thread(&self, thread: ThreadId, frames: &[(u64, &str)]) {
        let mut inner = lock(&self.inner);
        let mut stack = vec![];
        for &(handle, name) in frames {
            let frame = RawFrame::new(handle, thread);
            if handle != 0 {
                let function = FunctionIdentifier::new(handle as u32, 1);
                inner.function_identifiers.insert(frame, function);
                inner.function_names.insert(function, name.to_owned());
            }
            stack.push(frame);
        }
        inner.threads.push(thread);
        inner.stacks.insert(thread, stack);
    }

    pub(crate) fn set_function_identifier(&self, frame: RawFrame, function: FunctionIdentifier) {
        lock(&self.inner).function_identifiers.insert(frame, function);
    }

    pub(crate) fn set_function_name(&self, function: FunctionIdentifier, name: &str) {
        lock(&self.inner).function_names.insert(function, name.to_owned());
    }

    pub(crate) fn set_fail_pause(&self, fail: bool) {
        lock(&self.inner).fail_pause = fail;
    }

    pub(crate) fn set_panic_on_walk(&self, thread: Option<ThreadId>) {
        lock(&self.inner).panic_on_walk = thread;
    }

    /// Runs `hook` right after every successful pause.
    pub(crate) fn set_pause_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.pause_hook) = Some(Box::new(hook));
    }

    pub(crate) fn is_paused(&self) -> bool {
        lock(&self.inner).paused
    }

    pub(crate) fn pause_count(&self) -> usize {
        lock(&self.inner).pause_count
    }

    pub(crate) fn resume_count(&self) -> usize {
        lock(&self.inner).resume_count
    }

    pub(crate) fn identifier_resolutions(&self) -> usize {
        lock(&self.inner).identifier_resolutions
    }

    pub(crate) fn name_resolutions(&self) -> usize {
        lock(&self.inner).name_resolutions
    }
}

impl RuntimeHost for FakeHost {
    fn pause_runtime(&self) -> Result<(), HostError> {
        {
            let mut inner = lock(&self.inner);
            if inner.fail_pause {
                return Err(HostError::Pause(-1));
            }
            assert!(!inner.paused, "runtime paused twice");
            inner.paused = true;
            inner.pause_count += 1;
        }
        if let Some(hook) = lock(&self.pause_hook).as_ref() {
            hook();
        }
        Ok(())
    }

    fn resume_runtime(&self) -> Result<(), HostError> {
        let mut inner = lock(&self.inner);
        inner.paused = false;
        inner.resume_count += 1;
        Ok(())
    }

    fn live_threads(&self) -> Vec<ThreadId> {
        lock(&self.inner).threads.clone()
    }

    fn walk_stack(&self, thread: ThreadId, on_frame: &mut dyn FnMut(RawFrame)) -> Result<(), HostError> {
        let stack = {
            let inner = lock(&self.inner);
            if inner.panic_on_walk == Some(thread) {
                drop(inner);
                panic!("stack walk exploded");
            }
            inner.stacks.get(&thread).cloned()
        };
        match stack {
            Some(stack) => {
                for frame in stack {
                    on_frame(frame);
                }
                Ok(())
            }
            None => Err(HostError::StackWalk { thread, status: -1 }),
        }
    }

    fn resolve_function_identifier(&self, frame: RawFrame) -> Result<FunctionIdentifier, HostError> {
        let mut inner = lock(&self.inner);
        inner.identifier_resolutions += 1;
        inner
            .function_identifiers
            .get(&frame)
            .copied()
            .ok_or(HostError::Resolution(-1))
    }

    fn resolve_function_name(&self, function: &FunctionIdentifier) -> Result<String, HostError> {
        let mut inner = lock(&self.inner);
        inner.name_resolutions += 1;
        inner
            .function_names
            .get(function)
            .cloned()
            .ok_or(HostError::Resolution(-1))
    }
}
