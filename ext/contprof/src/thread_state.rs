use std::collections::HashMap;

use crate::span_context::ThreadId;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThreadState {
    pub thread_name: String,
}

/// Per-thread mutable records, created lazily and dropped on thread exit.
#[derive(Debug, Default)]
pub struct ThreadStateTable {
    states: HashMap<ThreadId, ThreadState>,
}

impl ThreadStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, thread: ThreadId) -> &mut ThreadState {
        self.states.entry(thread).or_default()
    }

    pub fn set_name(&mut self, thread: ThreadId, name: String) {
        self.get_or_create(thread).thread_name = name;
    }

    /// The thread's name, or an empty string for threads never named.
    pub fn thread_name(&self, thread: ThreadId) -> &str {
        self.states
            .get(&thread)
            .map(|state| state.thread_name.as_str())
            .unwrap_or("")
    }

    pub fn remove(&mut self, thread: ThreadId) -> Option<ThreadState> {
        self.states.remove(&thread)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
