use std::sync::atomic::Ordering;
use std::sync::TryLockError;

use crate::engine::EngineShared;
use crate::frame::{FunctionIdentifier, RawFrame};
use crate::span_context::ThreadId;
use crate::util::{lock, unix_millis};

/// One allocation notification from the runtime, delivered on the
/// allocating thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationTick {
    pub thread: ThreadId,
    pub allocated_bytes: u64,
    pub type_name: String,
}

/// Records `tick` into the allocation buffer if the sub-sampler accepts it.
/// Returns whether a sample was written.
///
/// Ticks never wait for a capture: while the runtime is being paused the
/// tick is dropped.
pub(crate) fn handle_allocation_tick(shared: &EngineShared, tick: &AllocationTick) -> bool {
    if !shared.allocation_enabled.load(Ordering::Acquire) {
        return false;
    }

    let _gate = match shared.pause_gate.try_read() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            log::trace!("Runtime pause in progress. Dropping allocation tick.");
            return false;
        }
    };

    if !shared.allocation_sampler.should_sample() {
        return false;
    }

    let thread_name = lock(&shared.thread_states)
        .get_or_create(tick.thread)
        .thread_name
        .clone();
    let context = lock(&shared.correlation)
        .get_context(tick.thread)
        .unwrap_or_default();

    let host = shared.host.as_ref();
    let mut raw_frames: Vec<RawFrame> = vec![];
    if let Err(err) = host.walk_stack(tick.thread, &mut |frame| raw_frames.push(frame)) {
        log::debug!("{}", err);
        raw_frames.clear();
    }

    let frames: Vec<(FunctionIdentifier, String)> = {
        let mut name_cache = lock(&shared.name_cache);
        raw_frames
            .into_iter()
            .map(|frame| {
                let function = name_cache.function_identifier(host, frame);
                let name = name_cache.function_name(host, &function);
                (function, name)
            })
            .collect()
    };

    let mut output = lock(&shared.allocation_output);
    output.allocation_sample(
        unix_millis(),
        tick.allocated_bytes,
        &tick.type_name,
        &thread_name,
        &context,
    );
    for (function, name) in &frames {
        output.write_frame(function, name);
    }
    output.end_sample();
    true
}
