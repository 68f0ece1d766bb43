use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::util::lock;

pub const DEFAULT_TARGET_PER_CYCLE: u32 = 200;
pub const DEFAULT_CYCLE_LENGTH: Duration = Duration::from_secs(60);
/// Shorter cycle lengths are raised to this.
pub const MIN_CYCLE_LENGTH: Duration = Duration::from_millis(1);

/// Decides which allocation events get a full capture.
///
/// Rather than reservoir sampling (capture everything, then discard), each
/// event is accepted with roughly the probability that would have yielded
/// `target_per_cycle` samples in the previous cycle. Acceptance stops hard
/// once the target is reached within the current cycle.
#[derive(Debug)]
pub struct AllocationSubSampler {
    state: Mutex<SamplerState>,
}

#[derive(Debug)]
struct SamplerState {
    target_per_cycle: u32,
    cycle_length: Duration,
    seen_this_cycle: u64,
    sampled_this_cycle: u32,
    seen_last_cycle: u64,
    next_cycle_start: Instant,
    rng: fastrand::Rng,
}

impl AllocationSubSampler {
    pub fn new(target_per_cycle: u32, cycle_length: Duration) -> Self {
        Self::with_rng(target_per_cycle, cycle_length, Instant::now(), fastrand::Rng::new())
    }

    pub fn with_rng(
        target_per_cycle: u32,
        cycle_length: Duration,
        start: Instant,
        rng: fastrand::Rng,
    ) -> Self {
        let cycle_length = cycle_length.max(MIN_CYCLE_LENGTH);
        Self {
            state: Mutex::new(SamplerState {
                target_per_cycle,
                cycle_length,
                seen_this_cycle: 0,
                sampled_this_cycle: 0,
                seen_last_cycle: 0,
                next_cycle_start: start + cycle_length,
                rng,
            }),
        }
    }

    /// Restarts the sampler with a new per-cycle target.
    pub fn reset(&self, target_per_cycle: u32, now: Instant) {
        let mut state = lock(&self.state);
        state.target_per_cycle = target_per_cycle;
        state.seen_this_cycle = 0;
        state.sampled_this_cycle = 0;
        state.seen_last_cycle = 0;
        state.next_cycle_start = now + state.cycle_length;
    }

    pub fn should_sample(&self) -> bool {
        self.should_sample_at(Instant::now())
    }

    pub fn should_sample_at(&self, now: Instant) -> bool {
        let mut state = lock(&self.state);

        if now >= state.next_cycle_start {
            let cycle_nanos = state.cycle_length.as_nanos();
            let behind = (now - state.next_cycle_start).as_nanos();
            // Whole cycles that went by without a single event saw nothing
            state.seen_last_cycle = if behind < cycle_nanos {
                state.seen_this_cycle
            } else {
                0
            };
            state.seen_this_cycle = 0;
            state.sampled_this_cycle = 0;
            let into_cycle = Duration::from_nanos((behind % cycle_nanos) as u64);
            state.next_cycle_start = now + (state.cycle_length - into_cycle);
        }

        state.seen_this_cycle += 1;
        if state.sampled_this_cycle >= state.target_per_cycle {
            return false;
        }

        let upper = state.seen_last_cycle.max(1);
        let draw = state.rng.u64(1..=upper);
        if draw <= u64::from(state.target_per_cycle) {
            state.sampled_this_cycle += 1;
            true
        } else {
            false
        }
    }

    pub fn sampled_this_cycle(&self) -> u32 {
        lock(&self.state).sampled_this_cycle
    }
}

impl Default for AllocationSubSampler {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_PER_CYCLE, DEFAULT_CYCLE_LENGTH)
    }
}
