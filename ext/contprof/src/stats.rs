/// Per-cycle counters, reset at the start of every pause-capture cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingStatistics {
    pub micros_suspended: u32,
    pub num_threads: u32,
    pub total_frames: u32,
    pub name_cache_misses: u32,
}

impl SamplingStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
