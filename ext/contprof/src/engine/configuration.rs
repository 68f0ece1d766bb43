use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_THREAD_SAMPLING_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_MAX_ALLOCATIONS_PER_MINUTE: u32 = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub thread_sampling_enabled: bool,
    pub thread_sampling_interval_ms: u64,
    pub allocation_sampling_enabled: bool,
    pub max_allocations_per_minute: u32,
    /// Zero disables selective sampling.
    pub selective_sampling_interval_ms: u64,
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("thread sampling is enabled with a zero interval")]
    ZeroInterval,
    #[error(
        "selective sampling interval ({selective_ms}ms) does not evenly divide the thread sampling interval ({continuous_ms}ms)"
    )]
    IntervalNotMultiple { continuous_ms: u64, selective_ms: u64 },
    #[error("allocation sampling is enabled with a zero per-minute target")]
    ZeroAllocationTarget,
    #[error("invalid configuration: {0}")]
    Parse(String),
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            thread_sampling_enabled: false,
            thread_sampling_interval_ms: DEFAULT_THREAD_SAMPLING_INTERVAL_MS,
            allocation_sampling_enabled: false,
            max_allocations_per_minute: DEFAULT_MAX_ALLOCATIONS_PER_MINUTE,
            selective_sampling_interval_ms: 0,
        }
    }
}

impl Configuration {
    pub fn new(
        thread_sampling_enabled: bool,
        thread_sampling_interval_ms: u64,
        allocation_sampling_enabled: bool,
        max_allocations_per_minute: u32,
        selective_sampling_interval_ms: u64,
    ) -> Self {
        Self {
            thread_sampling_enabled,
            thread_sampling_interval_ms,
            allocation_sampling_enabled,
            max_allocations_per_minute,
            selective_sampling_interval_ms,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|err| ConfigurationError::Parse(err.to_string()))
    }

    pub fn thread_sampling_interval(&self) -> Option<Duration> {
        if self.thread_sampling_enabled {
            Some(Duration::from_millis(self.thread_sampling_interval_ms))
        } else {
            None
        }
    }

    pub fn selective_sampling_interval(&self) -> Option<Duration> {
        if self.selective_sampling_interval_ms > 0 {
            Some(Duration::from_millis(self.selective_sampling_interval_ms))
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.thread_sampling_enabled && self.thread_sampling_interval_ms == 0 {
            return Err(ConfigurationError::ZeroInterval);
        }
        if self.thread_sampling_enabled
            && self.selective_sampling_interval_ms > 0
            && self.thread_sampling_interval_ms % self.selective_sampling_interval_ms != 0
        {
            return Err(ConfigurationError::IntervalNotMultiple {
                continuous_ms: self.thread_sampling_interval_ms,
                selective_ms: self.selective_sampling_interval_ms,
            });
        }
        if self.allocation_sampling_enabled && self.max_allocations_per_minute == 0 {
            return Err(ConfigurationError::ZeroAllocationTarget);
        }
        Ok(())
    }
}
