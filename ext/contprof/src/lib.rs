extern crate serde;
#[macro_use]
extern crate serde_derive;

pub mod ffi;

pub mod accumulator;
pub mod allocation;
pub mod allocation_sampler;
pub mod correlation;
pub mod encoder;
pub mod engine;
pub mod frame;
pub mod handoff;
pub mod host;
mod lru;
pub mod name_cache;
pub mod reader;
pub mod scheduler;
pub mod selective_registry;
pub mod span_context;
pub mod stats;
pub mod thread_state;
mod util;

#[cfg(test)]
mod testing;

pub use allocation::AllocationTick;
pub use engine::configuration::{Configuration, ConfigurationError};
pub use engine::{ContinuousProfilerEngine, StartError};
pub use host::{HostError, RuntimeHost};
pub use reader::{DecodeError, Record, SampleReader};
pub use span_context::{SpanContext, ThreadId, TraceId};
pub use stats::SamplingStatistics;
