pub mod configuration;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use self::configuration::{Configuration, ConfigurationError};
use crate::accumulator::SampleAccumulator;
use crate::allocation::{self, AllocationTick};
use crate::allocation_sampler::AllocationSubSampler;
use crate::correlation::ThreadSpanIndex;
use crate::encoder::SampleBuffer;
use crate::handoff::DualBufferHandoff;
use crate::host::RuntimeHost;
use crate::name_cache::NameCache;
use crate::scheduler;
use crate::selective_registry::{SelectionError, SelectiveSamplingRegistry};
use crate::span_context::{SpanContext, ThreadId, TraceId};
use crate::stats::SamplingStatistics;
use crate::thread_state::ThreadStateTable;
use crate::util::lock;

/// Everything the sampling thread, the host callbacks and the consumer share.
///
/// Lock order, whenever more than one is held: `pause_gate`, `thread_states`,
/// `correlation`, `name_cache`. The remaining locks are only ever taken alone.
pub(crate) struct EngineShared {
    pub(crate) host: Arc<dyn RuntimeHost>,
    /// Written while the runtime is paused, read by allocation ticks.
    pub(crate) pause_gate: RwLock<()>,
    pub(crate) thread_states: Mutex<ThreadStateTable>,
    pub(crate) correlation: Mutex<ThreadSpanIndex>,
    pub(crate) name_cache: Mutex<NameCache>,
    pub(crate) selective_registry: Mutex<SelectiveSamplingRegistry>,
    pub(crate) handoff: DualBufferHandoff,
    pub(crate) selective_output: Mutex<SampleAccumulator>,
    pub(crate) allocation_output: Mutex<SampleBuffer>,
    pub(crate) allocation_sampler: AllocationSubSampler,
    pub(crate) allocation_enabled: AtomicBool,
    pub(crate) last_statistics: Mutex<SamplingStatistics>,
    shutdown_requested: Mutex<bool>,
    shutdown_signal: Condvar,
}

impl EngineShared {
    pub(crate) fn new(host: Arc<dyn RuntimeHost>) -> Self {
        Self {
            host,
            pause_gate: RwLock::new(()),
            thread_states: Mutex::new(ThreadStateTable::new()),
            correlation: Mutex::new(ThreadSpanIndex::new()),
            name_cache: Mutex::new(NameCache::new()),
            selective_registry: Mutex::new(SelectiveSamplingRegistry::new()),
            handoff: DualBufferHandoff::new(),
            selective_output: Mutex::new(SampleAccumulator::new()),
            allocation_output: Mutex::new(SampleBuffer::new()),
            allocation_sampler: AllocationSubSampler::default(),
            allocation_enabled: AtomicBool::new(false),
            last_statistics: Mutex::new(SamplingStatistics::default()),
            shutdown_requested: Mutex::new(false),
            shutdown_signal: Condvar::new(),
        }
    }

    /// Sleeps for `timeout` unless shutdown is requested first.
    /// Returns whether shutdown was requested.
    pub(crate) fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let requested = lock(&self.shutdown_requested);
        let (requested, _) = self
            .shutdown_signal
            .wait_timeout_while(requested, timeout, |requested| !*requested)
            .unwrap_or_else(PoisonError::into_inner);
        *requested
    }

    pub(crate) fn is_shutdown_requested(&self) -> bool {
        *lock(&self.shutdown_requested)
    }

    pub(crate) fn request_shutdown(&self, requested: bool) {
        *lock(&self.shutdown_requested) = requested;
        self.shutdown_signal.notify_all();
    }
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("continuous profiler is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// The continuous sampling engine. One per process.
///
/// Owns every table the sampler works with; `start`/`stop` control the
/// sampling thread and allocation sampling.
pub struct ContinuousProfilerEngine {
    shared: Arc<EngineShared>,
    control: Mutex<EngineControl>,
}

#[derive(Default)]
struct EngineControl {
    scheduler_thread: Option<JoinHandle<()>>,
    configuration: Option<Configuration>,
}

impl ContinuousProfilerEngine {
    pub fn new(host: Arc<dyn RuntimeHost>) -> Self {
        Self {
            shared: Arc::new(EngineShared::new(host)),
            control: Mutex::new(EngineControl::default()),
        }
    }

    /// Fails without side effects if the engine is already running or the
    /// configuration does not validate.
    pub fn start(&self, configuration: Configuration) -> Result<(), StartError> {
        let mut control = lock(&self.control);
        if control.configuration.is_some() {
            log::warn!("Continuous profiler is already running. Ignoring start request.");
            return Err(StartError::AlreadyRunning);
        }
        if let Err(err) = configuration.validate() {
            log::warn!("Invalid continuous profiler configuration: {}", err);
            return Err(err.into());
        }

        self.shared.request_shutdown(false);

        if configuration.allocation_sampling_enabled {
            self.shared
                .allocation_sampler
                .reset(configuration.max_allocations_per_minute, Instant::now());
            self.shared.allocation_enabled.store(true, Ordering::Release);
        }

        if configuration.thread_sampling_enabled || configuration.selective_sampling_interval_ms > 0 {
            let shared = Arc::clone(&self.shared);
            let thread_configuration = configuration.clone();
            let spawned = thread::Builder::new()
                .name("contprof-sampler".to_owned())
                .spawn(move || scheduler::run(shared, thread_configuration));
            match spawned {
                Ok(handle) => control.scheduler_thread = Some(handle),
                Err(err) => log::warn!("Failed to spawn the sampling thread: {}", err),
            }
        }

        log::info!("Continuous profiler started: {:?}", configuration);
        control.configuration = Some(configuration);
        Ok(())
    }

    /// Stops allocation sampling, then signals and joins the sampling thread.
    /// A capture in flight completes first.
    pub fn stop(&self) {
        let mut control = lock(&self.control);
        self.shared.allocation_enabled.store(false, Ordering::Release);

        if let Some(handle) = control.scheduler_thread.take() {
            self.shared.request_shutdown(true);
            if handle.join().is_err() {
                log::warn!("Sampling thread terminated with a panic");
            }
        }

        if control.configuration.take().is_some() {
            log::info!("Continuous profiler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.control).configuration.is_some()
    }

    pub fn configuration(&self) -> Option<Configuration> {
        lock(&self.control).configuration.clone()
    }

    /// Forgets anything recorded for a previous thread with the same id.
    pub fn thread_created(&self, thread: ThreadId) {
        let mut thread_states = lock(&self.shared.thread_states);
        let mut correlation = lock(&self.shared.correlation);
        thread_states.remove(thread);
        correlation.remove_thread(thread);
    }

    pub fn thread_destroyed(&self, thread: ThreadId) {
        let mut thread_states = lock(&self.shared.thread_states);
        let mut correlation = lock(&self.shared.correlation);
        thread_states.remove(thread);
        correlation.remove_thread(thread);
    }

    pub fn thread_name_changed(&self, thread: ThreadId, name: String) {
        lock(&self.shared.thread_states).set_name(thread, name);
    }

    pub fn span_attached(&self, thread: ThreadId, context: SpanContext) {
        lock(&self.shared.correlation).put(thread, context);
    }

    pub fn span_detached(&self, thread: ThreadId) {
        lock(&self.shared.correlation).remove_thread(thread);
    }

    pub fn span_closed(&self, context: &SpanContext) {
        lock(&self.shared.correlation).remove_context(context);
    }

    pub fn start_selective_sampling(&self, trace: TraceId) -> Result<(), SelectionError> {
        let result = lock(&self.shared.selective_registry).start(trace);
        if let Err(err) = &result {
            log::warn!("Selective sampling for {:?} rejected: {}", trace, err);
        }
        result
    }

    pub fn stop_selective_sampling(&self, trace: &TraceId) {
        lock(&self.shared.selective_registry).stop(trace);
    }

    /// Returns whether the tick was captured.
    pub fn allocation_tick(&self, tick: &AllocationTick) -> bool {
        allocation::handle_allocation_tick(&self.shared, tick)
    }

    /// Copies one ready continuous buffer into `out`. Returns the bytes copied.
    pub fn read_thread_samples(&self, out: &mut [u8]) -> usize {
        self.shared.handoff.consume_one(out)
    }

    pub fn take_thread_samples(&self) -> Option<Vec<u8>> {
        self.shared.handoff.take_one().map(SampleBuffer::into_bytes)
    }

    pub fn read_selected_thread_samples(&self, out: &mut [u8]) -> usize {
        lock(&self.shared.selective_output).drain_into(out)
    }

    pub fn take_selected_thread_samples(&self) -> Vec<u8> {
        lock(&self.shared.selective_output).take()
    }

    /// Swaps in a fresh allocation buffer and copies the old one into `out`.
    pub fn read_allocation_samples(&self, out: &mut [u8]) -> usize {
        let buffer = self.take_allocation_buffer();
        let bytes = buffer.as_bytes();
        let len = bytes.len().min(out.len());
        if len < bytes.len() {
            log::warn!(
                "Consumer buffer too small ({} < {} bytes). Truncating allocation samples.",
                out.len(),
                bytes.len()
            );
        }
        out[..len].copy_from_slice(&bytes[..len]);
        len
    }

    pub fn take_allocation_samples(&self) -> Vec<u8> {
        self.take_allocation_buffer().into_bytes()
    }

    pub fn last_statistics(&self) -> SamplingStatistics {
        *lock(&self.shared.last_statistics)
    }

    fn take_allocation_buffer(&self) -> SampleBuffer {
        std::mem::take(&mut *lock(&self.shared.allocation_output))
    }
}

impl Drop for ContinuousProfilerEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
