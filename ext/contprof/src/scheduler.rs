use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::encoder::SampleBuffer;
use crate::engine::configuration::{Configuration, ConfigurationError};
use crate::engine::EngineShared;
use crate::frame::FunctionIdentifier;
use crate::span_context::{SpanContext, ThreadId, TraceId};
use crate::stats::SamplingStatistics;
use crate::util::{lock, unix_millis, write};

/// Scratch capture storage is rebuilt from scratch this often, dropping
/// entries of threads that have exited.
pub const SCRATCH_REBUILD_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Continuous,
    Selective,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Nothing was captured: no free handoff slot, no selected thread, or
    /// the runtime could not be paused.
    Skipped,
    /// Captured, but no thread had a non-empty stack.
    Empty,
    Published,
    /// Captured and encoded, but the destination was full.
    Dropped,
}

/// The tick rate of the sampling thread and which ticks are continuous.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureCadence {
    pub tick_interval: Duration,
    /// Every n-th tick is continuous. `None` when only selective sampling runs.
    continuous_every: Option<u64>,
}

impl CaptureCadence {
    /// Returns `Ok(None)` when no stack sampling is configured at all.
    pub fn from_configuration(configuration: &Configuration) -> Result<Option<Self>, ConfigurationError> {
        configuration.validate()?;

        let cadence = match (
            configuration.thread_sampling_interval(),
            configuration.selective_sampling_interval(),
        ) {
            (None, None) => return Ok(None),
            (Some(continuous), None) => Self {
                tick_interval: continuous,
                continuous_every: Some(1),
            },
            (None, Some(selective)) => Self {
                tick_interval: selective,
                continuous_every: None,
            },
            (Some(_), Some(selective)) => Self {
                tick_interval: selective,
                continuous_every: Some(
                    configuration.thread_sampling_interval_ms / configuration.selective_sampling_interval_ms,
                ),
            },
        };
        Ok(Some(cadence))
    }

    /// `tick` counts from 1.
    pub fn mode_for_tick(&self, tick: u64) -> CaptureMode {
        match self.continuous_every {
            Some(every) if tick % every == 0 => CaptureMode::Continuous,
            _ => CaptureMode::Selective,
        }
    }
}

#[derive(Debug, Default)]
struct ThreadCapture {
    thread_name: String,
    context: SpanContext,
    frames: Vec<FunctionIdentifier>,
}

/// Entry point of the sampling thread.
pub(crate) fn run(shared: Arc<EngineShared>, configuration: Configuration) {
    let cadence = match CaptureCadence::from_configuration(&configuration) {
        Ok(Some(cadence)) => cadence,
        Ok(None) => {
            log::info!("No stack sampling configured. Sampling thread exiting.");
            return;
        }
        Err(err) => {
            log::warn!("Invalid sampling configuration ({}). Sampling thread exiting.", err);
            return;
        }
    };
    log::debug!("Sampling thread started: {:?}", cadence);

    let mut scheduler = SamplingScheduler::new(cadence, Instant::now());
    loop {
        if shared.wait_for_shutdown(cadence.tick_interval) {
            break;
        }
        scheduler.tick(&shared);
        if shared.is_shutdown_requested() {
            break;
        }
    }

    log::debug!("Sampling thread exiting");
}

pub(crate) struct SamplingScheduler {
    cadence: CaptureCadence,
    ticks: u64,
    scratch: HashMap<ThreadId, ThreadCapture>,
    next_rebuild: Instant,
    stats: SamplingStatistics,
}

impl SamplingScheduler {
    pub(crate) fn new(cadence: CaptureCadence, now: Instant) -> Self {
        Self {
            cadence,
            ticks: 0,
            scratch: HashMap::new(),
            next_rebuild: now + SCRATCH_REBUILD_INTERVAL,
            stats: SamplingStatistics::default(),
        }
    }

    pub(crate) fn tick(&mut self, shared: &EngineShared) -> (CaptureMode, CaptureOutcome) {
        self.ticks += 1;
        let mode = self.cadence.mode_for_tick(self.ticks);
        let outcome = self.capture(shared, mode);
        self.clear_scratch(Instant::now());
        (mode, outcome)
    }

    pub(crate) fn capture(&mut self, shared: &EngineShared, mode: CaptureMode) -> CaptureOutcome {
        let selected_traces = match mode {
            CaptureMode::Continuous => {
                if !shared.handoff.should_produce() {
                    log::debug!("Both thread sample buffers are pending. Skipping continuous capture.");
                    return CaptureOutcome::Skipped;
                }
                None
            }
            CaptureMode::Selective => {
                let traces = {
                    let mut registry = lock(&shared.selective_registry);
                    registry.remove_outdated_entries(Instant::now());
                    registry.traces()
                };
                if traces.is_empty() {
                    return CaptureOutcome::Skipped;
                }
                Some(traces)
            }
        };

        self.stats.reset();
        if !self.pause_and_capture(shared, selected_traces.as_ref()) {
            return CaptureOutcome::Skipped;
        }

        let captured = self.scratch.values().filter(|capture| !capture.frames.is_empty());
        for capture in captured {
            self.stats.num_threads += 1;
            self.stats.total_frames = self
                .stats
                .total_frames
                .saturating_add(u32::try_from(capture.frames.len()).unwrap_or(u32::MAX));
        }
        if self.stats.num_threads == 0 {
            return CaptureOutcome::Empty;
        }

        let outcome = match mode {
            CaptureMode::Continuous => self.publish_continuous(shared),
            CaptureMode::Selective => self.publish_selective(shared),
        };

        *lock(&shared.last_statistics) = self.stats;
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(json) = serde_json::to_string(&self.stats) {
                log::debug!("{:?} capture: {}", mode, json);
            }
        }
        outcome
    }

    /// Pauses the runtime and walks the target threads into `scratch`.
    /// Returns false if nothing was captured.
    fn pause_and_capture(&mut self, shared: &EngineShared, selected_traces: Option<&HashSet<TraceId>>) -> bool {
        // Everything an application thread might be holding when it is paused
        // is taken here first: gate, thread states, correlation, name cache.
        let _gate = write(&shared.pause_gate);
        let thread_states = lock(&shared.thread_states);
        let correlation = lock(&shared.correlation);
        let mut name_cache = lock(&shared.name_cache);

        let selected_threads: Option<Vec<ThreadId>> = match selected_traces {
            Some(traces) => {
                let threads: HashSet<ThreadId> = traces
                    .iter()
                    .flat_map(|trace| correlation.get_all_threads(trace))
                    .collect();
                if threads.is_empty() {
                    log::trace!("No live thread runs a selected trace. Skipping pause.");
                    return false;
                }
                Some(threads.into_iter().collect())
            }
            None => None,
        };

        let host = shared.host.as_ref();
        let started_at = Instant::now();
        if let Err(err) = host.pause_runtime() {
            log::warn!("Failed to pause the runtime: {}", err);
            return false;
        }

        let scratch = &mut self.scratch;
        let walked = panic::catch_unwind(AssertUnwindSafe(|| {
            let threads = selected_threads.unwrap_or_else(|| host.live_threads());
            for thread in threads {
                let capture = scratch.entry(thread).or_default();
                capture.thread_name.clear();
                capture.frames.clear();
                capture.thread_name.push_str(thread_states.thread_name(thread));
                capture.context = correlation.get_context(thread).unwrap_or_default();

                let frames = &mut capture.frames;
                let result = host.walk_stack(thread, &mut |frame| {
                    frames.push(name_cache.function_identifier(host, frame));
                });
                if let Err(err) = result {
                    log::debug!("{}", err);
                    capture.frames.clear();
                }
            }
        }));

        if let Err(err) = host.resume_runtime() {
            log::warn!("Failed to resume the runtime: {}", err);
        }
        self.stats.micros_suspended = u32::try_from(started_at.elapsed().as_micros()).unwrap_or(u32::MAX);

        if walked.is_err() {
            log::warn!("Stack capture panicked. Discarding this capture.");
            for capture in self.scratch.values_mut() {
                capture.frames.clear();
            }
            return false;
        }
        true
    }

    fn publish_continuous(&mut self, shared: &EngineShared) -> CaptureOutcome {
        let mut buffer = SampleBuffer::new();
        buffer.start_batch(unix_millis());
        {
            let host = shared.host.as_ref();
            let mut name_cache = lock(&shared.name_cache);
            name_cache.take_misses();
            for capture in self.scratch.values().filter(|capture| !capture.frames.is_empty()) {
                buffer.start_sample(&capture.thread_name, &capture.context);
                for function in &capture.frames {
                    let name = name_cache.function_name(host, function);
                    buffer.write_frame(function, &name);
                }
                buffer.end_sample();
            }
            self.stats.name_cache_misses = name_cache.take_misses();
        }
        buffer.write_final_stats(&self.stats);
        buffer.end_batch();

        match shared.handoff.record_produced(buffer) {
            Ok(()) => CaptureOutcome::Published,
            Err(err) => {
                log::warn!("{}", err);
                CaptureOutcome::Dropped
            }
        }
    }

    fn publish_selective(&mut self, shared: &EngineShared) -> CaptureOutcome {
        let timestamp_ms = unix_millis();
        let mut buffer = SampleBuffer::new();
        buffer.start_selected_batch(timestamp_ms);
        {
            let host = shared.host.as_ref();
            let mut name_cache = lock(&shared.name_cache);
            name_cache.take_misses();
            for capture in self.scratch.values().filter(|capture| !capture.frames.is_empty()) {
                buffer.selected_thread_sample(timestamp_ms, &capture.thread_name, &capture.context);
                for function in &capture.frames {
                    let name = name_cache.function_name(host, function);
                    buffer.write_frame(function, &name);
                }
                buffer.end_sample();
            }
            self.stats.name_cache_misses = name_cache.take_misses();
        }
        buffer.end_selected_batch();

        match lock(&shared.selective_output).append(buffer.as_bytes()) {
            Ok(()) => CaptureOutcome::Published,
            Err(_) => CaptureOutcome::Dropped,
        }
    }

    /// Empties the per-thread scratch in place. Every `SCRATCH_REBUILD_INTERVAL`
    /// the map itself is replaced instead.
    fn clear_scratch(&mut self, now: Instant) {
        if now >= self.next_rebuild {
            self.scratch = HashMap::new();
            self.next_rebuild = now + SCRATCH_REBUILD_INTERVAL;
            return;
        }
        for capture in self.scratch.values_mut() {
            capture.thread_name.clear();
            capture.frames.clear();
        }
    }
}
