#![deny(unsafe_op_in_unsafe_fn)]

use std::any::Any;
use std::ffi::CStr;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::sync::Arc;

use libc::{c_char, c_int, c_void};

use crate::allocation::AllocationTick;
use crate::encoder::MAX_STRING_LENGTH;
use crate::engine::configuration::Configuration;
use crate::engine::ContinuousProfilerEngine;
use crate::frame::{FunctionIdentifier, RawFrame};
use crate::host::{HostError, RuntimeHost};
use crate::span_context::{SpanContext, ThreadId, TraceId};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawFunctionIdentifier {
    pub token: u32,
    pub module_id: u64,
    pub is_valid: u8,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSpanContext {
    pub trace_id_high: u64,
    pub trace_id_low: u64,
    pub span_id: u64,
}

impl From<RawSpanContext> for SpanContext {
    fn from(raw: RawSpanContext) -> Self {
        SpanContext::new(raw.trace_id_high, raw.trace_id_low, raw.span_id)
    }
}

pub type FrameCallback = unsafe extern "C" fn(user_data: *mut c_void, function_handle: u64, frame_info: u64);

/// Runtime primitives supplied by the host. Status returns are zero on
/// success. `context` is passed back verbatim to every callback.
#[repr(C)]
pub struct HostCallbacks {
    pub context: *mut c_void,
    pub pause_runtime: unsafe extern "C" fn(context: *mut c_void) -> c_int,
    pub resume_runtime: unsafe extern "C" fn(context: *mut c_void) -> c_int,
    /// Writes up to `capacity` thread ids to `out` and returns the number of
    /// live threads. `out` may be null when `capacity` is zero.
    pub enumerate_threads: unsafe extern "C" fn(context: *mut c_void, out: *mut u64, capacity: usize) -> usize,
    /// Calls `on_frame(user_data, ...)` once per frame, innermost first.
    pub walk_stack: unsafe extern "C" fn(
        context: *mut c_void,
        thread: u64,
        on_frame: FrameCallback,
        user_data: *mut c_void,
    ) -> c_int,
    pub resolve_function_identifier: unsafe extern "C" fn(
        context: *mut c_void,
        function_handle: u64,
        frame_info: u64,
        out: *mut RawFunctionIdentifier,
    ) -> c_int,
    /// Writes up to `capacity` UTF-16 units of the name to `out` and returns
    /// the full length of the name, or a negative status on failure.
    pub resolve_function_name: unsafe extern "C" fn(
        context: *mut c_void,
        token: u32,
        module_id: u64,
        out: *mut u16,
        capacity: usize,
    ) -> isize,
}

/// Frame callback state passed through the host's stack walker.
struct FrameWalker<F> {
    on_frame: F,
    panic: Option<Box<dyn Any + Send>>,
}

/// `RuntimeHost` backed by C callbacks.
pub struct CallbackHost {
    callbacks: HostCallbacks,
}

// The host guarantees its callbacks may be invoked from any thread.
unsafe impl Send for CallbackHost {}
unsafe impl Sync for CallbackHost {}

impl CallbackHost {
    /// # Safety
    ///
    /// Every callback must stay valid, and `context` must stay usable from
    /// any thread, for the lifetime of the returned host.
    pub unsafe fn new(callbacks: HostCallbacks) -> Self {
        Self { callbacks }
    }

    // A panic must not cross the host's frames: it is parked here and the
    // remaining frames are ignored.
    unsafe extern "C" fn frame_trampoline<F>(user_data: *mut c_void, function_handle: u64, frame_info: u64)
    where
        F: FnMut(RawFrame),
    {
        let walker = unsafe { &mut *(user_data as *mut FrameWalker<F>) };
        if walker.panic.is_some() {
            return;
        }
        let frame = RawFrame::new(function_handle, frame_info);
        let on_frame = &mut walker.on_frame;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_frame(frame))) {
            walker.panic = Some(payload);
        }
    }

    /// Re-raises a panic from `on_frame` once the host's walker has returned.
    fn walk_with<F>(&self, thread: ThreadId, on_frame: F) -> c_int
    where
        F: FnMut(RawFrame),
    {
        let mut walker = FrameWalker { on_frame, panic: None };
        let status = unsafe {
            (self.callbacks.walk_stack)(
                self.callbacks.context,
                thread,
                Self::frame_trampoline::<F>,
                &mut walker as *mut FrameWalker<F> as *mut c_void,
            )
        };
        if let Some(payload) = walker.panic {
            panic::resume_unwind(payload);
        }
        status
    }
}

impl RuntimeHost for CallbackHost {
    fn pause_runtime(&self) -> Result<(), HostError> {
        match unsafe { (self.callbacks.pause_runtime)(self.callbacks.context) } {
            0 => Ok(()),
            status => Err(HostError::Pause(status)),
        }
    }

    fn resume_runtime(&self) -> Result<(), HostError> {
        match unsafe { (self.callbacks.resume_runtime)(self.callbacks.context) } {
            0 => Ok(()),
            status => Err(HostError::Resume(status)),
        }
    }

    fn live_threads(&self) -> Vec<ThreadId> {
        let enumerate = self.callbacks.enumerate_threads;
        let context = self.callbacks.context;

        let mut threads: Vec<ThreadId> = vec![];
        let mut count = unsafe { enumerate(context, ptr::null_mut(), 0) };
        // Threads may start between the two calls
        while count > threads.len() {
            threads.resize(count, 0);
            count = unsafe { enumerate(context, threads.as_mut_ptr(), threads.len()) };
        }
        threads.truncate(count);
        threads
    }

    fn walk_stack(&self, thread: ThreadId, on_frame: &mut dyn FnMut(RawFrame)) -> Result<(), HostError> {
        match self.walk_with(thread, |frame| on_frame(frame)) {
            0 => Ok(()),
            status => Err(HostError::StackWalk { thread, status }),
        }
    }

    fn resolve_function_identifier(&self, frame: RawFrame) -> Result<FunctionIdentifier, HostError> {
        let mut out = RawFunctionIdentifier::default();
        let status = unsafe {
            (self.callbacks.resolve_function_identifier)(
                self.callbacks.context,
                frame.function_handle,
                frame.frame_info,
                &mut out,
            )
        };
        match status {
            0 if out.is_valid != 0 => Ok(FunctionIdentifier::new(out.token, out.module_id)),
            0 => Ok(FunctionIdentifier::invalid()),
            status => Err(HostError::Resolution(status)),
        }
    }

    fn resolve_function_name(&self, function: &FunctionIdentifier) -> Result<String, HostError> {
        let mut units = vec![0u16; MAX_STRING_LENGTH];
        loop {
            let len = unsafe {
                (self.callbacks.resolve_function_name)(
                    self.callbacks.context,
                    function.token,
                    function.module_id,
                    units.as_mut_ptr(),
                    units.len(),
                )
            };
            let Ok(len) = usize::try_from(len) else {
                return Err(HostError::Resolution(i32::try_from(len).unwrap_or(i32::MIN)));
            };
            if len <= units.len() {
                return Ok(String::from_utf16_lossy(&units[..len]));
            }
            units.resize(len, 0);
        }
    }
}

// C ABI. Every entry point swallows panics; nothing unwinds into the host.

fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("Panic in continuous profiler entry point");
        fallback
    })
}

unsafe fn utf16_string(units: *const u16, len: usize) -> String {
    if units.is_null() || len == 0 {
        return String::new();
    }
    String::from_utf16_lossy(unsafe { slice::from_raw_parts(units, len) })
}

unsafe fn out_buffer<'a>(out: *mut u8, capacity: usize) -> &'a mut [u8] {
    if out.is_null() || capacity == 0 {
        return &mut [];
    }
    unsafe { slice::from_raw_parts_mut(out, capacity) }
}

/// Installs env_logger when built with the `debug` feature. `RUST_LOG`
/// controls the level.
#[no_mangle]
pub extern "C" fn contprof_init_logging() {
    #[cfg(feature = "debug")]
    {
        let _ = env_logger::builder()
            .format_timestamp(None)
            .format_module_path(false)
            .try_init();
    }
}

/// Returns null if `callbacks` is null.
///
/// # Safety
///
/// See `CallbackHost::new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_engine_new(callbacks: *const HostCallbacks) -> *mut ContinuousProfilerEngine {
    if callbacks.is_null() {
        return ptr::null_mut();
    }
    let callbacks = unsafe { ptr::read(callbacks) };
    guarded(ptr::null_mut(), move || {
        let host = Arc::new(unsafe { CallbackHost::new(callbacks) });
        Box::into_raw(Box::new(ContinuousProfilerEngine::new(host)))
    })
}

/// Stops the engine and releases it.
///
/// # Safety
///
/// `engine` must come from `contprof_engine_new` and must not be used again.
#[no_mangle]
pub unsafe extern "C" fn contprof_engine_free(engine: *mut ContinuousProfilerEngine) {
    if engine.is_null() {
        return;
    }
    let engine = unsafe { Box::from_raw(engine) };
    guarded((), move || drop(engine));
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_engine_start(
    engine: *const ContinuousProfilerEngine,
    thread_sampling_enabled: bool,
    thread_sampling_interval_ms: u64,
    allocation_sampling_enabled: bool,
    max_allocations_per_minute: u32,
    selective_sampling_interval_ms: u64,
) -> bool {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return false;
    };
    let configuration = Configuration::new(
        thread_sampling_enabled,
        thread_sampling_interval_ms,
        allocation_sampling_enabled,
        max_allocations_per_minute,
        selective_sampling_interval_ms,
    );
    guarded(false, || engine.start(configuration).is_ok())
}

/// Starts the engine from a JSON configuration object.
///
/// # Safety
///
/// `engine` as for `contprof_engine_start`; `json` must be null or a
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn contprof_engine_start_json(
    engine: *const ContinuousProfilerEngine,
    json: *const c_char,
) -> bool {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return false;
    };
    if json.is_null() {
        return false;
    }
    let json = unsafe { CStr::from_ptr(json) };
    guarded(false, || {
        let configuration = json
            .to_str()
            .map_err(|err| log::warn!("Configuration is not valid UTF-8: {}", err))
            .ok()
            .and_then(|json| {
                Configuration::from_json(json)
                    .map_err(|err| log::warn!("{}", err))
                    .ok()
            });
        match configuration {
            Some(configuration) => engine.start(configuration).is_ok(),
            None => false,
        }
    })
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_engine_stop(engine: *const ContinuousProfilerEngine) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.stop());
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_thread_created(engine: *const ContinuousProfilerEngine, thread: u64) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.thread_created(thread));
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_thread_destroyed(engine: *const ContinuousProfilerEngine, thread: u64) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.thread_destroyed(thread));
    }
}

/// `name` is UTF-16, `name_len` units long.
///
/// # Safety
///
/// `engine` as above; `name` must be null or valid for `name_len` units.
#[no_mangle]
pub unsafe extern "C" fn contprof_thread_name_changed(
    engine: *const ContinuousProfilerEngine,
    thread: u64,
    name: *const u16,
    name_len: usize,
) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        let name = unsafe { utf16_string(name, name_len) };
        guarded((), || engine.thread_name_changed(thread, name));
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_span_attached(
    engine: *const ContinuousProfilerEngine,
    thread: u64,
    context: RawSpanContext,
) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.span_attached(thread, context.into()));
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_span_detached(engine: *const ContinuousProfilerEngine, thread: u64) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.span_detached(thread));
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_span_closed(engine: *const ContinuousProfilerEngine, context: RawSpanContext) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || engine.span_closed(&context.into()));
    }
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_start_selective_sampling(
    engine: *const ContinuousProfilerEngine,
    trace_id_high: u64,
    trace_id_low: u64,
) -> bool {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return false;
    };
    guarded(false, || {
        engine
            .start_selective_sampling(TraceId::new(trace_id_high, trace_id_low))
            .is_ok()
    })
}

/// # Safety
///
/// `engine` must be null or a live pointer from `contprof_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn contprof_stop_selective_sampling(
    engine: *const ContinuousProfilerEngine,
    trace_id_high: u64,
    trace_id_low: u64,
) {
    if let Some(engine) = unsafe { engine.as_ref() } {
        guarded((), || {
            engine.stop_selective_sampling(&TraceId::new(trace_id_high, trace_id_low))
        });
    }
}

/// Called on the allocating thread. `type_name` is UTF-16.
///
/// # Safety
///
/// `engine` as above; `type_name` must be null or valid for
/// `type_name_len` units.
#[no_mangle]
pub unsafe extern "C" fn contprof_allocation_tick(
    engine: *const ContinuousProfilerEngine,
    thread: u64,
    allocated_bytes: u64,
    type_name: *const u16,
    type_name_len: usize,
) -> bool {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return false;
    };
    let tick = AllocationTick {
        thread,
        allocated_bytes,
        type_name: unsafe { utf16_string(type_name, type_name_len) },
    };
    guarded(false, || engine.allocation_tick(&tick))
}

/// Copies one ready continuous buffer into `out`. Returns the bytes copied.
///
/// # Safety
///
/// `engine` as above; `out` must be null or valid for `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn contprof_read_thread_samples(
    engine: *const ContinuousProfilerEngine,
    out: *mut u8,
    capacity: usize,
) -> usize {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return 0;
    };
    let out = unsafe { out_buffer(out, capacity) };
    guarded(0, || engine.read_thread_samples(out))
}

/// # Safety
///
/// `engine` as above; `out` must be null or valid for `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn contprof_read_selected_thread_samples(
    engine: *const ContinuousProfilerEngine,
    out: *mut u8,
    capacity: usize,
) -> usize {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return 0;
    };
    let out = unsafe { out_buffer(out, capacity) };
    guarded(0, || engine.read_selected_thread_samples(out))
}

/// # Safety
///
/// `engine` as above; `out` must be null or valid for `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn contprof_read_allocation_samples(
    engine: *const ContinuousProfilerEngine,
    out: *mut u8,
    capacity: usize,
) -> usize {
    let Some(engine) = (unsafe { engine.as_ref() }) else {
        return 0;
    };
    let out = unsafe { out_buffer(out, capacity) };
    guarded(0, || engine.read_allocation_samples(out))
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::reader::{Record, SampleReader};

    const LONG_NAME_LEN: usize = 600;

    #[derive(Default)]
    struct TestRuntime {
        pauses: AtomicUsize,
        resumes: AtomicUsize,
    }

    unsafe extern "C" fn pause(context: *mut c_void) -> c_int {
        let runtime = unsafe { &*(context as *const TestRuntime) };
        runtime.pauses.fetch_add(1, Ordering::SeqCst);
        0
    }

    unsafe extern "C" fn resume(context: *mut c_void) -> c_int {
        let runtime = unsafe { &*(context as *const TestRuntime) };
        runtime.resumes.fetch_add(1, Ordering::SeqCst);
        0
    }

    unsafe extern "C" fn enumerate_threads(_: *mut c_void, out: *mut u64, capacity: usize) -> usize {
        let threads = [7u64, 8];
        for (i, thread) in threads.iter().take(capacity).enumerate() {
            unsafe { *out.add(i) = *thread };
        }
        threads.len()
    }

    unsafe extern "C" fn walk_stack(
        _: *mut c_void,
        thread: u64,
        on_frame: FrameCallback,
        user_data: *mut c_void,
    ) -> c_int {
        if thread != 7 {
            return -3;
        }
        unsafe {
            on_frame(user_data, 0x10, thread);
            on_frame(user_data, 0x20, thread);
            on_frame(user_data, 0, thread);
        }
        0
    }

    unsafe extern "C" fn resolve_function_identifier(
        _: *mut c_void,
        function_handle: u64,
        _: u64,
        out: *mut RawFunctionIdentifier,
    ) -> c_int {
        unsafe {
            *out = RawFunctionIdentifier {
                token: function_handle as u32,
                module_id: 1,
                is_valid: 1,
            }
        };
        0
    }

    unsafe extern "C" fn resolve_function_name(
        _: *mut c_void,
        token: u32,
        _: u64,
        out: *mut u16,
        capacity: usize,
    ) -> isize {
        let name: Vec<u16> = match token {
            0x10 => "App.Alloc".encode_utf16().collect(),
            0x20 => std::iter::repeat(u16::from(b'x')).take(LONG_NAME_LEN).collect(),
            _ => return -1,
        };
        for (i, unit) in name.iter().take(capacity).enumerate() {
            unsafe { *out.add(i) = *unit };
        }
        name.len() as isize
    }

    fn callbacks(runtime: &TestRuntime) -> HostCallbacks {
        HostCallbacks {
            context: runtime as *const TestRuntime as *mut c_void,
            pause_runtime: pause,
            resume_runtime: resume,
            enumerate_threads,
            walk_stack,
            resolve_function_identifier,
            resolve_function_name,
        }
    }

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_callback_host() {
        let runtime = TestRuntime::default();
        let host = unsafe { CallbackHost::new(callbacks(&runtime)) };

        host.pause_runtime().unwrap();
        host.resume_runtime().unwrap();
        assert_eq!(runtime.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(host.live_threads(), vec![7, 8]);

        let mut frames = vec![];
        host.walk_stack(7, &mut |frame| frames.push(frame)).unwrap();
        assert_eq!(
            frames,
            vec![RawFrame::new(0x10, 7), RawFrame::new(0x20, 7), RawFrame::new(0, 7)]
        );
        assert_eq!(
            host.walk_stack(8, &mut |_| {}),
            Err(HostError::StackWalk { thread: 8, status: -3 })
        );

        // A panicking frame callback unwinds out of walk_stack, not through the host
        let mut seen = vec![];
        let walked = panic::catch_unwind(AssertUnwindSafe(|| {
            host.walk_stack(7, &mut |frame| {
                seen.push(frame);
                if seen.len() == 2 {
                    panic!("frame callback failed");
                }
            })
        }));
        assert!(walked.is_err());
        assert_eq!(seen.len(), 2);

        let function = host.resolve_function_identifier(RawFrame::new(0x10, 7)).unwrap();
        assert_eq!(function, FunctionIdentifier::new(0x10, 1));
        assert_eq!(host.resolve_function_name(&function).unwrap(), "App.Alloc");
        // Longer than the initial buffer: resolved with a second call
        assert_eq!(
            host.resolve_function_name(&FunctionIdentifier::new(0x20, 1)).unwrap().len(),
            LONG_NAME_LEN
        );
        assert_eq!(
            host.resolve_function_name(&FunctionIdentifier::new(0x30, 1)),
            Err(HostError::Resolution(-1))
        );
    }

    #[test]
    fn test_c_abi_allocation_flow() {
        let runtime = TestRuntime::default();
        let callbacks = callbacks(&runtime);
        unsafe {
            let engine = contprof_engine_new(&callbacks);
            assert!(!engine.is_null());

            let name = utf16("worker-7");
            contprof_thread_name_changed(engine, 7, name.as_ptr(), name.len());
            contprof_span_attached(
                engine,
                7,
                RawSpanContext {
                    trace_id_high: 0,
                    trace_id_low: 42,
                    span_id: 1,
                },
            );
            assert!(contprof_start_selective_sampling(engine, 0, 42));
            assert!(!contprof_start_selective_sampling(engine, 0, 0));

            let json = CString::new(r#"{"allocation_sampling_enabled": true}"#).unwrap();
            assert!(contprof_engine_start_json(engine, json.as_ptr()));
            // Already running
            assert!(!contprof_engine_start(engine, false, 0, true, 10, 0));

            let type_name = utf16("System.Byte[]");
            assert!(contprof_allocation_tick(engine, 7, 4096, type_name.as_ptr(), type_name.len()));

            let mut out = vec![0u8; 8192];
            let len = contprof_read_allocation_samples(engine, out.as_mut_ptr(), out.len());
            let records = SampleReader::decode_all(&out[..len]).unwrap();
            match records.as_slice() {
                [Record::AllocationSample {
                    allocated_bytes,
                    type_name,
                    thread_name,
                    context,
                    frames,
                    ..
                }] => {
                    assert_eq!(*allocated_bytes, 4096);
                    assert_eq!(type_name, "System.Byte[]");
                    assert_eq!(thread_name, "worker-7");
                    assert_eq!(*context, SpanContext::new(0, 42, 1));
                    assert_eq!(frames.len(), 3);
                    assert_eq!(frames[0], "App.Alloc");
                    assert_eq!(frames[1].len(), MAX_STRING_LENGTH);
                    assert_eq!(frames[2], "Unknown-Native-Function");
                }
                records => panic!("unexpected records: {:?}", records),
            }

            assert_eq!(contprof_read_thread_samples(engine, out.as_mut_ptr(), out.len()), 0);
            assert_eq!(contprof_read_selected_thread_samples(engine, ptr::null_mut(), 0), 0);

            contprof_span_closed(
                engine,
                RawSpanContext {
                    trace_id_high: 0,
                    trace_id_low: 42,
                    span_id: 1,
                },
            );
            contprof_stop_selective_sampling(engine, 0, 42);
            contprof_engine_stop(engine);
            contprof_engine_free(engine);
        }
        assert_eq!(runtime.pauses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_null_engine_is_ignored() {
        unsafe {
            assert!(contprof_engine_new(ptr::null()).is_null());
            assert!(!contprof_engine_start(ptr::null(), true, 1000, false, 200, 0));
            contprof_thread_created(ptr::null(), 1);
            contprof_engine_stop(ptr::null());
            contprof_engine_free(ptr::null_mut());
            assert_eq!(contprof_read_thread_samples(ptr::null(), ptr::null_mut(), 0), 0);
        }
    }
}
