use std::collections::HashMap;

use crate::frame::FunctionIdentifier;
use crate::span_context::SpanContext;
use crate::stats::SamplingStatistics;

/// Wire format version written into every batch header.
pub const BUFFER_VERSION: u32 = 1;
/// Hard cap on the size of a single buffer. Writes past it are dropped.
pub const MAX_BUFFER_SIZE: usize = 200 * 1024;
/// Strings are truncated to this many UTF-16 code units.
pub const MAX_STRING_LENGTH: usize = 512;
/// No new frame codes are minted once this many are in use.
pub const MAX_CODES_PER_BUFFER: usize = 10_000;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    StartBatch = 0x01,
    StartSample = 0x02,
    EndBatch = 0x06,
    FinalStats = 0x07,
    AllocationSample = 0x08,
    SelectedThreadSample = 0x09,
    StartSelectedBatch = 0x0A,
    EndSelectedBatch = 0x0B,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::StartBatch),
            0x02 => Ok(Self::StartSample),
            0x06 => Ok(Self::EndBatch),
            0x07 => Ok(Self::FinalStats),
            0x08 => Ok(Self::AllocationSample),
            0x09 => Ok(Self::SelectedThreadSample),
            0x0A => Ok(Self::StartSelectedBatch),
            0x0B => Ok(Self::EndSelectedBatch),
            other => Err(other),
        }
    }
}

/// An append-only, big-endian sample buffer.
///
/// Stack frames go through a per-buffer code table: the first occurrence of a
/// function is written as `-code` followed by its name, later occurrences as
/// the positive `code` alone. The table never outlives the buffer.
///
/// Every primitive write checks the buffer against [`MAX_BUFFER_SIZE`] first;
/// once it is exceeded, the rest of the buffer's writes are silently dropped.
#[derive(Debug)]
pub struct SampleBuffer {
    bytes: Vec<u8>,
    codes: HashMap<FunctionIdentifier, u16>,
    max_size: usize,
    truncated: bool,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::with_max_size(MAX_BUFFER_SIZE)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            bytes: vec![],
            codes: HashMap::new(),
            max_size,
            truncated: false,
        }
    }

    pub fn start_batch(&mut self, timestamp_ms: u64) {
        self.write_opcode(Opcode::StartBatch);
        self.write_u32(BUFFER_VERSION);
        self.write_u64(timestamp_ms);
    }

    pub fn start_sample(&mut self, thread_name: &str, context: &SpanContext) {
        self.write_opcode(Opcode::StartSample);
        self.write_string(thread_name);
        self.write_span_context(context);
    }

    /// Records one stack frame of the current sample.
    pub fn write_frame(&mut self, function: &FunctionIdentifier, name: &str) {
        if let Some(&code) = self.codes.get(function) {
            self.write_i16(code as i16);
            return;
        }

        // Past the cap the same overflow code is redefined every time
        let code = self.codes.len() + 1;
        if self.codes.len() < MAX_CODES_PER_BUFFER {
            self.codes.insert(*function, code as u16);
        }
        self.write_i16(-(code as i16));
        self.write_string(name);
    }

    pub fn end_sample(&mut self) {
        self.write_u16(0);
    }

    pub fn end_batch(&mut self) {
        self.write_opcode(Opcode::EndBatch);
    }

    pub fn write_final_stats(&mut self, stats: &SamplingStatistics) {
        self.write_opcode(Opcode::FinalStats);
        self.write_u32(stats.micros_suspended);
        self.write_u32(stats.num_threads);
        self.write_u32(stats.total_frames);
        self.write_u32(stats.name_cache_misses);
    }

    pub fn allocation_sample(
        &mut self,
        timestamp_ms: u64,
        allocated_bytes: u64,
        type_name: &str,
        thread_name: &str,
        context: &SpanContext,
    ) {
        self.write_opcode(Opcode::AllocationSample);
        self.write_u64(timestamp_ms);
        self.write_u64(allocated_bytes);
        self.write_string(type_name);
        self.write_string(thread_name);
        self.write_span_context(context);
    }

    pub fn start_selected_batch(&mut self, timestamp_ms: u64) {
        self.write_opcode(Opcode::StartSelectedBatch);
        self.write_u32(BUFFER_VERSION);
        self.write_u64(timestamp_ms);
    }

    pub fn selected_thread_sample(&mut self, timestamp_ms: u64, thread_name: &str, context: &SpanContext) {
        self.write_opcode(Opcode::SelectedThreadSample);
        self.write_u64(timestamp_ms);
        self.write_string(thread_name);
        self.write_span_context(context);
    }

    pub fn end_selected_batch(&mut self) {
        self.write_opcode(Opcode::EndSelectedBatch);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn has_room(&mut self) -> bool {
        if self.bytes.len() < self.max_size {
            return true;
        }
        if !self.truncated {
            self.truncated = true;
            log::warn!(
                "Sample buffer reached its size limit ({} bytes). Dropping further writes.",
                self.max_size
            );
        }
        false
    }

    fn write_opcode(&mut self, opcode: Opcode) {
        self.write_u8(opcode as u8);
    }

    fn write_span_context(&mut self, context: &SpanContext) {
        self.write_u64(context.trace_id_high);
        self.write_u64(context.trace_id_low);
        self.write_u64(context.span_id);
    }

    fn write_u8(&mut self, value: u8) {
        if self.has_room() {
            self.bytes.push(value);
        }
    }

    fn write_u16(&mut self, value: u16) {
        if self.has_room() {
            self.bytes.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn write_i16(&mut self, value: i16) {
        if self.has_room() {
            self.bytes.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn write_u32(&mut self, value: u32) {
        if self.has_room() {
            self.bytes.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn write_u64(&mut self, value: u64) {
        if self.has_room() {
            self.bytes.extend_from_slice(&value.to_be_bytes());
        }
    }

    // Length-prefixed UTF-16, written as a single operation
    fn write_string(&mut self, value: &str) {
        if !self.has_room() {
            return;
        }
        let units: Vec<u16> = value.encode_utf16().take(MAX_STRING_LENGTH).collect();
        self.bytes.reserve(2 + units.len() * 2);
        self.bytes.extend_from_slice(&(units.len() as u16).to_be_bytes());
        for unit in units {
            self.bytes.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
