use std::collections::HashMap;

use thiserror::Error;

use crate::encoder::{Opcode, BUFFER_VERSION};
use crate::span_context::SpanContext;
use crate::stats::SamplingStatistics;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer at offset {0}")]
    UnexpectedEof(usize),
    #[error("unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("unsupported buffer version {0}")]
    UnsupportedVersion(u32),
    #[error("frame references undefined code {0}")]
    UndefinedCode(i16),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    StartBatch {
        version: u32,
        timestamp_ms: u64,
    },
    Sample {
        thread_name: String,
        context: SpanContext,
        frames: Vec<String>,
    },
    EndBatch,
    FinalStats(SamplingStatistics),
    AllocationSample {
        timestamp_ms: u64,
        allocated_bytes: u64,
        type_name: String,
        thread_name: String,
        context: SpanContext,
        frames: Vec<String>,
    },
    SelectedThreadSample {
        timestamp_ms: u64,
        thread_name: String,
        context: SpanContext,
        frames: Vec<String>,
    },
    StartSelectedBatch {
        version: u32,
        timestamp_ms: u64,
    },
    EndSelectedBatch,
}

/// Decodes the records of a sample buffer.
///
/// Iteration stops after the first error; a buffer that was truncated at its
/// size limit therefore yields its complete records followed by
/// `DecodeError::UnexpectedEof`.
pub struct SampleReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    codes: HashMap<i16, String>,
    failed: bool,
}

impl<'a> SampleReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            codes: HashMap::new(),
            failed: false,
        }
    }

    pub fn decode_all(bytes: &'a [u8]) -> Result<Vec<Record>, DecodeError> {
        Self::new(bytes).collect()
    }

    fn read_record(&mut self) -> Result<Record, DecodeError> {
        let offset = self.offset;
        let opcode = self.read_u8()?;
        let opcode =
            Opcode::try_from(opcode).map_err(|opcode| DecodeError::UnknownOpcode { opcode, offset })?;

        let record = match opcode {
            Opcode::StartBatch => {
                let (version, timestamp_ms) = self.read_batch_header()?;
                Record::StartBatch {
                    version,
                    timestamp_ms,
                }
            }
            Opcode::StartSample => {
                let thread_name = self.read_string()?;
                let context = self.read_span_context()?;
                let frames = self.read_frames()?;
                Record::Sample {
                    thread_name,
                    context,
                    frames,
                }
            }
            Opcode::EndBatch => Record::EndBatch,
            Opcode::FinalStats => Record::FinalStats(SamplingStatistics {
                micros_suspended: self.read_u32()?,
                num_threads: self.read_u32()?,
                total_frames: self.read_u32()?,
                name_cache_misses: self.read_u32()?,
            }),
            Opcode::AllocationSample => {
                let timestamp_ms = self.read_u64()?;
                let allocated_bytes = self.read_u64()?;
                let type_name = self.read_string()?;
                let thread_name = self.read_string()?;
                let context = self.read_span_context()?;
                let frames = self.read_frames()?;
                Record::AllocationSample {
                    timestamp_ms,
                    allocated_bytes,
                    type_name,
                    thread_name,
                    context,
                    frames,
                }
            }
            Opcode::SelectedThreadSample => {
                let timestamp_ms = self.read_u64()?;
                let thread_name = self.read_string()?;
                let context = self.read_span_context()?;
                let frames = self.read_frames()?;
                Record::SelectedThreadSample {
                    timestamp_ms,
                    thread_name,
                    context,
                    frames,
                }
            }
            Opcode::StartSelectedBatch => {
                let (version, timestamp_ms) = self.read_batch_header()?;
                Record::StartSelectedBatch {
                    version,
                    timestamp_ms,
                }
            }
            Opcode::EndSelectedBatch => Record::EndSelectedBatch,
        };
        Ok(record)
    }

    // Each batch carries its own code table
    fn read_batch_header(&mut self) -> Result<(u32, u64), DecodeError> {
        let version = self.read_u32()?;
        if version != BUFFER_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let timestamp_ms = self.read_u64()?;
        self.codes.clear();
        Ok((version, timestamp_ms))
    }

    fn read_frames(&mut self) -> Result<Vec<String>, DecodeError> {
        let mut frames = vec![];
        loop {
            let code = self.read_i16()?;
            match code {
                0 => return Ok(frames),
                code if code < 0 => {
                    let code = code.checked_neg().ok_or(DecodeError::UndefinedCode(code))?;
                    let name = self.read_string()?;
                    self.codes.insert(code, name.clone());
                    frames.push(name);
                }
                code => match self.codes.get(&code) {
                    Some(name) => frames.push(name.clone()),
                    None => return Err(DecodeError::UndefinedCode(code)),
                },
            }
        }
    }

    fn read_span_context(&mut self) -> Result<SpanContext, DecodeError> {
        Ok(SpanContext::new(
            self.read_u64()?,
            self.read_u64()?,
            self.read_u64()?,
        ))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = usize::from(self.read_u16()?);
        let mut units = Vec::with_capacity(len);
        for _ in 0..len {
            units.push(self.read_u16()?);
        }
        Ok(String::from_utf16_lossy(&units))
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let bytes = self
            .bytes
            .get(self.offset..end)
            .ok_or(DecodeError::UnexpectedEof(self.offset))?;
        let mut array = [0; N];
        array.copy_from_slice(bytes);
        self.offset = end;
        Ok(array)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(u8::from_be_bytes(self.take()?))
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.take()?))
    }
}

impl Iterator for SampleReader<'_> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        let record = self.read_record();
        if record.is_err() {
            self.failed = true;
        }
        Some(record)
    }
}
