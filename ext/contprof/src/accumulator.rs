use thiserror::Error;

use crate::encoder::MAX_BUFFER_SIZE;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum AccumulatorError {
    #[error("accumulator full: {pending} bytes pending, {incoming} incoming, limit {limit}")]
    Full {
        pending: usize,
        incoming: usize,
        limit: usize,
    },
}

/// Collects encoded selective-sampling batches until the consumer drains them.
///
/// Batches are appended whole or not at all. The first rejected batch after
/// each drain is logged.
#[derive(Debug)]
pub struct SampleAccumulator {
    bytes: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

impl SampleAccumulator {
    pub fn new() -> Self {
        Self::with_limit(MAX_BUFFER_SIZE)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: vec![],
            limit,
            overflowed: false,
        }
    }

    pub fn append(&mut self, batch: &[u8]) -> Result<(), AccumulatorError> {
        if self.bytes.len() + batch.len() > self.limit {
            if !self.overflowed {
                log::warn!(
                    "Selected thread samples not drained ({} bytes pending). Dropping batches until the next read.",
                    self.bytes.len()
                );
                self.overflowed = true;
            }
            return Err(AccumulatorError::Full {
                pending: self.bytes.len(),
                incoming: batch.len(),
                limit: self.limit,
            });
        }
        self.bytes.extend_from_slice(batch);
        Ok(())
    }

    /// Copies the pending bytes into `out` and clears the accumulator.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let len = self.bytes.len().min(out.len());
        if len < self.bytes.len() {
            log::warn!(
                "Consumer buffer too small ({} < {} bytes). Truncating selected thread samples.",
                out.len(),
                self.bytes.len()
            );
        }
        out[..len].copy_from_slice(&self.bytes[..len]);
        self.bytes.clear();
        self.overflowed = false;
        len
    }

    pub fn take(&mut self) -> Vec<u8> {
        self.overflowed = false;
        std::mem::take(&mut self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for SampleAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_drain() {
        let mut accumulator = SampleAccumulator::with_limit(8);
        accumulator.append(&[1, 2, 3]).unwrap();
        accumulator.append(&[4, 5]).unwrap();
        assert_eq!(accumulator.len(), 5);

        let mut out = [0u8; 16];
        assert_eq!(accumulator.drain_into(&mut out), 5);
        assert_eq!(&out[..5], &[1, 2, 3, 4, 5]);
        assert!(accumulator.is_empty());
        assert_eq!(accumulator.drain_into(&mut out), 0);
    }

    #[test]
    fn test_append_past_limit_is_rejected_whole() {
        let mut accumulator = SampleAccumulator::with_limit(4);
        accumulator.append(&[1, 2, 3]).unwrap();
        assert_eq!(
            accumulator.append(&[4, 5]),
            Err(AccumulatorError::Full {
                pending: 3,
                incoming: 2,
                limit: 4
            })
        );
        assert_eq!(accumulator.take(), vec![1, 2, 3]);
        accumulator.append(&[4, 5]).unwrap();
        assert_eq!(accumulator.take(), vec![4, 5]);
    }
}
