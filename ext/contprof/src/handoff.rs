use std::sync::Mutex;

use thiserror::Error;

use crate::encoder::SampleBuffer;
use crate::util::lock;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// Both slots were occupied; the produced buffer has been dropped.
    #[error("both buffer slots are occupied, dropping {0} bytes")]
    Full(usize),
}

/// Hands completed buffers from the sampling thread to one external consumer.
///
/// Two slots: the producer proceeds while at least one is free and drops its
/// buffer when both are occupied. Neither side ever blocks on the other beyond
/// the slot lock.
#[derive(Debug, Default)]
pub struct DualBufferHandoff {
    slots: Mutex<[Option<SampleBuffer>; 2]>,
}

impl DualBufferHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_produce(&self) -> bool {
        lock(&self.slots).iter().any(|slot| slot.is_none())
    }

    /// Moves `buffer` into the first free slot.
    pub fn record_produced(&self, buffer: SampleBuffer) -> Result<(), HandoffError> {
        let mut slots = lock(&self.slots);
        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(buffer);
                Ok(())
            }
            None => Err(HandoffError::Full(buffer.len())),
        }
    }

    /// Takes one ready buffer, preferring slot A.
    pub fn take_one(&self) -> Option<SampleBuffer> {
        lock(&self.slots).iter_mut().find_map(|slot| slot.take())
    }

    /// Copies one ready buffer into `out` and frees it. Bytes beyond
    /// `out.len()` are discarded. Returns the number of bytes copied.
    pub fn consume_one(&self, out: &mut [u8]) -> usize {
        let Some(buffer) = self.take_one() else {
            return 0;
        };
        let bytes = buffer.as_bytes();
        let len = bytes.len().min(out.len());
        if len < bytes.len() {
            log::warn!(
                "Consumer buffer too small ({} < {} bytes). Truncating thread samples.",
                out.len(),
                bytes.len()
            );
        }
        out[..len].copy_from_slice(&bytes[..len]);
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_timestamp(timestamp: u64) -> SampleBuffer {
        let mut buffer = SampleBuffer::new();
        buffer.start_batch(timestamp);
        buffer.end_batch();
        buffer
    }

    #[test]
    fn test_handoff() {
        let handoff = DualBufferHandoff::new();
        assert!(handoff.should_produce());
        assert!(handoff.take_one().is_none());

        handoff.record_produced(buffer_with_timestamp(1)).unwrap();
        assert!(handoff.should_produce());
        handoff.record_produced(buffer_with_timestamp(2)).unwrap();
        assert!(!handoff.should_produce());

        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(1).as_bytes());
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(2).as_bytes());
        assert!(handoff.take_one().is_none());
    }

    #[test]
    fn test_handoff_full() {
        let handoff = DualBufferHandoff::new();
        handoff.record_produced(buffer_with_timestamp(1)).unwrap();
        handoff.record_produced(buffer_with_timestamp(2)).unwrap();

        let dropped = buffer_with_timestamp(3);
        let len = dropped.len();
        assert_eq!(handoff.record_produced(dropped), Err(HandoffError::Full(len)));

        // The overflowing buffer never reaches the consumer
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(1).as_bytes());
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(2).as_bytes());
        assert!(handoff.take_one().is_none());
    }

    #[test]
    fn test_handoff_refills_slot_a_first() {
        let handoff = DualBufferHandoff::new();
        handoff.record_produced(buffer_with_timestamp(1)).unwrap();
        handoff.take_one().unwrap();
        handoff.record_produced(buffer_with_timestamp(2)).unwrap();
        handoff.record_produced(buffer_with_timestamp(3)).unwrap();
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(2).as_bytes());
        handoff.record_produced(buffer_with_timestamp(4)).unwrap();
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(4).as_bytes());
        assert_eq!(handoff.take_one().unwrap().as_bytes(), buffer_with_timestamp(3).as_bytes());
    }

    #[test]
    fn test_consume_one() {
        let handoff = DualBufferHandoff::new();
        let expected = buffer_with_timestamp(7);
        handoff.record_produced(buffer_with_timestamp(7)).unwrap();

        let mut out = [0u8; 64];
        let len = handoff.consume_one(&mut out);
        assert_eq!(&out[..len], expected.as_bytes());
        assert_eq!(handoff.consume_one(&mut out), 0);

        // A short consumer buffer receives a prefix; the rest is freed
        handoff.record_produced(buffer_with_timestamp(8)).unwrap();
        let mut short = [0u8; 4];
        assert_eq!(handoff.consume_one(&mut short), 4);
        assert_eq!(handoff.consume_one(&mut out), 0);
    }
}
