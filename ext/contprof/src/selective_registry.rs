use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::span_context::TraceId;

pub const MAX_SELECTED_TRACES: usize = 50;
pub const SELECTION_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selective sampling registry is full ({0} traces)")]
    Full(usize),
    #[error("cannot select the default trace")]
    DefaultTrace,
}

/// Traces of interest whose threads get sampled at the selective interval.
///
/// Expired entries are swept lazily: `remove_outdated_entries` only scans once
/// the earliest known deadline has passed, instead of keeping a timer per entry.
#[derive(Debug)]
pub struct SelectiveSamplingRegistry {
    deadlines: HashMap<TraceId, Instant>,
    capacity: usize,
    ttl: Duration,
    next_sweep: Option<Instant>,
}

impl SelectiveSamplingRegistry {
    pub fn new() -> Self {
        Self::with_limits(MAX_SELECTED_TRACES, SELECTION_TTL)
    }

    pub fn with_limits(capacity: usize, ttl: Duration) -> Self {
        Self {
            deadlines: HashMap::new(),
            capacity,
            ttl,
            next_sweep: None,
        }
    }

    pub fn start(&mut self, trace: TraceId) -> Result<(), SelectionError> {
        self.start_at(trace, Instant::now())
    }

    pub fn start_at(&mut self, trace: TraceId, now: Instant) -> Result<(), SelectionError> {
        if trace.is_default() {
            return Err(SelectionError::DefaultTrace);
        }
        if !self.deadlines.contains_key(&trace) && self.deadlines.len() >= self.capacity {
            return Err(SelectionError::Full(self.capacity));
        }

        let deadline = now + self.ttl;
        self.deadlines.insert(trace, deadline);
        self.next_sweep = Some(match self.next_sweep {
            Some(next_sweep) => next_sweep.min(deadline),
            None => deadline,
        });
        Ok(())
    }

    pub fn stop(&mut self, trace: &TraceId) {
        self.deadlines.remove(trace);
    }

    pub fn contains(&self, trace: &TraceId) -> bool {
        self.deadlines.contains_key(trace)
    }

    pub fn traces(&self) -> HashSet<TraceId> {
        self.deadlines.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }

    /// Evicts expired entries. Returns the number of entries evicted.
    pub fn remove_outdated_entries(&mut self, now: Instant) -> usize {
        match self.next_sweep {
            Some(next_sweep) if now >= next_sweep => {}
            _ => return 0,
        }

        let before = self.deadlines.len();
        let mut next_sweep: Option<Instant> = None;
        self.deadlines.retain(|_, deadline| {
            if *deadline <= now {
                return false;
            }
            next_sweep = Some(next_sweep.map_or(*deadline, |next| next.min(*deadline)));
            true
        });
        self.next_sweep = next_sweep;

        let evicted = before - self.deadlines.len();
        if evicted > 0 {
            log::debug!("Selective sampling: {} trace(s) expired", evicted);
        }
        evicted
    }
}

impl Default for SelectiveSamplingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
