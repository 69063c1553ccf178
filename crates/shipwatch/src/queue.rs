use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::warn;

use crate::matcher::MatchResult;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hand-off between the pipeline (producer) and pollers (consumers).
///
/// Bounded: when full, pushing drops the oldest entry.
#[derive(Debug)]
pub struct EventQueue {
    entries: Mutex<VecDeque<MatchResult>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl EventQueue {
    /// A `capacity` of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn push(&self, result: MatchResult) {
        let evicted = {
            let mut entries = self.entries.lock();
            let evicted = if entries.len() >= self.capacity {
                entries.pop_front()
            } else {
                None
            };
            entries.push_back(result);
            evicted
        };

        if let Some(evicted) = evicted {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped == 1 || dropped % 100 == 0 {
                warn!(
                    dropped,
                    capacity = self.capacity,
                    ship = %evicted.ship,
                    "event queue full; dropping oldest events"
                );
            }
        }
    }

    /// Takes the oldest entry without waiting for the producer.
    pub fn try_pop(&self) -> Option<MatchResult> {
        self.entries.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
