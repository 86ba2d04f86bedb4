//! Bounded per-target sample window.
//!
//! Readers never lock: they load the current [`Snapshot`] through an atomic
//! pointer and keep it as long as they like. Writers serialize on a mutex,
//! build the next snapshot from the current one and swap it in, so a reader
//! only ever observes fully recorded samples.

use crate::monitor::error::{PingError, Result};
use crate::monitor::model::{Sample, SequenceNumber};
use crate::monitor::statistics::Statistics;
use arc_swap::ArcSwap;
use std::slice;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{debug, trace};

/// Append-only block of sample slots. Slots are written once, in order, by
/// the store's writer; a snapshot only reads the slots it was published with.
#[derive(Debug)]
struct Chunk {
    slots: Box<[OnceLock<Sample>]>,
}

impl Chunk {
    fn new(len: usize) -> Arc<Self> {
        Arc::new(Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        })
    }
}

/// Immutable view of a sample window at one point in time.
///
/// Chunks are as long as the window, so the window always lies in the tail of
/// the previous chunk plus the filled head of the current one. Publishing the
/// next snapshot copies two pointers, never the samples.
#[derive(Debug, Clone)]
pub struct Snapshot {
    prev: Option<Arc<Chunk>>,
    cur: Arc<Chunk>,
    /// Written slots of `cur`
    fill: usize,
    len: usize,
    capacity: usize,
    last_sequence: Option<SequenceNumber>,
    recorded: u64,
    lost: u64,
    version: u64,
}

/// Iterator over the samples of a [`Snapshot`], oldest first.
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    head: slice::Iter<'a, OnceLock<Sample>>,
    tail: slice::Iter<'a, OnceLock<Sample>>,
}

impl<'a> Iterator for Samples<'a> {
    type Item = &'a Sample;

    fn next(&mut self) -> Option<&'a Sample> {
        self.head.by_ref().chain(self.tail.by_ref()).find_map(OnceLock::get)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.head.len() + self.tail.len();
        (len, Some(len))
    }
}

impl DoubleEndedIterator for Samples<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.tail
            .by_ref()
            .rev()
            .chain(self.head.by_ref().rev())
            .find_map(OnceLock::get)
    }
}

impl ExactSizeIterator for Samples<'_> {}

impl Snapshot {
    fn empty(capacity: usize) -> Self {
        Self {
            prev: None,
            cur: Chunk::new(capacity),
            fill: 0,
            len: 0,
            capacity,
            last_sequence: None,
            recorded: 0,
            lost: 0,
            version: 0,
        }
    }

    /// Publication counter; every change to the store yields a higher value.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> Samples<'_> {
        let tail = &self.cur.slots[self.fill.saturating_sub(self.len)..self.fill];
        let from_prev = self.len - tail.len();
        let head: &[OnceLock<Sample>] = match &self.prev {
            Some(prev) if from_prev > 0 => &prev.slots[prev.slots.len().saturating_sub(from_prev)..],
            _ => &[],
        };
        Samples {
            head: head.iter(),
            tail: tail.iter(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples().next_back()
    }

    /// Highest sequence number ever recorded, including samples already evicted
    /// or cleared by a reset.
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        self.last_sequence
    }

    /// Samples recorded since creation or the last reset, evicted ones included.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Losses recorded since creation or the last reset.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Percentage of all recorded probes that got a reply.
    pub fn uptime_pct(&self) -> f64 {
        if self.recorded == 0 {
            0.0
        } else {
            (self.recorded - self.lost) as f64 / self.recorded as f64 * 100.0
        }
    }

    /// Latencies in milliseconds, oldest first, `None` for losses.
    pub fn latencies_ms(&self) -> Vec<Option<f64>> {
        self.samples().map(Sample::latency_ms).collect()
    }

    pub fn stats(&self) -> Result<Statistics> {
        Statistics::new(self.samples())
    }

    /// True if both snapshots read the same sample storage.
    pub fn shares_storage_with(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.cur, &other.cur)
    }

    /// Append in O(1): write the next free slot, starting a new chunk when the
    /// current one is full.
    fn push(&mut self, mut sample: Sample) {
        loop {
            if self.fill == self.cur.slots.len() {
                self.prev = Some(std::mem::replace(&mut self.cur, Chunk::new(self.capacity)));
                self.fill = 0;
            }
            match self.cur.slots[self.fill].set(sample) {
                Ok(()) => break,
                // slot written by an update that was never published
                Err(back) => {
                    sample = back;
                    self.rebuild(self.capacity);
                }
            }
        }
        self.fill += 1;
        self.len = (self.len + 1).min(self.capacity);
    }

    /// Copy the newest samples into a fresh chunk sized for `capacity`.
    fn rebuild(&mut self, capacity: usize) {
        let keep = self.len.min(capacity);
        let chunk = Chunk::new(capacity);
        for (slot, sample) in chunk.slots.iter().zip(self.samples().skip(self.len - keep)) {
            let _ = slot.set(sample.clone());
        }
        self.prev = None;
        self.cur = chunk;
        self.fill = keep;
        self.len = keep;
        self.capacity = capacity;
    }
}

/// Ring buffer of samples for one target, safe to share between the probe
/// tasks and the renderer.
#[derive(Debug)]
pub struct SampleStore {
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl SampleStore {
    /// Create an empty store. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty(capacity)),
            writer: Mutex::new(()),
        }
    }

    /// Append a sample, evicting the oldest one when the window is full.
    /// O(1) amortized, independent of the capacity.
    ///
    /// Fails without touching the window if the sample's sequence number is not
    /// greater than the last recorded one.
    pub fn record(&self, sample: Sample) -> Result<Arc<Snapshot>> {
        self.update(|next| {
            if let Some(last) = next.last_sequence {
                if sample.sequence <= last {
                    return Err(PingError::StaleSequence {
                        last: last.0,
                        got: sample.sequence.0,
                    });
                }
            }

            trace!(
                sequence = sample.sequence.0,
                status = sample.outcome.status(),
                "Recording sample"
            );

            next.last_sequence = Some(sample.sequence);
            next.recorded += 1;
            if sample.is_loss() {
                next.lost += 1;
            }
            next.push(sample);
            Ok(())
        })
    }

    /// Current window. Cheap; the returned snapshot never changes.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn stats(&self) -> Result<Statistics> {
        self.current.load().stats()
    }

    pub fn capacity(&self) -> usize {
        self.current.load().capacity
    }

    /// Change the window size. Shrinking drops the oldest samples.
    pub fn resize(&self, capacity: usize) -> Result<Arc<Snapshot>> {
        if capacity == 0 {
            return Err(PingError::Config("capacity must be > 0".into()));
        }
        self.update(|next| {
            debug!(from = next.capacity, to = capacity, "Resizing sample window");
            next.rebuild(capacity);
            Ok(())
        })
    }

    /// Drop all samples and counters. Sequence ordering is kept so that later
    /// samples still have to be newer than anything recorded before.
    pub fn reset(&self) -> Arc<Snapshot> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        let mut next = Snapshot::empty(current.capacity);
        next.last_sequence = current.last_sequence;
        next.version = current.version + 1;
        debug!(dropped = current.len, "Resetting sample window");
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        next
    }

    fn update(&self, f: impl FnOnce(&mut Snapshot) -> Result<()>) -> Result<Arc<Snapshot>> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&self.current.load());
        f(&mut next)?;
        next.version += 1;
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Ok(next)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::monitor::model::ProbeOutcome;
    use proptest::prelude::*;
    use std::time::Duration;

    proptest! {
        #[test]
        fn test_never_exceeds_capacity(
            capacity in 1usize..50,
            outcomes in proptest::collection::vec(proptest::option::of(0u64..5_000), 0..300),
        ) {
            let store = SampleStore::new(capacity);
            for (i, ms) in outcomes.iter().enumerate() {
                let outcome = match ms {
                    Some(ms) => ProbeOutcome::Reply(Duration::from_millis(*ms)),
                    None => ProbeOutcome::Timeout,
                };
                store.record(Sample::new(SequenceNumber(i as u64), outcome)).unwrap();
                prop_assert!(store.snapshot().len() <= capacity);
            }

            // oldest-first eviction: the window is exactly the newest samples
            let snapshot = store.snapshot();
            let kept: Vec<u64> = snapshot.samples().map(|s| s.sequence.0).collect();
            let start = outcomes.len().saturating_sub(capacity) as u64;
            let expected: Vec<u64> = (start..outcomes.len() as u64).collect();
            prop_assert_eq!(kept, expected);
            prop_assert_eq!(snapshot.recorded(), outcomes.len() as u64);
        }
    }
}
