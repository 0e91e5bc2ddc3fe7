//! Ordered hand-off between the feed-reading task and the replica consumer.
//!
//! Pushes never block. The queue is unbounded unless a capacity is
//! configured; a bounded queue only ever sheds refresh-phase items, and only
//! once the book is complete. Every shed item and every push past capacity is
//! counted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use super::types::{Fields, MutationRecord};

/// One unit of work for the replica.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestItem {
    Mutation(MutationRecord),
    Summary(Fields),
}

/// Which part of the stream an item arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Carried by a refresh (snapshot) message.
    Refresh,
    /// Carried by an incremental update message.
    Incremental,
}

#[derive(Debug)]
struct Queued {
    item: IngestItem,
    phase: Phase,
}

/// Point-in-time queue metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub depth: usize,
    pub high_water: usize,
    pub pushed: u64,
    pub overflows: u64,
    pub dropped: u64,
    /// Records the feed could not decode and never enqueued.
    pub rejected: u64,
}

/// Thread-safe FIFO of [`IngestItem`]s.
#[derive(Debug)]
pub struct IngestQueue {
    items: Mutex<VecDeque<Queued>>,
    capacity: Option<usize>,
    high_water: AtomicUsize,
    pushed: AtomicU64,
    overflows: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
}

impl IngestQueue {
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            high_water: AtomicUsize::new(0),
            pushed: AtomicU64::new(0),
            overflows: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Queued>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item.
    ///
    /// `book_complete` tells a full bounded queue whether refresh-phase items
    /// may be shed to make room.
    pub fn push(&self, item: IngestItem, phase: Phase, book_complete: bool) {
        let mut items = self.lock();

        if let Some(capacity) = self.capacity {
            if items.len() >= capacity {
                let oldest_refresh = if book_complete {
                    items.iter().position(|q| q.phase == Phase::Refresh)
                } else {
                    None
                };

                match oldest_refresh {
                    Some(pos) => {
                        items.remove(pos);
                        let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(capacity, dropped, "Ingest queue full, dropped oldest refresh item");
                    }
                    None => {
                        let overflows = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
                        if overflows == 1 || overflows % 1000 == 0 {
                            warn!(
                                capacity,
                                depth = items.len(),
                                overflows,
                                "Ingest queue over capacity"
                            );
                        }
                    }
                }
            }
        }

        items.push_back(Queued { item, phase });
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.high_water.fetch_max(items.len(), Ordering::Relaxed);
    }

    /// Removes and returns everything currently queued, in push order.
    /// Never waits for new items.
    pub fn drain(&self) -> Vec<IngestItem> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into_iter().map(|q| q.item).collect()
    }

    /// Counts a record the producer rejected before it reached the queue.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            depth: self.len(),
            high_water: self.high_water.load(Ordering::Relaxed),
            pushed: self.pushed.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for IngestQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn delete(key: &str) -> IngestItem {
        IngestItem::Mutation(MutationRecord::delete(key))
    }

    fn keys(items: &[IngestItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                IngestItem::Mutation(record) => record.key.to_string(),
                IngestItem::Summary(_) => "<summary>".to_string(),
            })
            .collect()
    }

    #[test]
    fn drain_preserves_push_order_and_empties_queue() {
        let queue = IngestQueue::unbounded();
        queue.push(delete("a"), Phase::Incremental, true);
        queue.push(IngestItem::Summary(Fields::new()), Phase::Incremental, true);
        queue.push(delete("b"), Phase::Incremental, true);

        assert_eq!(keys(&queue.drain()), ["a", "<summary>", "b"]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn bounded_queue_never_sheds_while_refresh_in_progress() {
        let queue = IngestQueue::with_capacity(Some(2));
        for key in ["a", "b", "c"] {
            queue.push(delete(key), Phase::Refresh, false);
        }

        let stats = queue.stats();
        assert_eq!(stats.depth, 3);
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.dropped, 0);
        assert_eq!(keys(&queue.drain()), ["a", "b", "c"]);
    }

    #[test]
    fn bounded_queue_sheds_oldest_refresh_item_after_complete() {
        let queue = IngestQueue::with_capacity(Some(2));
        queue.push(delete("inc"), Phase::Incremental, true);
        queue.push(delete("snap"), Phase::Refresh, true);
        queue.push(delete("next"), Phase::Incremental, true);

        assert_eq!(queue.stats().dropped, 1);
        assert_eq!(keys(&queue.drain()), ["inc", "next"]);
    }

    #[test]
    fn bounded_queue_keeps_incremental_items_when_full() {
        let queue = IngestQueue::with_capacity(Some(1));
        queue.push(delete("a"), Phase::Incremental, true);
        queue.push(delete("b"), Phase::Incremental, true);

        let stats = queue.stats();
        assert_eq!(stats.overflows, 1);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.high_water, 2);
    }

    #[test]
    fn concurrent_producer_items_arrive_in_order() {
        let queue = Arc::new(IngestQueue::unbounded());
        let producer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            for i in 0..500 {
                producer.push(delete(&i.to_string()), Phase::Incremental, true);
            }
        });

        let mut seen = Vec::new();
        while seen.len() < 500 {
            seen.extend(keys(&queue.drain()));
            std::thread::yield_now();
        }
        handle.join().unwrap();

        let expected: Vec<String> = (0..500).map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
