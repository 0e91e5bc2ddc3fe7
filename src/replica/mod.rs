//! Order book replica engine.
//!
//! The engine is split across two execution contexts:
//! - the feed task holds a [`FeedHandle`] and only ever pushes records
//!   onto the shared [`IngestQueue`] and marks refresh progress;
//! - the consumer owns the [`OrderBookReplica`] and periodically calls
//!   [`OrderBookReplica::drain_and_apply`], which is the only path that
//!   mutates the [`ReplicaStore`].
//!
//! Submodules:
//! - [`types`] - Entry keys, entries and mutation records
//! - [`store`] - The keyed replica and summary fields
//! - [`refresh`] - Multi-part refresh completion tracking
//! - [`queue`] - Producer/consumer hand-off
//! - [`anomaly`] - Recoverable anomaly counters

pub mod anomaly;
pub mod queue;
pub mod refresh;
pub mod store;
pub mod types;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::Result;

pub use anomaly::AnomalyReport;
pub use queue::{IngestItem, IngestQueue, Phase, QueueStats};
pub use refresh::{RefreshState, RefreshTracker, RefreshTransition};
pub use store::{AppliedEffect, ReplicaSnapshot, ReplicaStore, UnknownUpdatePolicy};
pub use types::{Entry, EntryKey, Fields, MutationKind, MutationRecord};

/// Construction options for [`OrderBookReplica`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplicaOptions {
    pub unknown_update_policy: UnknownUpdatePolicy,
    /// `None` keeps the ingest queue unbounded.
    pub queue_capacity: Option<usize>,
}

/// One mutation accepted during a consumption cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: EntryKey,
    pub kind: MutationKind,
    pub effect: AppliedEffect,
}

/// Result of one [`OrderBookReplica::drain_and_apply`] cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    /// Accepted mutations in the order they were applied.
    pub changes: Vec<Change>,
    /// Full summary state after the cycle.
    pub summary: Fields,
    /// Summary field names written during this cycle.
    pub touched_summary: Vec<String>,
    /// Number of live entries after the cycle.
    pub entry_count: usize,
    /// Whether the initial refresh had completed when the cycle began.
    pub book_complete: bool,
    /// Whether the replica changed since the consumer's last
    /// [`OrderBookReplica::snapshot`]; cleared only by taking one.
    pub dirty: bool,
    /// Cumulative anomaly counts for this engine.
    pub anomalies: AnomalyReport,
    /// Items pushed while this cycle ran, left for the next one.
    pub queue_depth: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.touched_summary.is_empty()
    }

    /// The summary fields written this cycle with their current values.
    pub fn touched_summary_fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.touched_summary
            .iter()
            .filter_map(|name| self.summary.get(name).map(|value| (name.as_str(), value)))
    }
}

/// Producer-side handle given to the feed adapter.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    queue: Arc<IngestQueue>,
    refresh: Arc<RefreshTracker>,
}

impl FeedHandle {
    /// Queues one entry mutation.
    pub fn push_mutation(&self, phase: Phase, record: MutationRecord) {
        self.queue.push(
            IngestItem::Mutation(record),
            phase,
            self.refresh.is_complete(),
        );
    }

    /// Queues a summary field update.
    pub fn push_summary(&self, phase: Phase, fields: Fields) {
        self.queue
            .push(IngestItem::Summary(fields), phase, self.refresh.is_complete());
    }

    /// Records a refresh message after its entries have been queued.
    ///
    /// `complete` is the message's completeness indicator; `None` marks the
    /// final part.
    pub fn mark_refresh(&self, complete: Option<bool>) -> RefreshTransition {
        self.refresh.mark(complete)
    }

    /// Counts a record that could not be decoded into a mutation.
    pub fn record_malformed(&self) {
        self.queue.record_rejected();
    }

    pub fn is_complete(&self) -> bool {
        self.refresh.is_complete()
    }

    /// Polls every `poll` until the book is complete, giving up after
    /// `timeout`. Lets a task other than the consumer watch the refresh.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::RefreshTimeout`](crate::ReplicaError::RefreshTimeout)
    /// if the deadline passes first.
    pub async fn wait_until_complete(&self, poll: Duration, timeout: Duration) -> Result<()> {
        self.refresh.wait_until_complete(poll, timeout).await
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}

/// Consumer-side replica engine; one instance per subscription.
#[derive(Debug)]
pub struct OrderBookReplica {
    store: ReplicaStore,
    queue: Arc<IngestQueue>,
    refresh: Arc<RefreshTracker>,
    cycles: u64,
}

impl OrderBookReplica {
    /// Creates an engine and the feed handle that writes into it.
    pub fn new(options: ReplicaOptions) -> (Self, FeedHandle) {
        let queue = Arc::new(IngestQueue::with_capacity(options.queue_capacity));
        let refresh = Arc::new(RefreshTracker::new());

        let feed = FeedHandle {
            queue: Arc::clone(&queue),
            refresh: Arc::clone(&refresh),
        };
        let replica = Self {
            store: ReplicaStore::new(options.unknown_update_policy),
            queue,
            refresh,
            cycles: 0,
        };

        (replica, feed)
    }

    /// Drains everything queued so far and applies it in order.
    ///
    /// Completion is read before the drain. The feed marks a refresh only
    /// after queuing its entries, so a complete book reported here always
    /// has every refresh entry applied.
    pub fn drain_and_apply(&mut self) -> ChangeSet {
        let book_complete = self.refresh.is_complete();
        let items = self.queue.drain();
        let mut changes = Vec::with_capacity(items.len());
        let mut touched = BTreeSet::new();

        for item in items {
            match item {
                IngestItem::Mutation(record) => {
                    let key = record.key.clone();
                    let kind = record.kind;
                    let effect = self.store.apply(record);
                    if effect.is_applied() {
                        changes.push(Change { key, kind, effect });
                    }
                }
                IngestItem::Summary(fields) => {
                    touched.extend(fields.keys().cloned());
                    self.store.merge_summary(fields);
                }
            }
        }

        self.cycles += 1;
        let change_set = ChangeSet {
            changes,
            summary: self.store.summary().clone(),
            touched_summary: touched.into_iter().collect(),
            entry_count: self.store.len(),
            book_complete,
            dirty: self.store.is_dirty(),
            anomalies: self.anomalies(),
            queue_depth: self.queue.len(),
        };

        if !change_set.is_empty() {
            debug!(
                cycle = self.cycles,
                changes = change_set.changes.len(),
                summary_fields = change_set.touched_summary.len(),
                entry_count = change_set.entry_count,
                book_complete = change_set.book_complete,
                "Applied batch"
            );
        }

        change_set
    }

    /// Copies the replica and clears its dirty flag.
    pub fn snapshot(&mut self) -> ReplicaSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &ReplicaStore {
        &self.store
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.store.get(key)
    }

    pub fn is_complete(&self) -> bool {
        self.refresh.is_complete()
    }

    pub fn refresh(&self) -> &RefreshTracker {
        &self.refresh
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Anomalies from every component of this engine.
    pub fn anomalies(&self) -> AnomalyReport {
        let stats = self.queue.stats();
        let mut report = self.store.anomalies();
        report.malformed += stats.rejected;
        report.late_refreshes = self.refresh.late_refreshes();
        report.queue_overflows = stats.overflows;
        report.queue_drops = stats.dropped;
        report
    }

    /// Number of completed consumption cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
