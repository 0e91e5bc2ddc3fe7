//! Counters for recoverable protocol anomalies.

use serde::Serialize;

/// Cumulative anomaly counts for one engine instance.
///
/// None of these conditions stop the engine; each one is handled by the
/// corrective action described on the counter and then counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnomalyReport {
    /// `Add` for a key that already existed; the entry was overwritten.
    pub duplicate_adds: u64,
    /// `Update` for a key that did not exist; inserted or rejected per policy.
    pub unknown_updates: u64,
    /// `Delete` for a key that did not exist; treated as a no-op.
    pub unknown_deletes: u64,
    /// Records rejected because they could not be applied as received.
    pub malformed: u64,
    /// Refresh messages received after the book was already complete.
    pub late_refreshes: u64,
    /// Pushes accepted beyond the queue capacity without dropping anything.
    pub queue_overflows: u64,
    /// Refresh-phase items dropped to make room in a bounded queue.
    pub queue_drops: u64,
}

impl AnomalyReport {
    pub fn total(&self) -> u64 {
        self.duplicate_adds
            + self.unknown_updates
            + self.unknown_deletes
            + self.malformed
            + self.late_refreshes
            + self.queue_overflows
            + self.queue_drops
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }
}
