//! Tracks whether the multi-part initial refresh has fully arrived.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{ReplicaError, Result};

/// Completeness of the initial snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    InProgress,
    Complete,
}

/// Outcome of feeding one refresh message to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTransition {
    /// A non-final part of a multi-part refresh.
    Pending,
    /// This refresh completed the book.
    Completed,
    /// The book was already complete; counted as a late refresh.
    AlreadyComplete,
}

/// Refresh state machine shared between the feed and the consumer.
///
/// Starts `InProgress` and moves to `Complete` exactly once. It never
/// reverts; a re-subscription builds a new engine instead.
#[derive(Debug, Default)]
pub struct RefreshTracker {
    complete: AtomicBool,
    refreshes: AtomicU64,
    late_refreshes: AtomicU64,
}

impl RefreshTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one refresh message.
    ///
    /// `complete` is the message's completeness indicator; an absent
    /// indicator means the message is the final part.
    pub fn mark(&self, complete: Option<bool>) -> RefreshTransition {
        let final_part = complete.unwrap_or(true);
        let part = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;

        if self.is_complete() {
            self.late_refreshes.fetch_add(1, Ordering::Relaxed);
            warn!(part, final_part, "Refresh received after book was complete");
            return RefreshTransition::AlreadyComplete;
        }

        if !final_part {
            debug!(part, "Multipart refresh, not yet complete");
            return RefreshTransition::Pending;
        }

        match self
            .complete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                info!(parts = part, "Final refresh, order book complete");
                RefreshTransition::Completed
            }
            Err(_) => {
                self.late_refreshes.fetch_add(1, Ordering::Relaxed);
                warn!(part, "Refresh received after book was complete");
                RefreshTransition::AlreadyComplete
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn state(&self) -> RefreshState {
        if self.is_complete() {
            RefreshState::Complete
        } else {
            RefreshState::InProgress
        }
    }

    /// Number of refresh messages seen, including late ones.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn late_refreshes(&self) -> u64 {
        self.late_refreshes.load(Ordering::Relaxed)
    }

    /// Polls [`is_complete`](Self::is_complete) every `poll` until the book
    /// is complete or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicaError::RefreshTimeout`] if the deadline passes first.
    pub async fn wait_until_complete(&self, poll: Duration, timeout: Duration) -> Result<()> {
        let wait = async {
            let mut interval = tokio::time::interval(poll);
            loop {
                interval.tick().await;
                if self.is_complete() {
                    return;
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ReplicaError::RefreshTimeout(timeout))
    }
}
