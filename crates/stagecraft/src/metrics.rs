//! In-process runtime counters
//!
//! Atomic counters with point-in-time snapshots. These are the counters the
//! runtime itself consumes (overflow accounting, dead-letter totals) plus
//! the aggregates an embedding application typically wants to log.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Stage-wide counters
#[derive(Debug, Default)]
pub struct StageMetrics {
    /// Actors created via the stage
    pub actors_created: AtomicU64,
    /// Actors that completed their stop sequence
    pub actors_stopped: AtomicU64,
    /// Instance replacements performed by supervision
    pub actors_restarted: AtomicU64,
    /// Failures routed to supervisors
    pub failures_routed: AtomicU64,
    /// Escalations between supervisors
    pub escalations: AtomicU64,
}

impl StageMetrics {
    /// Fresh zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_actor_created(&self) {
        self.actors_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_actor_stopped(&self) {
        self.actors_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_actor_restarted(&self) {
        self.actors_restarted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure_routed(&self) {
        self.failures_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StageMetricsSnapshot {
        StageMetricsSnapshot {
            actors_created: self.actors_created.load(Ordering::Relaxed),
            actors_stopped: self.actors_stopped.load(Ordering::Relaxed),
            actors_restarted: self.actors_restarted.load(Ordering::Relaxed),
            failures_routed: self.failures_routed.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`StageMetrics`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageMetricsSnapshot {
    /// Actors created via the stage
    pub actors_created: u64,
    /// Actors that completed their stop sequence
    pub actors_stopped: u64,
    /// Instance replacements performed by supervision
    pub actors_restarted: u64,
    /// Failures routed to supervisors
    pub failures_routed: u64,
    /// Escalations between supervisors
    pub escalations: u64,
}

/// Per-mailbox counters
#[derive(Debug, Default)]
pub struct MailboxMetrics {
    /// Invocations accepted into the queue
    pub enqueued: AtomicU64,
    /// Invocations whose closure ran to completion or error
    pub delivered: AtomicU64,
    /// Invocations discarded by a bounded overflow policy
    pub dropped: AtomicU64,
    /// Current queue depth
    pub depth: AtomicUsize,
    /// Times the mailbox was suspended by a failure
    pub suspensions: AtomicU64,
}

impl MailboxMetrics {
    /// Fresh zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_enqueued(&self, depth: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self, depth: usize) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    /// Invocations discarded so far
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MailboxMetricsSnapshot {
        MailboxMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            depth: self.depth.load(Ordering::Relaxed),
            suspensions: self.suspensions.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`MailboxMetrics`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxMetricsSnapshot {
    /// Invocations accepted into the queue
    pub enqueued: u64,
    /// Invocations whose closure ran to completion or error
    pub delivered: u64,
    /// Invocations discarded by a bounded overflow policy
    pub dropped: u64,
    /// Current queue depth
    pub depth: usize,
    /// Times the mailbox was suspended by a failure
    pub suspensions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_metrics_snapshot() {
        let metrics = StageMetrics::new();
        metrics.record_actor_created();
        metrics.record_actor_created();
        metrics.record_actor_restarted();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.actors_created, 2);
        assert_eq!(snapshot.actors_restarted, 1);
        assert_eq!(snapshot.actors_stopped, 0);
    }

    #[test]
    fn test_mailbox_drop_counter() {
        let metrics = MailboxMetrics::new();
        metrics.record_dropped();
        assert_eq!(metrics.dropped_count(), 1);
        metrics.record_dropped();
        assert_eq!(metrics.dropped_count(), 2);
    }
}
